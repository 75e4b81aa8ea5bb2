//! # echo-crypto
//!
//! Identitaets-Verschluesselung fuer Echo.
//!
//! ## Module
//! - `envelope` - Passwort-basierte Envelope-Verschluesselung (PBKDF2 + AES-256-CBC)
//! - `identity` - Ableitung der pseudonymen SessionIdentity (`hashedIdentity`)
//! - `pool` - Begrenzter Worker-Pool fuer die CPU-lastige Schluesselableitung
//! - `types` - Gemeinsame Typen (DerivedKey, Envelope, KdfParameter)
//! - `error` - Fehlertypen
//!
//! ## Sicherheitshinweis
//! Das Envelope-Format bietet ausschliesslich Vertraulichkeit. Es gibt keinen
//! Authentifizierungs-Tag: Manipulationen am Ciphertext werden nicht erkannt
//! und fuehren entweder zu einem Entschluesselungsfehler oder zu verfaelschtem
//! Klartext. Ein authentifizierter Modus wuerde das Wire-Format aendern.

pub mod envelope;
pub mod error;
pub mod identity;
pub mod pool;
pub mod types;

// Bequeme Re-Exports
pub use envelope::{decrypt_envelope, decrypt_string, derive_key, encrypt_envelope, encrypt_string};
pub use error::{CryptoError, CryptoResult};
pub use identity::{hash_identity, issue_credential, resolve_identity};
pub use pool::KdfPool;
pub use types::{DerivedKey, Envelope, KdfParameter};
