//! echo-auth – Authentifizierungs-Gate
//!
//! Dieses Crate implementiert:
//! - Extraktion des Bearer-Tokens aus dem Handshake
//! - [`AuthGate`]: entscheidet ueber Annahme/Ablehnung, bevor irgendein
//!   Verbindungszustand angelegt wird
//! - [`CredentialValidator`]: Erweiterungspunkt fuer die Token-Pruefung
//!   ([`PresenceValidator`] als Standard, [`EnvelopeValidator`] fuer
//!   verschluesselte Identitaets-Tokens)

pub mod error;
pub mod gate;
pub mod validator;

pub use error::{AuthError, AuthResult};
pub use gate::{bearer_token, weitergeleitete_adresse, AuthGate, Authentifiziert};
pub use validator::{CredentialValidator, EnvelopeValidator, PresenceValidator};
