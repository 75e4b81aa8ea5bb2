//! Pseudonyme Identitaet (`hashedIdentity`)
//!
//! Die SessionIdentity ist der SHA-256-Hash (Hex, Kleinbuchstaben) der
//! Identitaetsquelle. Sie ist stabil ueber Reconnects hinweg und dient dem
//! externen Speicher als Eindeutigkeits-Schluessel; die Quelle selbst wird
//! nie gespeichert.
//!
//! Die Quelle reist verschluesselt im Bearer-Token: `issue_credential`
//! erzeugt ein solches Token, `resolve_identity` loest es wieder auf.

use echo_core::SessionIdentity;
use sha2::{Digest, Sha256};

use crate::envelope::{decrypt_string, encrypt_string};
use crate::error::CryptoResult;
use crate::types::KdfParameter;

/// Berechnet die nicht umkehrbare Form einer Identitaetsquelle
pub fn hash_identity(quelle: &str) -> SessionIdentity {
    let digest = Sha256::digest(quelle.as_bytes());
    SessionIdentity::aus_hash(hex::encode(digest))
}

/// Erzeugt ein Bearer-Token das die Identitaetsquelle verschluesselt traegt
pub fn issue_credential(quelle: &str, geheimnis: &str, params: &KdfParameter) -> CryptoResult<String> {
    encrypt_string(quelle, geheimnis, params)
}

/// Entschluesselt ein Token und leitet daraus die SessionIdentity ab
pub fn resolve_identity(
    token: &str,
    geheimnis: &str,
    params: &KdfParameter,
) -> CryptoResult<SessionIdentity> {
    let quelle = decrypt_string(token, geheimnis, params)?;
    Ok(hash_identity(&quelle))
}
