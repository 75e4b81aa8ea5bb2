//! Gemeinsame Typen fuer das Kryptografie-Subsystem

use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};

/// Laenge des PBKDF2-Salts in Bytes
pub const SALT_LEN: usize = 16;

/// Laenge des CBC-Initialisierungsvektors in Bytes
pub const IV_LEN: usize = 16;

/// Laenge des abgeleiteten AES-256-Schluessels in Bytes
pub const KEY_LEN: usize = 32;

/// AES-Blockgroesse in Bytes
pub const BLOCK_LEN: usize = 16;

/// Minimale Laenge eines dekodierten Envelopes (Salt + IV)
pub const ENVELOPE_MIN_LEN: usize = SALT_LEN + IV_LEN;

/// Standard-Rundenzahl fuer PBKDF2-HMAC-SHA256
pub const STANDARD_KDF_RUNDEN: u32 = 32767;

/// Parameter der Schluesselableitung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParameter {
    /// Anzahl der PBKDF2-Iterationen
    pub runden: u32,
}

impl Default for KdfParameter {
    fn default() -> Self {
        Self {
            runden: STANDARD_KDF_RUNDEN,
        }
    }
}

/// Aus Passwort und Salt abgeleiteter symmetrischer Schluessel
///
/// Wird pro Operation neu berechnet und nie persistiert.
/// Der Inhalt wird beim Drop genullt.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKey([u8; KEY_LEN]);

impl DerivedKey {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DerivedKey([REDACTED] {KEY_LEN} bytes)")
    }
}

/// Zerlegter Envelope: `salt(16) || iv(16) || ciphertext`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub salt: [u8; SALT_LEN],
    pub iv: [u8; IV_LEN],
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Serialisiert zu Bytes: [salt(16)] + [iv(16)] + [ciphertext]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ENVELOPE_MIN_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Zerlegt dekodierte Envelope-Bytes
    ///
    /// Weniger als 32 Bytes sind ein Eingabefehler. Die Laenge des
    /// Ciphertexts wird hier nicht geprueft.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() < ENVELOPE_MIN_LEN {
            return Err(CryptoError::eingabe(format!(
                "Envelope zu kurz: {} Bytes (Minimum: {ENVELOPE_MIN_LEN} Bytes)",
                bytes.len()
            )));
        }

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&bytes[..SALT_LEN]);
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&bytes[SALT_LEN..ENVELOPE_MIN_LEN]);

        Ok(Self {
            salt,
            iv,
            ciphertext: bytes[ENVELOPE_MIN_LEN..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_key_debug_ist_geschwaerzt() {
        let key = DerivedKey::new([7u8; KEY_LEN]);
        let debug = format!("{key:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("[7, 7"));
    }

    #[test]
    fn envelope_zerlegung() {
        let mut bytes = vec![1u8; SALT_LEN];
        bytes.extend_from_slice(&[2u8; IV_LEN]);
        bytes.extend_from_slice(&[3u8; BLOCK_LEN]);

        let envelope = Envelope::from_bytes(&bytes).unwrap();
        assert_eq!(envelope.salt, [1u8; SALT_LEN]);
        assert_eq!(envelope.iv, [2u8; IV_LEN]);
        assert_eq!(envelope.ciphertext, vec![3u8; BLOCK_LEN]);
        assert_eq!(envelope.to_bytes(), bytes);
    }

    #[test]
    fn zu_kurzer_envelope_ist_eingabefehler() {
        let ergebnis = Envelope::from_bytes(&[0u8; ENVELOPE_MIN_LEN - 1]);
        assert!(matches!(ergebnis, Err(CryptoError::Eingabe(_))));
    }

    #[test]
    fn standard_rundenzahl() {
        assert_eq!(KdfParameter::default().runden, 32767);
    }
}
