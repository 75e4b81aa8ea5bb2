//! Fehlertypen fuer das Kryptografie-Subsystem

use thiserror::Error;

/// Fehler im Kryptografie-Subsystem
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Ungueltige Eingabe (kein Base64, Envelope zu kurz)
    ///
    /// Wird vor jedem Entschluesselungsversuch erkannt.
    #[error("Ungueltige Eingabe: {0}")]
    Eingabe(String),

    /// Entschluesselung fehlgeschlagen
    ///
    /// Traegt bewusst keine Details: falsches Passwort und beschaedigter
    /// Ciphertext sind von aussen nicht unterscheidbar.
    #[error("Entschluesselung fehlgeschlagen")]
    Entschluesselung,

    #[error("Verschluesselung fehlgeschlagen: {0}")]
    Verschluesselung(String),

    #[error("KDF-Worker-Pool geschlossen")]
    PoolGeschlossen,

    #[error("KDF-Worker abgebrochen: {0}")]
    WorkerAbgebrochen(String),
}

impl CryptoError {
    /// Erstellt einen Eingabefehler
    pub fn eingabe(msg: impl Into<String>) -> Self {
        Self::Eingabe(msg.into())
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;
