//! Fehlertypen fuer das Authentifizierungs-Gate

use echo_protocol::ErrorCode;
use thiserror::Error;

/// Alle moeglichen Fehler beim Handshake
#[derive(Debug, Error)]
pub enum AuthError {
    /// Kein oder leeres Bearer-Token im Authorization-Feld
    #[error("Credential fehlt")]
    CredentialFehlt,

    /// Token vorhanden, aber vom Validator abgelehnt
    #[error("Credential ungueltig: {0}")]
    CredentialUngueltig(String),

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl AuthError {
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Fehler-Code fuer die Antwort an den Client
    pub fn protokoll_code(&self) -> ErrorCode {
        match self {
            Self::CredentialFehlt | Self::CredentialUngueltig(_) => ErrorCode::AuthenticationFailed,
            Self::Intern(_) => ErrorCode::InternalError,
        }
    }

    /// Nachricht fuer den Client; interne Details bleiben im Log
    pub fn client_nachricht(&self) -> String {
        match self {
            Self::Intern(_) => "Interner Serverfehler".into(),
            andere => andere.to_string(),
        }
    }
}

/// Result-Alias fuer das Auth-Crate
pub type AuthResult<T> = Result<T, AuthError>;
