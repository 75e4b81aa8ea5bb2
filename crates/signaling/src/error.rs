//! Fehlertypen fuer den Signaling-Service

use echo_auth::AuthError;
use echo_core::EchoError;
use echo_protocol::ErrorCode;
use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Handshake abgelehnt
    #[error("Authentifizierungsfehler: {0}")]
    Auth(#[from] AuthError),

    /// Ungueltige Eingabe (z.B. Raum-Pfad)
    #[error("Ungueltige Anfrage: {0}")]
    Eingabe(#[from] EchoError),

    /// Nachricht im falschen Verbindungszustand
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    /// Erste Nachricht war kein Handshake
    #[error("Nicht authentifiziert")]
    NichtAuthentifiziert,

    /// Zweiter Handshake auf derselben Verbindung
    #[error("Bereits authentifiziert")]
    BereitsAuthentifiziert,

    /// Handshake nicht rechtzeitig erhalten
    #[error("Timeout")]
    Timeout,
}

impl SignalingError {
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }

    /// Fehler-Code fuer die Antwort an den Client
    pub fn protokoll_code(&self) -> ErrorCode {
        match self {
            Self::Auth(e) => e.protokoll_code(),
            Self::Eingabe(e) if e.ist_eingabefehler() => ErrorCode::InvalidRequest,
            Self::Protokoll(_) => ErrorCode::InvalidRequest,
            Self::NichtAuthentifiziert => ErrorCode::NotAuthenticated,
            Self::BereitsAuthentifiziert => ErrorCode::AlreadyAuthenticated,
            Self::Timeout => ErrorCode::Timeout,
            Self::Io(_) | Self::Eingabe(_) => ErrorCode::InternalError,
        }
    }

    /// Nachricht fuer den Client; interne Details bleiben im Log
    pub fn client_nachricht(&self) -> String {
        match self {
            Self::Auth(e) => e.client_nachricht(),
            Self::Io(_) => "Interner Serverfehler".into(),
            Self::Eingabe(e) if !e.ist_eingabefehler() => "Interner Serverfehler".into(),
            andere => andere.to_string(),
        }
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
