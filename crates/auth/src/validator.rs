//! Credential-Validatoren
//!
//! Ein Validator bekommt das bereits extrahierte, nicht-leere Bearer-Token
//! und entscheidet, ob es akzeptiert wird. Optional liefert er die
//! aufgeloeste [`SessionIdentity`]; ohne Identitaet wird die Verbindung
//! anonym registriert.

use async_trait::async_trait;
use echo_core::SessionIdentity;
use echo_crypto::{CryptoError, KdfPool};

use crate::error::{AuthError, AuthResult};

/// Erweiterungspunkt fuer die Token-Pruefung
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    /// Kurzname fuer Logs
    fn name(&self) -> &'static str;

    /// Prueft ein Token und loest optional die Identitaet auf
    async fn pruefen(&self, token: &str) -> AuthResult<Option<SessionIdentity>>;
}

// ---------------------------------------------------------------------------
// PresenceValidator
// ---------------------------------------------------------------------------

/// Akzeptiert jedes nicht-leere Token ohne Identitaetsaufloesung
///
/// Bewusst schwach: es wird nur geprueft, dass ueberhaupt ein Credential
/// mitgeschickt wurde.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresenceValidator;

#[async_trait]
impl CredentialValidator for PresenceValidator {
    fn name(&self) -> &'static str {
        "praesenz"
    }

    async fn pruefen(&self, token: &str) -> AuthResult<Option<SessionIdentity>> {
        if token.trim().is_empty() {
            return Err(AuthError::CredentialFehlt);
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// EnvelopeValidator
// ---------------------------------------------------------------------------

/// Erwartet ein mit dem Server-Geheimnis verschluesseltes Envelope-Token
///
/// Die Entschluesselung laeuft im [`KdfPool`]; der Klartext ist die
/// Identitaetsquelle, daraus wird der SHA-256-Hash als Identitaet gebildet.
#[derive(Clone)]
pub struct EnvelopeValidator {
    pool: KdfPool,
    geheimnis: String,
}

impl EnvelopeValidator {
    pub fn neu(pool: KdfPool, geheimnis: impl Into<String>) -> Self {
        Self {
            pool,
            geheimnis: geheimnis.into(),
        }
    }
}

impl std::fmt::Debug for EnvelopeValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeValidator")
            .field("pool", &self.pool)
            .field("geheimnis", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl CredentialValidator for EnvelopeValidator {
    fn name(&self) -> &'static str {
        "envelope"
    }

    async fn pruefen(&self, token: &str) -> AuthResult<Option<SessionIdentity>> {
        match self
            .pool
            .resolve_identity(token.to_owned(), self.geheimnis.clone())
            .await
        {
            Ok(identity) => Ok(Some(identity)),
            Err(e @ (CryptoError::Eingabe(_) | CryptoError::Entschluesselung)) => {
                Err(AuthError::CredentialUngueltig(e.to_string()))
            }
            Err(e) => Err(AuthError::intern(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
