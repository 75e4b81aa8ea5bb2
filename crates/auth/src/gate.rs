//! Authentifizierungs-Gate
//!
//! Erste Station jeder Verbindung. Das Gate prueft den Handshake und legt
//! selbst keinerlei Zustand an: Registry-Eintraege und Raum-Mitgliedschaften
//! entstehen erst nachdem [`AuthGate::handshake`] erfolgreich war.

use std::sync::Arc;

use echo_core::SessionIdentity;
use echo_protocol::control::HandshakeRequest;

use crate::error::{AuthError, AuthResult};
use crate::validator::{CredentialValidator, PresenceValidator};

/// Extrahiert das Token aus `Bearer <token>`
///
/// Das Token ist der zweite durch Whitespace getrennte Teil. Fehlt er,
/// gibt es kein Credential.
pub fn bearer_token(authorization: Option<&str>) -> Option<&str> {
    let mut teile = authorization?.split_whitespace();
    let _schema = teile.next()?;
    teile.next()
}

/// Erste Adresse aus einem `x-forwarded-for`-artigen Feld
pub fn weitergeleitete_adresse(forwarded_for: Option<&str>) -> Option<&str> {
    forwarded_for?
        .split(',')
        .next()
        .map(str::trim)
        .filter(|a| !a.is_empty())
}

/// Ergebnis eines angenommenen Handshakes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authentifiziert {
    /// Aufgeloeste Identitaet (None = anonym registrieren)
    pub identity: Option<SessionIdentity>,
}

/// Prueft Handshakes mit einem austauschbaren [`CredentialValidator`]
#[derive(Clone)]
pub struct AuthGate {
    validator: Arc<dyn CredentialValidator>,
}

impl AuthGate {
    pub fn neu(validator: Arc<dyn CredentialValidator>) -> Self {
        Self { validator }
    }

    /// Gate mit reiner Praesenzpruefung
    pub fn praesenz() -> Self {
        Self::neu(Arc::new(PresenceValidator))
    }

    pub fn validator_name(&self) -> &'static str {
        self.validator.name()
    }

    /// Nimmt einen Handshake an oder lehnt ihn ab
    ///
    /// Ohne Token wird der Validator gar nicht erst aufgerufen.
    pub async fn handshake(&self, anfrage: &HandshakeRequest) -> AuthResult<Authentifiziert> {
        let token = match bearer_token(anfrage.authorization.as_deref()) {
            Some(token) => token,
            None => {
                tracing::debug!("Handshake ohne Bearer-Token abgelehnt");
                return Err(AuthError::CredentialFehlt);
            }
        };

        let identity = self.validator.pruefen(token).await.map_err(|e| {
            tracing::debug!(validator = self.validator.name(), fehler = %e, "Credential abgelehnt");
            e
        })?;

        Ok(Authentifiziert { identity })
    }
}

impl Default for AuthGate {
    fn default() -> Self {
        Self::praesenz()
    }
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("validator", &self.validator.name())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::EnvelopeValidator;
    use async_trait::async_trait;
    use echo_crypto::{hash_identity, issue_credential, KdfParameter, KdfPool};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn anfrage(authorization: Option<&str>) -> HandshakeRequest {
        HandshakeRequest {
            authorization: authorization.map(String::from),
            forwarded_for: None,
        }
    }

    /// Zaehlt Aufrufe, akzeptiert alles
    #[derive(Default)]
    struct Zaehler(AtomicUsize);

    #[async_trait]
    impl CredentialValidator for Zaehler {
        fn name(&self) -> &'static str {
            "zaehler"
        }

        async fn pruefen(&self, _token: &str) -> AuthResult<Option<SessionIdentity>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    #[test]
    fn bearer_token_extraktion() {
        assert_eq!(bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(Some("Bearer   abc  ")), Some("abc"));
        assert_eq!(bearer_token(Some("Bearer")), None);
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(Some("")), None);
        assert_eq!(bearer_token(None), None);
    }

    #[test]
    fn forwarded_for_erste_adresse() {
        assert_eq!(
            weitergeleitete_adresse(Some("203.0.113.7, 10.0.0.1")),
            Some("203.0.113.7")
        );
        assert_eq!(weitergeleitete_adresse(Some("  ")), None);
        assert_eq!(weitergeleitete_adresse(None), None);
    }

    #[tokio::test]
    async fn praesenz_gate_akzeptiert_token() {
        let gate = AuthGate::praesenz();
        let ergebnis = gate.handshake(&anfrage(Some("Bearer xyz"))).await.unwrap();
        assert!(ergebnis.identity.is_none());
    }

    #[tokio::test]
    async fn leeres_credential_erreicht_validator_nicht() {
        let zaehler = Arc::new(Zaehler::default());
        let gate = AuthGate::neu(zaehler.clone());

        for auth in [None, Some(""), Some("Bearer"), Some("Bearer   ")] {
            assert!(matches!(
                gate.handshake(&anfrage(auth)).await,
                Err(AuthError::CredentialFehlt)
            ));
        }
        assert_eq!(zaehler.0.load(Ordering::SeqCst), 0);

        gate.handshake(&anfrage(Some("Bearer t"))).await.unwrap();
        assert_eq!(zaehler.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn envelope_gate_liefert_identitaet() {
        let params = KdfParameter { runden: 1000 };
        let gate = AuthGate::neu(Arc::new(EnvelopeValidator::neu(
            KdfPool::neu(1, params),
            "geheim",
        )));
        assert_eq!(gate.validator_name(), "envelope");

        let token = issue_credential("bob", "geheim", &params).unwrap();
        let ergebnis = gate
            .handshake(&anfrage(Some(&format!("Bearer {token}"))))
            .await
            .unwrap();
        assert_eq!(ergebnis.identity, Some(hash_identity("bob")));
    }
}
