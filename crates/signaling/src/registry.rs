//! Connection-Registry – wer ist gerade verbunden
//!
//! Prozessweite Tabelle aller aktiven Verbindungen, indiziert nach
//! SessionIdentity (bzw. einem anonymen Platzhalter aus der ConnectionId).
//! Die Registry ist kein globales Singleton: sie wird als Clone-Handle
//! (Arc intern) an alle Beteiligten weitergereicht.
//!
//! ## Reconnect
//! Registriert sich dieselbe Identitaet erneut, ersetzt der neue Eintrag den
//! alten. Ein spaeteres `entfernen` der alten ConnectionId trifft den neuen
//! Eintrag nicht. Die ersetzte Verbindung bekommt ein Trennsignal und
//! beendet ihren Task selbst.
//!
//! ## Lock-Reihenfolge
//! `eintraege` wird immer vor `index` gesperrt, nie umgekehrt.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use echo_core::{ConnectionId, SessionIdentity};
use echo_protocol::MemberInfo;
use tokio::sync::Notify;

// ---------------------------------------------------------------------------
// Trennsignal
// ---------------------------------------------------------------------------

/// Fordert den Task einer Verbindung auf, sich zu beenden
///
/// Clones teilen dasselbe Signal. Ein ausgeloestes Signal bleibt gespeichert,
/// bis der Task es abholt.
#[derive(Clone, Default)]
pub struct Trennsignal(Arc<Notify>);

impl Trennsignal {
    pub fn ausloesen(&self) {
        self.0.notify_one();
    }

    pub async fn abwarten(&self) {
        self.0.notified().await;
    }
}

impl PartialEq for Trennsignal {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Trennsignal {}

impl std::fmt::Debug for Trennsignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Trennsignal")
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Eine aktive Verbindung
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    /// Remote-Adresse (weitergeleitet oder Socket-Peer)
    pub adresse: String,
    /// None solange keine Identitaet aufgeloest wurde
    pub identity: Option<SessionIdentity>,
    pub erstellt_am: DateTime<Utc>,
    pub trennsignal: Trennsignal,
}

impl Connection {
    pub fn neu(adresse: impl Into<String>, identity: Option<SessionIdentity>) -> Self {
        Self {
            id: ConnectionId::new(),
            adresse: adresse.into(),
            identity,
            erstellt_am: Utc::now(),
            trennsignal: Trennsignal::default(),
        }
    }

    pub fn schluessel(&self) -> RegistryKey {
        match &self.identity {
            Some(identity) => RegistryKey::Identitaet(identity.clone()),
            None => RegistryKey::Anonym(self.id),
        }
    }

    /// Oeffentliche Sicht fuer Raum-Events
    pub fn member_info(&self) -> MemberInfo {
        MemberInfo {
            connection_id: self.id,
            identity: self.identity.clone(),
        }
    }
}

/// Schluessel eines Registry-Eintrags
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegistryKey {
    Identitaet(SessionIdentity),
    Anonym(ConnectionId),
}

// ---------------------------------------------------------------------------
// ConnectionRegistry
// ---------------------------------------------------------------------------

/// Thread-safe Registry aller aktiven Verbindungen
///
/// Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    eintraege: DashMap<RegistryKey, Connection>,
    /// connection_id -> Schluessel des Eintrags
    index: DashMap<ConnectionId, RegistryKey>,
}

impl ConnectionRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert eine Verbindung
    ///
    /// Gibt die ersetzte Verbindung zurueck, falls die Identitaet bereits
    /// registriert war. Deren Trennsignal ist dann bereits ausgeloest.
    pub fn registrieren(&self, verbindung: Connection) -> Option<Connection> {
        let schluessel = verbindung.schluessel();
        let id = verbindung.id;

        match self.inner.eintraege.entry(schluessel.clone()) {
            Entry::Occupied(mut eintrag) => {
                let alt = eintrag.insert(verbindung);
                self.inner.index.remove(&alt.id);
                self.inner.index.insert(id, schluessel);
                alt.trennsignal.ausloesen();
                tracing::debug!(
                    alt = %alt.id,
                    neu = %id,
                    "Identitaet erneut registriert – alte Verbindung ersetzt"
                );
                Some(alt)
            }
            Entry::Vacant(eintrag) => {
                self.inner.index.insert(id, schluessel);
                eintrag.insert(verbindung);
                None
            }
        }
    }

    /// Entfernt eine Verbindung (idempotent)
    ///
    /// Unbekannte oder bereits ersetzte Verbindungen sind ein No-op.
    pub fn entfernen(&self, connection_id: &ConnectionId) -> Option<Connection> {
        let schluessel = self.inner.index.get(connection_id).map(|s| s.clone())?;

        let entfernt = self
            .inner
            .eintraege
            .remove_if(&schluessel, |_, v| v.id == *connection_id)
            .map(|(_, v)| v);

        self.inner.index.remove_if(connection_id, |_, s| *s == schluessel);
        entfernt
    }

    /// Verbindung zu einer Identitaet
    pub fn nach_identitaet(&self, identity: &SessionIdentity) -> Option<Connection> {
        self.inner
            .eintraege
            .get(&RegistryKey::Identitaet(identity.clone()))
            .map(|e| e.value().clone())
    }

    /// Verbindung zu einer ConnectionId
    pub fn verbindung(&self, connection_id: &ConnectionId) -> Option<Connection> {
        let schluessel = self.inner.index.get(connection_id).map(|s| s.clone())?;
        self.inner
            .eintraege
            .get(&schluessel)
            .filter(|e| e.id == *connection_id)
            .map(|e| e.value().clone())
    }

    pub fn enthaelt(&self, connection_id: &ConnectionId) -> bool {
        self.verbindung(connection_id).is_some()
    }

    /// Anzahl registrierter Verbindungen
    pub fn anzahl(&self) -> usize {
        self.inner.eintraege.len()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("anzahl", &self.anzahl())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
