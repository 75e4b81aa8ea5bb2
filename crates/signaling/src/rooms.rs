//! Raum-Orchestrator – dynamische Broadcast-Kanaele
//!
//! Raeume werden ueber ihre numerische ID (`/room-<n>`) adressiert und beim
//! ersten Beitritt angelegt. Jede Verbindung ist in hoechstens einem Raum;
//! ein Beitritt in einen anderen Raum verlaesst den bisherigen still.
//!
//! ## Nebenlaeufigkeit
//! Mitgliedschaften werden unter dem Shard-Lock des jeweiligen Raums
//! veraendert, gleichzeitige Beitritte gehen daher nie verloren. Das
//! `MemberJoined`-Event wird noch unter demselben Lock eingereiht, damit
//! alle Mitglieder Beitritte in derselben Reihenfolge sehen.
//!
//! ## Aufraeumen
//! Leere Raeume werden entfernt, sobald das letzte Mitglied geht
//! (ausser `leere_behalten` ist gesetzt). "Mitglied hat verlassen"-Events
//! gibt es nicht.

use std::sync::Arc;

use dashmap::DashMap;
use echo_core::{ConnectionId, RoomId};
use echo_protocol::{ControlMessage, MemberInfo};

use crate::broadcast::ClientSender;

/// Ein Raum-Mitglied: oeffentliche Info plus Send-Queue
#[derive(Debug, Clone)]
pub struct RaumMitglied {
    pub info: MemberInfo,
    pub sender: ClientSender,
}

impl RaumMitglied {
    pub fn connection_id(&self) -> ConnectionId {
        self.info.connection_id
    }
}

/// Broadcast-Domaene eines Raums (Mitglieder in Beitrittsreihenfolge)
#[derive(Debug, Default)]
struct RoomChannel {
    mitglieder: Vec<RaumMitglied>,
}

impl RoomChannel {
    fn entfernen(&mut self, connection_id: &ConnectionId) -> bool {
        let vorher = self.mitglieder.len();
        self.mitglieder.retain(|m| m.connection_id() != *connection_id);
        self.mitglieder.len() != vorher
    }

    fn senden(&self, nachricht: &ControlMessage) -> usize {
        self.mitglieder
            .iter()
            .filter(|m| m.sender.senden(nachricht.clone()))
            .count()
    }
}

/// Ergebnis eines Raum-Beitritts
#[derive(Debug, Clone)]
pub struct Beitritt {
    pub room_id: RoomId,
    /// Alle Mitglieder nach dem Beitritt (inkl. des Beitretenden)
    pub mitglieder: Vec<MemberInfo>,
    /// Anzahl zugestellter `MemberJoined`-Events
    pub zugestellt: usize,
    /// Raum der dafuer verlassen wurde
    pub vorheriger_raum: Option<RoomId>,
}

/// Verwaltet alle Raeume und die Zuordnung Verbindung -> Raum
///
/// Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct RoomOrchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    raeume: DashMap<RoomId, RoomChannel>,
    zuordnung: DashMap<ConnectionId, RoomId>,
    leere_behalten: bool,
}

impl RoomOrchestrator {
    pub fn neu(leere_behalten: bool) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                raeume: DashMap::new(),
                zuordnung: DashMap::new(),
                leere_behalten,
            }),
        }
    }

    pub fn leere_behalten(&self) -> bool {
        self.inner.leere_behalten
    }

    /// Tritt einem Raum bei (get-or-create)
    ///
    /// Broadcastet `MemberJoined` an alle Mitglieder des Raums, den
    /// Beitretenden eingeschlossen. Erneuter Beitritt in denselben Raum
    /// aendert die Mitgliedschaft nicht, sendet das Event aber erneut.
    pub fn raum_beitreten(&self, room_id: RoomId, mitglied: RaumMitglied) -> Beitritt {
        let connection_id = mitglied.connection_id();

        let vorheriger_raum = self
            .inner
            .zuordnung
            .insert(connection_id, room_id)
            .filter(|alt| *alt != room_id);
        if let Some(alt) = vorheriger_raum {
            self.aus_raum_entfernen(alt, &connection_id);
        }

        let event = ControlMessage::member_joined(room_id, mitglied.info.clone());
        let mut raum = self.inner.raeume.entry(room_id).or_default();
        match raum
            .mitglieder
            .iter()
            .position(|m| m.connection_id() == connection_id)
        {
            Some(i) => raum.mitglieder[i] = mitglied,
            None => raum.mitglieder.push(mitglied),
        }
        let zugestellt = raum.senden(&event);
        let mitglieder = raum.mitglieder.iter().map(|m| m.info.clone()).collect();
        drop(raum);

        Beitritt {
            room_id,
            mitglieder,
            zugestellt,
            vorheriger_raum,
        }
    }

    /// Verlaesst einen Raum
    ///
    /// Gibt `false` zurueck wenn die Verbindung nicht in diesem Raum war.
    pub fn raum_verlassen(&self, connection_id: &ConnectionId, room_id: RoomId) -> bool {
        if self
            .inner
            .zuordnung
            .remove_if(connection_id, |_, r| *r == room_id)
            .is_none()
        {
            return false;
        }
        self.aus_raum_entfernen(room_id, connection_id)
    }

    /// Entfernt eine Verbindung aus ihrem Raum (Disconnect)
    pub fn verbindung_entfernen(&self, connection_id: &ConnectionId) -> Option<RoomId> {
        let (_, room_id) = self.inner.zuordnung.remove(connection_id)?;
        self.aus_raum_entfernen(room_id, connection_id);
        Some(room_id)
    }

    /// Sendet eine Nachricht an alle Mitglieder eines Raums
    ///
    /// Gibt die Anzahl erfolgreicher Zustellungen zurueck.
    pub fn broadcast(&self, room_id: RoomId, nachricht: ControlMessage) -> usize {
        self.inner
            .raeume
            .get(&room_id)
            .map(|raum| raum.senden(&nachricht))
            .unwrap_or(0)
    }

    pub fn mitglieder(&self, room_id: RoomId) -> Vec<MemberInfo> {
        self.inner
            .raeume
            .get(&room_id)
            .map(|raum| raum.mitglieder.iter().map(|m| m.info.clone()).collect())
            .unwrap_or_default()
    }

    pub fn raum_von(&self, connection_id: &ConnectionId) -> Option<RoomId> {
        self.inner.zuordnung.get(connection_id).map(|r| *r)
    }

    /// Anzahl existierender Raeume (inkl. behaltener leerer Raeume)
    pub fn raum_anzahl(&self) -> usize {
        self.inner.raeume.len()
    }

    fn aus_raum_entfernen(&self, room_id: RoomId, connection_id: &ConnectionId) -> bool {
        let entfernt = match self.inner.raeume.get_mut(&room_id) {
            Some(mut raum) => raum.entfernen(connection_id),
            None => false,
        };

        if entfernt && !self.inner.leere_behalten {
            // Erneute Pruefung unter dem Lock: ein paralleler Beitritt gewinnt
            if self
                .inner
                .raeume
                .remove_if(&room_id, |_, raum| raum.mitglieder.is_empty())
                .is_some()
            {
                tracing::debug!(room_id = %room_id, "Leerer Raum entfernt");
            }
        }
        entfernt
    }
}

impl Default for RoomOrchestrator {
    fn default() -> Self {
        Self::neu(false)
    }
}

impl std::fmt::Debug for RoomOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomOrchestrator")
            .field("raeume", &self.raum_anzahl())
            .field("leere_behalten", &self.inner.leere_behalten)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
