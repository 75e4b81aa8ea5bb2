//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt Gate, Registry und Raum-Orchestrator als Clone-Handles, die sicher
//! zwischen tokio-Tasks geteilt werden koennen.

use echo_auth::AuthGate;
use echo_observability::EchoMetrics;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::registry::ConnectionRegistry;
use crate::rooms::RoomOrchestrator;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Anzeigename des Servers (nur fuer Logs)
    pub server_name: String,
    /// Maximale gleichzeitige Verbindungen (inkl. ausstehender Handshakes)
    pub max_clients: u32,
    /// Zeit bis zum Handshake in Sekunden
    pub handshake_timeout_sek: u64,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
}

impl SignalingConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_sek)
    }
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            server_name: "Echo Server".to_string(),
            max_clients: 512,
            handshake_timeout_sek: 10,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
        }
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    pub config: Arc<SignalingConfig>,
    pub gate: AuthGate,
    pub registry: ConnectionRegistry,
    pub raeume: RoomOrchestrator,
    pub metriken: Option<EchoMetrics>,
    /// Offene TCP-Verbindungen, auch vor dem Handshake
    offene_verbindungen: Arc<AtomicUsize>,
}

impl SignalingState {
    pub fn neu(
        config: SignalingConfig,
        gate: AuthGate,
        raeume: RoomOrchestrator,
        metriken: Option<EchoMetrics>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            gate,
            registry: ConnectionRegistry::neu(),
            raeume,
            metriken,
            offene_verbindungen: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// `true` wenn keine weiteren Verbindungen angenommen werden
    pub fn ist_voll(&self) -> bool {
        let belegt = self.offene_verbindungen().max(self.registry.anzahl());
        belegt >= self.config.max_clients as usize
    }

    pub fn offene_verbindungen(&self) -> usize {
        self.offene_verbindungen.load(Ordering::Acquire)
    }

    /// Belegt einen Verbindungsplatz bis der Rueckgabewert gedroppt wird
    pub fn platz_belegen(&self) -> VerbindungsPlatz {
        self.offene_verbindungen.fetch_add(1, Ordering::AcqRel);
        VerbindungsPlatz {
            zaehler: Arc::clone(&self.offene_verbindungen),
        }
    }

    /// Setzt die Gauges auf den aktuellen Stand
    pub fn gauges_aktualisieren(&self) {
        if let Some(m) = &self.metriken {
            m.connected_clients.set(self.registry.anzahl() as i64);
            m.rooms_active.set(self.raeume.raum_anzahl() as i64);
        }
    }

    pub(crate) fn metrik(&self, f: impl FnOnce(&EchoMetrics)) {
        if let Some(m) = &self.metriken {
            f(m);
        }
    }
}

/// Belegter Verbindungsplatz, gibt sich beim Drop frei
#[derive(Debug)]
pub struct VerbindungsPlatz {
    zaehler: Arc<AtomicUsize>,
}

impl Drop for VerbindungsPlatz {
    fn drop(&mut self) {
        self.zaehler.fetch_sub(1, Ordering::AcqRel);
    }
}
