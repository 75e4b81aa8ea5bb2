//! echo-server – Bibliotheks-Root
//!
//! Verdrahtet Konfiguration, Metriken, KDF-Pool, Auth-Gate, Raeume und
//! den TCP-Signaling-Server.

pub mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use config::{AuthModus, ServerConfig};
use echo_auth::{AuthGate, EnvelopeValidator};
use echo_crypto::KdfPool;
use echo_observability::EchoMetrics;
use echo_signaling::{RoomOrchestrator, SignalingServer, SignalingState};
use tokio::sync::watch;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Baut das Auth-Gate passend zu `auth.modus`
    ///
    /// Im Envelope-Modus laufen Ableitungen ueber einen eigenen KDF-Pool,
    /// dessen Dauer im Histogramm `kdf_duration_seconds` landet.
    pub fn gate_erstellen(&self, metriken: Option<&EchoMetrics>) -> Result<AuthGate> {
        match self.config.auth.modus {
            AuthModus::Praesenz => Ok(AuthGate::praesenz()),
            AuthModus::Envelope => {
                let geheimnis = self
                    .config
                    .auth
                    .geheimnis
                    .clone()
                    .filter(|g| !g.is_empty())
                    .context("auth.geheimnis fehlt fuer den Envelope-Modus")?;

                let mut pool = KdfPool::neu(self.config.krypto.worker, self.config.kdf_parameter());
                if let Some(m) = metriken {
                    pool = pool.mit_beobachter(m.kdf_beobachter());
                }
                Ok(AuthGate::neu(Arc::new(EnvelopeValidator::neu(pool, geheimnis))))
            }
        }
    }

    /// Startet alle Subsysteme und laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => tracing::error!(fehler = %e, "Ctrl-C-Handler nicht verfuegbar"),
            }
        });

        self.starten_mit_shutdown(shutdown_rx).await
    }

    /// Startet alle Subsysteme und laeuft bis `shutdown_rx` `true` meldet
    ///
    /// Reihenfolge:
    /// 1. Metriken und Auth-Gate
    /// 2. Observability-Server (falls aktiviert)
    /// 3. TCP-Signaling-Server
    pub async fn starten_mit_shutdown(self, shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        self.config.validieren()?;

        let metriken = EchoMetrics::neu()?;
        let gate = self.gate_erstellen(Some(&metriken))?;
        let raeume = RoomOrchestrator::neu(self.config.raeume.leere_behalten);

        tracing::info!(
            server_name = %self.config.server.name,
            tcp = %self.config.tcp_bind_adresse(),
            validator = gate.validator_name(),
            max_clients = self.config.server.max_clients,
            leere_raeume_behalten = self.config.raeume.leere_behalten,
            "Server startet"
        );

        let state = SignalingState::neu(
            self.config.signaling_config(),
            gate,
            raeume,
            Some(metriken.clone()),
        );

        if self.config.observability.aktiviert {
            let adresse = bind_adresse_parsen(&self.config.observability_bind_adresse())?;
            let rx = shutdown_rx.clone();
            tokio::spawn(async move {
                if let Err(e) =
                    echo_observability::observability_server_starten(adresse, metriken, rx).await
                {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            });
        }

        let tcp_adresse = bind_adresse_parsen(&self.config.tcp_bind_adresse())?;
        let server = SignalingServer::binden(state, tcp_adresse)
            .await
            .with_context(|| format!("TCP-Listener auf {tcp_adresse} nicht bindbar"))?;

        server.starten(shutdown_rx).await?;
        tracing::info!("Server beendet");
        Ok(())
    }
}

fn bind_adresse_parsen(adresse: &str) -> Result<SocketAddr> {
    adresse
        .parse()
        .with_context(|| format!("Ungueltige Bind-Adresse '{adresse}'"))
}
