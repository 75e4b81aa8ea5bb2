//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `SignalingServer` bindet einen TCP-Socket und startet fuer jede
//! eingehende Verbindung eine `ClientConnection`.
//!
//! ## Concurrency-Modell
//! Alle Verbindungs-Tasks laufen als lokale Tasks in einer
//! `tokio::task::LocalSet` auf einer einzigen Event-Loop. Nur die
//! Schluesselableitung verlaesst die Loop (KDF-Worker-Pool).

use echo_protocol::control::{ControlMessage, ErrorCode};
use echo_protocol::FrameCodec;
use futures_util::SinkExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::LocalSet;
use tokio_util::codec::Framed;

use crate::connection::ClientConnection;
use crate::server_state::SignalingState;

/// TCP-Signaling-Server
pub struct SignalingServer {
    state: Arc<SignalingState>,
    listener: TcpListener,
}

impl SignalingServer {
    /// Bindet den Listener (Port 0 waehlt einen freien Port)
    pub async fn binden(state: Arc<SignalingState>, bind_addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self { state, listener })
    }

    /// Tatsaechlich gebundene Adresse
    pub fn lokale_adresse(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Akzeptiert Verbindungen bis `shutdown_rx` ein `true`-Signal empfaengt
    ///
    /// Offene Verbindungen bekommen das Signal ebenfalls und werden vor dem
    /// Zurueckkehren abgewartet.
    pub async fn starten(self, shutdown_rx: watch::Receiver<bool>) -> std::io::Result<()> {
        let local = LocalSet::new();
        local.run_until(self.accept_loop(shutdown_rx)).await?;
        // Verbleibende Verbindungs-Tasks zu Ende laufen lassen
        local.await;
        Ok(())
    }

    /// Interne Accept-Loop (laeuft innerhalb der LocalSet)
    async fn accept_loop(self, mut shutdown_rx: watch::Receiver<bool>) -> std::io::Result<()> {
        tracing::info!(
            adresse = %self.listener.local_addr()?,
            server = %self.state.config.server_name,
            validator = self.state.gate.validator_name(),
            "TCP Signaling-Server gestartet"
        );

        loop {
            tokio::select! {
                ergebnis = self.listener.accept() => {
                    match ergebnis {
                        Ok((stream, peer_addr)) => {
                            if self.state.ist_voll() {
                                tracing::warn!(
                                    peer = %peer_addr,
                                    max = self.state.config.max_clients,
                                    "Server voll – Verbindung abgelehnt"
                                );
                                tokio::task::spawn_local(voll_ablehnen(stream));
                                continue;
                            }

                            tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");
                            let platz = self.state.platz_belegen();
                            let verbindung = ClientConnection::neu(Arc::clone(&self.state), peer_addr);
                            let shutdown_rx_clone = shutdown_rx.clone();

                            tokio::task::spawn_local(async move {
                                verbindung.verarbeiten(stream, shutdown_rx_clone).await;
                                drop(platz);
                            });
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                }

                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Signaling-Server: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!("TCP Signaling-Server gestoppt");
        Ok(())
    }
}

/// Meldet `SERVER_FULL` und schliesst die Verbindung
async fn voll_ablehnen(stream: TcpStream) {
    let mut framed = Framed::new(stream, FrameCodec::new());
    let abgelehnt = ControlMessage::error(0, ErrorCode::ServerFull, "Server voll");
    let _ = tokio::time::timeout(Duration::from_secs(1), framed.send(abgelehnt)).await;
}
