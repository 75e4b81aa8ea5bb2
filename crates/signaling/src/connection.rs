//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `ClientConnection` in einem eigenen
//! lokalen Task.
//!
//! ## State Machine
//! ```text
//! Ausstehend --handshake ok--> Authentifiziert --registriert--> Aktiv --> Geschlossen
//!     |
//!     +--kein/ungueltiges Credential, Timeout--> Abgelehnt
//! ```
//!
//! Bis zum Zustand `Authentifiziert` existiert weder ein Registry-Eintrag
//! noch eine Raum-Mitgliedschaft; eine Ablehnung hinterlaesst keinen Zustand.
//!
//! ## Reconnect
//! Ersetzt eine neue Verbindung derselben Identitaet den Registry-Eintrag,
//! verlaesst die alte Verbindung ihren Raum und wird geschlossen.
//!
//! ## Keepalive
//! - Server sendet alle `keepalive_sek` einen Ping
//! - Ohne eingehende Frames fuer `verbindungs_timeout_sek` wird getrennt

use echo_auth::weitergeleitete_adresse;
use echo_protocol::{
    control::{ControlMessage, ControlPayload, ErrorCode, HandshakeAccepted},
    wire::FrameCodec,
};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_util::codec::Framed;

use crate::broadcast::sende_queue;
use crate::dispatcher::{jetzt_ms, DispatcherContext, MessageDispatcher};
use crate::error::{SignalingError, SignalingResult};
use crate::registry::Connection;
use crate::server_state::SignalingState;

type FramedStream = Framed<TcpStream, FrameCodec>;

// ---------------------------------------------------------------------------
// Verbindungszustand
// ---------------------------------------------------------------------------

/// Zustand der TCP-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsZustand {
    /// Verbunden, Handshake steht aus
    Ausstehend,
    /// Credential akzeptiert, noch nicht registriert
    Authentifiziert,
    /// Registriert, Nachrichten werden verarbeitet
    Aktiv,
    /// Verbindung beendet und aufgeraeumt
    Geschlossen,
    /// Handshake abgelehnt (terminal)
    Abgelehnt,
}

// ---------------------------------------------------------------------------
// ClientConnection
// ---------------------------------------------------------------------------

/// Verarbeitet eine einzelne TCP-Verbindung
pub struct ClientConnection {
    state: Arc<SignalingState>,
    peer_addr: SocketAddr,
    zustand: VerbindungsZustand,
}

impl ClientConnection {
    pub fn neu(state: Arc<SignalingState>, peer_addr: SocketAddr) -> Self {
        Self {
            state,
            peer_addr,
            zustand: VerbindungsZustand::Ausstehend,
        }
    }

    pub fn zustand(&self) -> VerbindungsZustand {
        self.zustand
    }

    fn uebergang(&mut self, neu: VerbindungsZustand) {
        tracing::trace!(peer = %self.peer_addr, von = ?self.zustand, nach = ?neu, "Zustandswechsel");
        self.zustand = neu;
    }

    /// Verarbeitet die Verbindung bis zum Ende
    ///
    /// Gibt den Endzustand zurueck (`Geschlossen` oder `Abgelehnt`).
    pub async fn verarbeiten(
        mut self,
        stream: TcpStream,
        shutdown_rx: watch::Receiver<bool>,
    ) -> VerbindungsZustand {
        let peer_addr = self.peer_addr;
        let mut framed = Framed::new(stream, FrameCodec::new());

        let (request_id, verbindung) = match self.handshake(&mut framed).await {
            Ok(ergebnis) => ergebnis,
            Err(e) => {
                self.uebergang(VerbindungsZustand::Abgelehnt);
                self.state.metrik(|m| m.handshakes_rejected.inc());
                tracing::info!(peer = %peer_addr, grund = %e, "Handshake abgelehnt");
                return self.zustand;
            }
        };

        // Registrieren + Send-Queue anlegen
        let (sender, sende_rx) = sende_queue(verbindung.id);
        if let Some(ersetzt) = self.state.registry.registrieren(verbindung.clone()) {
            tracing::info!(
                connection_id = %verbindung.id,
                ersetzt = %ersetzt.id,
                "Reconnect: vorherige Verbindung derselben Identitaet wird getrennt"
            );
        }
        self.uebergang(VerbindungsZustand::Aktiv);
        self.state.metrik(|m| m.handshakes_accepted.inc());
        self.state.gauges_aktualisieren();

        tracing::info!(
            connection_id = %verbindung.id,
            adresse = %verbindung.adresse,
            anonym = verbindung.identity.is_none(),
            "Neue Verbindung"
        );

        let angenommen = ControlMessage::new(
            request_id,
            ControlPayload::HandshakeAccepted(HandshakeAccepted {
                connection_id: verbindung.id,
                identity: verbindung.identity.clone(),
            }),
        );
        let ctx = DispatcherContext {
            verbindung,
            sender,
        };
        let connection_id = ctx.verbindung.id;

        match framed.send(angenommen).await {
            Ok(()) => {
                self.aktiv_schleife(&mut framed, &ctx, sende_rx, shutdown_rx)
                    .await
            }
            Err(e) => {
                tracing::warn!(connection_id = %connection_id, fehler = %e, "Handshake-Antwort nicht zustellbar");
            }
        }

        // Cleanup beim Verbindungsende
        if let Some(room_id) = self.state.raeume.verbindung_entfernen(&connection_id) {
            tracing::debug!(connection_id = %connection_id, room_id = %room_id, "Raum beim Trennen verlassen");
        }
        self.state.registry.entfernen(&connection_id);
        self.state.gauges_aktualisieren();
        self.uebergang(VerbindungsZustand::Geschlossen);

        tracing::info!(connection_id = %connection_id, "Verbindungs-Task beendet");
        self.zustand
    }

    /// Wartet auf den Handshake und prueft ihn am Gate
    ///
    /// Sendet bei Ablehnung eine Fehlernachricht. Bei Erfolg kommen
    /// Request-ID und die noch nicht registrierte Verbindung zurueck.
    async fn handshake(&mut self, framed: &mut FramedStream) -> SignalingResult<(u32, Connection)> {
        let timeout = self.state.config.handshake_timeout();

        let nachricht = match tokio::time::timeout(timeout, framed.next()).await {
            Err(_) => {
                let fehler = SignalingError::Timeout;
                let _ = framed
                    .send(ControlMessage::error(0, fehler.protokoll_code(), "Kein Handshake erhalten"))
                    .await;
                return Err(fehler);
            }
            Ok(None) => return Err(SignalingError::protokoll("Verbindung vor Handshake getrennt")),
            Ok(Some(Err(e))) => return Err(SignalingError::Io(e)),
            Ok(Some(Ok(nachricht))) => nachricht,
        };

        let request_id = nachricht.request_id;
        let anfrage = match nachricht.payload {
            ControlPayload::Handshake(anfrage) => anfrage,
            _ => {
                let fehler = SignalingError::NichtAuthentifiziert;
                let _ = framed
                    .send(ControlMessage::error(
                        request_id,
                        fehler.protokoll_code(),
                        "Erste Nachricht muss ein Handshake sein",
                    ))
                    .await;
                return Err(fehler);
            }
        };

        let authentifiziert = match self.state.gate.handshake(&anfrage).await {
            Ok(a) => a,
            Err(e) => {
                let fehler = SignalingError::Auth(e);
                let _ = framed
                    .send(ControlMessage::error(
                        request_id,
                        fehler.protokoll_code(),
                        fehler.client_nachricht(),
                    ))
                    .await;
                return Err(fehler);
            }
        };
        self.uebergang(VerbindungsZustand::Authentifiziert);

        let adresse = weitergeleitete_adresse(anfrage.forwarded_for.as_deref())
            .map(String::from)
            .unwrap_or_else(|| self.peer_addr.to_string());
        Ok((request_id, Connection::neu(adresse, authentifiziert.identity)))
    }

    /// Hauptschleife einer aktiven Verbindung
    async fn aktiv_schleife(
        &self,
        framed: &mut FramedStream,
        ctx: &DispatcherContext,
        mut sende_rx: mpsc::Receiver<ControlMessage>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let connection_id = ctx.verbindung.id;
        let keepalive_intervall = Duration::from_secs(self.state.config.keepalive_sek.max(1));
        let timeout_dauer = Duration::from_secs(self.state.config.verbindungs_timeout_sek);
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));

        let mut letzter_empfang = Instant::now();
        let mut naechster_ping = Instant::now() + keepalive_intervall;
        let mut ping_request_id: u32 = 0;

        loop {
            let jetzt = Instant::now();

            if jetzt.duration_since(letzter_empfang) > timeout_dauer {
                tracing::warn!(connection_id = %connection_id, "Verbindungs-Timeout");
                break;
            }

            let ping_verzoegerung = naechster_ping.saturating_duration_since(jetzt);

            tokio::select! {
                // Eingehende Nachricht vom Client
                frame = framed.next() => {
                    match frame {
                        Some(Ok(nachricht)) => {
                            letzter_empfang = Instant::now();
                            tracing::trace!(
                                connection_id = %connection_id,
                                request_id = nachricht.request_id,
                                "Nachricht empfangen"
                            );

                            if let Some(antwort) = dispatcher.dispatch(nachricht, ctx) {
                                if let Err(e) = framed.send(antwort).await {
                                    tracing::warn!(connection_id = %connection_id, fehler = %e, "Senden fehlgeschlagen");
                                    break;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(connection_id = %connection_id, fehler = %e, "Frame-Lesefehler");
                            break;
                        }
                        None => {
                            tracing::info!(connection_id = %connection_id, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                // Ausgehende Nachricht aus Raum-Broadcasts
                Some(ausgehend) = sende_rx.recv() => {
                    if let Err(e) = framed.send(ausgehend).await {
                        tracing::warn!(connection_id = %connection_id, fehler = %e, "Broadcast-Senden fehlgeschlagen");
                        break;
                    }
                }

                // Keepalive-Ping
                _ = tokio::time::sleep(ping_verzoegerung) => {
                    ping_request_id = ping_request_id.wrapping_add(1);
                    if let Err(e) = framed.send(ControlMessage::ping(ping_request_id, jetzt_ms())).await {
                        tracing::warn!(connection_id = %connection_id, fehler = %e, "Ping-Senden fehlgeschlagen");
                        break;
                    }
                    naechster_ping = Instant::now() + keepalive_intervall;
                }

                // Durch neuere Verbindung derselben Identitaet ersetzt
                _ = ctx.verbindung.trennsignal.abwarten() => {
                    tracing::info!(connection_id = %connection_id, "Verbindung ersetzt – wird getrennt");
                    break;
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(connection_id = %connection_id, "Shutdown-Signal – Verbindung wird getrennt");
                        let abschied = ControlMessage::error(
                            0,
                            ErrorCode::InternalError,
                            "Server wird heruntergefahren",
                        );
                        let _ = framed.send(abschied).await;
                        break;
                    }
                }
            }
        }
    }
}
