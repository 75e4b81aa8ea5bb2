//! Message-Dispatcher – Routet ControlMessages nach dem Handshake
//!
//! Der Handshake selbst wird in der `ClientConnection` abgewickelt; der
//! Dispatcher sieht nur Nachrichten authentifizierter, registrierter
//! Verbindungen.
//!
//! ## Raum-Pfade
//! `room_join`/`room_leave` tragen einen Pfad `/room-<n>`. Ungueltige Pfade
//! werden mit `INVALID_REQUEST` abgelehnt, bevor der Orchestrator sie sieht.

use echo_core::RoomId;
use echo_protocol::control::{
    ControlMessage, ControlPayload, ErrorCode, RoomJoinedResponse, RoomLeftResponse,
};
use std::sync::Arc;

use crate::broadcast::ClientSender;
use crate::error::{SignalingError, SignalingResult};
use crate::registry::Connection;
use crate::rooms::RaumMitglied;
use crate::server_state::SignalingState;

/// Dispatcher-Kontext – die Verbindung zu der die Nachricht gehoert
pub struct DispatcherContext {
    pub verbindung: Connection,
    /// Eigene Send-Queue (wird bei Raum-Beitritten hinterlegt)
    pub sender: ClientSender,
}

/// Zentraler Message-Dispatcher
pub struct MessageDispatcher {
    state: Arc<SignalingState>,
}

impl MessageDispatcher {
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    /// Verarbeitet eine eingehende ControlMessage und gibt die Antwort zurueck
    ///
    /// Gibt `None` zurueck wenn keine Antwort gesendet werden soll.
    pub fn dispatch(
        &self,
        message: ControlMessage,
        ctx: &DispatcherContext,
    ) -> Option<ControlMessage> {
        let request_id = message.request_id;

        let ergebnis = match message.payload {
            ControlPayload::Handshake(_) => Err(SignalingError::BereitsAuthentifiziert),

            ControlPayload::RoomJoin(req) => self.raum_beitreten(&req.path, request_id, ctx),

            ControlPayload::RoomLeave(req) => self.raum_verlassen(&req.path, request_id, ctx),

            // -------------------------------------------------------------------
            // Keepalive
            // -------------------------------------------------------------------
            ControlPayload::Ping(ping) => Ok(Some(ControlMessage::pong(
                request_id,
                ping.timestamp_ms,
                jetzt_ms(),
            ))),

            ControlPayload::Pong(_) => {
                tracing::trace!(connection_id = %ctx.verbindung.id, "Pong empfangen");
                Ok(None)
            }

            ControlPayload::Error(e) => {
                tracing::debug!(
                    connection_id = %ctx.verbindung.id,
                    code = ?e.code,
                    nachricht = %e.message,
                    "Fehlermeldung vom Client"
                );
                Ok(None)
            }

            // Nur Server -> Client
            ControlPayload::HandshakeAccepted(_)
            | ControlPayload::RoomJoined(_)
            | ControlPayload::RoomLeft(_)
            | ControlPayload::MemberJoined(_) => Err(SignalingError::protokoll(
                "Nachrichtentyp wird nur vom Server gesendet",
            )),
        };

        match ergebnis {
            Ok(antwort) => antwort,
            Err(e) => {
                if e.protokoll_code() == ErrorCode::InternalError {
                    tracing::error!(connection_id = %ctx.verbindung.id, fehler = %e, "Anfrage fehlgeschlagen");
                } else {
                    tracing::debug!(connection_id = %ctx.verbindung.id, fehler = %e, "Anfrage abgelehnt");
                }
                Some(ControlMessage::error(
                    request_id,
                    e.protokoll_code(),
                    e.client_nachricht(),
                ))
            }
        }
    }

    fn raum_beitreten(
        &self,
        pfad: &str,
        request_id: u32,
        ctx: &DispatcherContext,
    ) -> SignalingResult<Option<ControlMessage>> {
        let room_id = RoomId::aus_pfad(pfad)?;

        let mitglied = RaumMitglied {
            info: ctx.verbindung.member_info(),
            sender: ctx.sender.clone(),
        };
        let beitritt = self.state.raeume.raum_beitreten(room_id, mitglied);

        tracing::info!(
            connection_id = %ctx.verbindung.id,
            adresse = %ctx.verbindung.adresse,
            room_id = %room_id,
            mitglieder = beitritt.mitglieder.len(),
            "Raum beigetreten"
        );
        self.state.metrik(|m| m.room_joins.inc());
        self.state.gauges_aktualisieren();

        Ok(Some(ControlMessage::new(
            request_id,
            ControlPayload::RoomJoined(RoomJoinedResponse {
                room_id,
                members: beitritt.mitglieder,
            }),
        )))
    }

    fn raum_verlassen(
        &self,
        pfad: &str,
        request_id: u32,
        ctx: &DispatcherContext,
    ) -> SignalingResult<Option<ControlMessage>> {
        let room_id = RoomId::aus_pfad(pfad)?;

        if !self.state.raeume.raum_verlassen(&ctx.verbindung.id, room_id) {
            return Err(SignalingError::protokoll(format!(
                "Nicht Mitglied von {}",
                room_id.pfad()
            )));
        }

        tracing::debug!(connection_id = %ctx.verbindung.id, room_id = %room_id, "Raum verlassen");
        self.state.gauges_aktualisieren();

        Ok(Some(ControlMessage::new(
            request_id,
            ControlPayload::RoomLeft(RoomLeftResponse { room_id }),
        )))
    }
}

/// Aktuelle Unix-Zeit in Millisekunden
pub(crate) fn jetzt_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::sende_queue;
    use crate::rooms::RoomOrchestrator;
    use crate::server_state::SignalingConfig;
    use echo_auth::AuthGate;
    use echo_observability::EchoMetrics;
    use tokio::sync::mpsc;

    fn aufbau() -> (MessageDispatcher, Arc<SignalingState>, EchoMetrics) {
        let metriken = EchoMetrics::neu().unwrap();
        let state = SignalingState::neu(
            SignalingConfig::default(),
            AuthGate::praesenz(),
            RoomOrchestrator::default(),
            Some(metriken.clone()),
        );
        (MessageDispatcher::neu(Arc::clone(&state)), state, metriken)
    }

    fn kontext() -> (DispatcherContext, mpsc::Receiver<ControlMessage>) {
        let verbindung = Connection::neu("127.0.0.1:1", None);
        let (sender, rx) = sende_queue(verbindung.id);
        (DispatcherContext { verbindung, sender }, rx)
    }

    fn fehler_code(antwort: Option<ControlMessage>) -> ErrorCode {
        match antwort.map(|a| a.payload) {
            Some(ControlPayload::Error(e)) => e.code,
            andere => panic!("Fehler erwartet, erhalten: {andere:?}"),
        }
    }

    #[test]
    fn raum_beitritt_und_verlassen() {
        let (dispatcher, state, metriken) = aufbau();
        let (ctx, mut rx) = kontext();

        let antwort = dispatcher
            .dispatch(ControlMessage::room_join(3, "/room-12"), &ctx)
            .unwrap();
        assert_eq!(antwort.request_id, 3);
        match antwort.payload {
            ControlPayload::RoomJoined(r) => {
                assert_eq!(r.room_id, RoomId(12));
                assert_eq!(r.members, vec![ctx.verbindung.member_info()]);
            }
            andere => panic!("RoomJoined erwartet: {andere:?}"),
        }
        assert!(matches!(
            rx.try_recv().unwrap().payload,
            ControlPayload::MemberJoined(_)
        ));
        assert_eq!(metriken.room_joins.get(), 1);
        assert_eq!(metriken.rooms_active.get(), 1);

        let verlassen = ControlMessage::new(
            4,
            ControlPayload::RoomLeave(echo_protocol::control::RoomLeaveRequest {
                path: "/room-12".into(),
            }),
        );
        let antwort = dispatcher.dispatch(verlassen, &ctx).unwrap();
        assert!(matches!(antwort.payload, ControlPayload::RoomLeft(_)));
        assert_eq!(state.raeume.raum_anzahl(), 0);
        assert_eq!(metriken.rooms_active.get(), 0);
    }

    #[test]
    fn ungueltige_pfade_sind_invalid_request() {
        let (dispatcher, state, _) = aufbau();
        let (ctx, _rx) = kontext();

        for pfad in ["/room-", "/room-0", "/room-abc", "/lobby", "/room-99999999999999999999"] {
            let antwort = dispatcher.dispatch(ControlMessage::room_join(1, pfad), &ctx);
            assert_eq!(fehler_code(antwort), ErrorCode::InvalidRequest, "{pfad}");
        }
        assert_eq!(state.raeume.raum_anzahl(), 0);
    }

    #[test]
    fn verlassen_ohne_mitgliedschaft() {
        let (dispatcher, _, _) = aufbau();
        let (ctx, _rx) = kontext();
        let verlassen = ControlMessage::new(
            1,
            ControlPayload::RoomLeave(echo_protocol::control::RoomLeaveRequest {
                path: "/room-1".into(),
            }),
        );
        assert_eq!(
            fehler_code(dispatcher.dispatch(verlassen, &ctx)),
            ErrorCode::InvalidRequest
        );
    }

    #[test]
    fn zweiter_handshake_wird_abgelehnt() {
        let (dispatcher, _, _) = aufbau();
        let (ctx, _rx) = kontext();
        let antwort = dispatcher.dispatch(ControlMessage::handshake(2, "Bearer x"), &ctx);
        assert_eq!(fehler_code(antwort), ErrorCode::AlreadyAuthenticated);
    }

    #[test]
    fn ping_wird_beantwortet() {
        let (dispatcher, _, _) = aufbau();
        let (ctx, _rx) = kontext();
        let antwort = dispatcher
            .dispatch(ControlMessage::ping(7, 1234), &ctx)
            .unwrap();
        assert_eq!(antwort.request_id, 7);
        match antwort.payload {
            ControlPayload::Pong(p) => assert_eq!(p.echo_timestamp_ms, 1234),
            andere => panic!("Pong erwartet: {andere:?}"),
        }
        assert!(dispatcher.dispatch(ControlMessage::pong(8, 1, 2), &ctx).is_none());
    }

    #[test]
    fn server_nachrichten_vom_client_sind_ungueltig() {
        let (dispatcher, _, _) = aufbau();
        let (ctx, _rx) = kontext();
        let event = ControlMessage::member_joined(RoomId(1), ctx.verbindung.member_info());
        assert_eq!(
            fehler_code(dispatcher.dispatch(event, &ctx)),
            ErrorCode::InvalidRequest
        );
    }
}
