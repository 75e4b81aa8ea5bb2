//! Control-Protokoll (TCP)
//!
//! Definiert alle Steuerungsnachrichten die ueber die TCP-Verbindung
//! zwischen Client und Server ausgetauscht werden.
//!
//! ## Ablauf
//! ```text
//! Client                                  Server
//!   | -- handshake { authorization } -->    |
//!   | <-- handshake_accepted / error ----   |
//!   | -- room_join { path: "/room-5" } -->  |
//!   | <-- room_joined { room_id, members }  |
//!   | <== member_joined (an alle im Raum)   |
//! ```
//!
//! ## Design
//! - Request/Response Pattern: jede Nachricht hat eine `request_id: u32`
//! - Server-Push-Events tragen `request_id = 0`
//! - Tagged Enums fuer typsichere Nachrichtentypen

use echo_core::types::{ConnectionId, RoomId, SessionIdentity};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Standardisierte Fehler-Codes fuer Error-Responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InternalError,
    InvalidRequest,
    AuthenticationFailed,
    NotAuthenticated,
    AlreadyAuthenticated,
    ServerFull,
    Timeout,
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// Handshake-Anfrage – erste Nachricht jeder Verbindung
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandshakeRequest {
    /// Authorization-Feld im Format `Bearer <token>`
    #[serde(default)]
    pub authorization: Option<String>,
    /// Weitergeleitete Client-Adresse (`x-forwarded-for`), falls ein Proxy davor sitzt
    #[serde(default)]
    pub forwarded_for: Option<String>,
}

/// Erfolgreicher Handshake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeAccepted {
    pub connection_id: ConnectionId,
    /// Aufgeloeste Identitaet (None = anonym)
    pub identity: Option<SessionIdentity>,
}

// ---------------------------------------------------------------------------
// Raeume
// ---------------------------------------------------------------------------

/// Oeffentliche Info ueber ein Raum-Mitglied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub connection_id: ConnectionId,
    pub identity: Option<SessionIdentity>,
}

/// Raum beitreten (Namespace-Pfad `/room-<n>`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomJoinRequest {
    pub path: String,
}

/// Bestaetigung des Raum-Beitritts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomJoinedResponse {
    pub room_id: RoomId,
    /// Alle aktuellen Mitglieder inkl. des Beitretenden
    pub members: Vec<MemberInfo>,
}

/// Raum verlassen (Namespace-Disconnect)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomLeaveRequest {
    pub path: String,
}

/// Bestaetigung des Verlassens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomLeftResponse {
    pub room_id: RoomId,
}

/// Event: ein Mitglied ist dem Raum beigetreten
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberJoinedEvent {
    pub room_id: RoomId,
    pub member: MemberInfo,
}

// ---------------------------------------------------------------------------
// Keepalive
// ---------------------------------------------------------------------------

/// Ping (Client -> Server oder Server -> Client)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingMessage {
    /// Unix-Timestamp in Millisekunden fuer RTT-Messung
    pub timestamp_ms: u64,
}

/// Pong-Antwort (spiegelt Timestamp zurueck)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PongMessage {
    pub echo_timestamp_ms: u64,
    pub server_timestamp_ms: u64,
}

/// Standardisierte Fehler-Antwort
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Haupt-Enum: ControlPayload
// ---------------------------------------------------------------------------

/// Alle moeglichen Control-Nachrichten (typsicher via Tagged Enum)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlPayload {
    // Handshake
    Handshake(HandshakeRequest),
    HandshakeAccepted(HandshakeAccepted),

    // Raeume
    RoomJoin(RoomJoinRequest),
    RoomJoined(RoomJoinedResponse),
    RoomLeave(RoomLeaveRequest),
    RoomLeft(RoomLeftResponse),
    MemberJoined(MemberJoinedEvent),

    // Keepalive
    Ping(PingMessage),
    Pong(PongMessage),

    // Error
    Error(ErrorResponse),
}

// ---------------------------------------------------------------------------
// Control-Frame (Umschlag fuer alle Nachrichten)
// ---------------------------------------------------------------------------

/// Control-Protokoll-Nachricht mit Request/Response-Zuordnung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlMessage {
    /// Nachrichten-ID fuer Request/Response-Zuordnung (0 = Server-Push)
    pub request_id: u32,
    /// Inhalt der Nachricht
    pub payload: ControlPayload,
}

impl ControlMessage {
    /// Erstellt eine neue Control-Nachricht
    pub fn new(request_id: u32, payload: ControlPayload) -> Self {
        Self {
            request_id,
            payload,
        }
    }

    /// Erstellt eine Handshake-Anfrage mit Bearer-Token
    pub fn handshake(request_id: u32, authorization: impl Into<String>) -> Self {
        Self::new(
            request_id,
            ControlPayload::Handshake(HandshakeRequest {
                authorization: Some(authorization.into()),
                forwarded_for: None,
            }),
        )
    }

    /// Erstellt eine Raum-Beitritts-Anfrage
    pub fn room_join(request_id: u32, path: impl Into<String>) -> Self {
        Self::new(
            request_id,
            ControlPayload::RoomJoin(RoomJoinRequest { path: path.into() }),
        )
    }

    /// Erstellt ein MemberJoined-Event (Server-Push)
    pub fn member_joined(room_id: RoomId, member: MemberInfo) -> Self {
        Self::new(
            0,
            ControlPayload::MemberJoined(MemberJoinedEvent { room_id, member }),
        )
    }

    /// Erstellt eine Ping-Nachricht
    pub fn ping(request_id: u32, timestamp_ms: u64) -> Self {
        Self::new(
            request_id,
            ControlPayload::Ping(PingMessage { timestamp_ms }),
        )
    }

    /// Erstellt eine Pong-Antwort
    pub fn pong(request_id: u32, echo_timestamp_ms: u64, server_timestamp_ms: u64) -> Self {
        Self::new(
            request_id,
            ControlPayload::Pong(PongMessage {
                echo_timestamp_ms,
                server_timestamp_ms,
            }),
        )
    }

    /// Erstellt eine Fehler-Antwort
    pub fn error(request_id: u32, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(
            request_id,
            ControlPayload::Error(ErrorResponse {
                code,
                message: message.into(),
            }),
        )
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert eine Nachricht aus JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_wire_format() {
        let msg = ControlMessage::handshake(1, "Bearer abc");
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"handshake\""));
        assert!(json.contains("\"authorization\":\"Bearer abc\""));
    }

    #[test]
    fn handshake_ohne_felder_ist_gueltig() {
        let json = r#"{"request_id":3,"payload":{"type":"handshake"}}"#;
        let msg = ControlMessage::from_json(json).unwrap();
        match msg.payload {
            ControlPayload::Handshake(h) => {
                assert!(h.authorization.is_none());
                assert!(h.forwarded_for.is_none());
            }
            _ => panic!("Erwartet Handshake-Payload"),
        }
    }

    #[test]
    fn member_joined_ist_server_push() {
        let member = MemberInfo {
            connection_id: ConnectionId::new(),
            identity: Some(SessionIdentity::aus_hash("ab12")),
        };
        let msg = ControlMessage::member_joined(RoomId(5), member.clone());
        assert_eq!(msg.request_id, 0);

        let decoded = ControlMessage::from_json(&msg.to_json().unwrap()).unwrap();
        match decoded.payload {
            ControlPayload::MemberJoined(e) => {
                assert_eq!(e.room_id, RoomId(5));
                assert_eq!(e.member, member);
            }
            _ => panic!("Erwartet MemberJoined-Payload"),
        }
    }

    #[test]
    fn room_join_aus_client_json() {
        let json = r#"{"request_id":7,"payload":{"type":"room_join","path":"/room-12"}}"#;
        let msg = ControlMessage::from_json(json).unwrap();
        assert_eq!(msg.request_id, 7);
        assert!(matches!(msg.payload, ControlPayload::RoomJoin(ref r) if r.path == "/room-12"));
    }

    #[test]
    fn error_codes_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::AuthenticationFailed).unwrap();
        assert_eq!(json, "\"AUTHENTICATION_FAILED\"");
    }
}
