//! echo-signaling – Verbindungen, Registry und Raeume
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SignalingServer, LocalSet)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein lokaler Task)
//!     |  State Machine: Ausstehend -> Authentifiziert -> Aktiv -> Geschlossen
//!     |                         \-> Abgelehnt
//!     |  Handshake -> AuthGate (echo-auth)
//!     v
//! MessageDispatcher
//!     |
//!     +-- room_join / room_leave -> RoomOrchestrator
//!     +-- ping / pong
//!
//! ConnectionRegistry – Wer ist verbunden (Identitaet -> Verbindung)
//! RoomOrchestrator   – Raeume, Mitgliedschaften, raumbezogene Broadcasts
//! ```

pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod rooms;
pub mod server_state;
pub mod tcp;

// Bequeme Re-Exporte
pub use broadcast::{sende_queue, ClientSender};
pub use connection::{ClientConnection, VerbindungsZustand};
pub use dispatcher::MessageDispatcher;
pub use error::{SignalingError, SignalingResult};
pub use registry::{Connection, ConnectionRegistry, RegistryKey, Trennsignal};
pub use rooms::{Beitritt, RaumMitglied, RoomOrchestrator};
pub use server_state::{SignalingConfig, SignalingState, VerbindungsPlatz};
pub use tcp::SignalingServer;
