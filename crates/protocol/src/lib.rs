//! echo-protocol – Netzwerkprotokoll-Definitionen
//!
//! Dieses Crate definiert alle Nachrichtentypen die zwischen Client und
//! Server ausgetauscht werden, sowie das Frame-Format der TCP-Verbindung.

pub mod control;
pub mod wire;

pub use control::{ControlMessage, ControlPayload, ErrorCode, MemberInfo};
pub use wire::FrameCodec;
