//! Gemeinsame Identifikationstypen fuer Echo
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EchoError;

/// Praefix eines Raum-Pfads (`/room-<n>`)
pub const RAUM_PFAD_PRAEFIX: &str = "/room-";

/// Eindeutige ID einer Transport-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Numerische Raum-ID (Schluessel eines RoomChannels)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(pub u64);

impl RoomId {
    /// Parst einen Raum-Pfad der Form `/room-<positive Ganzzahl>`
    ///
    /// Nur ASCII-Ziffern sind erlaubt (kein Vorzeichen, keine Leerzeichen).
    /// `0` und Werte ausserhalb von `u64` werden abgelehnt.
    pub fn aus_pfad(pfad: &str) -> Result<Self, EchoError> {
        let ziffern = pfad
            .strip_prefix(RAUM_PFAD_PRAEFIX)
            .ok_or_else(|| EchoError::UngueltigerRaumPfad(pfad.to_string()))?;

        if ziffern.is_empty() || !ziffern.bytes().all(|b| b.is_ascii_digit()) {
            return Err(EchoError::UngueltigerRaumPfad(pfad.to_string()));
        }

        match ziffern.parse::<u64>() {
            Ok(0) | Err(_) => Err(EchoError::UngueltigerRaumPfad(pfad.to_string())),
            Ok(id) => Ok(Self(id)),
        }
    }

    /// Gibt den kanonischen Pfad des Raums zurueck
    pub fn pfad(&self) -> String {
        format!("{RAUM_PFAD_PRAEFIX}{}", self.0)
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "room:{}", self.0)
    }
}

/// Stabile pseudonyme Identitaet eines Benutzers
///
/// Haelt die nicht umkehrbare Form (`hashedIdentity`) als Hex-String.
/// Einmal zugewiesen wird sie nicht mehr veraendert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionIdentity(String);

impl SessionIdentity {
    /// Uebernimmt einen bereits gehashten Identitaets-String
    pub fn aus_hash(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "identity:{}", self.0)
    }
}
