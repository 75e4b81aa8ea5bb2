//! Fehlertypen fuer Echo
//!
//! Zentraler Fehler-Enum fuer crate-uebergreifende Fehlerzustaende.
//! Untermodule definieren eigene Fehler und konvertieren bei Bedarf.

use thiserror::Error;

/// Globaler Result-Alias fuer Echo
pub type Result<T> = std::result::Result<T, EchoError>;

/// Crate-uebergreifende Fehler im Echo-System
#[derive(Debug, Error)]
pub enum EchoError {
    // --- Eingabe ---
    #[error("Ungueltiger Raum-Pfad: '{0}'")]
    UngueltigerRaumPfad(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

impl EchoError {
    /// Gibt true zurueck wenn der Fehler auf ungueltige Eingaben zurueckgeht
    ///
    /// Eingabefehler werden ohne Seiteneffekte synchron abgelehnt.
    pub fn ist_eingabefehler(&self) -> bool {
        matches!(self, Self::UngueltigerRaumPfad(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = EchoError::UngueltigerRaumPfad("/room-x".into());
        assert_eq!(e.to_string(), "Ungueltiger Raum-Pfad: '/room-x'");
    }

    #[test]
    fn eingabefehler_erkennung() {
        assert!(EchoError::UngueltigerRaumPfad("x".into()).ist_eingabefehler());
        assert!(!EchoError::Konfiguration("krypto.runden".into()).ist_eingabefehler());
    }
}
