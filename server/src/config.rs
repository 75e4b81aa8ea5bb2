//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.
//!
//! Fehlt die Datei, wird `config_template.toml` im selben Verzeichnis
//! verwendet, falls vorhanden.

use std::path::{Path, PathBuf};

use echo_core::EchoError;
use echo_crypto::types::{KdfParameter, STANDARD_KDF_RUNDEN};
use echo_observability::logging::log_format_gueltig;
use echo_signaling::SignalingConfig;
use serde::{Deserialize, Serialize};

/// Dateiname der Vorlage neben der eigentlichen Konfiguration
pub const TEMPLATE_DATEINAME: &str = "config_template.toml";

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Handshake-Pruefung
    pub auth: AuthEinstellungen,
    /// Schluesselableitung
    pub krypto: KryptoEinstellungen,
    /// Raum-Verwaltung
    pub raeume: RaumEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
    /// Maximale Anzahl gleichzeitiger Clients
    pub max_clients: u32,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Echo Server".into(),
            max_clients: 512,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer TCP und Observability
    pub bind_adresse: String,
    /// Port fuer das Signaling-Protokoll
    pub tcp_port: u16,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Inaktive Verbindungen werden nach dieser Zeit getrennt
    pub verbindungs_timeout_sek: u64,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            tcp_port: 9987,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
        }
    }
}

/// Art der Credential-Pruefung beim Handshake
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthModus {
    /// Jedes nicht-leere Bearer-Token wird akzeptiert
    #[default]
    Praesenz,
    /// Token ist ein mit `geheimnis` verschluesselter Envelope
    Envelope,
}

/// Handshake-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEinstellungen {
    pub modus: AuthModus,
    /// Server-Geheimnis fuer den Envelope-Modus
    pub geheimnis: Option<String>,
    /// Zeit bis zum Handshake in Sekunden
    pub handshake_timeout_sek: u64,
}

impl Default for AuthEinstellungen {
    fn default() -> Self {
        Self {
            modus: AuthModus::Praesenz,
            geheimnis: None,
            handshake_timeout_sek: 10,
        }
    }
}

/// Einstellungen der Schluesselableitung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KryptoEinstellungen {
    /// PBKDF2-Runden
    pub runden: u32,
    /// Gleichzeitige KDF-Worker
    pub worker: usize,
}

impl Default for KryptoEinstellungen {
    fn default() -> Self {
        Self {
            runden: STANDARD_KDF_RUNDEN,
            worker: echo_crypto::pool::STANDARD_WORKER,
        }
    }
}

/// Raum-Einstellungen
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RaumEinstellungen {
    /// Leere Raeume behalten statt sie zu entfernen
    pub leere_behalten: bool,
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// EnvFilter-Direktive, z.B. "info" oder "echo_signaling=debug"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den `/metrics`-Endpunkt
    pub aktiviert: bool,
    /// Port fuer Metriken (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

/// Woher die Konfiguration stammt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigQuelle {
    Datei(PathBuf),
    Vorlage(PathBuf),
    Standard,
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei
    ///
    /// Reihenfolge: `pfad`, dann `config_template.toml` daneben, dann
    /// Standardwerte.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        Self::laden_mit_quelle(pfad).map(|(config, _)| config)
    }

    /// Wie [`ServerConfig::laden`], meldet zusaetzlich die Quelle
    ///
    /// Laeuft vor der Logging-Initialisierung, daher loggt der Aufrufer.
    pub fn laden_mit_quelle(pfad: &str) -> anyhow::Result<(Self, ConfigQuelle)> {
        let pfad = Path::new(pfad);
        if let Some(config) = Self::datei_lesen(pfad)? {
            return Ok((config, ConfigQuelle::Datei(pfad.to_path_buf())));
        }

        let vorlage = pfad.with_file_name(TEMPLATE_DATEINAME);
        if let Some(config) = Self::datei_lesen(&vorlage)? {
            return Ok((config, ConfigQuelle::Vorlage(vorlage)));
        }

        Ok((Self::default(), ConfigQuelle::Standard))
    }

    /// `Ok(None)` wenn die Datei nicht existiert
    fn datei_lesen(pfad: &Path) -> anyhow::Result<Option<Self>> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt).map_err(|e| {
                    anyhow::anyhow!("Konfigurationsfehler in '{}': {e}", pfad.display())
                })?;
                Ok(Some(config))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{}' nicht lesbar: {e}",
                pfad.display()
            )),
        }
    }

    /// Prueft Werte, die Serde allein nicht abfangen kann
    pub fn validieren(&self) -> Result<(), EchoError> {
        if self.auth.modus == AuthModus::Envelope
            && self.auth.geheimnis.as_deref().map_or(true, |g| g.is_empty())
        {
            return Err(EchoError::Konfiguration(
                "auth.modus = \"envelope\" erfordert auth.geheimnis".into(),
            ));
        }
        if self.krypto.runden == 0 {
            return Err(EchoError::Konfiguration("krypto.runden muss >= 1 sein".into()));
        }
        if self.krypto.worker == 0 {
            return Err(EchoError::Konfiguration("krypto.worker muss >= 1 sein".into()));
        }
        if self.netzwerk.verbindungs_timeout_sek == 0 {
            return Err(EchoError::Konfiguration(
                "netzwerk.verbindungs_timeout_sek muss >= 1 sein".into(),
            ));
        }
        if self.auth.handshake_timeout_sek == 0 {
            return Err(EchoError::Konfiguration(
                "auth.handshake_timeout_sek muss >= 1 sein".into(),
            ));
        }
        if !log_format_gueltig(&self.logging.format) {
            return Err(EchoError::Konfiguration(format!(
                "Unbekanntes Log-Format '{}' (erlaubt: text, json)",
                self.logging.format
            )));
        }
        Ok(())
    }

    pub fn kdf_parameter(&self) -> KdfParameter {
        KdfParameter {
            runden: self.krypto.runden,
        }
    }

    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            server_name: self.server.name.clone(),
            max_clients: self.server.max_clients,
            handshake_timeout_sek: self.auth.handshake_timeout_sek,
            keepalive_sek: self.netzwerk.keepalive_sek,
            verbindungs_timeout_sek: self.netzwerk.verbindungs_timeout_sek,
        }
    }

    /// Gibt die vollstaendige Bind-Adresse fuer TCP zurueck
    pub fn tcp_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.tcp_port)
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.observability.port)
    }
}
