//! Echo Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Server.

use anyhow::Result;
use echo_server::{
    config::{ConfigQuelle, ServerConfig},
    Server,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("ECHO_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let (config, quelle) = ServerConfig::laden_mit_quelle(&config_pfad)?;

    echo_observability::logging_initialisieren(&config.logging.level, &config.logging.format)?;

    match &quelle {
        ConfigQuelle::Datei(_) => {}
        ConfigQuelle::Vorlage(vorlage) => tracing::warn!(
            pfad = %config_pfad,
            vorlage = %vorlage.display(),
            "Konfigurationsdatei nicht gefunden, verwende Vorlage"
        ),
        ConfigQuelle::Standard => tracing::warn!(
            pfad = %config_pfad,
            "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
        ),
    }

    config.validieren()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Echo Server wird initialisiert"
    );

    Server::neu(config).starten().await
}
