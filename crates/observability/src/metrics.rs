//! Prometheus-kompatible Metriken fuer Echo
//!
//! Registrierte Metriken:
//! - `echo_connected_clients` – Gauge: Registrierte Verbindungen
//! - `echo_rooms_active` – Gauge: Existierende Raeume
//! - `echo_handshakes_accepted_total` – Counter: Angenommene Handshakes
//! - `echo_handshakes_rejected_total` – Counter: Abgelehnte Handshakes
//! - `echo_room_joins_total` – Counter: Raum-Beitritte
//! - `echo_kdf_duration_seconds` – Histogram: Dauer einer Envelope-Operation im KDF-Pool

use std::time::Duration;

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Alle Echo-Prometheus-Metriken
///
/// Clone teilt Registry und Metriken.
#[derive(Clone)]
pub struct EchoMetrics {
    pub registry: Arc<Registry>,

    pub connected_clients: IntGauge,
    pub rooms_active: IntGauge,
    pub handshakes_accepted: IntCounter,
    pub handshakes_rejected: IntCounter,
    pub room_joins: IntCounter,
    pub kdf_duration_seconds: Histogram,
}

impl EchoMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_clients = IntGauge::with_opts(Opts::new(
            "echo_connected_clients",
            "Anzahl registrierter Verbindungen",
        ))?;
        registry.register(Box::new(connected_clients.clone()))?;

        let rooms_active = IntGauge::with_opts(Opts::new(
            "echo_rooms_active",
            "Anzahl existierender Raeume",
        ))?;
        registry.register(Box::new(rooms_active.clone()))?;

        let handshakes_accepted = IntCounter::with_opts(Opts::new(
            "echo_handshakes_accepted_total",
            "Angenommene Handshakes",
        ))?;
        registry.register(Box::new(handshakes_accepted.clone()))?;

        let handshakes_rejected = IntCounter::with_opts(Opts::new(
            "echo_handshakes_rejected_total",
            "Abgelehnte Handshakes",
        ))?;
        registry.register(Box::new(handshakes_rejected.clone()))?;

        let room_joins = IntCounter::with_opts(Opts::new(
            "echo_room_joins_total",
            "Raum-Beitritte",
        ))?;
        registry.register(Box::new(room_joins.clone()))?;

        // PBKDF2 mit 32767 Runden liegt typischerweise im einstelligen bis
        // zweistelligen Millisekundenbereich
        let kdf_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "echo_kdf_duration_seconds",
                "Dauer einer Envelope-Operation im KDF-Pool in Sekunden",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;
        registry.register(Box::new(kdf_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_clients,
            rooms_active,
            handshakes_accepted,
            handshakes_rejected,
            room_joins,
            kdf_duration_seconds,
        })
    }

    /// Callback fuer den KDF-Pool (`KdfPool::mit_beobachter`)
    pub fn kdf_beobachter(&self) -> Arc<dyn Fn(Duration) + Send + Sync> {
        let histogramm = self.kdf_duration_seconds.clone();
        Arc::new(move |dauer: Duration| histogramm.observe(dauer.as_secs_f64()))
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: EchoMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<EchoMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
