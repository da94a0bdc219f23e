//! Prometheus-kompatible Metriken fuer Rendezvous
//!
//! Registrierte Metriken:
//! - `rendezvous_active_sessions` – Gauge: Offene WebSocket-Sessions
//! - `rendezvous_registered_names` – Gauge: Aktuell beanspruchte Namen
//! - `rendezvous_logins_total` – Counter: Login-Versuche (result)
//! - `rendezvous_frames_relayed_total` – Counter: Weitergeleitete Frames (type)
//! - `rendezvous_frames_dropped_total` – Counter: Verworfene Frames (reason)
//! - `rendezvous_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `rendezvous_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Alle Rendezvous-Prometheus-Metriken
///
/// Clone teilt die Registry und alle Metrik-Handles.
#[derive(Clone)]
pub struct RendezvousMetrics {
    pub registry: Arc<Registry>,

    // Signaling
    pub active_sessions: IntGauge,
    pub registered_names: IntGauge,
    pub logins_total: IntCounterVec,
    pub frames_relayed_total: IntCounterVec,
    pub frames_dropped_total: IntCounterVec,

    // HTTP
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

impl RendezvousMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let active_sessions = IntGauge::with_opts(Opts::new(
            "rendezvous_active_sessions",
            "Anzahl offener WebSocket-Sessions",
        ))?;
        registry.register(Box::new(active_sessions.clone()))?;

        let registered_names = IntGauge::with_opts(Opts::new(
            "rendezvous_registered_names",
            "Anzahl aktuell beanspruchter Namen",
        ))?;
        registry.register(Box::new(registered_names.clone()))?;

        let logins_total = IntCounterVec::new(
            Opts::new("rendezvous_logins_total", "Login-Versuche nach Ergebnis"),
            &["result"],
        )?;
        registry.register(Box::new(logins_total.clone()))?;

        let frames_relayed_total = IntCounterVec::new(
            Opts::new(
                "rendezvous_frames_relayed_total",
                "An ein Ziel weitergeleitete Frames",
            ),
            &["type"],
        )?;
        registry.register(Box::new(frames_relayed_total.clone()))?;

        let frames_dropped_total = IntCounterVec::new(
            Opts::new(
                "rendezvous_frames_dropped_total",
                "Verworfene Frames nach Grund",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(frames_dropped_total.clone()))?;

        let http_requests_total = IntCounterVec::new(
            Opts::new(
                "rendezvous_http_requests_total",
                "Gesamtanzahl HTTP-Anfragen",
            ),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "rendezvous_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
            ]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            active_sessions,
            registered_names,
            logins_total,
            frames_relayed_total,
            frames_dropped_total,
            http_requests_total,
            http_request_duration_seconds,
        })
    }

    /// Zaehlt einen Login-Versuch (`ok` oder `taken`)
    pub fn login_zaehlen(&self, ergebnis: &str) {
        self.logins_total.with_label_values(&[ergebnis]).inc();
    }

    /// Zaehlt einen erfolgreich eingereihten Relay-Frame
    pub fn relay_zaehlen(&self, typ: &str) {
        self.frames_relayed_total.with_label_values(&[typ]).inc();
    }

    /// Zaehlt einen verworfenen Frame
    pub fn verworfen_zaehlen(&self, grund: &str) {
        self.frames_dropped_total.with_label_values(&[grund]).inc();
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
pub fn metrics_router(metriken: RendezvousMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<RendezvousMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
