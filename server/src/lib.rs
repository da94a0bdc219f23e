//! rendezvous-server – Bibliotheks-Root
//!
//! Baut den HTTP-Router (Caller-Seite, `/ws`, `/health`, `/metrics`) und
//! stellt den oeffentlichen Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use anyhow::Result;
use axum::{
    http::{HeaderValue, Method},
    response::Html,
    routing::get,
    Router,
};
use config::ServerConfig;
use rendezvous_observability::{
    health_router, metrics_router, request_timing_layer, timing_middleware, HealthState,
    RendezvousMetrics,
};
use rendezvous_signaling::{signaling_router, SignalingState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

/// Eingebettete Caller-Seite
pub const INDEX_HTML: &str = include_str!("../static/index.html");

/// Wie lange nach dem Shutdown-Signal auf offene Sessions gewartet wird
const SESSION_AUSLAUF: Duration = Duration::from_secs(5);

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
    pub state: Arc<SignalingState>,
    pub health: HealthState,
    pub metriken: RendezvousMetrics,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Result<Self> {
        let metriken = RendezvousMetrics::neu()?;
        let state = SignalingState::neu(config.signaling_config(), metriken.clone());
        let health = HealthState::neu(metriken.clone());
        Ok(Self {
            config,
            state,
            health,
            metriken,
        })
    }

    /// Baut den vollstaendigen Router inklusive Middleware
    pub fn app(&self) -> Router {
        Router::new()
            .route("/", get(index))
            .merge(signaling_router(Arc::clone(&self.state)))
            .merge(health_router(self.health.clone()))
            .merge(metrics_router(self.metriken.clone()))
            .layer(axum::middleware::from_fn_with_state(
                self.metriken.clone(),
                timing_middleware,
            ))
            .layer(request_timing_layer())
            .layer(cors_layer(&self.config.http.cors_origins))
    }

    /// Startet den HTTP-Server und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge beim Herunterfahren:
    /// 1. `/health` meldet 503
    /// 2. Sessions bekommen das Shutdown-Signal und geben ihre Namen frei
    /// 3. Listener wird geschlossen
    /// 4. Bis zu 5 Sekunden auf offene Sessions warten
    pub async fn starten(self) -> Result<()> {
        let adresse = self.config.bind_adresse()?;
        let listener = tokio::net::TcpListener::bind(adresse).await?;

        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %adresse,
            max_clients = self.config.server.max_clients,
            "Server gestartet"
        );

        let app = self.app();
        let state = Arc::clone(&self.state);
        let health = self.health.clone();

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
            health.herunterfahren_markieren();
            state.herunterfahren();
        })
        .await?;

        if self.state.auf_sessions_warten(SESSION_AUSLAUF).await {
            tracing::info!("Alle Sessions beendet");
        }
        Ok(())
    }
}

/// `GET /` – Caller-Seite
async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// CORS: ohne konfigurierte Origins ist jeder Origin erlaubt
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let basis = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.is_empty() {
        return basis.allow_origin(Any);
    }

    let erlaubt: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(wert) => Some(wert),
            Err(_) => {
                tracing::warn!(origin = %o, "Ungueltiger CORS-Origin ignoriert");
                None
            }
        })
        .collect();
    basis.allow_origin(erlaubt)
}

/// Wartet auf Ctrl-C oder SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Ctrl-C-Handler konnte nicht installiert werden: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("SIGTERM-Handler konnte nicht installiert werden: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
