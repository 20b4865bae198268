//! HTTP server for the document QA service

pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use state::AppState;

/// Document QA HTTP server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    /// Create a new server backed by Ollama
    pub async fn new(config: RagConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Create a server around existing state
    pub fn with_state(state: AppState) -> Self {
        Self {
            config: state.config().clone(),
            state,
        }
    }

    /// Get the shared state
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness))
            .nest(
                &self.config.server.api_prefix,
                routes::api_routes(self.config.server.max_upload_size),
            )
            .with_state(self.state.clone())
            // Middleware layers (order matters - applied bottom to top)
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new());

        if self.config.server.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router = router.layer(cors);
        }

        router
    }

    /// Start the periodic session sweep, unless sessions never expire
    fn spawn_session_sweeper(&self) -> Option<tokio::task::JoinHandle<()>> {
        let sessions = self.state.sessions().clone();
        let policy = sessions.policy().name().to_string();
        if policy == "none" {
            return None;
        }

        let period = Duration::from_secs(self.config.sessions.sweep_interval_secs.max(1));
        tracing::info!("Session sweep every {:?} (policy: {})", period, policy);

        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let evicted = sessions.evict_expired(chrono::Utc::now());
                if evicted > 0 {
                    tracing::info!("Evicted {} sessions", evicted);
                }
            }
        }))
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::InvalidConfig(format!("Invalid address: {}", e)))?;

        let router = self.router();
        let sweeper = self.spawn_session_sweeper();

        tracing::info!("Starting document QA server on http://{}", addr);
        tracing::info!("API info: http://{}{}/info", addr, self.config.server.api_prefix);

        let listener = tokio::net::TcpListener::bind(addr).await?;

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::internal(format!("Server error: {}", e)));

        if let Some(handle) = sweeper {
            handle.abort();
        }
        self.state.set_ready(false);
        self.state.ingest().persist().await;

        served
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint
async fn readiness(state: axum::extract::State<AppState>) -> axum::http::StatusCode {
    if state.is_ready() {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    }
}
