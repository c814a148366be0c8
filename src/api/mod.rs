//! HTTP API server for the VocaFree gateway

mod error;
pub mod health;
pub mod rate_limit;
pub mod sessions;
pub mod voice;

pub use error::ApiError;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::config::{Config, DEFAULT_MAX_UPLOAD_BYTES};
use crate::session::SessionStore;
use crate::turn::TurnProcessor;
use crate::Result;

/// How often idle sessions are swept
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared state for API handlers
pub struct ApiState {
    pub processor: Arc<TurnProcessor>,
    pub sessions: SessionStore,
    pub model: String,
    pub rate_limiter: Option<rate_limit::SharedLimiter>,
    /// Largest accepted audio upload in bytes
    pub max_upload_bytes: usize,
}

impl ApiState {
    /// Create state with no rate limit and the default upload cap
    #[must_use]
    pub fn new(processor: TurnProcessor, sessions: SessionStore, model: String) -> Self {
        Self {
            processor: Arc::new(processor),
            sessions,
            model,
            rate_limiter: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Accept audio uploads up to `max_upload_bytes`
    #[must_use]
    pub const fn with_upload_limit(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Limit all routes to `requests_per_minute`
    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_minute: Option<u32>) -> Self {
        self.rate_limiter = requests_per_minute.map(rate_limit::create_limiter);
        self
    }
}

/// Build the router with all routes
pub fn router(state: Arc<ApiState>, static_dir: Option<&Path>) -> Router {
    // Recordings routinely exceed axum's 2 MiB default body limit
    let upload_limit = state.max_upload_bytes;

    let mut router = Router::new()
        .nest(
            "/api/sessions",
            sessions::router(state.clone()).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .nest(
            "/api/voice",
            voice::router(state.clone()).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .merge(health::router())
        .merge(health::ready_router(state.clone()));

    // Serve the web UI if configured
    if let Some(static_dir) = static_dir {
        let index_file = static_dir.join("index.html");
        let serve_dir = ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

        router = router.fallback_service(serve_dir);
        tracing::info!(path = %static_dir.display(), "serving static files");
    }

    let router = router.layer(axum::middleware::from_fn_with_state(
        state,
        rate_limit::rate_limit_middleware,
    ));

    // CORS layer for cross-origin requests from frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router.layer(cors).layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    host: String,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    /// Build a server and its collaborators from configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let processor = crate::providers::build_processor(config);
        let sessions = SessionStore::new(config.llm.system_prompt.clone(), config.session_idle_ttl);
        let state = ApiState::new(processor, sessions, config.llm.model.clone())
            .with_rate_limit(config.server.rate_limit_rpm)
            .with_upload_limit(config.server.max_upload_bytes);

        Self {
            state: Arc::new(state),
            host: config.server.host.clone(),
            port: config.server.port,
            static_dir: config.server.static_dir.clone(),
        }
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server on {addr}: {e}")))?;

        tracing::info!(addr = %addr, "API server listening");

        let sweeper = self.state.sessions.spawn_sweeper(SWEEP_INTERVAL);
        let app = router(self.state, self.static_dir.as_deref());

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        sweeper.abort();

        served.map_err(|e| crate::Error::Config(format!("API server error: {e}")))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
