//! Browser UI: a single server-rendered page backed by per-session state.
//!
//! ```text
//! GET  /               page (sidebar, upload, preview, result, downloads)
//! POST /credential     store the session's API key
//! POST /upload         multipart "file" → intake → held image
//! POST /extract        one vision call for the held image
//! GET  /download/json  invoice_data.json
//! GET  /download/csv   invoice_line_items.csv
//! GET  /api/health     liveness
//! ```

pub mod handlers;
pub mod session;
pub mod view;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::{ExtractionConfig, ServeConfig};
use crate::error::InvoiceError;
pub use session::{Session, SessionStore};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    pub config: Arc<ExtractionConfig>,
}

impl AppState {
    pub fn new(config: ExtractionConfig) -> Self {
        Self::with_limits(config, &ServeConfig::default())
    }

    /// State whose session store follows the server's TTL and capacity.
    pub fn with_limits(config: ExtractionConfig, serve: &ServeConfig) -> Self {
        Self {
            sessions: SessionStore::with_limits(serve.session_idle_ttl, serve.max_sessions),
            config: Arc::new(config),
        }
    }

    /// Users must enter a key unless the server brings its own backend.
    pub fn credential_required(&self) -> bool {
        self.config.backend.is_none() && self.config.provider_name.is_none()
    }
}

impl IntoResponse for InvoiceError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, self.to_string()).into_response()
    }
}

/// Build the application router.
pub fn router(state: AppState, serve: &ServeConfig) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/credential", post(handlers::set_credential))
        .route("/upload", post(handlers::upload))
        .route("/extract", post(handlers::extract))
        .route("/download/json", get(handlers::download_json))
        .route("/download/csv", get(handlers::download_csv))
        .route("/api/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(serve.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and run the web UI until Ctrl-C.
pub async fn serve(config: ExtractionConfig, serve: ServeConfig) -> Result<(), InvoiceError> {
    let state = AppState::with_limits(config, &serve);
    let listener = TcpListener::bind(serve.addr)
        .await
        .map_err(|e| InvoiceError::Internal(format!("cannot bind {}: {}", serve.addr, e)))?;
    let reaper = tokio::spawn(reap_idle_sessions(state.sessions.clone()));
    let app = router(state, &serve);
    info!("Invoice extractor listening on http://{}", serve.addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| InvoiceError::Internal(format!("server error: {e}")));
    reaper.abort();
    served
}

/// Periodically drop sessions idle past the store's TTL.
async fn reap_idle_sessions(sessions: SessionStore) {
    let period = (sessions.idle_ttl() / 4).max(Duration::from_secs(1));
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        let reaped = sessions.reap_idle().await;
        if reaped > 0 {
            info!("Reaped {} idle sessions", reaped);
        }
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down"),
        // Without a signal handler the server runs until killed
        Err(_) => std::future::pending::<()>().await,
    }
}
