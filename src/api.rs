//! HTTP server: the LINE webhook plus status endpoints.
//!
//! The webhook verifies the signature, queues text events for the
//! gateway, and answers right away. Replies are sent asynchronously.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use linerelay_channels::line::{parse_events, verify_signature, SIGNATURE_HEADER};
use linerelay_core::{config::ServerConfig, message::IncomingMessage};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::i18n;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    tx: mpsc::Sender<IncomingMessage>,
    channel_secret: Arc<str>,
    uptime: Instant,
    language: String,
}

impl ApiState {
    pub fn new(tx: mpsc::Sender<IncomingMessage>, channel_secret: &str, language: &str) -> Self {
        Self {
            tx,
            channel_secret: channel_secret.into(),
            uptime: Instant::now(),
            language: language.to_string(),
        }
    }
}

/// `GET /`
async fn home(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({
        "status": "running",
        "message": i18n::t("server_running", &state.language),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// `GET /health`
async fn health(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "uptime_secs": state.uptime.elapsed().as_secs(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// `POST /callback`: LINE webhook.
///
/// Bad signature or malformed body: 400 with nothing queued.
async fn callback(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    if let Err(e) = verify_signature(&state.channel_secret, &body, signature) {
        warn!("webhook rejected: {e}");
        return (StatusCode::BAD_REQUEST, "Bad Request");
    }

    let messages = match parse_events(&body) {
        Ok(m) => m,
        Err(e) => {
            warn!("webhook body rejected: {e}");
            return (StatusCode::BAD_REQUEST, "Bad Request");
        }
    };

    debug!("webhook accepted with {} text message(s)", messages.len());
    for msg in messages {
        if state.tx.send(msg).await.is_err() {
            error!("gateway queue closed, dropping webhook events");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    }

    (StatusCode::OK, "OK")
}

/// Build the axum router with shared state.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/callback", post(callback))
        .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024)) // 1 MB max request body
        .with_state(state)
}

/// Serve until Ctrl-C. Dropping the router afterwards closes the gateway queue.
pub async fn serve(config: &ServerConfig, state: ApiState) -> anyhow::Result<()> {
    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {addr}: {e}"))?;

    info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
