//! Webhook receiver.
//!
//! Routes:
//! - `POST /webhook/{secret}`: Bot API updates, authenticated by the
//!   `X-Telegram-Bot-Api-Secret-Token` header
//! - `GET /healthz`: liveness

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use subtle::ConstantTimeEq;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::dispatcher::Dispatcher;
use crate::error::ServerError;
use crate::telegram::Update;

/// Header the platform echoes the registered secret in.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Shared state for the webhook handlers.
#[derive(Clone)]
pub struct WebhookState {
    pub dispatcher: Arc<Dispatcher>,
    pub secret: SecretString,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

fn secret_matches(expected: &SecretString, provided: &str) -> bool {
    bool::from(
        provided
            .as_bytes()
            .ct_eq(expected.expose_secret().as_bytes()),
    )
}

async fn webhook_handler(
    State(state): State<WebhookState>,
    Path(path_secret): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if !secret_matches(&state.secret, &path_secret) {
        tracing::warn!("Webhook request on unknown path");
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Not found" })),
        );
    }

    let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    match provided {
        Some(secret) if secret_matches(&state.secret, secret) => {}
        Some(_) => {
            tracing::warn!("Webhook secret validation failed");
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "Invalid secret token" })),
            );
        }
        None => {
            tracing::warn!("Webhook secret required but not provided");
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "Invalid secret token" })),
            );
        }
    }

    // Unparseable updates are still acknowledged, or the platform redelivers them.
    match serde_json::from_slice::<Update>(&body) {
        Ok(update) => {
            tracing::debug!(update_id = update.update_id, "Webhook update received");
            state.dispatcher.dispatch(&update).await;
        }
        Err(e) => {
            tracing::warn!(error = %e, body_len = body.len(), "Failed to parse webhook update");
        }
    }

    (StatusCode::OK, Json(serde_json::json!({ "ok": true })))
}

/// Build the router without binding it.
pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/webhook/{secret}", post(webhook_handler))
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB max request body
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A running server.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// The address actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            tracing::error!("Webhook server task failed: {}", e);
        }
    }
}

/// Bind `addr` and serve the webhook router in a background task.
pub async fn start_server(
    addr: SocketAddr,
    state: WebhookState,
) -> Result<ServerHandle, ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
    let bound_addr = listener.local_addr().map_err(|e| ServerError::Bind {
        addr: addr.to_string(),
        reason: format!("failed to get local addr: {e}"),
    })?;

    let app = router(state);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Webhook server shutting down");
            })
            .await
        {
            tracing::error!("Webhook server error: {}", e);
        }
    });

    tracing::info!(addr = %bound_addr, "Webhook server listening");
    Ok(ServerHandle {
        addr: bound_addr,
        shutdown_tx,
        task,
    })
}
