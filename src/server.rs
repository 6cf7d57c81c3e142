//! HTTP surface — liveness probe and the Telegram webhook endpoint.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{debug, warn};

use crate::channels::telegram;
use crate::orchestrator::Orchestrator;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Bot token; doubles as the secret webhook path segment.
    pub webhook_token: String,
}

/// Build the router. The webhook route is mounted only for the push transport.
pub fn routes(state: AppState, webhook: bool) -> Router {
    let mut router = Router::new().route("/", get(health));
    if webhook {
        router = router.route("/{token}", post(receive_update));
    }
    router.with_state(state)
}

/// GET / — unauthenticated liveness probe.
async fn health() -> &'static str {
    "Bot is running!"
}

/// POST /{token} — Telegram pushes updates here.
///
/// A mismatched token gets a bare 404. Everything else gets an immediate
/// `200 {"message":"ok"}`: the body is parsed leniently and processing is
/// spawned, so malformed updates and downstream failures are logged but never
/// surfaced to Telegram (which would otherwise retry the update).
async fn receive_update(
    Path(token): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> impl IntoResponse {
    if token != state.webhook_token {
        warn!("Webhook request with wrong token");
        return StatusCode::NOT_FOUND.into_response();
    }

    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(update) => {
            if let Some(incoming) = telegram::parse_update(&update) {
                let orchestrator = Arc::clone(&state.orchestrator);
                tokio::spawn(async move {
                    orchestrator
                        .handle_message(&incoming.chat_id, &incoming.text)
                        .await;
                });
            } else {
                debug!("Ignoring update without a text message");
            }
        }
        Err(e) => warn!(error = %e, "Malformed webhook body"),
    }

    Json(serde_json::json!({ "message": "ok" })).into_response()
}

// ── Tests ───────────────────────────────────────────────────────────
