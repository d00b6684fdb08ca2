//! HTTP surface: handshake verification, event intake, health.
//!
//! Handlers stay thin. The POST handler hands raw bytes plus the
//! signature header to the dispatcher and maps its terminal outcome to
//! a status code; anything 5xx tells the platform to redeliver.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::pipeline::Dispatcher;
use crate::pipeline::types::DispatchOutcome;
use crate::webhook::signature::SIGNATURE_HEADER;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    /// Token the platform must echo during the GET handshake.
    pub verify_token: SecretString,
}

/// Build the Axum router for the webhook endpoints.
pub fn webhook_routes(dispatcher: Arc<Dispatcher>, verify_token: SecretString) -> Router {
    let state = AppState {
        dispatcher,
        verify_token,
    };

    Router::new()
        .route("/webhook", get(verify_webhook).post(receive_event))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "ledgerhook"
    }))
}

// ── Handshake ───────────────────────────────────────────────────────────

/// `hub.*` query parameters the platform sends when registering the
/// webhook URL.
#[derive(Debug, Deserialize)]
struct HandshakeParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<HandshakeParams>,
) -> Response {
    let (Some(mode), Some(token), Some(challenge)) =
        (params.mode, params.verify_token, params.challenge)
    else {
        warn!("Handshake request missing hub.* parameters");
        return StatusCode::FORBIDDEN.into_response();
    };

    if mode == "subscribe" && token == state.verify_token.expose_secret() {
        info!("Webhook handshake verified");
        (StatusCode::OK, challenge).into_response()
    } else {
        warn!(mode = %mode, "Webhook handshake failed verification");
        StatusCode::FORBIDDEN.into_response()
    }
}

// ── Event intake ────────────────────────────────────────────────────────

async fn receive_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = state.dispatcher.dispatch(&body, signature).await;
    debug!(outcome = outcome.label(), "Delivery handled");

    match outcome {
        DispatchOutcome::Rejected => StatusCode::UNAUTHORIZED.into_response(),
        DispatchOutcome::Failed { .. } => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        DispatchOutcome::Persisted { .. } | DispatchOutcome::Ignored { .. } => {
            (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response()
        }
    }
}
