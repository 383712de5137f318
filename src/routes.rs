//! HTTP control surface: status, pairing QR, send-message.
//!
//! Every route except `/health` requires the shared `x-api-key` secret.

use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderName, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use subtle::ConstantTimeEq;
use tower_http::cors::{Any, CorsLayer};

use crate::error::BridgeError;
use crate::session::StatusSnapshot;
use crate::state::SharedState;

pub fn app(state: SharedState) -> Router {
    // Browser dashboards poll /qr and /status cross-origin, so preflights
    // must clear the x-api-key header.
    let cors = CorsLayer::new()
        .allow_origin(Any) // Restrict to specific origins in production
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-api-key")]);

    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/qr", get(qr))
        .route("/send-message", post(send_message))
        .layer(cors)
        .with_state(state)
}

// ── Authentication ───────────────────────────────────────────────

/// Marker extracted from a request whose `x-api-key` header matches the
/// configured secret. Comparison is constant-time.
pub struct ApiKey;

impl FromRequestParts<SharedState> for ApiKey {
    type Rejection = BridgeError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .ok_or(BridgeError::Unauthorized)?;

        if constant_time_eq(presented, &state.api_key) {
            Ok(ApiKey)
        } else {
            tracing::warn!("rejected request with invalid x-api-key");
            Err(BridgeError::Unauthorized)
        }
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

// ── Handlers ─────────────────────────────────────────────────────

/// Liveness check. Public: it leaks no session state.
async fn health() -> Json<Value> {
    Json(json!({
        "ok": true,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn status(_key: ApiKey, State(state): State<SharedState>) -> Json<StatusSnapshot> {
    Json(state.session.status())
}

async fn qr(_key: ApiKey, State(state): State<SharedState>) -> Json<Value> {
    match state.session.pending_qr() {
        Some(payload) => match crate::qr::svg_data_url(&payload) {
            Ok(data_url) => Json(json!({ "qr": data_url, "connected": false })),
            Err(e) => {
                // Raw payload still lets a client render the QR themselves.
                tracing::warn!("failed to render QR image, returning raw payload: {e:#}");
                Json(json!({ "qr": payload, "connected": false }))
            }
        },
        None => {
            let snapshot = state.session.status();
            let message = if snapshot.connected {
                "already authenticated"
            } else {
                "no pairing in progress"
            };
            Json(json!({ "connected": snapshot.connected, "message": message }))
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    to: String,
    message: String,
}

async fn send_message(
    _key: ApiKey,
    State(state): State<SharedState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<Value>, BridgeError> {
    if req.to.trim().is_empty() {
        return Err(BridgeError::BadRequest("\"to\" is required".into()));
    }
    if req.message.trim().is_empty() {
        return Err(BridgeError::BadRequest("\"message\" is required".into()));
    }

    let message_id = state.session.send(&req.to, &req.message).await?;
    Ok(Json(json!({ "success": true, "messageId": message_id })))
}
