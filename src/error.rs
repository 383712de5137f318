use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::session::ConnectionStatus;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("not connected (session is {0})")]
    NotConnected(ConnectionStatus),
    #[error("send failed: {0}")]
    SendFailed(anyhow::Error),
    #[error("transport start failed: {0}")]
    TransportStartFailed(anyhow::Error),
    #[error("unauthorized")]
    Unauthorized,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            BridgeError::NotConnected(_) => (StatusCode::CONFLICT, self.to_string()),
            BridgeError::SendFailed(cause) => {
                tracing::error!("send failed: {cause:#}");
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            // Startup failures are absorbed by the reconnect path; this arm
            // only exists so the variant has a defined HTTP shape.
            BridgeError::TransportStartFailed(cause) => {
                tracing::error!("transport start failed: {cause:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            BridgeError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".into()),
            BridgeError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            BridgeError::Internal(e) => {
                tracing::error!("internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".into(),
                )
            }
        };
        (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
    }
}
