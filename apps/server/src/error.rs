use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use adpulse_core::sync::SyncRateStatus;
use adpulse_core::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    /// The manual sync budget is spent.
    RateLimited(SyncRateStatus),
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::RateLimited(status) => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "status": "rate_limited",
                    "message": format!(
                        "Sync limit reached ({}/{}). Please wait for cooldown.",
                        status.max_syncs, status.max_syncs
                    ),
                    "syncsRemaining": 0,
                    "nextFreeAt": status.next_free_at,
                    "cooldownSecondsRemaining": status.cooldown_seconds_remaining,
                })),
            )
                .into_response(),
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(message) => {
                tracing::error!("Request failed: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error", "detail": message })),
                )
                    .into_response()
            }
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(e) => ApiError::BadRequest(e.to_string()),
            Error::Database(adpulse_core::DatabaseError::NotFound(msg)) => ApiError::NotFound(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
