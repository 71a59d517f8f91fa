//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use herald_channels::ChannelError;
use herald_db::DbPool;
use herald_log::LogError;
use rusqlite::Connection;
use serde_json::json;

/// A failed request: a status code and a short client-facing message.
///
/// Server-side failures carry a generic message; their detail goes to the
/// log instead of the response body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// `NotFound` → 404, `Unauthorized` → 403, subscription state conflicts →
/// 409, `RecipientNotSubscribed` → 422, `InvalidArgument` → 400, anything
/// else → 500 (with error logged).
impl From<ChannelError> for ApiError {
    fn from(e: ChannelError) -> Self {
        let status = match &e {
            ChannelError::NotFound(_) => StatusCode::NOT_FOUND,
            ChannelError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            ChannelError::AlreadySubscribed(_) | ChannelError::NotSubscribed(_) => {
                StatusCode::CONFLICT
            }
            ChannelError::RecipientNotSubscribed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ChannelError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ChannelError::Database(_) | ChannelError::Log(_) | ChannelError::Payload(_) => {
                tracing::error!(error = %e, "channel operation failed");
                return Self::internal();
            }
        };
        Self::new(status, e.to_string())
    }
}

impl From<LogError> for ApiError {
    fn from(e: LogError) -> Self {
        tracing::error!(error = %e, "broadcast log query failed");
        Self::internal()
    }
}

/// Runs `f` on a pooled connection in the blocking thread pool.
///
/// `op` names the operation in error logs.
pub async fn with_conn<T, F>(pool: &DbPool, op: &'static str, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T, ApiError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            tracing::error!(error = %e, op, "failed to get db connection");
            ApiError::internal()
        })?;
        f(&conn)
    })
    .await
    .map_err(|e| {
        tracing::error!(error = %e, op, "blocking task join error");
        ApiError::internal()
    })?
}
