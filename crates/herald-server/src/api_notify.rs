//! Notification dispatch handlers.
//!
//! A successful send returns the committed log entry and then forwards it
//! to the notification stream.

use crate::api_channels::parse_actor;
use crate::error::{with_conn, ApiError};
use crate::middleware::CallerContext;
use crate::{publish_entry, AppState};
use axum::{
    extract::{Extension, Path},
    response::Json,
};
use herald_channels::{notify_all, notify_one};
use herald_log::LogEntry;
use herald_types::{ChannelIndex, NotificationContent};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct NotifyOneRequest {
    pub recipient: String,
    /// Content is ciphertext for the recipient when set.
    #[serde(default)]
    pub is_private: bool,
    #[serde(flatten)]
    pub content: NotificationContent,
}

/// POST /api/channels/{index}/notify
pub async fn notify_one_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CallerContext(caller)): Extension<CallerContext>,
    Path(index): Path<ChannelIndex>,
    Json(payload): Json<NotifyOneRequest>,
) -> Result<Json<LogEntry>, ApiError> {
    let recipient = parse_actor(&payload.recipient)?;

    let entry = with_conn(&state.pool, "notify_one", move |conn| {
        Ok(notify_one(
            conn,
            &caller,
            &recipient,
            index,
            &payload.content,
            payload.is_private,
        )?)
    })
    .await?;

    publish_entry(&state.log_tx, &entry);
    Ok(Json(entry))
}

/// POST /api/channels/{index}/broadcast
pub async fn notify_all_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CallerContext(caller)): Extension<CallerContext>,
    Path(index): Path<ChannelIndex>,
    Json(content): Json<NotificationContent>,
) -> Result<Json<LogEntry>, ApiError> {
    let entry = with_conn(&state.pool, "notify_all", move |conn| {
        Ok(notify_all(conn, &caller, index, &content)?)
    })
    .await?;

    publish_entry(&state.log_tx, &entry);
    Ok(Json(entry))
}
