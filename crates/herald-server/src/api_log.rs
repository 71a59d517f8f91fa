//! Broadcast log read surface.
//!
//! Provides:
//! - `GET /api/log`: cursor-paged retrieval with filtering
//! - `GET /events/notifications`: SSE stream of newly committed entries
//!
//! Both are unauthenticated. Private notification content in the log is
//! ciphertext, so exposing the log does not expose private payloads.

use crate::api_channels::parse_actor;
use crate::error::{with_conn, ApiError};
use crate::AppState;
use axum::{
    extract::{Extension, Query},
    response::{
        sse::{Event, KeepAlive},
        Json, Sse,
    },
};
use futures_util::Stream;
use herald_db::run_read;
use herald_log::{latest_seq, query_log, LogEntry, LogError, LogFilter};
use herald_types::{ActorId, ChannelIndex, NotificationKind};
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Query parameters for `GET /api/log`.
#[derive(Debug, Deserialize)]
pub struct LogQuery {
    /// Return entries with `seq` strictly greater than this cursor.
    pub after_seq: Option<i64>,
    pub channel: Option<ChannelIndex>,
    pub recipient: Option<String>,
    /// `TARGETED` or `BROADCAST`.
    pub kind: Option<String>,
    /// Maximum number of entries to return (default: 100, max: 1000).
    pub limit: Option<i64>,
}

/// Response wrapper for a page of log entries.
#[derive(Debug, Serialize)]
pub struct LogResponse {
    /// The matching entries in `seq` order.
    pub entries: Vec<LogEntry>,
    pub count: usize,
    /// Highest `seq` committed at query time, for cursor bookkeeping.
    pub latest_seq: i64,
}

/// GET /api/log
pub async fn get_log_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<LogQuery>,
) -> Result<Json<LogResponse>, ApiError> {
    let kind = params
        .kind
        .as_deref()
        .map(str::parse::<NotificationKind>)
        .transpose()
        .map_err(|e| {
            ApiError::bad_request(format!("{e}. Expected one of: TARGETED, BROADCAST"))
        })?;
    let recipient = params.recipient.as_deref().map(parse_actor).transpose()?;

    let filter = LogFilter {
        after_seq: params.after_seq,
        channel: params.channel,
        recipient,
        kind,
        limit: params.limit,
    };

    let response = with_conn(&state.pool, "query_log", move |conn| {
        // One snapshot, so `latest_seq` is never behind the page it describes.
        Ok(run_read(conn, |tx| -> Result<LogResponse, LogError> {
            let entries = query_log(tx, &filter)?;
            let latest_seq = latest_seq(tx)?;
            Ok(LogResponse {
                count: entries.len(),
                entries,
                latest_seq,
            })
        })?)
    })
    .await?;
    Ok(Json(response))
}

/// Query parameters for `GET /events/notifications`.
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub channel: Option<ChannelIndex>,
    /// Only targeted entries addressed to this actor.
    pub recipient: Option<String>,
}

/// GET /events/notifications
///
/// Streams log entries as they commit. A listener that falls behind the
/// stream buffer silently misses entries and should backfill through
/// `GET /api/log` using the last `seq` it saw.
///
/// A malformed `recipient` is rejected before the stream opens.
pub async fn get_notification_stream_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let channel_filter = params.channel;
    let recipient_filter: Option<ActorId> =
        params.recipient.as_deref().map(parse_actor).transpose()?;

    let rx = state.log_tx.subscribe();
    let stream = BroadcastStream::new(rx);

    let mapped_stream = stream.filter_map(move |result| match result {
        Ok(entry) => {
            if channel_filter.is_some_and(|c| entry.record.channel() != c) {
                return None;
            }
            if let Some(ref wanted) = recipient_filter {
                if entry.record.recipient() != Some(wanted) {
                    return None;
                }
            }

            match serde_json::to_string(&entry) {
                Ok(data) => Some(Ok(Event::default()
                    .id(entry.seq.to_string())
                    .data(data))),
                Err(e) => {
                    tracing::error!(seq = entry.seq, "failed to serialize log entry: {}", e);
                    None
                }
            }
        }
        Err(lagged) => {
            tracing::warn!(error = %lagged, "notification stream listener lagged");
            None
        }
    });

    Ok(Sse::new(mapped_stream).keep_alive(KeepAlive::default()))
}
