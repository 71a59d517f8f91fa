//! Herald server library logic.
//!
//! The HTTP surface is a thin shell over `herald-channels`: every handler
//! resolves the caller, runs one registry operation on a pooled connection
//! inside `spawn_blocking`, and maps the outcome to a status code. Entries
//! appended to the broadcast log are also forwarded to live SSE listeners
//! once their transaction has committed.

pub mod api_channels;
pub mod api_events;
pub mod api_keys;
pub mod api_log;
pub mod api_notify;
pub mod config;
pub mod error;
pub mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Extension, Json, Router,
};
use herald_db::DbPool;
use herald_log::LogEntry;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Maximum accepted request body, in bytes.
pub const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Committed broadcast log entries, fanned out to SSE listeners.
    pub log_tx: broadcast::Sender<LogEntry>,
}

impl AppState {
    pub fn new(pool: DbPool, stream_capacity: usize) -> Self {
        let (log_tx, _) = broadcast::channel(stream_capacity.max(1));
        Self { pool, log_tx }
    }
}

/// Forwards a committed log entry to live stream listeners.
///
/// Having no listeners is the normal idle state, so a failed send is only
/// logged at debug level and never reaches the caller.
pub fn publish_entry(log_tx: &broadcast::Sender<LogEntry>, entry: &LogEntry) {
    match log_tx.send(entry.clone()) {
        Ok(receivers) => {
            tracing::debug!(seq = entry.seq, receivers, "published log entry to stream");
        }
        Err(_) => {
            tracing::debug!(seq = entry.seq, "no stream listeners for log entry");
        }
    }
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/api/channels",
            post(api_channels::create_channel_handler).get(api_channels::list_channels_handler),
        )
        .route(
            "/api/channels/{index}",
            get(api_channels::get_channel_handler).put(api_channels::edit_channel_handler),
        )
        .route(
            "/api/channels/{index}/subscribe",
            post(api_channels::subscribe_handler),
        )
        .route(
            "/api/channels/{index}/unsubscribe",
            post(api_channels::unsubscribe_handler),
        )
        .route(
            "/api/channels/{index}/subscribers",
            get(api_channels::subscribers_handler),
        )
        .route(
            "/api/channels/{index}/push-access/{actor}",
            put(api_channels::set_push_access_handler).get(api_channels::get_push_access_handler),
        )
        .route(
            "/api/channels/{index}/settings",
            put(api_channels::set_settings_handler).get(api_channels::get_settings_handler),
        )
        .route(
            "/api/channels/{index}/notify",
            post(api_notify::notify_one_handler),
        )
        .route(
            "/api/channels/{index}/broadcast",
            post(api_notify::notify_all_handler),
        )
        .route("/api/keys", put(api_keys::set_public_key_handler))
        .route("/api/keys/{actor}", get(api_keys::get_public_key_handler))
        .route(
            "/api/actors/{actor}/subscriptions",
            get(api_channels::subscriptions_of_handler),
        )
        .layer(axum::middleware::from_fn(middleware::actor_middleware));

    Router::new()
        .route("/health", get(health))
        .route("/api/log", get(api_log::get_log_handler))
        .route(
            "/api/registry/events",
            get(api_events::get_registry_events_handler),
        )
        .route(
            "/events/notifications",
            get(api_log::get_notification_stream_handler),
        )
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
