//! Registry event feed handler.
//!
//! `GET /api/registry/events` pages through committed registry state
//! changes. Like the broadcast log it is public: every field in the feed is
//! already readable through the channel endpoints.

use crate::api_channels::parse_actor;
use crate::error::{with_conn, ApiError};
use crate::AppState;
use axum::{
    extract::{Extension, Query},
    response::Json,
};
use herald_channels::{registry_events, RegistryEventEntry, RegistryEventFilter};
use herald_types::ChannelIndex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct RegistryEventQuery {
    pub after_seq: Option<i64>,
    pub channel: Option<ChannelIndex>,
    pub actor: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RegistryEventResponse {
    pub events: Vec<RegistryEventEntry>,
    pub count: usize,
}

/// GET /api/registry/events
pub async fn get_registry_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<RegistryEventQuery>,
) -> Result<Json<RegistryEventResponse>, ApiError> {
    let filter = RegistryEventFilter {
        after_seq: params.after_seq,
        channel: params.channel,
        actor: params.actor.as_deref().map(parse_actor).transpose()?,
        limit: params.limit,
    };

    let events = with_conn(&state.pool, "registry_events", move |conn| {
        Ok(registry_events(conn, &filter)?)
    })
    .await?;
    Ok(Json(RegistryEventResponse {
        count: events.len(),
        events,
    }))
}
