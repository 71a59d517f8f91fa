//! Channel store, subscription and push-access handlers.

use crate::error::{with_conn, ApiError};
use crate::middleware::CallerContext;
use crate::AppState;
use axum::{
    extract::{Extension, Path},
    response::Json,
};
use herald_channels::{
    all_channels, create_channel, edit_channel, get_channel, get_notification_settings,
    has_push_access, set_notification_settings, set_push_access, subscribe,
    subscribers_with_count, subscriptions_of, unsubscribe, Channel, ChannelParams, Subscribers,
};
use herald_types::{ActorId, ChannelIndex};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Parses an actor identifier taken from the request path.
pub(crate) fn parse_actor(raw: &str) -> Result<ActorId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::bad_request(format!("invalid actor id: {e}")))
}

#[derive(Debug, Serialize)]
pub struct CreateChannelResponse {
    pub channel_index: ChannelIndex,
}

#[derive(Debug, Deserialize)]
pub struct SetPushAccessRequest {
    pub grant: bool,
}

#[derive(Debug, Serialize)]
pub struct PushAccessResponse {
    pub channel_index: ChannelIndex,
    pub actor: ActorId,
    pub has_push_access: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetSettingsRequest {
    pub notif_id: u64,
    pub settings: String,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub channel_index: ChannelIndex,
    pub actor: ActorId,
    pub settings: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionsResponse {
    pub actor: ActorId,
    pub channels: Vec<ChannelIndex>,
}

/// POST /api/channels
///
/// Any caller may create a channel and becomes its admin.
pub async fn create_channel_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CallerContext(caller)): Extension<CallerContext>,
    Json(params): Json<ChannelParams>,
) -> Result<Json<CreateChannelResponse>, ApiError> {
    let channel_index = with_conn(&state.pool, "create_channel", move |conn| {
        Ok(create_channel(conn, &caller, &params)?)
    })
    .await?;

    Ok(Json(CreateChannelResponse { channel_index }))
}

/// GET /api/channels
pub async fn list_channels_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CallerContext(_caller)): Extension<CallerContext>,
) -> Result<Json<Vec<Channel>>, ApiError> {
    let channels = with_conn(&state.pool, "all_channels", |conn| Ok(all_channels(conn)?)).await?;
    Ok(Json(channels))
}

/// GET /api/channels/{index}
pub async fn get_channel_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CallerContext(_caller)): Extension<CallerContext>,
    Path(index): Path<ChannelIndex>,
) -> Result<Json<Channel>, ApiError> {
    let channel = with_conn(&state.pool, "get_channel", move |conn| {
        Ok(get_channel(conn, index)?)
    })
    .await?;
    Ok(Json(channel))
}

/// PUT /api/channels/{index}
///
/// Admin only. Overwrites all four descriptive fields.
pub async fn edit_channel_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CallerContext(caller)): Extension<CallerContext>,
    Path(index): Path<ChannelIndex>,
    Json(params): Json<ChannelParams>,
) -> Result<Json<Value>, ApiError> {
    with_conn(&state.pool, "edit_channel", move |conn| {
        Ok(edit_channel(conn, &caller, index, &params)?)
    })
    .await?;
    Ok(Json(json!({"status": "updated"})))
}

/// POST /api/channels/{index}/subscribe
pub async fn subscribe_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CallerContext(caller)): Extension<CallerContext>,
    Path(index): Path<ChannelIndex>,
) -> Result<Json<Value>, ApiError> {
    with_conn(&state.pool, "subscribe", move |conn| {
        Ok(subscribe(conn, &caller, index)?)
    })
    .await?;
    Ok(Json(json!({"status": "subscribed"})))
}

/// POST /api/channels/{index}/unsubscribe
pub async fn unsubscribe_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CallerContext(caller)): Extension<CallerContext>,
    Path(index): Path<ChannelIndex>,
) -> Result<Json<Value>, ApiError> {
    with_conn(&state.pool, "unsubscribe", move |conn| {
        Ok(unsubscribe(conn, &caller, index)?)
    })
    .await?;
    Ok(Json(json!({"status": "unsubscribed"})))
}

/// GET /api/channels/{index}/subscribers
pub async fn subscribers_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CallerContext(_caller)): Extension<CallerContext>,
    Path(index): Path<ChannelIndex>,
) -> Result<Json<Subscribers>, ApiError> {
    let listing = with_conn(&state.pool, "subscribers_with_count", move |conn| {
        Ok(subscribers_with_count(conn, index)?)
    })
    .await?;
    Ok(Json(listing))
}

/// PUT /api/channels/{index}/push-access/{actor}
///
/// Admin only.
pub async fn set_push_access_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CallerContext(caller)): Extension<CallerContext>,
    Path((index, actor)): Path<(ChannelIndex, String)>,
    Json(payload): Json<SetPushAccessRequest>,
) -> Result<Json<PushAccessResponse>, ApiError> {
    let actor = parse_actor(&actor)?;
    let grant = payload.grant;

    let response = with_conn(&state.pool, "set_push_access", move |conn| {
        set_push_access(conn, &caller, index, &actor, grant)?;
        Ok(PushAccessResponse {
            channel_index: index,
            actor,
            has_push_access: grant,
        })
    })
    .await?;
    Ok(Json(response))
}

/// GET /api/channels/{index}/push-access/{actor}
pub async fn get_push_access_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CallerContext(_caller)): Extension<CallerContext>,
    Path((index, actor)): Path<(ChannelIndex, String)>,
) -> Result<Json<PushAccessResponse>, ApiError> {
    let actor = parse_actor(&actor)?;

    let response = with_conn(&state.pool, "has_push_access", move |conn| {
        let granted = has_push_access(conn, index, &actor)?;
        Ok(PushAccessResponse {
            channel_index: index,
            actor,
            has_push_access: granted,
        })
    })
    .await?;
    Ok(Json(response))
}

/// PUT /api/channels/{index}/settings
///
/// Stores the caller's own settings; the caller must be subscribed.
pub async fn set_settings_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CallerContext(caller)): Extension<CallerContext>,
    Path(index): Path<ChannelIndex>,
    Json(payload): Json<SetSettingsRequest>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let response = with_conn(&state.pool, "set_notification_settings", move |conn| {
        let stored =
            set_notification_settings(conn, &caller, index, payload.notif_id, &payload.settings)?;
        Ok(SettingsResponse {
            channel_index: index,
            actor: caller,
            settings: Some(stored),
        })
    })
    .await?;
    Ok(Json(response))
}

/// GET /api/channels/{index}/settings
pub async fn get_settings_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CallerContext(caller)): Extension<CallerContext>,
    Path(index): Path<ChannelIndex>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let response = with_conn(&state.pool, "get_notification_settings", move |conn| {
        let settings = get_notification_settings(conn, index, &caller)?;
        Ok(SettingsResponse {
            channel_index: index,
            actor: caller,
            settings,
        })
    })
    .await?;
    Ok(Json(response))
}

/// GET /api/actors/{actor}/subscriptions
pub async fn subscriptions_of_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CallerContext(_caller)): Extension<CallerContext>,
    Path(actor): Path<String>,
) -> Result<Json<SubscriptionsResponse>, ApiError> {
    let actor = parse_actor(&actor)?;

    let response = with_conn(&state.pool, "subscriptions_of", move |conn| {
        let channels = subscriptions_of(conn, &actor)?;
        Ok(SubscriptionsResponse { actor, channels })
    })
    .await?;
    Ok(Json(response))
}
