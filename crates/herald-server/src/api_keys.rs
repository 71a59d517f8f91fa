//! Public key registry handlers.

use crate::api_channels::parse_actor;
use crate::error::{with_conn, ApiError};
use crate::middleware::CallerContext;
use crate::AppState;
use axum::{
    extract::{Extension, Path},
    response::Json,
};
use herald_channels::{get_public_key, set_public_key};
use herald_types::ActorId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct SetPublicKeyRequest {
    pub public_key: String,
}

#[derive(Debug, Serialize)]
pub struct PublicKeyResponse {
    pub actor: ActorId,
    /// `None` when the actor never registered a key.
    pub public_key: Option<String>,
}

/// PUT /api/keys
///
/// Registers or replaces the caller's own key. The value is opaque.
pub async fn set_public_key_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CallerContext(caller)): Extension<CallerContext>,
    Json(payload): Json<SetPublicKeyRequest>,
) -> Result<Json<PublicKeyResponse>, ApiError> {
    let response = with_conn(&state.pool, "set_public_key", move |conn| {
        set_public_key(conn, &caller, &payload.public_key)?;
        Ok(PublicKeyResponse {
            actor: caller,
            public_key: Some(payload.public_key),
        })
    })
    .await?;
    Ok(Json(response))
}

/// GET /api/keys/{actor}
pub async fn get_public_key_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CallerContext(_caller)): Extension<CallerContext>,
    Path(actor): Path<String>,
) -> Result<Json<PublicKeyResponse>, ApiError> {
    let actor = parse_actor(&actor)?;

    let response = with_conn(&state.pool, "get_public_key", move |conn| {
        let public_key = get_public_key(conn, &actor)?;
        Ok(PublicKeyResponse { actor, public_key })
    })
    .await?;
    Ok(Json(response))
}
