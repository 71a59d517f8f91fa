use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use herald_types::ActorId;

/// Header carrying the caller's actor identifier.
pub const ACTOR_HEADER: &str = "x-herald-actor";

/// The authenticated caller, stored in request extensions.
#[derive(Clone, Debug)]
pub struct CallerContext(pub ActorId);

/// Resolves the caller from `X-Herald-Actor` or `Authorization: Bearer`.
///
/// Identity is supplied by the deployment substrate and taken at face value;
/// the bearer token is the actor identifier itself. Requests without a
/// well-formed identifier are rejected with 401.
pub async fn actor_middleware(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let actor = caller_from_headers(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;
    req.extensions_mut().insert(CallerContext(actor));
    Ok(next.run(req).await)
}

fn caller_from_headers(headers: &HeaderMap) -> Option<ActorId> {
    let raw = if let Some(val) = headers.get(ACTOR_HEADER) {
        val.to_str().ok()?
    } else {
        headers
            .get("authorization")?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?
    };

    match raw.parse::<ActorId>() {
        Ok(actor) => Some(actor),
        Err(e) => {
            tracing::debug!(error = %e, "rejected malformed caller identity");
            None
        }
    }
}
