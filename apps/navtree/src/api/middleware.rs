//! # Middleware Module
//!
//! Rate limiting and request identity for the navtree HTTP API.

use super::types::ErrorResponse;
use axum::{
    Json,
    body::Body,
    extract::{FromRequestParts, State},
    http::{HeaderMap, Request, StatusCode, request::Parts},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use navtree_core::Actor;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Header carrying the acting user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the acting user's display name.
pub const USER_NAME_HEADER: &str = "x-user-name";

// =============================================================================
// RATE LIMITER
// =============================================================================

/// Global rate limiter type alias.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create a global rate limiter, or `None` when `requests_per_second` is 0.
pub fn create_rate_limiter(requests_per_second: u32) -> Option<GlobalRateLimiter> {
    let rps = NonZeroU32::new(requests_per_second)?;
    Some(Arc::new(RateLimiter::direct(Quota::per_second(rps))))
}

/// Rate limiting middleware. Returns 429 once the quota is spent.
pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    match limiter.check() {
        Ok(()) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!("Rate limit exceeded");
            Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorResponse::new("RATE_LIMITED", "Too Many Requests")),
            ))
        }
    }
}

// =============================================================================
// ACTOR EXTRACTION
// =============================================================================

/// The acting user, read from `X-User-Id` / `X-User-Name`.
///
/// Requests without an id act as the system actor.
#[derive(Debug, Clone)]
pub struct RequestActor(pub Actor);

/// Build an actor from request headers. Blank or non-UTF-8 values are
/// ignored.
pub fn actor_from_headers(headers: &HeaderMap) -> Actor {
    let read = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    match read(USER_ID_HEADER) {
        Some(id) => Actor::user(id, read(USER_NAME_HEADER)),
        None => Actor::system(),
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestActor {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(actor_from_headers(&parts.headers)))
    }
}

// =============================================================================
// TESTS
// =============================================================================
