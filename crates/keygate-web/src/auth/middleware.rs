use axum::body::Body;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::Response;
use keygate_core::{CoreError, RequestContext, UserId};

use crate::error::AppError;
use crate::middleware::request_context;
use crate::state::AppState;

/// Verifies the bearer token and attaches the authenticated [`RequestContext`]
/// for everything behind it.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let anonymous = request_context(&req, state.config.trust_proxy_headers);
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let context = state.gate.attach(anonymous, authorization)?;
    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}

/// The subject resolved by [`require_auth`]. Rejects with 401 on routes the
/// gate did not run on.
pub struct AuthUser {
    pub id: UserId,
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .and_then(RequestContext::subject)
            .map(|id| AuthUser { id })
            .ok_or(AppError::Core(CoreError::Unauthorized))
    }
}
