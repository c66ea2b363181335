// Per-client fixed-window limiting backed by the shared secret store.
//
// Limit and window come from `[rate_limit]` in ServerConfig (default 100 per 60s).
// Denied requests get 429 before the handler runs.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AppError;
use crate::middleware::request_context;
use crate::state::AppState;

pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let context = request_context(&req, state.config.trust_proxy_headers);
    state.limiter.enforce(context.client()).await?;
    Ok(next.run(req).await)
}
