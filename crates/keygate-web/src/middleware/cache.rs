use axum::body::Body;
use axum::extract::{OriginalUri, State};
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use keygate_core::CacheLookup;

use crate::state::AppState;

/// Serves a cached body when one exists; otherwise the handler runs and
/// decides whether to populate the cache.
pub async fn response_cache(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    req: Request<Body>,
    next: Next,
) -> Response {
    match state.cache.lookup(uri.path()).await {
        CacheLookup::Hit(body) => {
            let mut response = (StatusCode::OK, body).into_response();
            let headers = response.headers_mut();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            headers.insert("x-cache", HeaderValue::from_static("HIT"));
            response
        }
        CacheLookup::Miss => next.run(req).await,
    }
}
