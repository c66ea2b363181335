mod auth_handlers;
mod health;
mod users;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use crate::auth::middleware::require_auth;
use crate::middleware::{cache, rate_limit};
use crate::state::AppState;

/// Public credential endpoints. Rate limited per client.
pub fn auth_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(auth_handlers::register))
        .route("/auth/login", post(auth_handlers::login))
        .route("/auth/password-recovery", post(auth_handlers::password_recovery))
        .route("/auth/reset-password", post(auth_handlers::reset_password))
        .route_layer(from_fn_with_state(state.clone(), rate_limit::rate_limit))
}

/// Bearer-authenticated endpoints. The last `route_layer` runs first, so the
/// order per request is auth, then rate limit, then (for `/users`) the cache.
pub fn protected_router(state: &AppState) -> Router<AppState> {
    let cached = Router::new()
        .route("/users", get(users::list_users))
        .route_layer(from_fn_with_state(state.clone(), cache::response_cache));

    Router::new()
        .route("/protected/profile", get(auth_handlers::profile))
        .route("/users/{id}", get(users::get_user))
        .merge(cached)
        .route_layer(from_fn_with_state(state.clone(), rate_limit::rate_limit))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
}

pub fn health_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ping", get(health::ping))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api", auth_router(&state).merge(protected_router(&state)))
        .merge(health_router())
        .with_state(state)
}
