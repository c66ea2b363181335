use axum::extract::{OriginalUri, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use keygate_core::{CoreError, UserId};

use crate::dto::*;
use crate::error::AppError;
use crate::state::AppState;

/// Lists every account and fills the response cache for this path.
pub async fn list_users(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, AppError> {
    let users = state.accounts.list_users().await?;
    let body = serde_json::to_string(&UsersResponse { success: true, users })
        .map_err(|e| CoreError::Internal(format!("failed to render user list: {e}")))?;

    state.cache.populate(uri.path(), &body).await;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], body).into_response())
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let id: UserId = id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid user ID".to_string()))?;
    let user = state.accounts.profile(id).await?;
    Ok(Json(UserResponse { success: true, user }))
}
