use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use keygate_core::{LoginRequest, PasswordRecoveryRequest, RegisterRequest, ResetPasswordRequest};

use crate::auth::middleware::AuthUser;
use crate::dto::*;
use crate::error::AppError;
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let Json(request) = body?;
    let user = state.accounts.register(&request).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "User registered successfully",
            user,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(request) = body?;
    let session = state.accounts.login(&request).await?;

    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful",
        session,
    }))
}

pub async fn password_recovery(
    State(state): State<AppState>,
    body: Result<Json<PasswordRecoveryRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(request) = body?;
    state.reset.initiate(&request).await?;

    Ok(Json(MessageResponse::new(
        "Password recovery initiated. Please check your messages.",
    )))
}

pub async fn reset_password(
    State(state): State<AppState>,
    body: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(request) = body?;
    state.reset.confirm(&request).await?;

    Ok(Json(MessageResponse::new("Password has been reset successfully.")))
}

pub async fn profile(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.accounts.profile(user.id).await?;
    Ok(Json(UserResponse { success: true, user }))
}
