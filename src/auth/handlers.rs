use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{
        ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
        RegisterResponse, ResetPasswordRequest, UserProfile, VerifyEmailRequest,
        VerifyEmailResponse,
    },
    extractors::AuthUser,
    services::{self, REGISTERED_MESSAGE, RESET_MESSAGE, VERIFIED_MESSAGE},
};
use crate::{
    error::{AuthError, AuthResult},
    state::AppState,
};

/// Unauthenticated account endpoints. Rate limiting is layered on by the app.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify-email", post(verify_email))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/profile", get(get_profile))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AuthResult<T> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| AuthError::Validation(format!("Invalid request body: {}", e.body_text())))
}

#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AuthResult<(StatusCode, Json<RegisterResponse>)> {
    let reg = services::register(&state, body(payload)?).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: REGISTERED_MESSAGE.into(),
            user_id: reg.user_id,
        }),
    ))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AuthResult<Json<LoginResponse>> {
    let req = body(payload)?;
    let session = services::login(&state, &req.email, &req.password).await?;
    Ok(Json(LoginResponse {
        token: session.token,
        user: session.profile,
    }))
}

#[instrument(skip_all)]
pub async fn verify_email(
    State(state): State<AppState>,
    payload: Result<Json<VerifyEmailRequest>, JsonRejection>,
) -> AuthResult<Json<VerifyEmailResponse>> {
    let req = body(payload)?;
    let session = services::verify_email(&state, &req.token).await?;
    Ok(Json(VerifyEmailResponse {
        message: VERIFIED_MESSAGE.into(),
        token: session.token,
        user: session.profile,
    }))
}

#[instrument(skip_all)]
pub async fn forgot_password(
    State(state): State<AppState>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> AuthResult<Json<MessageResponse>> {
    let req = body(payload)?;
    let message = services::forgot_password(&state, &req.email).await?;
    Ok(Json(MessageResponse {
        message: message.into(),
    }))
}

#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> AuthResult<Json<MessageResponse>> {
    let req = body(payload)?;
    services::reset_password(&state, &req.token, &req.new_password).await?;
    Ok(Json(MessageResponse {
        message: RESET_MESSAGE.into(),
    }))
}

#[instrument(skip(state, claims), fields(user_id = %claims.user_id))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> AuthResult<Json<UserProfile>> {
    Ok(Json(services::profile(&state, claims.user_id).await?))
}
