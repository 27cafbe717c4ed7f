use axum::{
    extract::{FromRef, State},
    http::{header, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    claims::Role,
    cookies::{build_clear_cookie, build_session_cookie},
    dto::{AuthResponse, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, ResetPasswordRequest},
    extractors::AuthUser,
    jwt::JwtKeys,
    services,
};
use crate::{
    dto::MessageResponse,
    error::AppError,
    extract::AppJson,
    state::AppState,
    users::{
        dto::{CreateUserRequest, PublicUser, UserDetails, UserResponse},
        services::{create_user, get_user_details},
    },
};

type SetCookie = [(header::HeaderName, String); 1];

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions/register", post(register))
        .route("/sessions/login", post(login))
        .route("/sessions/current", get(current))
        .route("/sessions/logout", post(logout))
        .route("/sessions/forgot-password", post(forgot_password))
        .route("/sessions/reset-password", post(reset_password))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let user = create_user(&state, payload, Role::User, false).await?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully",
            user: PublicUser::from(user),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<(SetCookie, Json<AuthResponse>), AppError> {
    let user = services::authenticate(&state, &payload.email, &payload.password).await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, &user.email, user.role)?;
    let cookie = build_session_cookie(&state.config.cookie, &token, keys.ttl);

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            message: "Login successful",
            user: PublicUser::from(user),
        }),
    ))
}

#[instrument(skip(state, auth), fields(user_id = %auth.id()))]
pub async fn current(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse<UserDetails>>, AppError> {
    let user = get_user_details(&state, auth.id()).await?;
    Ok(Json(UserResponse { message: None, user }))
}

#[instrument(skip(state, auth), fields(user_id = %auth.id()))]
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> (SetCookie, Json<MessageResponse>) {
    info!(user_id = %auth.id(), "user logged out");
    (
        [(header::SET_COOKIE, build_clear_cookie(&state.config.cookie))],
        Json(MessageResponse {
            message: "Logout successful",
        }),
    )
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>, AppError> {
    let reset_token = services::request_password_reset(&state, &payload.email).await?;
    Ok(Json(ForgotPasswordResponse {
        message: "If the email exists, a reset link has been sent",
        reset_token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    services::reset_password(&state, &payload.token, &payload.password).await?;
    Ok(Json(MessageResponse {
        message: "Password reset successful",
    }))
}
