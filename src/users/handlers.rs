use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{CreateUserRequest, PublicUser, UpdateUserRequest, UserDetails, UserResponse, UsersResponse},
    services,
};
use crate::{
    auth::{
        claims::Role,
        extractors::{AdminUser, AuthUser},
    },
    dto::MessageResponse,
    error::AppError,
    extract::{AppJson, AppPath},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(get_user).put(update_user).delete(delete_user))
}

#[instrument(skip(state, _admin))]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<UsersResponse>, AppError> {
    let users = state.users.list().await?;
    Ok(Json(UsersResponse {
        users: users.into_iter().map(PublicUser::from).collect(),
    }))
}

#[instrument(skip(state, _auth))]
pub async fn get_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<UserResponse<UserDetails>>, AppError> {
    let user = services::get_user_details(&state, id).await?;
    Ok(Json(UserResponse { message: None, user }))
}

#[instrument(skip(state, _admin, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse<PublicUser>>), AppError> {
    let user = services::create_user(&state, payload, Role::User, true).await?;
    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            message: Some("User created successfully"),
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, auth, payload), fields(by = %auth.id()))]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> Result<Json<UserResponse<PublicUser>>, AppError> {
    let user = services::update_user(&state, &auth, id, payload).await?;
    Ok(Json(UserResponse {
        message: Some("User updated successfully"),
        user: user.into(),
    }))
}

#[instrument(skip(state, _admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    services::delete_user(&state, id).await?;
    Ok(Json(MessageResponse {
        message: "User deleted successfully",
    }))
}
