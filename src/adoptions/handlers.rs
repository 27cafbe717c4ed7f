use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{AdoptionResponse, AdoptionsResponse},
    services,
};
use crate::{
    auth::extractors::{AdminUser, AuthUser},
    dto::MessageResponse,
    error::AppError,
    extract::AppPath,
    state::AppState,
};

pub fn adoption_routes() -> Router<AppState> {
    Router::new()
        .route("/adoptions", get(list_adoptions))
        .route("/adoptions/user", get(list_my_adoptions))
        .route("/adoptions/:id", get(get_adoption).delete(delete_adoption))
        .route("/adoptions/:id/:pet_id", post(create_adoption))
}

#[instrument(skip(state, _admin))]
pub async fn list_adoptions(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<AdoptionsResponse>, AppError> {
    let adoptions = services::list_adoptions(&state).await?;
    Ok(Json(AdoptionsResponse { adoptions }))
}

#[instrument(skip(state, auth), fields(user_id = %auth.id()))]
pub async fn list_my_adoptions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<AdoptionsResponse>, AppError> {
    let adoptions = services::list_user_adoptions(&state, auth.id()).await?;
    Ok(Json(AdoptionsResponse { adoptions }))
}

#[instrument(skip(state, auth))]
pub async fn get_adoption(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<AdoptionResponse>, AppError> {
    let adoption = services::get_adoption(&state, &auth, id).await?;
    Ok(Json(AdoptionResponse {
        message: None,
        adoption,
    }))
}

/// POST /adoptions/:uid/:pid. Users may only adopt for themselves.
#[instrument(skip(state, auth), fields(by = %auth.id()))]
pub async fn create_adoption(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath((user_id, pet_id)): AppPath<(Uuid, Uuid)>,
) -> Result<(StatusCode, Json<AdoptionResponse>), AppError> {
    auth.ensure_self_or_admin(user_id)?;
    let adoption = services::create_adoption(&state, user_id, pet_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(AdoptionResponse {
            message: Some("Adoption created successfully"),
            adoption,
        }),
    ))
}

#[instrument(skip(state, _admin))]
pub async fn delete_adoption(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    services::delete_adoption(&state, id).await?;
    Ok(Json(MessageResponse {
        message: "Adoption deleted successfully",
    }))
}
