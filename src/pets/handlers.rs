use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{
    dto::{CreatePetRequest, PetResponse, PetsResponse, UpdatePetRequest},
    services,
};
use crate::{
    auth::extractors::AdminUser,
    dto::MessageResponse,
    error::AppError,
    extract::{AppJson, AppPath},
    state::AppState,
};

const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/pets", get(list_pets))
        .route("/pets/:id", get(get_pet))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/pets", post(create_pet))
        .route("/pets/:id", put(update_pet).delete(delete_pet))
        .route(
            "/pets/:id/image",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
}

#[instrument(skip(state))]
pub async fn list_pets(State(state): State<AppState>) -> Result<Json<PetsResponse>, AppError> {
    let pets = services::list_pets(&state).await?;
    Ok(Json(PetsResponse { pets }))
}

#[instrument(skip(state))]
pub async fn get_pet(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<PetResponse>, AppError> {
    let pet = services::get_pet(&state, id).await?;
    Ok(Json(PetResponse { message: None, pet }))
}

#[instrument(skip(state, _admin, payload))]
pub async fn create_pet(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppJson(payload): AppJson<CreatePetRequest>,
) -> Result<(StatusCode, Json<PetResponse>), AppError> {
    let pet = services::create_pet(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(PetResponse {
            message: Some("Pet created successfully"),
            pet,
        }),
    ))
}

#[instrument(skip(state, _admin, payload))]
pub async fn update_pet(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdatePetRequest>,
) -> Result<Json<PetResponse>, AppError> {
    let pet = services::update_pet(&state, id, payload).await?;
    Ok(Json(PetResponse {
        message: Some("Pet updated successfully"),
        pet,
    }))
}

#[instrument(skip(state, _admin))]
pub async fn delete_pet(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    services::delete_pet(&state, id).await?;
    Ok(Json(MessageResponse {
        message: "Pet deleted successfully",
    }))
}

/// POST /pets/:id/image (multipart), field `image`.
#[instrument(skip(state, _admin, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
    mut mp: Multipart,
) -> Result<Json<PetResponse>, AppError> {
    loop {
        let field = match mp.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "invalid multipart body");
                return Err(AppError::bad_request("Invalid multipart body"));
            }
        };
        if field.name() != Some("image") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let data = field.bytes().await.map_err(|e| {
            warn!(error = %e, "failed to read upload");
            AppError::bad_request("Invalid multipart body")
        })?;
        if data.is_empty() {
            break;
        }
        let pet = services::upload_pet_image(&state, id, data, &content_type).await?;
        return Ok(Json(PetResponse {
            message: Some("Image uploaded successfully"),
            pet,
        }));
    }
    Err(AppError::bad_request("No file uploaded"))
}
