use anyhow::Context;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{parse_birth_date, CreatePetRequest, PetView, UpdatePetRequest},
    repo_types::{NewPet, Pet},
};
use crate::{error::AppError, state::AppState, storage::ext_from_mime, users::dto::OwnerSummary};

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn view(state: &AppState, pet: Pet) -> Result<PetView, AppError> {
    let owner = match pet.owner {
        Some(owner_id) => state
            .users
            .find_by_id(owner_id)
            .await?
            .as_ref()
            .map(OwnerSummary::from),
        None => None,
    };
    Ok(PetView::new(pet, owner))
}

async fn find_pet(state: &AppState, id: Uuid) -> Result<Pet, AppError> {
    state
        .pets
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("Pet not found"))
}

pub async fn list_pets(state: &AppState) -> Result<Vec<PetView>, AppError> {
    let pets = state.pets.list().await?;
    let mut out = Vec::with_capacity(pets.len());
    for pet in pets {
        out.push(view(state, pet).await?);
    }
    Ok(out)
}

pub async fn get_pet(state: &AppState, id: Uuid) -> Result<PetView, AppError> {
    let pet = find_pet(state, id).await?;
    view(state, pet).await
}

pub async fn create_pet(state: &AppState, req: CreatePetRequest) -> Result<PetView, AppError> {
    let required = || AppError::bad_request("Name, specie, and birthDate are required");
    let name = non_blank(req.name).ok_or_else(required)?;
    let specie = non_blank(req.specie).ok_or_else(required)?;
    let raw_date = non_blank(req.birth_date).ok_or_else(required)?;
    let birth_date = parse_birth_date(&raw_date).ok_or_else(|| {
        warn!(birth_date = %raw_date, "invalid birth date");
        AppError::bad_request("Invalid birthDate")
    })?;

    let pet = state
        .pets
        .create(NewPet {
            name,
            specie,
            breed: non_blank(req.breed),
            birth_date,
            image: non_blank(req.image),
            location: non_blank(req.location),
        })
        .await?;
    info!(pet_id = %pet.id, "pet created");
    Ok(PetView::new(pet, None))
}

/// Shallow merge of descriptive fields; adoption state is not writable here.
pub async fn update_pet(state: &AppState, id: Uuid, req: UpdatePetRequest) -> Result<PetView, AppError> {
    let mut pet = find_pet(state, id).await?;

    if let Some(name) = req.name {
        pet.name = non_blank(Some(name)).ok_or_else(|| AppError::bad_request("Name cannot be empty"))?;
    }
    if let Some(specie) = req.specie {
        pet.specie =
            non_blank(Some(specie)).ok_or_else(|| AppError::bad_request("Specie cannot be empty"))?;
    }
    if let Some(raw) = req.birth_date {
        pet.birth_date = parse_birth_date(&raw).ok_or_else(|| AppError::bad_request("Invalid birthDate"))?;
    }
    if let Some(breed) = req.breed {
        pet.breed = non_blank(breed);
    }
    if let Some(image) = req.image {
        pet.image = non_blank(image);
    }
    if let Some(location) = req.location {
        pet.location = non_blank(location);
    }

    let updated = state
        .pets
        .update_details(&pet)
        .await?
        .ok_or_else(|| AppError::not_found("Pet not found"))?;
    info!(pet_id = %updated.id, "pet updated");
    view(state, updated).await
}

pub async fn delete_pet(state: &AppState, id: Uuid) -> Result<(), AppError> {
    if !state.pets.delete(id).await? {
        return Err(AppError::not_found("Pet not found"));
    }
    info!(pet_id = %id, "pet deleted");
    Ok(())
}

/// Stores the image and points the pet at its public path.
pub async fn upload_pet_image(
    state: &AppState,
    id: Uuid,
    body: Bytes,
    content_type: &str,
) -> Result<PetView, AppError> {
    let mut pet = find_pet(state, id).await?;
    let ext = ext_from_mime(content_type).ok_or_else(|| {
        warn!(content_type, "unsupported image type");
        AppError::bad_request("Unsupported image type")
    })?;

    let key = format!("pets/{}-{}.{}", pet.id, Uuid::new_v4(), ext);
    let path = state
        .storage
        .put_object(&key, body, content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;

    pet.image = Some(path);
    let updated = state
        .pets
        .update_details(&pet)
        .await?
        .ok_or_else(|| AppError::not_found("Pet not found"))?;
    info!(pet_id = %updated.id, key = %key, "pet image uploaded");
    view(state, updated).await
}
