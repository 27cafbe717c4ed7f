use tracing::{error, info, warn};
use uuid::Uuid;

use super::{dto::AdoptionView, repo::Adoption};
use crate::{
    auth::extractors::AuthUser, error::AppError, pets::dto::PetSummary, state::AppState,
    users::dto::OwnerSummary,
};

async fn view(state: &AppState, adoption: Adoption) -> Result<AdoptionView, AppError> {
    let owner = state
        .users
        .find_by_id(adoption.owner)
        .await?
        .as_ref()
        .map(OwnerSummary::from);
    let pet = state
        .pets
        .find_by_id(adoption.pet)
        .await?
        .as_ref()
        .map(PetSummary::from);
    Ok(AdoptionView {
        id: adoption.id,
        owner,
        pet,
        created_at: adoption.created_at,
    })
}

async fn views(state: &AppState, adoptions: Vec<Adoption>) -> Result<Vec<AdoptionView>, AppError> {
    let mut out = Vec::with_capacity(adoptions.len());
    for a in adoptions {
        out.push(view(state, a).await?);
    }
    Ok(out)
}

pub async fn list_adoptions(state: &AppState) -> Result<Vec<AdoptionView>, AppError> {
    let adoptions = state.adoptions.list().await?;
    views(state, adoptions).await
}

pub async fn list_user_adoptions(state: &AppState, owner: Uuid) -> Result<Vec<AdoptionView>, AppError> {
    let adoptions = state.adoptions.list_by_owner(owner).await?;
    views(state, adoptions).await
}

/// Readable by the adopting user and by admins.
pub async fn get_adoption(state: &AppState, actor: &AuthUser, id: Uuid) -> Result<AdoptionView, AppError> {
    let adoption = state
        .adoptions
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("Adoption not found"))?;
    actor.ensure_self_or_admin(adoption.owner)?;
    view(state, adoption).await
}

async fn release_claim(state: &AppState, pet_id: Uuid) {
    if let Err(e) = state.pets.release(pet_id).await {
        error!(error = ?e, pet_id = %pet_id, "compensation failed: pet still claimed");
    }
}

/// Adopts `pet_id` for `user_id`.
///
/// The pet is claimed first with a conditional write, so of two concurrent
/// requests for the same pet exactly one proceeds. The pet id is then added
/// to the user and the adoption record is written last. When a later step
/// fails the earlier ones are undone before the error is returned.
pub async fn create_adoption(state: &AppState, user_id: Uuid, pet_id: Uuid) -> Result<AdoptionView, AppError> {
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let pet = state
        .pets
        .find_by_id(pet_id)
        .await?
        .ok_or_else(|| AppError::not_found("Pet not found"))?;
    if pet.adopted {
        warn!(pet_id = %pet_id, "pet already adopted");
        return Err(AppError::bad_request("Pet is already adopted"));
    }

    let Some(pet) = state.pets.claim(pet_id, user_id).await? else {
        warn!(pet_id = %pet_id, user_id = %user_id, "lost adoption race");
        return Err(AppError::bad_request("Pet is already adopted"));
    };

    match state.users.add_pet(user_id, pet_id).await {
        Ok(true) => {}
        Ok(false) => {
            release_claim(state, pet_id).await;
            return Err(AppError::not_found("User not found"));
        }
        Err(e) => {
            release_claim(state, pet_id).await;
            return Err(e.into());
        }
    }

    let adoption = match state.adoptions.create(user_id, pet_id).await {
        Ok(a) => a,
        Err(e) => {
            if let Err(undo) = state.users.remove_pet(user_id, pet_id).await {
                error!(error = ?undo, user_id = %user_id, pet_id = %pet_id, "compensation failed: pet left on user");
            }
            release_claim(state, pet_id).await;
            return Err(e.into());
        }
    };

    info!(adoption_id = %adoption.id, user_id = %user_id, pet_id = %pet_id, "adoption created");
    Ok(AdoptionView {
        id: adoption.id,
        owner: Some(OwnerSummary::from(&user)),
        pet: Some(PetSummary::from(&pet)),
        created_at: adoption.created_at,
    })
}

/// Reverses an adoption. A pet or user deleted in the meantime is skipped.
pub async fn delete_adoption(state: &AppState, id: Uuid) -> Result<(), AppError> {
    let adoption = state
        .adoptions
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("Adoption not found"))?;

    if state.pets.release(adoption.pet).await?.is_none() {
        warn!(pet_id = %adoption.pet, "adopted pet no longer exists");
    }
    if !state.users.remove_pet(adoption.owner, adoption.pet).await? {
        warn!(user_id = %adoption.owner, "adopting user no longer exists");
    }
    state.adoptions.delete(id).await?;

    info!(adoption_id = %id, pet_id = %adoption.pet, user_id = %adoption.owner, "adoption deleted");
    Ok(())
}
