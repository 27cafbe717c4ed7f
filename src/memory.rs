//! Process-local store used when no `DATABASE_URL` is configured, and by tests.
//!
//! Mirrors the uniqueness rules of the SQL schema (email, one adoption per pet)
//! and the conditional pet claim. Locks are never held across an `.await`.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    adoptions::repo::{Adoption, AdoptionStore},
    pets::{
        repo::PetStore,
        repo_types::{NewPet, Pet},
    },
    users::{
        repo::{DuplicateEmail, UserStore},
        repo_types::{NewUser, User},
    },
};

#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<Vec<User>>,
    pets: Mutex<Vec<Pet>>,
    adoptions: Mutex<Vec<Adoption>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(m: &Mutex<T>) -> anyhow::Result<MutexGuard<'_, T>> {
    m.lock().map_err(|_| anyhow::anyhow!("memory store lock poisoned"))
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn list(&self) -> anyhow::Result<Vec<User>> {
        Ok(lock(&self.users)?.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(lock(&self.users)?.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(lock(&self.users)?.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_reset_token(&self, digest: &str, now: OffsetDateTime) -> anyhow::Result<Option<User>> {
        Ok(lock(&self.users)?
            .iter()
            .find(|u| {
                u.reset_token_digest.as_deref() == Some(digest)
                    && u.reset_expires_at.is_some_and(|exp| exp > now)
            })
            .cloned())
    }

    async fn create(&self, user: NewUser) -> anyhow::Result<User> {
        let mut users = lock(&self.users)?;
        if users.iter().any(|u| u.email == user.email) {
            return Err(DuplicateEmail.into());
        }
        let user = user.into_user(OffsetDateTime::now_utc());
        users.push(user.clone());
        Ok(user)
    }

    async fn update_profile(&self, user: &User) -> anyhow::Result<Option<User>> {
        let mut users = lock(&self.users)?;
        if users.iter().any(|u| u.id != user.id && u.email == user.email) {
            return Err(DuplicateEmail.into());
        }
        let Some(stored) = users.iter_mut().find(|u| u.id == user.id) else {
            return Ok(None);
        };
        stored.first_name = user.first_name.clone();
        stored.last_name = user.last_name.clone();
        stored.email = user.email.clone();
        stored.password_hash = user.password_hash.clone();
        stored.role = user.role;
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(Some(stored.clone()))
    }

    async fn set_reset_token(&self, id: Uuid, digest: &str, expires_at: OffsetDateTime) -> anyhow::Result<()> {
        if let Some(u) = lock(&self.users)?.iter_mut().find(|u| u.id == id) {
            u.reset_token_digest = Some(digest.to_string());
            u.reset_expires_at = Some(expires_at);
            u.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn reset_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        if let Some(u) = lock(&self.users)?.iter_mut().find(|u| u.id == id) {
            u.password_hash = password_hash.to_string();
            u.reset_token_digest = None;
            u.reset_expires_at = None;
            u.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn add_pet(&self, id: Uuid, pet_id: Uuid) -> anyhow::Result<bool> {
        let mut users = lock(&self.users)?;
        let Some(u) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(false);
        };
        u.pets.push(pet_id);
        u.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn remove_pet(&self, id: Uuid, pet_id: Uuid) -> anyhow::Result<bool> {
        let mut users = lock(&self.users)?;
        let Some(u) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(false);
        };
        u.pets.retain(|p| *p != pet_id);
        u.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut users = lock(&self.users)?;
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() != before)
    }
}

#[async_trait]
impl PetStore for MemoryStore {
    async fn list(&self) -> anyhow::Result<Vec<Pet>> {
        Ok(lock(&self.pets)?.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Pet>> {
        Ok(lock(&self.pets)?.iter().find(|p| p.id == id).cloned())
    }

    async fn create(&self, pet: NewPet) -> anyhow::Result<Pet> {
        let pet = pet.into_pet(OffsetDateTime::now_utc());
        lock(&self.pets)?.push(pet.clone());
        Ok(pet)
    }

    async fn update_details(&self, pet: &Pet) -> anyhow::Result<Option<Pet>> {
        let mut pets = lock(&self.pets)?;
        let Some(stored) = pets.iter_mut().find(|p| p.id == pet.id) else {
            return Ok(None);
        };
        stored.name = pet.name.clone();
        stored.specie = pet.specie.clone();
        stored.breed = pet.breed.clone();
        stored.birth_date = pet.birth_date;
        stored.image = pet.image.clone();
        stored.location = pet.location.clone();
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(Some(stored.clone()))
    }

    async fn claim(&self, id: Uuid, owner: Uuid) -> anyhow::Result<Option<Pet>> {
        let mut pets = lock(&self.pets)?;
        let Some(p) = pets.iter_mut().find(|p| p.id == id && !p.adopted) else {
            return Ok(None);
        };
        p.adopted = true;
        p.owner = Some(owner);
        p.updated_at = OffsetDateTime::now_utc();
        Ok(Some(p.clone()))
    }

    async fn release(&self, id: Uuid) -> anyhow::Result<Option<Pet>> {
        let mut pets = lock(&self.pets)?;
        let Some(p) = pets.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        p.adopted = false;
        p.owner = None;
        p.updated_at = OffsetDateTime::now_utc();
        Ok(Some(p.clone()))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut pets = lock(&self.pets)?;
        let before = pets.len();
        pets.retain(|p| p.id != id);
        Ok(pets.len() != before)
    }
}

#[async_trait]
impl AdoptionStore for MemoryStore {
    async fn list(&self) -> anyhow::Result<Vec<Adoption>> {
        Ok(lock(&self.adoptions)?.clone())
    }

    async fn list_by_owner(&self, owner: Uuid) -> anyhow::Result<Vec<Adoption>> {
        Ok(lock(&self.adoptions)?
            .iter()
            .filter(|a| a.owner == owner)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Adoption>> {
        Ok(lock(&self.adoptions)?.iter().find(|a| a.id == id).cloned())
    }

    async fn create(&self, owner: Uuid, pet: Uuid) -> anyhow::Result<Adoption> {
        let mut adoptions = lock(&self.adoptions)?;
        anyhow::ensure!(
            adoptions.iter().all(|a| a.pet != pet),
            "pet {pet} already has an adoption record"
        );
        let adoption = Adoption {
            id: Uuid::new_v4(),
            owner,
            pet,
            created_at: OffsetDateTime::now_utc(),
        };
        adoptions.push(adoption.clone());
        Ok(adoption)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut adoptions = lock(&self.adoptions)?;
        let before = adoptions.len();
        adoptions.retain(|a| a.id != id);
        Ok(adoptions.len() != before)
    }
}
