use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewPet, Pet};

#[async_trait]
pub trait PetStore: Send + Sync {
    async fn list(&self) -> anyhow::Result<Vec<Pet>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Pet>>;
    async fn create(&self, pet: NewPet) -> anyhow::Result<Pet>;
    /// Writes the descriptive fields only; `adopted`/`owner` are left untouched.
    async fn update_details(&self, pet: &Pet) -> anyhow::Result<Option<Pet>>;
    /// Marks the pet adopted by `owner` iff it is currently available.
    /// `None` means the pet is missing or was already adopted.
    async fn claim(&self, id: Uuid, owner: Uuid) -> anyhow::Result<Option<Pet>>;
    async fn release(&self, id: Uuid) -> anyhow::Result<Option<Pet>>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgPetStore {
    db: PgPool,
}

impl PgPetStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PetStore for PgPetStore {
    async fn list(&self) -> anyhow::Result<Vec<Pet>> {
        let rows = sqlx::query_as::<_, Pet>(
            r#"
            SELECT id, name, specie, breed, birth_date, adopted, owner_id, image, location,
                   created_at, updated_at
            FROM pets
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list pets")?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Pet>> {
        let row = sqlx::query_as::<_, Pet>(
            r#"
            SELECT id, name, specie, breed, birth_date, adopted, owner_id, image, location,
                   created_at, updated_at
            FROM pets
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find pet by id")?;
        Ok(row)
    }

    async fn create(&self, pet: NewPet) -> anyhow::Result<Pet> {
        let row = sqlx::query_as::<_, Pet>(
            r#"
            INSERT INTO pets (id, name, specie, breed, birth_date, image, location)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, specie, breed, birth_date, adopted, owner_id, image, location,
                      created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&pet.name)
        .bind(&pet.specie)
        .bind(&pet.breed)
        .bind(pet.birth_date)
        .bind(&pet.image)
        .bind(&pet.location)
        .fetch_one(&self.db)
        .await
        .context("insert pet")?;
        Ok(row)
    }

    async fn update_details(&self, pet: &Pet) -> anyhow::Result<Option<Pet>> {
        let row = sqlx::query_as::<_, Pet>(
            r#"
            UPDATE pets
               SET name = $2, specie = $3, breed = $4, birth_date = $5, image = $6,
                   location = $7, updated_at = now()
             WHERE id = $1
            RETURNING id, name, specie, breed, birth_date, adopted, owner_id, image, location,
                      created_at, updated_at
            "#,
        )
        .bind(pet.id)
        .bind(&pet.name)
        .bind(&pet.specie)
        .bind(&pet.breed)
        .bind(pet.birth_date)
        .bind(&pet.image)
        .bind(&pet.location)
        .fetch_optional(&self.db)
        .await
        .context("update pet")?;
        Ok(row)
    }

    async fn claim(&self, id: Uuid, owner: Uuid) -> anyhow::Result<Option<Pet>> {
        let row = sqlx::query_as::<_, Pet>(
            r#"
            UPDATE pets
               SET adopted = TRUE, owner_id = $2, updated_at = now()
             WHERE id = $1 AND adopted = FALSE
            RETURNING id, name, specie, breed, birth_date, adopted, owner_id, image, location,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await
        .context("claim pet")?;
        Ok(row)
    }

    async fn release(&self, id: Uuid) -> anyhow::Result<Option<Pet>> {
        let row = sqlx::query_as::<_, Pet>(
            r#"
            UPDATE pets
               SET adopted = FALSE, owner_id = NULL, updated_at = now()
             WHERE id = $1
            RETURNING id, name, specie, breed, birth_date, adopted, owner_id, image, location,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("release pet")?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(r#"DELETE FROM pets WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete pet")?;
        Ok(res.rows_affected() > 0)
    }
}
