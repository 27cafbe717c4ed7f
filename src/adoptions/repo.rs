use anyhow::Context;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Join record of a completed adoption.
#[derive(Debug, Clone, FromRow)]
pub struct Adoption {
    pub id: Uuid,
    #[sqlx(rename = "owner_id")]
    pub owner: Uuid,
    #[sqlx(rename = "pet_id")]
    pub pet: Uuid,
    pub created_at: OffsetDateTime,
}

#[async_trait]
pub trait AdoptionStore: Send + Sync {
    async fn list(&self) -> anyhow::Result<Vec<Adoption>>;
    async fn list_by_owner(&self, owner: Uuid) -> anyhow::Result<Vec<Adoption>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Adoption>>;
    async fn create(&self, owner: Uuid, pet: Uuid) -> anyhow::Result<Adoption>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgAdoptionStore {
    db: PgPool,
}

impl PgAdoptionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AdoptionStore for PgAdoptionStore {
    async fn list(&self) -> anyhow::Result<Vec<Adoption>> {
        let rows = sqlx::query_as::<_, Adoption>(
            r#"SELECT id, owner_id, pet_id, created_at FROM adoptions ORDER BY created_at ASC"#,
        )
        .fetch_all(&self.db)
        .await
        .context("list adoptions")?;
        Ok(rows)
    }

    async fn list_by_owner(&self, owner: Uuid) -> anyhow::Result<Vec<Adoption>> {
        let rows = sqlx::query_as::<_, Adoption>(
            r#"
            SELECT id, owner_id, pet_id, created_at
            FROM adoptions
            WHERE owner_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.db)
        .await
        .context("list adoptions by owner")?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Adoption>> {
        let row = sqlx::query_as::<_, Adoption>(
            r#"SELECT id, owner_id, pet_id, created_at FROM adoptions WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find adoption by id")?;
        Ok(row)
    }

    async fn create(&self, owner: Uuid, pet: Uuid) -> anyhow::Result<Adoption> {
        let row = sqlx::query_as::<_, Adoption>(
            r#"
            INSERT INTO adoptions (id, owner_id, pet_id)
            VALUES ($1, $2, $3)
            RETURNING id, owner_id, pet_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(pet)
        .fetch_one(&self.db)
        .await
        .context("insert adoption")?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(r#"DELETE FROM adoptions WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete adoption")?;
        Ok(res.rows_affected() > 0)
    }
}
