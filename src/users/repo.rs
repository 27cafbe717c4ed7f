use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{NewUser, User, UserRow};

/// Returned by `create`/`update_profile` when the email belongs to another user.
#[derive(Debug, thiserror::Error)]
#[error("email already registered")]
pub struct DuplicateEmail;

fn write_error(err: sqlx::Error, what: &'static str) -> anyhow::Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => DuplicateEmail.into(),
        _ => anyhow::Error::new(err).context(what),
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn list(&self) -> anyhow::Result<Vec<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    /// Only matches while the reset window is still open at `now`.
    async fn find_by_reset_token(&self, digest: &str, now: OffsetDateTime) -> anyhow::Result<Option<User>>;
    async fn create(&self, user: NewUser) -> anyhow::Result<User>;
    /// Writes the editable profile fields (names, email, role, password hash).
    async fn update_profile(&self, user: &User) -> anyhow::Result<Option<User>>;
    async fn set_reset_token(&self, id: Uuid, digest: &str, expires_at: OffsetDateTime) -> anyhow::Result<()>;
    /// Sets the new hash and clears the reset token in one write.
    async fn reset_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()>;
    async fn add_pet(&self, id: Uuid, pet_id: Uuid) -> anyhow::Result<bool>;
    async fn remove_pet(&self, id: Uuid, pet_id: Uuid) -> anyhow::Result<bool>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_users(rows: Vec<UserRow>) -> anyhow::Result<Vec<User>> {
    rows.into_iter().map(User::try_from).collect()
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, first_name, last_name, email, password_hash, role, pets,
                   reset_token_digest, reset_expires_at, created_at, updated_at
            FROM users
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        into_users(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, first_name, last_name, email, password_hash, role, pets,
                   reset_token_digest, reset_expires_at, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, first_name, last_name, email, password_hash, role, pets,
                   reset_token_digest, reset_expires_at, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_reset_token(&self, digest: &str, now: OffsetDateTime) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, first_name, last_name, email, password_hash, role, pets,
                   reset_token_digest, reset_expires_at, created_at, updated_at
            FROM users
            WHERE reset_token_digest = $1 AND reset_expires_at > $2
            "#,
        )
        .bind(digest)
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .context("find user by reset token")?;
        row.map(User::try_from).transpose()
    }

    async fn create(&self, user: NewUser) -> anyhow::Result<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, first_name, last_name, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, first_name, last_name, email, password_hash, role, pets,
                      reset_token_digest, reset_expires_at, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(|e| write_error(e, "insert user"))?;
        row.try_into()
    }

    async fn update_profile(&self, user: &User) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
               SET first_name = $2, last_name = $3, email = $4, password_hash = $5,
                   role = $6, updated_at = now()
             WHERE id = $1
            RETURNING id, first_name, last_name, email, password_hash, role, pets,
                      reset_token_digest, reset_expires_at, created_at, updated_at
            "#,
        )
        .bind(user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_optional(&self.db)
        .await
        .map_err(|e| write_error(e, "update user"))?;
        row.map(User::try_from).transpose()
    }

    async fn set_reset_token(&self, id: Uuid, digest: &str, expires_at: OffsetDateTime) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET reset_token_digest = $2, reset_expires_at = $3, updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(digest)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .context("set reset token")?;
        Ok(())
    }

    async fn reset_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $2, reset_token_digest = NULL, reset_expires_at = NULL,
                   updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.db)
        .await
        .context("reset password")?;
        Ok(())
    }

    async fn add_pet(&self, id: Uuid, pet_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"UPDATE users SET pets = array_append(pets, $2), updated_at = now() WHERE id = $1"#,
        )
        .bind(id)
        .bind(pet_id)
        .execute(&self.db)
        .await
        .context("append user pet")?;
        Ok(res.rows_affected() > 0)
    }

    async fn remove_pet(&self, id: Uuid, pet_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"UPDATE users SET pets = array_remove(pets, $2), updated_at = now() WHERE id = $1"#,
        )
        .bind(id)
        .bind(pet_id)
        .execute(&self.db)
        .await
        .context("remove user pet")?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }
}
