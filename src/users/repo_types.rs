use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::claims::Role;

/// User record as the rest of the app sees it.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,            // Argon2 PHC string, never serialized
    pub role: Role,
    pub pets: Vec<Uuid>,                  // adopted pets, in adoption order
    pub reset_token_digest: Option<String>,
    pub reset_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

impl NewUser {
    pub fn into_user(self, now: OffsetDateTime) -> User {
        User {
            id: Uuid::new_v4(),
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            password_hash: self.password_hash,
            role: self.role,
            pets: Vec::new(),
            reset_token_digest: None,
            reset_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Raw `users` row; `role` is stored as text.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub pets: Vec<Uuid>,
    pub reset_token_digest: Option<String>,
    pub reset_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            role: r.role.parse()?,
            id: r.id,
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            password_hash: r.password_hash,
            pets: r.pets,
            reset_token_digest: r.reset_token_digest,
            reset_expires_at: r.reset_expires_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}
