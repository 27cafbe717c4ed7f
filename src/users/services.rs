use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{CreateUserRequest, UpdateUserRequest, UserDetails},
    repo::DuplicateEmail,
    repo_types::{NewUser, User},
};
use crate::{
    auth::{
        claims::Role,
        extractors::AuthUser,
        password::hash_password,
        services::{is_valid_email, normalize_email, validate_password},
    },
    config::AdminSeed,
    error::AppError,
    pets::dto::PetSummary,
    state::AppState,
};

/// The lookup before a write can race with another request; the store's
/// uniqueness check is what decides.
fn email_conflict(err: anyhow::Error) -> AppError {
    if err.is::<DuplicateEmail>() {
        warn!("email already registered");
        AppError::bad_request("Email already registered")
    } else {
        err.into()
    }
}

/// Validates and stores a new account. `default_role` applies when the
/// request does not name one; callers decide whether a requested role is honoured.
pub async fn create_user(
    state: &AppState,
    req: CreateUserRequest,
    default_role: Role,
    allow_role: bool,
) -> Result<User, AppError> {
    let first_name = req.first_name.trim().to_string();
    let last_name = req.last_name.trim().to_string();
    let email = normalize_email(&req.email);

    if first_name.is_empty() || last_name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(AppError::bad_request("All fields are required"));
    }
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::bad_request("Invalid email"));
    }
    validate_password(&req.password)?;

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::bad_request("Email already registered"));
    }

    let role = match req.role {
        Some(role) if allow_role => role,
        _ => default_role,
    };
    let password_hash = hash_password(&req.password)?;
    let user = state
        .users
        .create(NewUser {
            first_name,
            last_name,
            email,
            password_hash,
            role,
        })
        .await
        .map_err(email_conflict)?;

    info!(user_id = %user.id, role = %user.role, "user created");
    Ok(user)
}

pub async fn get_user(state: &AppState, id: Uuid) -> Result<User, AppError> {
    state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

/// Loads a user and resolves the pets list. Dangling pet ids are skipped.
pub async fn get_user_details(state: &AppState, id: Uuid) -> Result<UserDetails, AppError> {
    let user = get_user(state, id).await?;
    let mut pets = Vec::with_capacity(user.pets.len());
    for pet_id in &user.pets {
        if let Some(pet) = state.pets.find_by_id(*pet_id).await? {
            pets.push(PetSummary::from(&pet));
        }
    }
    Ok(UserDetails {
        id: user.id,
        first_name: user.first_name,
        last_name: user.last_name,
        email: user.email,
        role: user.role,
        pets,
        created_at: user.created_at,
        updated_at: user.updated_at,
    })
}

fn required_field(value: String, field: &str) -> Result<String, AppError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(AppError::bad_request(format!("{field} cannot be empty")));
    }
    Ok(value)
}

/// Shallow merge of the provided fields. Only admins may change roles.
pub async fn update_user(
    state: &AppState,
    actor: &AuthUser,
    id: Uuid,
    req: UpdateUserRequest,
) -> Result<User, AppError> {
    actor.ensure_self_or_admin(id)?;
    let mut user = get_user(state, id).await?;

    if let Some(role) = req.role {
        if role != user.role && !actor.is_admin() {
            warn!(user_id = %actor.id(), "role change denied");
            return Err(AppError::Forbidden("Only admins can change roles".into()));
        }
        user.role = role;
    }
    if let Some(first_name) = req.first_name {
        user.first_name = required_field(first_name, "first_name")?;
    }
    if let Some(last_name) = req.last_name {
        user.last_name = required_field(last_name, "last_name")?;
    }
    if let Some(email) = req.email {
        let email = normalize_email(&email);
        if !is_valid_email(&email) {
            return Err(AppError::bad_request("Invalid email"));
        }
        if email != user.email && state.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::bad_request("Email already registered"));
        }
        user.email = email;
    }
    if let Some(password) = req.password {
        validate_password(&password)?;
        user.password_hash = hash_password(&password)?;
    }

    let updated = state
        .users
        .update_profile(&user)
        .await
        .map_err(email_conflict)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    info!(user_id = %updated.id, by = %actor.id(), "user updated");
    Ok(updated)
}

pub async fn delete_user(state: &AppState, id: Uuid) -> Result<(), AppError> {
    if !state.users.delete(id).await? {
        return Err(AppError::not_found("User not found"));
    }
    info!(user_id = %id, "user deleted");
    Ok(())
}

/// Creates the configured admin account, or promotes it if it already exists.
pub async fn ensure_admin(state: &AppState, seed: &AdminSeed) -> anyhow::Result<()> {
    let email = normalize_email(&seed.email);
    match state.users.find_by_email(&email).await? {
        Some(user) if user.role == Role::Admin => {}
        Some(mut user) => {
            user.role = Role::Admin;
            state.users.update_profile(&user).await?;
            info!(user_id = %user.id, "existing user promoted to admin");
        }
        None => {
            let user = state
                .users
                .create(NewUser {
                    first_name: "Admin".into(),
                    last_name: "Admin".into(),
                    email,
                    password_hash: hash_password(&seed.password)?,
                    role: Role::Admin,
                })
                .await?;
            info!(user_id = %user.id, "admin account created");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::http::StatusCode;
    use time::OffsetDateTime;

    use super::*;
    use crate::{
        auth::{claims::Claims, password::verify_password},
        memory::MemoryStore,
        users::repo::UserStore,
    };

    fn request(email: &str) -> CreateUserRequest {
        CreateUserRequest {
            first_name: "A".into(),
            last_name: "B".into(),
            email: email.into(),
            password: "secret1".into(),
            role: Some(Role::Admin),
        }
    }

    fn actor(id: Uuid, role: Role) -> AuthUser {
        AuthUser(Claims {
            sub: id,
            email: String::new(),
            role,
            iat: 0,
            exp: 0,
            iss: String::new(),
            aud: String::new(),
        })
    }

    #[tokio::test]
    async fn create_hashes_password_and_normalizes_email() {
        let state = AppState::fake();
        let user = create_user(&state, request("  A@B.com "), Role::User, false)
            .await
            .unwrap();
        assert_eq!(user.email, "a@b.com");
        assert_ne!(user.password_hash, "secret1");
        assert!(verify_password("secret1", &user.password_hash).unwrap());
        // requested role ignored when not allowed
        assert_eq!(user.role, Role::User);
    }

    #[tokio::test]
    async fn create_rejects_missing_fields_duplicates_and_short_passwords() {
        let state = AppState::fake();
        let mut req = request("a@b.com");
        req.last_name = " ".into();
        let err = create_user(&state, req, Role::User, false).await.unwrap_err();
        assert_eq!(err.to_string(), "All fields are required");

        let mut req = request("a@b.com");
        req.password = "12345".into();
        let err = create_user(&state, req, Role::User, false).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        create_user(&state, request("a@b.com"), Role::User, false).await.unwrap();
        let err = create_user(&state, request("A@b.com"), Role::User, false)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Email already registered");
    }

    #[tokio::test]
    async fn admin_creation_honours_role() {
        let state = AppState::fake();
        let user = create_user(&state, request("admin@b.com"), Role::User, true)
            .await
            .unwrap();
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn update_is_shallow_and_role_is_admin_only() {
        let state = AppState::fake();
        let user = create_user(&state, request("u@b.com"), Role::User, false)
            .await
            .unwrap();
        let me = actor(user.id, Role::User);

        let updated = update_user(
            &state,
            &me,
            user.id,
            UpdateUserRequest {
                first_name: Some("Alice".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.first_name, "Alice");
        assert_eq!(updated.last_name, "B");
        assert_eq!(updated.password_hash, user.password_hash);

        let err = update_user(
            &state,
            &me,
            user.id,
            UpdateUserRequest {
                role: Some(Role::Admin),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err = update_user(&state, &me, Uuid::new_v4(), UpdateUserRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let admin = actor(Uuid::new_v4(), Role::Admin);
        let promoted = update_user(
            &state,
            &admin,
            user.id,
            UpdateUserRequest {
                role: Some(Role::Admin),
                password: Some("new-secret".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(promoted.role, Role::Admin);
        assert!(verify_password("new-secret", &promoted.password_hash).unwrap());
    }

    /// Reports every email as free, so only the write can detect a conflict.
    struct StaleEmailLookup(MemoryStore);

    #[async_trait]
    impl UserStore for StaleEmailLookup {
        async fn list(&self) -> anyhow::Result<Vec<User>> {
            UserStore::list(&self.0).await
        }
        async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
            UserStore::find_by_id(&self.0, id).await
        }
        async fn find_by_email(&self, _email: &str) -> anyhow::Result<Option<User>> {
            Ok(None)
        }
        async fn find_by_reset_token(&self, digest: &str, now: OffsetDateTime) -> anyhow::Result<Option<User>> {
            self.0.find_by_reset_token(digest, now).await
        }
        async fn create(&self, user: NewUser) -> anyhow::Result<User> {
            UserStore::create(&self.0, user).await
        }
        async fn update_profile(&self, user: &User) -> anyhow::Result<Option<User>> {
            self.0.update_profile(user).await
        }
        async fn set_reset_token(&self, id: Uuid, digest: &str, expires_at: OffsetDateTime) -> anyhow::Result<()> {
            self.0.set_reset_token(id, digest, expires_at).await
        }
        async fn reset_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
            self.0.reset_password(id, password_hash).await
        }
        async fn add_pet(&self, id: Uuid, pet_id: Uuid) -> anyhow::Result<bool> {
            self.0.add_pet(id, pet_id).await
        }
        async fn remove_pet(&self, id: Uuid, pet_id: Uuid) -> anyhow::Result<bool> {
            self.0.remove_pet(id, pet_id).await
        }
        async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
            UserStore::delete(&self.0, id).await
        }
    }

    #[tokio::test]
    async fn email_taken_between_check_and_write_is_bad_request() {
        let mut state = AppState::fake();
        state.users = Arc::new(StaleEmailLookup(MemoryStore::new()));

        create_user(&state, request("race@b.com"), Role::User, false)
            .await
            .unwrap();
        let err = create_user(&state, request("race@b.com"), Role::User, false)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Email already registered");

        let other = create_user(&state, request("other@b.com"), Role::User, false)
            .await
            .unwrap();
        let err = update_user(
            &state,
            &actor(other.id, Role::User),
            other.id,
            UpdateUserRequest {
                email: Some("race@b.com".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Email already registered");
    }

    #[tokio::test]
    async fn delete_missing_user_is_not_found() {
        let state = AppState::fake();
        let err = delete_user(&state, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ensure_admin_creates_then_is_idempotent() {
        let state = AppState::fake();
        let seed = AdminSeed {
            email: "root@pets.io".into(),
            password: "changeme".into(),
        };
        ensure_admin(&state, &seed).await.unwrap();
        ensure_admin(&state, &seed).await.unwrap();
        let users = state.users.list().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, Role::Admin);
    }
}
