use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};

use super::password::{digest_reset_token, generate_reset_token, hash_password, verify_password};
use crate::{error::AppError, state::AppState, users::repo_types::User};

pub const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Unknown email and wrong password produce the same error.
pub async fn authenticate(state: &AppState, email: &str, password: &str) -> Result<User, AppError> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AppError::bad_request("Email and password are required"));
    }

    let invalid = || AppError::Unauthorized("Invalid credentials".into());
    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(invalid());
    };
    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid());
    }
    Ok(user)
}

/// Returns the raw reset token when the account exists.
pub async fn request_password_reset(state: &AppState, email: &str) -> Result<Option<String>, AppError> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AppError::bad_request("Email is required"));
    }
    let Some(user) = state.users.find_by_email(&email).await? else {
        info!("password reset requested for unknown email");
        return Ok(None);
    };

    let token = generate_reset_token();
    let expires_at =
        OffsetDateTime::now_utc() + Duration::minutes(state.config.reset_token_ttl_minutes);
    state
        .users
        .set_reset_token(user.id, &digest_reset_token(&token), expires_at)
        .await?;
    info!(user_id = %user.id, "password reset token issued");
    Ok(Some(token))
}

pub async fn reset_password(state: &AppState, token: &str, password: &str) -> Result<(), AppError> {
    if token.is_empty() || password.is_empty() {
        return Err(AppError::bad_request("Token and password are required"));
    }
    validate_password(password)?;

    let user = state
        .users
        .find_by_reset_token(&digest_reset_token(token), OffsetDateTime::now_utc())
        .await?
        .ok_or_else(|| {
            warn!("invalid or expired reset token");
            AppError::bad_request("Invalid or expired reset token")
        })?;

    let hash = hash_password(password)?;
    state.users.reset_password(user.id, &hash).await?;
    info!(user_id = %user.id, "password reset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::claims::Role, users::repo_types::NewUser};
    use axum::http::StatusCode;

    async fn seed_user(state: &AppState, email: &str, password: &str) -> User {
        state
            .users
            .create(NewUser {
                first_name: "A".into(),
                last_name: "B".into(),
                email: email.into(),
                password_hash: hash_password(password).unwrap(),
                role: Role::User,
            })
            .await
            .unwrap()
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@b.com"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.com"));
        assert_eq!(normalize_email("  Foo@Bar.COM "), "foo@bar.com");
    }

    #[tokio::test]
    async fn authenticate_does_not_reveal_which_part_failed() {
        let state = AppState::fake();
        seed_user(&state, "a@b.com", "secret1").await;

        let ok = authenticate(&state, "A@B.com", "secret1").await.unwrap();
        assert_eq!(ok.email, "a@b.com");

        let wrong_pw = authenticate(&state, "a@b.com", "nope-nope").await.unwrap_err();
        let unknown = authenticate(&state, "x@b.com", "secret1").await.unwrap_err();
        assert_eq!(wrong_pw.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_pw.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn reset_flow_consumes_token_once() {
        let state = AppState::fake();
        let user = seed_user(&state, "r@b.com", "secret1").await;

        assert!(request_password_reset(&state, "nobody@b.com").await.unwrap().is_none());
        let token = request_password_reset(&state, "r@b.com").await.unwrap().unwrap();

        let stored = state.users.find_by_id(user.id).await.unwrap().unwrap();
        assert_ne!(stored.reset_token_digest.as_deref(), Some(token.as_str()));

        reset_password(&state, &token, "brand-new").await.unwrap();
        authenticate(&state, "r@b.com", "brand-new").await.unwrap();

        let err = reset_password(&state, &token, "again-new").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid or expired reset token");
    }

    #[tokio::test]
    async fn expired_reset_token_is_rejected() {
        let state = AppState::fake();
        let user = seed_user(&state, "e@b.com", "secret1").await;
        let token = generate_reset_token();
        state
            .users
            .set_reset_token(
                user.id,
                &digest_reset_token(&token),
                OffsetDateTime::now_utc() - Duration::minutes(1),
            )
            .await
            .unwrap();
        let err = reset_password(&state, &token, "brand-new").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
