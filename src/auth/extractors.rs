use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use tracing::warn;
use uuid::Uuid;

use super::{
    claims::{Claims, Role},
    cookies::extract_cookie_value,
    jwt::JwtKeys,
};
use crate::{error::AppError, state::AppState};

/// Authenticated caller, resolved from the session cookie or a bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.0.sub
    }

    pub fn is_admin(&self) -> bool {
        self.0.role == Role::Admin
    }

    /// Admins act on anyone; everyone else only on themselves.
    pub fn ensure_self_or_admin(&self, user_id: Uuid) -> Result<(), AppError> {
        if self.is_admin() || self.id() == user_id {
            Ok(())
        } else {
            Err(AppError::Forbidden("Access denied".into()))
        }
    }
}

/// Authenticated caller holding the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

pub fn authorize(role: Role, required: Role) -> Result<(), AppError> {
    if role.allows(required) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin access required".into()))
    }
}

fn session_token<'a>(parts: &'a Parts, cookie_name: &str) -> Option<&'a str> {
    let from_cookie = parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|h| extract_cookie_value(h, cookie_name));
    if from_cookie.is_some() {
        return from_cookie;
    }
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(parts, &state.config.cookie.name)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;

        let keys = JwtKeys::from_ref(state);
        match keys.verify(token) {
            Ok(claims) => Ok(AuthUser(claims)),
            Err(e) => {
                warn!(error = %e, "invalid or expired token");
                Err(AppError::Unauthorized("Invalid or expired token".into()))
            }
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if let Err(e) = authorize(claims.role, Role::Admin) {
            warn!(user_id = %claims.sub, "admin access denied");
            return Err(e);
        }
        Ok(AdminUser(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    async fn extract<T>(state: &AppState, req: Request<()>) -> Result<T, AppError>
    where
        T: FromRequestParts<AppState, Rejection = AppError>,
    {
        let (mut parts, _) = req.into_parts();
        T::from_request_parts(&mut parts, state).await
    }

    fn token_for(state: &AppState, role: Role) -> (Uuid, String) {
        let id = Uuid::new_v4();
        let token = JwtKeys::from_ref(state).sign(id, "t@e.st", role).unwrap();
        (id, token)
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let state = AppState::fake();
        let req = Request::builder().uri("/").body(()).unwrap();
        let err = extract::<AuthUser>(&state, req).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Authentication required");
    }

    #[tokio::test]
    async fn tampered_token_is_unauthorized() {
        let state = AppState::fake();
        let (_, token) = token_for(&state, Role::User);
        let req = Request::builder()
            .header(header::COOKIE, format!("coderCookie={token}x"))
            .body(())
            .unwrap();
        let err = extract::<AuthUser>(&state, req).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid or expired token");
    }

    #[tokio::test]
    async fn cookie_and_bearer_are_both_accepted() {
        let state = AppState::fake();
        let (id, token) = token_for(&state, Role::User);

        let req = Request::builder()
            .header(header::COOKIE, format!("other=1; coderCookie={token}"))
            .body(())
            .unwrap();
        assert_eq!(extract::<AuthUser>(&state, req).await.unwrap().id(), id);

        let req = Request::builder()
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(())
            .unwrap();
        assert_eq!(extract::<AuthUser>(&state, req).await.unwrap().id(), id);
    }

    #[tokio::test]
    async fn admin_extractor_forbids_plain_users() {
        let state = AppState::fake();
        let (_, user_token) = token_for(&state, Role::User);
        let req = Request::builder()
            .header(header::AUTHORIZATION, format!("Bearer {user_token}"))
            .body(())
            .unwrap();
        let err = extract::<AdminUser>(&state, req).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let (admin_id, admin_token) = token_for(&state, Role::Admin);
        let req = Request::builder()
            .header(header::AUTHORIZATION, format!("Bearer {admin_token}"))
            .body(())
            .unwrap();
        let AdminUser(claims) = extract::<AdminUser>(&state, req).await.unwrap();
        assert_eq!(claims.sub, admin_id);
    }

    #[test]
    fn self_or_admin_check() {
        let me = Uuid::new_v4();
        let claims = |role| Claims {
            sub: me,
            email: "a@b.c".into(),
            role,
            iat: 0,
            exp: 0,
            iss: String::new(),
            aud: String::new(),
        };
        assert!(AuthUser(claims(Role::User)).ensure_self_or_admin(me).is_ok());
        assert!(AuthUser(claims(Role::User)).ensure_self_or_admin(Uuid::new_v4()).is_err());
        assert!(AuthUser(claims(Role::Admin)).ensure_self_or_admin(Uuid::new_v4()).is_ok());
    }
}
