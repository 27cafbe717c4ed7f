use serde::{Deserialize, Serialize};

use crate::users::dto::PublicUser;

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub password: String,
}

/// Returned by register and login. The session itself travels in the cookie.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: &'static str,
    pub user: PublicUser,
}

/// The same message is returned whether or not the email is known.
#[derive(Debug, Serialize)]
pub struct ForgotPasswordResponse {
    pub message: &'static str,
    #[serde(rename = "resetToken", skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}
