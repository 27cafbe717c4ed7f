use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    pub name: String,
    pub secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base URL the stored image paths are built from.
    pub public_url: String,
}

/// Account created (or promoted) at startup so a fresh deployment has an admin.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub cookie: CookieConfig,
    pub reset_token_ttl_minutes: i64,
    pub frontend_origins: Vec<String>,
    pub uploads_dir: String,
    pub s3: Option<S3Config>,
    pub admin_seed: Option<AdminSeed>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = non_empty_var("DATABASE_URL");
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "petadopt".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "petadopt-users".into()),
            ttl_minutes: parse_var("JWT_TTL_MINUTES").unwrap_or(60),
        };
        anyhow::ensure!(!jwt.secret.is_empty(), "JWT_SECRET must not be empty");

        let cookie = CookieConfig {
            name: std::env::var("SESSION_COOKIE_NAME").unwrap_or_else(|_| "coderCookie".into()),
            secure: std::env::var("COOKIE_SECURE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        };

        let frontend_origins = std::env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let s3 = match non_empty_var("S3_ENDPOINT") {
            Some(endpoint) => {
                let bucket = std::env::var("S3_BUCKET").context("S3_BUCKET must be set")?;
                let public_url = std::env::var("S3_PUBLIC_URL")
                    .unwrap_or_else(|_| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));
                Some(S3Config {
                    access_key: std::env::var("S3_ACCESS_KEY").context("S3_ACCESS_KEY must be set")?,
                    secret_key: std::env::var("S3_SECRET_KEY").context("S3_SECRET_KEY must be set")?,
                    region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
                    endpoint,
                    bucket,
                    public_url,
                })
            }
            None => None,
        };

        let admin_seed = match (non_empty_var("ADMIN_EMAIL"), non_empty_var("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed { email, password }),
            _ => None,
        };

        Ok(Self {
            database_url,
            jwt,
            cookie,
            reset_token_ttl_minutes: parse_var("RESET_TOKEN_TTL_MINUTES").unwrap_or(60),
            frontend_origins,
            uploads_dir: std::env::var("UPLOADS_DIR").unwrap_or_else(|_| "uploads".into()),
            s3,
            admin_seed,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|v| v.parse::<i64>().ok())
}
