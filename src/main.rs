mod adoptions;
mod app;
mod auth;
mod config;
mod db;
mod dto;
mod error;
mod extract;
mod memory;
mod pets;
mod state;
mod storage;
mod users;

use crate::{state::AppState, users::services::ensure_admin};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "petadopt=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init().await?;

    if let Some(seed) = app_state.config.admin_seed.clone() {
        ensure_admin(&app_state, &seed).await?;
    }

    let app = app::build_app(app_state);
    app::serve(app).await
}
