use std::sync::Arc;

use sqlx::PgPool;
use tracing::{info, warn};

use crate::{
    adoptions::repo::{AdoptionStore, PgAdoptionStore},
    config::AppConfig,
    db,
    memory::MemoryStore,
    pets::repo::{PetStore, PgPetStore},
    storage::{LocalStorage, S3Storage, StorageClient},
    users::repo::{PgUserStore, UserStore},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub pets: Arc<dyn PetStore>,
    pub adoptions: Arc<dyn AdoptionStore>,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let storage = match &config.s3 {
            Some(s3) => {
                info!(bucket = %s3.bucket, "using s3 image storage");
                Arc::new(S3Storage::new(s3).await?) as Arc<dyn StorageClient>
            }
            None => Arc::new(LocalStorage::new(&config.uploads_dir)) as Arc<dyn StorageClient>,
        };

        let state = match config.database_url.clone() {
            Some(url) => Self::with_postgres(db::connect(&url).await?, config, storage),
            None => {
                warn!("DATABASE_URL not set; using in-memory store, data is lost on restart");
                Self::in_memory(config, storage)
            }
        };
        Ok(state)
    }

    pub fn with_postgres(db: PgPool, config: Arc<AppConfig>, storage: Arc<dyn StorageClient>) -> Self {
        Self {
            config,
            users: Arc::new(PgUserStore::new(db.clone())),
            pets: Arc::new(PgPetStore::new(db.clone())),
            adoptions: Arc::new(PgAdoptionStore::new(db)),
            storage,
        }
    }

    pub fn in_memory(config: Arc<AppConfig>, storage: Arc<dyn StorageClient>) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            config,
            users: store.clone(),
            pets: store.clone(),
            adoptions: store,
            storage,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use async_trait::async_trait;
        use bytes::Bytes;

        use crate::config::{CookieConfig, JwtConfig};

        struct FakeStorage;
        #[async_trait]
        impl StorageClient for FakeStorage {
            async fn put_object(&self, k: &str, _b: Bytes, _ct: &str) -> anyhow::Result<String> {
                Ok(format!("/uploads/{}", k))
            }
        }

        let config = Arc::new(AppConfig {
            database_url: None,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60,
            },
            cookie: CookieConfig {
                name: "coderCookie".into(),
                secure: false,
            },
            reset_token_ttl_minutes: 60,
            frontend_origins: vec!["http://localhost:5173".into()],
            uploads_dir: "uploads".into(),
            s3: None,
            admin_seed: None,
        });

        Self::in_memory(config, Arc::new(FakeStorage))
    }
}
