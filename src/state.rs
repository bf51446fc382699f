use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::TokenVerifier;
use crate::blog::{BlogService, SqlitePostRepository};
use crate::config::Config;
use crate::uploads::UploadStore;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub tokens: Arc<TokenVerifier>,
    pub uploads: UploadStore,
    pub blogs: BlogService,
}

impl AppState {
    /// Wire the services over an already migrated pool.
    pub fn new(db: DbPool, config: Config) -> anyhow::Result<Self> {
        let secret = config
            .auth
            .jwt_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("no token signing secret configured"))?;

        let tokens = TokenVerifier::new(
            secret.as_bytes(),
            config.auth.token_hours,
            config.auth.accept_bearer_prefix,
        );
        let uploads = UploadStore::new(
            config.uploads_path(),
            &config.storage.public_prefix,
            config.storage.max_upload_bytes,
        );
        let blogs = BlogService::new(
            Arc::new(SqlitePostRepository::new(db.clone())),
            uploads.clone(),
        );

        Ok(Self {
            db,
            config,
            tokens: Arc::new(tokens),
            uploads,
            blogs,
        })
    }
}
