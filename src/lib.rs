pub mod api;
pub mod auth;
pub mod config;
pub mod db;

pub use db::DbPool;

use anyhow::Context;
use config::Config;
use std::sync::Arc;

use crate::auth::{AuthService, HmacSha256Hasher, LogNotifier, TokenCodec};
use crate::db::SqliteStore;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub auth: Arc<AuthService>,
    pub codec: TokenCodec,
}

impl AppState {
    /// Wire the auth service over the SQLite store with the configured keys.
    pub fn new(config: Config, db: DbPool) -> anyhow::Result<Self> {
        let token_config = config.auth.token_config()?;
        let codec = TokenCodec::new(token_config).context("Invalid auth.signing_key")?;

        if config.auth.password_salt.is_empty() {
            tracing::warn!("auth.password_salt is empty; password digests are unsalted");
        }

        let auth = AuthService::new(
            Arc::new(SqliteStore::new(db.clone())),
            Arc::new(HmacSha256Hasher::new(config.auth.password_salt.clone())),
            codec.clone(),
            Arc::new(LogNotifier),
        );

        Ok(Self {
            config,
            db,
            auth: Arc::new(auth),
            codec,
        })
    }
}
