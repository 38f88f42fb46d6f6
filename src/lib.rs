pub mod auth;
pub mod config;
pub mod storage;
pub mod utils;
pub mod web;

use auth::{SecurityService, TokenSigner};
use config::SecurityConfig;
use std::sync::Arc;
use storage::SqliteKeyStorage;

pub struct AppContext {
    pub security: Arc<SecurityService>,
}

impl AppContext {
    pub async fn from_config(config: &SecurityConfig) -> anyhow::Result<Self> {
        let keys = Arc::new(SqliteKeyStorage::new(&config.database_url).await?);
        let tokens = TokenSigner::new(&config.jwt_secret);
        Ok(Self {
            security: Arc::new(SecurityService::new(keys, tokens, config.bcrypt_cost)),
        })
    }
}

pub fn init_env() {
    dotenv::dotenv().ok();
}
