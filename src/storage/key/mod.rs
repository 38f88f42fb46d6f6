mod key_entity;
pub mod sqlite;


pub use key_entity::Model as ApiKeyRow;
pub use sqlite::SqliteKeyStorage;
use crate::auth::{ApiKeyRecord, ApiKeyUpdate};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::Set;

/// Persistence for API key records. Every method is a single unit of work
/// against the store; failures are logged by the implementation and returned as-is.
#[async_trait]
pub trait KeyStorage: Send + Sync + 'static {
    async fn create(&self, record: ApiKeyRecord) -> Result<ApiKeyRecord>;
    async fn get(&self, id: &str) -> Result<Option<ApiKeyRecord>>;
    /// Newest first.
    async fn list(&self, limit: u64, offset: u64) -> Result<Vec<ApiKeyRecord>>;
    /// All records with `is_active` set, newest first.
    async fn list_active(&self) -> Result<Vec<ApiKeyRecord>>;
    async fn update(&self, id: &str, update: &ApiKeyUpdate) -> Result<Option<ApiKeyRecord>>;
    /// Stamps `last_used_at` on an active record. Returns `false` when the record is
    /// gone or inactive.
    async fn touch_last_used(&self, id: &str) -> Result<bool>;
    async fn deactivate(&self, id: &str) -> Result<bool>;
    async fn remove(&self, id: &str) -> Result<bool>;
}

impl From<ApiKeyRow> for ApiKeyRecord {
    fn from(row: ApiKeyRow) -> Self {
        let permissions = row.get_permissions();

        ApiKeyRecord {
            id: row.id,
            key_hash: row.key_hash,
            name: row.name,
            permissions,
            rate_limit_per_hour: row.rate_limit_per_hour,
            is_active: row.is_active,
            last_used_at: row.last_used_at,
            expires_at: row.expires_at,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<ApiKeyRecord> for key_entity::ActiveModel {
    fn from(record: ApiKeyRecord) -> Self {
        key_entity::ActiveModel {
            id: Set(record.id),
            key_hash: Set(record.key_hash),
            name: Set(record.name),
            permissions: Set(key_entity::encode_permissions(&record.permissions)),
            rate_limit_per_hour: Set(record.rate_limit_per_hour),
            is_active: Set(record.is_active),
            last_used_at: Set(record.last_used_at),
            expires_at: Set(record.expires_at),
            created_by: Set(record.created_by),
            created_at: Set(record.created_at),
            updated_at: Set(record.updated_at),
        }
    }
}

/// Each updatable field maps to exactly one column here; everything else stays `NotSet`
/// and is left untouched by the UPDATE.
impl From<&ApiKeyUpdate> for key_entity::ActiveModel {
    fn from(update: &ApiKeyUpdate) -> Self {
        let mut model = key_entity::ActiveModel {
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Some(name) = &update.name {
            model.name = Set(name.clone());
        }
        if let Some(permissions) = &update.permissions {
            model.permissions = Set(key_entity::encode_permissions(permissions));
        }
        if let Some(is_active) = update.is_active {
            model.is_active = Set(is_active);
        }
        if let Some(rate_limit) = update.rate_limit_per_hour {
            model.rate_limit_per_hour = Set(rate_limit);
        }
        model
    }
}
