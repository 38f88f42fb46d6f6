use sea_orm::*;
use sea_query::Expr;
use anyhow::Result;
use chrono::Utc;
use std::future::Future;
use std::time::Instant;
use super::key_entity;
use super::KeyStorage;
use crate::auth::{ApiKeyRecord, ApiKeyUpdate};
use crate::storage::Db;
use async_trait::async_trait;
use tracing::{debug, error, info};

#[derive(Clone)]
pub struct SqliteKeyStorage {
    db: Db,
}

impl SqliteKeyStorage {
    pub async fn new(database_url: &str) -> Result<Self> {
        info!("Initializing SQLite API key storage at {}", database_url);

        let db = Database::connect(
            ConnectOptions::new(database_url.to_owned())
                .sqlx_logging(false)
                .to_owned()
        ).await?;

        db.execute(Statement::from_string(
            DbBackend::Sqlite,
            r#"
            CREATE TABLE IF NOT EXISTS api_keys (
                id TEXT PRIMARY KEY NOT NULL,
                key_hash TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                permissions TEXT NOT NULL DEFAULT '[]',
                rate_limit_per_hour INTEGER NOT NULL DEFAULT 1000,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                last_used_at TEXT,
                expires_at TEXT,
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#.to_owned(),
        ))
        .await?;

        db.execute(Statement::from_string(
            DbBackend::Sqlite,
            r#"
            CREATE INDEX IF NOT EXISTS idx_api_keys_active_created
                ON api_keys (is_active, created_at)
            "#.to_owned(),
        ))
        .await?;

        Ok(Self { db })
    }
}

/// Runs one store operation, logging its duration. Failures are logged with the
/// operation name and passed back to the caller unchanged.
async fn timed<T, F>(op: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, DbErr>>,
{
    let started = Instant::now();
    match fut.await {
        Ok(value) => {
            debug!(op, elapsed_ms = started.elapsed().as_millis() as u64, "api_keys query done");
            Ok(value)
        }
        Err(e) => {
            error!(op, elapsed_ms = started.elapsed().as_millis() as u64, error = %e, "api_keys query failed");
            Err(e.into())
        }
    }
}

#[async_trait]
impl KeyStorage for SqliteKeyStorage {
    async fn create(&self, record: ApiKeyRecord) -> Result<ApiKeyRecord> {
        let active_model: key_entity::ActiveModel = record.clone().into();

        timed("create", key_entity::Entity::insert(active_model).exec(&self.db)).await?;
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<ApiKeyRecord>> {
        let row = timed(
            "get",
            key_entity::Entity::find()
                .filter(key_entity::Column::Id.eq(id))
                .one(&self.db),
        )
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list(&self, limit: u64, offset: u64) -> Result<Vec<ApiKeyRecord>> {
        let rows = timed(
            "list",
            key_entity::Entity::find()
                .order_by_desc(key_entity::Column::CreatedAt)
                .limit(limit)
                .offset(offset)
                .all(&self.db),
        )
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_active(&self) -> Result<Vec<ApiKeyRecord>> {
        let rows = timed(
            "list_active",
            key_entity::Entity::find()
                .filter(key_entity::Column::IsActive.eq(true))
                .order_by_desc(key_entity::Column::CreatedAt)
                .all(&self.db),
        )
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update(&self, id: &str, update: &ApiKeyUpdate) -> Result<Option<ApiKeyRecord>> {
        let changes: key_entity::ActiveModel = update.into();

        let row = timed("update", async {
            let txn = self.db.begin().await?;
            let result = key_entity::Entity::update_many()
                .set(changes)
                .filter(key_entity::Column::Id.eq(id))
                .exec(&txn)
                .await?;
            if result.rows_affected == 0 {
                txn.rollback().await?;
                return Ok::<_, DbErr>(None);
            }
            let row = key_entity::Entity::find()
                .filter(key_entity::Column::Id.eq(id))
                .one(&txn)
                .await?;
            txn.commit().await?;
            Ok::<_, DbErr>(row)
        })
        .await?;
        Ok(row.map(Into::into))
    }

    async fn touch_last_used(&self, id: &str) -> Result<bool> {
        let result = timed(
            "touch_last_used",
            key_entity::Entity::update_many()
                .col_expr(key_entity::Column::LastUsedAt, Expr::value(Utc::now()))
                .filter(key_entity::Column::Id.eq(id))
                .filter(key_entity::Column::IsActive.eq(true))
                .exec(&self.db),
        )
        .await?;
        Ok(result.rows_affected > 0)
    }

    async fn deactivate(&self, id: &str) -> Result<bool> {
        let result = timed(
            "deactivate",
            key_entity::Entity::update_many()
                .col_expr(key_entity::Column::IsActive, Expr::value(false))
                .col_expr(key_entity::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(key_entity::Column::Id.eq(id))
                .exec(&self.db),
        )
        .await?;
        Ok(result.rows_affected > 0)
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let result = timed(
            "remove",
            key_entity::Entity::delete_many()
                .filter(key_entity::Column::Id.eq(id))
                .exec(&self.db),
        )
        .await?;
        Ok(result.rows_affected > 0)
    }
}
