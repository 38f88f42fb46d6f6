pub mod credential;
pub mod error;
pub mod token;
pub mod types;


pub use error::SecurityError;
pub use token::{parse_expiry, TokenSigner, DEFAULT_TOKEN_EXPIRY};
pub use types::{
    ApiKeyRecord, ApiKeyUpdate, AuthResult, NewApiKey, PermissionCheck,
    DEFAULT_RATE_LIMIT_PER_HOUR, WILDCARD_PERMISSION,
};

use crate::storage::KeyStorage;
use chrono::{Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: u64 = 50;

const INVALID_API_KEY: &str = "Invalid API key";

type Result<T> = std::result::Result<T, SecurityError>;

/// API key authentication, permission checks and session tokens.
///
/// Authentication is a linear bcrypt scan over the active keys. That is fine for
/// the small key populations this service sees; a larger population would want a
/// non-secret lookup prefix stored next to the hash to narrow the scan.
#[derive(Clone)]
pub struct SecurityService {
    keys: Arc<dyn KeyStorage>,
    tokens: TokenSigner,
    bcrypt_cost: u32,
}

impl SecurityService {
    pub fn new(keys: Arc<dyn KeyStorage>, tokens: TokenSigner, bcrypt_cost: u32) -> Self {
        Self {
            keys,
            tokens,
            bcrypt_cost,
        }
    }

    /// Creates a key and returns its plaintext. This is the only time the plaintext
    /// is available; only the hash is stored.
    pub async fn create_api_key(&self, new_key: NewApiKey) -> Result<(String, ApiKeyRecord)> {
        let name = new_key.name.trim().to_string();
        if name.is_empty() {
            return Err(SecurityError::Validation("name must not be empty".to_string()));
        }
        let rate_limit_per_hour = new_key.rate_limit_per_hour.unwrap_or(DEFAULT_RATE_LIMIT_PER_HOUR);
        validate_rate_limit(rate_limit_per_hour)?;

        let plaintext = credential::generate_key();
        let key_hash = {
            let plaintext = plaintext.clone();
            let cost = self.bcrypt_cost;
            tokio::task::spawn_blocking(move || credential::hash_key(&plaintext, cost))
                .await
                .map_err(|e| SecurityError::Hashing(e.to_string()))??
        };

        let now = Utc::now();
        let record = ApiKeyRecord {
            id: Uuid::new_v4().to_string(),
            key_hash,
            name,
            permissions: new_key.permissions,
            rate_limit_per_hour,
            is_active: true,
            last_used_at: None,
            expires_at: new_key.expires_at,
            created_by: new_key.created_by,
            created_at: now,
            updated_at: now,
        };

        let record = self.keys.create(record).await?;
        info!(
            key_id = %record.id,
            created_by = %record.created_by,
            permissions = ?record.permissions,
            "API key created: {}", record.name
        );
        Ok((plaintext, record))
    }

    pub async fn authenticate(&self, candidate: &str) -> Result<AuthResult> {
        let shown = credential::safe_prefix(candidate);
        if !credential::is_well_formed(candidate) {
            warn!(key_prefix = %shown, "API key rejected: malformed");
            return Ok(AuthResult::invalid(INVALID_API_KEY));
        }

        let now = Utc::now();
        let active: Vec<ApiKeyRecord> = self
            .keys
            .list_active()
            .await?
            .into_iter()
            .filter(|record| !record.is_expired(now))
            .collect();
        if active.is_empty() {
            debug!("No active API keys to authenticate against");
            warn!(key_prefix = %shown, "API key rejected");
            return Ok(AuthResult::invalid(INVALID_API_KEY));
        }

        let hashes: Vec<String> = active.iter().map(|r| r.key_hash.clone()).collect();
        let candidate_owned = candidate.to_string();
        let matched = tokio::task::spawn_blocking(move || {
            credential::find_match(&candidate_owned, hashes.iter().map(String::as_str))
        })
        .await
        .map_err(|e| SecurityError::Hashing(e.to_string()))?;

        let Some(index) = matched else {
            warn!(key_prefix = %shown, "API key rejected");
            return Ok(AuthResult::invalid(INVALID_API_KEY));
        };

        let mut record = active.into_iter().nth(index).ok_or_else(|| {
            SecurityError::Hashing("matched key index out of range".to_string())
        })?;
        // The scan ran against a snapshot; a key deactivated or deleted since then must not pass.
        if !self.keys.touch_last_used(&record.id).await? {
            warn!(key_id = %record.id, key_prefix = %shown, "API key rejected: no longer active");
            return Ok(AuthResult::invalid(INVALID_API_KEY));
        }
        record.last_used_at = Some(Utc::now());

        info!(key_id = %record.id, key_prefix = %shown, "API key authenticated");
        Ok(AuthResult::valid(record))
    }

    pub fn check_permission(&self, record: &ApiKeyRecord, permission: &str) -> PermissionCheck {
        if record.has_permission(permission) {
            PermissionCheck {
                has_permission: true,
                error_message: None,
            }
        } else {
            debug!(key_id = %record.id, permission, "Permission denied");
            PermissionCheck {
                has_permission: false,
                error_message: Some(format!("Missing required permission: {}", permission)),
            }
        }
    }

    pub async fn get_api_key_by_id(&self, id: &str) -> Result<Option<ApiKeyRecord>> {
        Ok(self.keys.get(id).await?)
    }

    pub async fn list_api_keys(&self, limit: Option<u64>, offset: Option<u64>) -> Result<Vec<ApiKeyRecord>> {
        let limit = validate_page_bound("limit", limit.unwrap_or(DEFAULT_PAGE_SIZE))?;
        let offset = validate_page_bound("offset", offset.unwrap_or(0))?;
        Ok(self.keys.list(limit, offset).await?)
    }

    /// Applies only the supplied fields. An update with no fields is rejected before
    /// the store is touched.
    pub async fn update_api_key(&self, id: &str, mut update: ApiKeyUpdate) -> Result<Option<ApiKeyRecord>> {
        if update.is_empty() {
            return Err(SecurityError::Validation("no fields supplied for update".to_string()));
        }
        if let Some(name) = update.name.as_mut() {
            *name = name.trim().to_string();
            if name.is_empty() {
                return Err(SecurityError::Validation("name must not be empty".to_string()));
            }
        }
        if let Some(rate_limit) = update.rate_limit_per_hour {
            validate_rate_limit(rate_limit)?;
        }

        let updated = self.keys.update(id, &update).await?;
        match &updated {
            Some(record) => info!(key_id = %record.id, changes = ?update, "API key updated"),
            None => debug!(key_id = id, "API key update matched no record"),
        }
        Ok(updated)
    }

    pub async fn deactivate_api_key(&self, id: &str) -> Result<bool> {
        let affected = self.keys.deactivate(id).await?;
        if affected {
            info!(key_id = id, "API key deactivated");
        }
        Ok(affected)
    }

    pub async fn delete_api_key(&self, id: &str) -> Result<bool> {
        let affected = self.keys.remove(id).await?;
        if affected {
            info!(key_id = id, "API key deleted");
        }
        Ok(affected)
    }

    pub fn issue_token<T: Serialize>(&self, claims: &T) -> Result<String> {
        self.issue_token_with_expiry(claims, parse_expiry(DEFAULT_TOKEN_EXPIRY)?)
    }

    pub fn issue_token_with_expiry<T: Serialize>(&self, claims: &T, expires_in: Duration) -> Result<String> {
        self.tokens.issue(claims, expires_in)
    }

    pub fn verify_token<T: DeserializeOwned>(&self, token: &str) -> Option<T> {
        self.tokens.verify(token)
    }
}

fn validate_rate_limit(rate_limit_per_hour: i32) -> Result<()> {
    if rate_limit_per_hour <= 0 {
        return Err(SecurityError::Validation(format!(
            "rate_limit_per_hour must be positive, got {}",
            rate_limit_per_hour
        )));
    }
    Ok(())
}

/// SQLite binds LIMIT/OFFSET as signed 64-bit integers.
fn validate_page_bound(name: &str, value: u64) -> Result<u64> {
    if value > i64::MAX as u64 {
        return Err(SecurityError::Validation(format!(
            "{} must not exceed {}, got {}",
            name,
            i64::MAX,
            value
        )));
    }
    Ok(value)
}
