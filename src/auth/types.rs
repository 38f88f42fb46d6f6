use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Grants every permission when present in a key's permission set.
pub const WILDCARD_PERMISSION: &str = "*";

pub const DEFAULT_RATE_LIMIT_PER_HOUR: i32 = 1000;

/// Stored form of an API key. The plaintext never appears here, only its bcrypt hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub id: String,
    #[serde(skip_serializing, default)]
    pub key_hash: String,
    pub name: String,
    pub permissions: Vec<String>,
    pub rate_limit_per_hour: i32,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApiKeyRecord {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p == WILDCARD_PERMISSION || p == permission)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Input for key creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewApiKey {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub rate_limit_per_hour: Option<i32>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: String,
}

impl NewApiKey {
    pub fn new(name: impl Into<String>, permissions: Vec<String>, created_by: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions,
            rate_limit_per_hour: None,
            expires_at: None,
            created_by: created_by.into(),
        }
    }

    pub fn with_rate_limit(mut self, rate_limit_per_hour: i32) -> Self {
        self.rate_limit_per_hour = Some(rate_limit_per_hour);
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// The mutable subset of an [`ApiKeyRecord`]. Only these fields can be changed after
/// creation; unknown fields are rejected when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiKeyUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_per_hour: Option<i32>,
}

impl ApiKeyUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.permissions.is_none()
            && self.is_active.is_none()
            && self.rate_limit_per_hour.is_none()
    }
}

/// Outcome of presenting a candidate key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthResult {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<ApiKeyRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AuthResult {
    pub fn valid(record: ApiKeyRecord) -> Self {
        Self {
            is_valid: true,
            record: Some(record),
            error_message: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            record: None,
            error_message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermissionCheck {
    pub has_permission: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}
