use std::env;
use std::net::SocketAddr;
use thiserror::Error;
use tracing::warn;

/// Signing secret used when `JWT_SECRET` is unset outside production. Anyone can forge
/// tokens signed with it.
pub const DEV_JWT_SECRET: &str = "forms-dev-secret-change-me";

pub const DEFAULT_DATABASE_URL: &str = "sqlite:./forms_data/forms.db?mode=rwc";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:7200";
/// `LOG_DIR` is read by the binary before configuration so config warnings are captured.
pub const DEFAULT_LOG_DIR: &str = "./logs";
pub const DEFAULT_BCRYPT_COST: u32 = 12;

const BCRYPT_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set to a non-default value when FORMS_ENV=production")]
    InsecureSecret,
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "dev" | "development" | "test" => Ok(Environment::Development),
            "prod" | "production" => Ok(Environment::Production),
            other => Err(ConfigError::InvalidValue {
                name: "FORMS_ENV",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub environment: Environment,
    pub database_url: String,
    pub jwt_secret: String,
    pub bcrypt_cost: u32,
    pub bind_addr: SocketAddr,
}

impl SecurityConfig {
    /// Reads the process environment. Call `init_env` first so `.env` is loaded.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = Environment::parse(&lookup("FORMS_ENV").unwrap_or_default())?;

        let jwt_secret = match lookup("JWT_SECRET").filter(|s| !s.trim().is_empty()) {
            Some(secret) if environment == Environment::Production && secret == DEV_JWT_SECRET => {
                return Err(ConfigError::InsecureSecret);
            }
            Some(secret) => secret,
            None if environment == Environment::Production => {
                return Err(ConfigError::InsecureSecret);
            }
            None => {
                warn!("JWT_SECRET not set, using the insecure development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let bcrypt_cost = match lookup("BCRYPT_COST") {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|cost| BCRYPT_COST_RANGE.contains(cost))
                .ok_or(ConfigError::InvalidValue { name: "BCRYPT_COST", value })?,
            None => DEFAULT_BCRYPT_COST,
        };

        let bind_value = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_value.parse().map_err(|_| ConfigError::InvalidValue {
            name: "BIND_ADDR",
            value: bind_value.clone(),
        })?;

        Ok(Self {
            environment,
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            jwt_secret,
            bcrypt_cost,
            bind_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<SecurityConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SecurityConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_in_development() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(config.bcrypt_cost, DEFAULT_BCRYPT_COST);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR.parse().unwrap());
    }

    #[test]
    fn production_requires_a_real_secret() {
        assert!(matches!(
            config_from(&[("FORMS_ENV", "production")]),
            Err(ConfigError::InsecureSecret)
        ));
        assert!(matches!(
            config_from(&[("FORMS_ENV", "production"), ("JWT_SECRET", DEV_JWT_SECRET)]),
            Err(ConfigError::InsecureSecret)
        ));
        assert!(matches!(
            config_from(&[("FORMS_ENV", "prod"), ("JWT_SECRET", "  ")]),
            Err(ConfigError::InsecureSecret)
        ));

        let config = config_from(&[("FORMS_ENV", "production"), ("JWT_SECRET", "s3cr3t")]).unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.jwt_secret, "s3cr3t");
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(config_from(&[("BCRYPT_COST", "2")]).is_err());
        assert!(config_from(&[("BCRYPT_COST", "abc")]).is_err());
        assert!(config_from(&[("BIND_ADDR", "nowhere")]).is_err());
        assert!(config_from(&[("FORMS_ENV", "staging")]).is_err());
        assert_eq!(config_from(&[("BCRYPT_COST", "4")]).unwrap().bcrypt_cost, 4);
    }
}
