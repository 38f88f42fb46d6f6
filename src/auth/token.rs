//! HS256 session tokens over arbitrary claims.
//!
//! The caller's claims travel under a `claims` field next to the registered `iat`
//! and `exp` claims, so any serializable payload round-trips unchanged.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::SecurityError;

pub const DEFAULT_TOKEN_EXPIRY: &str = "1h";

#[derive(Serialize)]
struct OutgoingClaims<'a, T: Serialize> {
    iat: i64,
    exp: i64,
    claims: &'a T,
}

#[derive(Deserialize)]
struct IncomingClaims<T> {
    claims: T,
}

#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenSigner {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn issue<T: Serialize>(&self, claims: &T, expires_in: Duration) -> Result<String, SecurityError> {
        let now = Utc::now().timestamp();
        let payload = OutgoingClaims {
            iat: now,
            exp: (now + expires_in.num_seconds()).max(0),
            claims,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key)?)
    }

    /// Decoded claims, or `None` when the token is expired, malformed or signed with
    /// another secret.
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Option<T> {
        match decode::<IncomingClaims<T>>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Some(data.claims.claims),
            Err(e) => {
                warn!("Token verification failed: {}", e);
                None
            }
        }
    }
}

/// Parses expiries such as `"30s"`, `"15m"`, `"1h"`, `"7d"`, or a bare number of seconds.
pub fn parse_expiry(value: &str) -> Result<Duration, SecurityError> {
    let value = value.trim();
    let invalid = || SecurityError::Validation(format!("invalid token expiry: {:?}", value));

    let (amount, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => value.split_at(idx),
        None => (value, "s"),
    };
    let amount: i64 = amount.parse().map_err(|_| invalid())?;

    let duration = match unit {
        "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        _ => None,
    };
    duration.ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_claims() {
        let signer = TokenSigner::new("test-secret");
        let claims = json!({"sub": "user-1", "roles": ["editor"], "form": {"id": 7}});

        let token = signer.issue(&claims, Duration::hours(1)).unwrap();
        let decoded: serde_json::Value = signer.verify(&token).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn round_trips_non_object_payloads() {
        let signer = TokenSigner::new("test-secret");
        for claims in [json!("just-a-string"), json!(42), json!([1, 2, 3]), json!(null)] {
            let token = signer.issue(&claims, Duration::minutes(5)).unwrap();
            assert_eq!(signer.verify::<serde_json::Value>(&token), Some(claims));
        }
    }

    #[test]
    fn expired_token_yields_none() {
        let signer = TokenSigner::new("test-secret");
        let token = signer.issue(&json!({"sub": "user-1"}), Duration::hours(-1)).unwrap();
        assert_eq!(signer.verify::<serde_json::Value>(&token), None);
    }

    #[test]
    fn foreign_signature_yields_none() {
        let token = TokenSigner::new("secret-a")
            .issue(&json!({"sub": "user-1"}), Duration::hours(1))
            .unwrap();
        assert_eq!(TokenSigner::new("secret-b").verify::<serde_json::Value>(&token), None);
    }

    #[test]
    fn malformed_token_yields_none() {
        let signer = TokenSigner::new("test-secret");
        assert_eq!(signer.verify::<serde_json::Value>("not.a.token"), None);
        assert_eq!(signer.verify::<serde_json::Value>(""), None);
    }

    #[test]
    fn parses_expiry_strings() {
        assert_eq!(parse_expiry("1h").unwrap(), Duration::hours(1));
        assert_eq!(parse_expiry("30s").unwrap(), Duration::seconds(30));
        assert_eq!(parse_expiry("15m").unwrap(), Duration::minutes(15));
        assert_eq!(parse_expiry("7d").unwrap(), Duration::days(7));
        assert_eq!(parse_expiry("3600").unwrap(), Duration::hours(1));
        assert_eq!(parse_expiry(DEFAULT_TOKEN_EXPIRY).unwrap(), Duration::hours(1));

        assert!(matches!(parse_expiry("1w"), Err(SecurityError::Validation(_))));
        assert!(matches!(parse_expiry("h"), Err(SecurityError::Validation(_))));
        assert!(matches!(parse_expiry(""), Err(SecurityError::Validation(_))));
    }
}
