use std::fmt;

/// Failures of the security service. Negative outcomes that callers are expected to
/// handle (wrong key, bad token, unknown id) are not errors; see `AuthResult`,
/// `PermissionCheck` and the `Option` returns of the service.
#[derive(Debug)]
pub enum SecurityError {
    Validation(String),
    Hashing(String),
    Token(String),
    StorageError(String),
}

impl fmt::Display for SecurityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityError::Validation(e) => write!(f, "Validation error: {}", e),
            SecurityError::Hashing(e) => write!(f, "Credential hashing failed: {}", e),
            SecurityError::Token(e) => write!(f, "Token signing failed: {}", e),
            SecurityError::StorageError(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for SecurityError {}

impl From<anyhow::Error> for SecurityError {
    fn from(err: anyhow::Error) -> Self {
        SecurityError::StorageError(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for SecurityError {
    fn from(err: bcrypt::BcryptError) -> Self {
        SecurityError::Hashing(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for SecurityError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        SecurityError::Token(err.to_string())
    }
}
