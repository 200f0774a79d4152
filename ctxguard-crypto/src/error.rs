//! Encryptor error types.

use thiserror::Error;

/// Result type for encryptor operations.
pub type EncryptorResult<T> = Result<T, EncryptorError>;

/// Errors raised by data encryptors, sessions, key sources and adapters.
#[derive(Debug, Error)]
pub enum EncryptorError {
    /// A required argument was blank or absent.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A value could not be serialized to or deserialized from bytes.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The cipher operation failed (malformed key, key mismatch, tampered data).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// The calling context may not access the requested key material.
    #[error("security error: {0}")]
    Security(String),

    /// No key or certificate matched the request.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The session was already closed.
    #[error("encryptor session has been closed")]
    Disposed,
}

impl EncryptorError {
    /// Whether this error belongs to the family a context store may absorb
    /// when protecting or unprotecting a value.
    pub fn is_protection_failure(&self) -> bool {
        matches!(
            self,
            EncryptorError::Serialization(_) | EncryptorError::Crypto(_) | EncryptorError::Security(_)
        )
    }
}

impl From<serde_json::Error> for EncryptorError {
    fn from(e: serde_json::Error) -> Self {
        EncryptorError::Serialization(e.to_string())
    }
}

impl From<base64::DecodeError> for EncryptorError {
    fn from(e: base64::DecodeError) -> Self {
        EncryptorError::Serialization(format!("invalid base64: {e}"))
    }
}
