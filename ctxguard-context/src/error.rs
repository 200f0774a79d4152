//! Context store error types.

use ctxguard_crypto::EncryptorError;
use thiserror::Error;

/// Result type for context store operations.
pub type ContextResult<T> = Result<T, ContextError>;

/// Errors raised by the context store, its serialization and its configuration.
#[derive(Debug, Error)]
pub enum ContextError {
    /// A key, group name or value was blank or absent.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The store or one of its values could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("encryptor error: {0}")]
    Encryptor(#[from] EncryptorError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ContextError {
    fn from(e: serde_json::Error) -> Self {
        ContextError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for ContextError {
    fn from(e: toml::de::Error) -> Self {
        ContextError::Config(e.to_string())
    }
}

/// Fails with [`ContextError::Validation`] when `value` is empty or whitespace.
pub(crate) fn require(value: &str, what: &str) -> ContextResult<()> {
    if value.trim().is_empty() {
        return Err(ContextError::Validation(format!("{what} cannot be empty")));
    }
    Ok(())
}
