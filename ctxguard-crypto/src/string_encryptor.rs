//! Text front-end over any [`DataEncryptor`].

use crate::encryptor::DataEncryptor;
use crate::error::{EncryptorError, EncryptorResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Encrypts strings into base64 cipher text and back.
#[derive(Clone)]
pub struct StringEncryptor {
    inner: Arc<dyn DataEncryptor>,
}

impl StringEncryptor {
    pub fn new(inner: Arc<dyn DataEncryptor>) -> Self {
        Self { inner }
    }

    pub fn encrypt(&self, key: &str, text: &str) -> EncryptorResult<String> {
        let cipher = self.inner.encrypt(key, text.as_bytes())?;
        Ok(STANDARD.encode(cipher))
    }

    pub fn decrypt(&self, key: &str, encoded: &str) -> EncryptorResult<Zeroizing<String>> {
        let cipher = STANDARD.decode(encoded)?;
        let plain = self.inner.decrypt(key, &cipher)?;
        let text = std::str::from_utf8(&plain)
            .map_err(|e| EncryptorError::Serialization(format!("decrypted text is not UTF-8: {e}")))?;
        Ok(Zeroizing::new(text.to_owned()))
    }
}
