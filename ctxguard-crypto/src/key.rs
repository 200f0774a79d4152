//! RSA key material and the sources that supply it on demand.
//!
//! Key material is never kept in the clear by an encryptor. A
//! [`KeyMaterialSource`] hands out a fresh [`KeyMaterial`] for each operation,
//! and the material wipes its PEM text when the operation drops it.

use crate::encryptor::DataEncryptor;
use crate::error::{EncryptorError, EncryptorResult};
use crate::string_encryptor::StringEncryptor;
use crate::user::UserDataEncryptor;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::sync::Arc;
use zeroize::Zeroizing;

/// Entropy name under which in-memory key material is protected.
pub const IN_MEMORY_KEY_NAME: &str = "RSAKEY";

/// Environment variable read by [`EnvLegacyKeyStore::default`].
pub const LEGACY_KEY_ENV_VAR: &str = "CTXGUARD_LEGACY_KEY";

/// Which half of a keypair a piece of key material carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    /// PKCS#8 private key (can encrypt and decrypt).
    Private,
    /// SubjectPublicKeyInfo public key (encrypt only).
    Public,
}

/// PEM-encoded RSA key material, wiped on drop.
pub struct KeyMaterial {
    kind: KeyKind,
    pem: Zeroizing<String>,
}

impl KeyMaterial {
    pub fn from_pem(kind: KeyKind, pem: Zeroizing<String>) -> Self {
        Self { kind, pem }
    }

    pub fn from_private_key(key: &RsaPrivateKey) -> EncryptorResult<Self> {
        let pem = key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| EncryptorError::Crypto(format!("private key encoding failed: {e}")))?;
        Ok(Self { kind: KeyKind::Private, pem })
    }

    pub fn from_public_key(key: &RsaPublicKey) -> EncryptorResult<Self> {
        let pem = key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| EncryptorError::Crypto(format!("public key encoding failed: {e}")))?;
        Ok(Self { kind: KeyKind::Public, pem: Zeroizing::new(pem) })
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// The public half of this material.
    pub fn public_half(&self) -> EncryptorResult<KeyMaterial> {
        match self.kind {
            KeyKind::Public => Ok(KeyMaterial::from_pem(KeyKind::Public, self.pem.clone())),
            KeyKind::Private => KeyMaterial::from_public_key(&RsaPublicKey::from(&self.private_key()?)),
        }
    }

    pub(crate) fn private_key(&self) -> EncryptorResult<RsaPrivateKey> {
        RsaPrivateKey::from_pkcs8_pem(&self.pem)
            .map_err(|e| EncryptorError::Crypto(format!("malformed private key: {e}")))
    }

    pub(crate) fn public_key(&self) -> EncryptorResult<RsaPublicKey> {
        RsaPublicKey::from_public_key_pem(&self.pem)
            .map_err(|e| EncryptorError::Crypto(format!("malformed public key: {e}")))
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial").field("kind", &self.kind).finish_non_exhaustive()
    }
}

/// Supplies key material on demand.
pub trait KeyMaterialSource: Send + Sync {
    fn fetch(&self) -> EncryptorResult<KeyMaterial>;
}

// ============================================================================
// Protected in-memory key (generated and certificate strategies)
// ============================================================================

/// Key material held only as current-user cipher text.
///
/// The material is encrypted the moment the source is built, so every later
/// fetch decrypts the same key.
pub struct ProtectedKeySource {
    kind: KeyKind,
    cipher_text: String,
    protector: StringEncryptor,
}

impl ProtectedKeySource {
    /// Protects `material` under the current-user encryptor.
    pub fn protect(material: KeyMaterial) -> EncryptorResult<Self> {
        Self::protect_with(material, UserDataEncryptor::current_user())
    }

    pub fn protect_with(material: KeyMaterial, protector: Arc<dyn DataEncryptor>) -> EncryptorResult<Self> {
        let protector = StringEncryptor::new(protector);
        let cipher_text = protector.encrypt(IN_MEMORY_KEY_NAME, material.pem())?;
        Ok(Self { kind: material.kind(), cipher_text, protector })
    }
}

impl KeyMaterialSource for ProtectedKeySource {
    fn fetch(&self) -> EncryptorResult<KeyMaterial> {
        let pem = self.protector.decrypt(IN_MEMORY_KEY_NAME, &self.cipher_text)?;
        Ok(KeyMaterial::from_pem(self.kind, pem))
    }
}

// ============================================================================
// Legacy key store
// ============================================================================

/// A platform location that may hold a provisioned legacy keypair.
///
/// The value is the base64 text produced by [`seal_legacy_key`]. `Ok(None)`
/// means nothing is configured.
pub trait LegacyKeyStore {
    fn read_value(&self) -> EncryptorResult<Option<String>>;
}

impl<F> LegacyKeyStore for F
where
    F: Fn() -> EncryptorResult<Option<String>>,
{
    fn read_value(&self) -> EncryptorResult<Option<String>> {
        self()
    }
}

/// Reads the legacy key from an environment variable.
#[derive(Clone, Debug)]
pub struct EnvLegacyKeyStore {
    var: String,
}

impl EnvLegacyKeyStore {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvLegacyKeyStore {
    fn default() -> Self {
        Self::new(LEGACY_KEY_ENV_VAR)
    }
}

impl LegacyKeyStore for EnvLegacyKeyStore {
    fn read_value(&self) -> EncryptorResult<Option<String>> {
        match std::env::var(&self.var) {
            Ok(value) if !value.trim().is_empty() => Ok(Some(value)),
            Ok(_) | Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => Err(EncryptorError::Security(format!(
                "legacy key variable {} is not valid unicode",
                self.var
            ))),
        }
    }
}

/// Produces the legacy store value for a private key: machine-scope cipher
/// without entropy, base64-encoded.
pub fn seal_legacy_key(material: &KeyMaterial) -> EncryptorResult<String> {
    if material.kind() != KeyKind::Private {
        return Err(EncryptorError::Validation("legacy store only holds private keys".into()));
    }
    let cipher = UserDataEncryptor::local_machine().encrypt_without_entropy(material.pem().as_bytes())?;
    Ok(STANDARD.encode(cipher))
}

/// Key material read from the legacy store, kept as machine-scope cipher.
///
/// Nothing is checked at construction; a malformed value surfaces on the
/// first fetch.
pub struct LegacyStoreKeySource {
    cipher: Vec<u8>,
}

impl LegacyStoreKeySource {
    pub fn from_store_value(encoded: &str) -> EncryptorResult<Self> {
        Ok(Self { cipher: STANDARD.decode(encoded.trim())? })
    }
}

impl KeyMaterialSource for LegacyStoreKeySource {
    fn fetch(&self) -> EncryptorResult<KeyMaterial> {
        let plain = UserDataEncryptor::local_machine().decrypt_without_entropy(&self.cipher)?;
        let pem = std::str::from_utf8(&plain)
            .map_err(|e| EncryptorError::Crypto(format!("legacy key is not UTF-8: {e}")))?;
        Ok(KeyMaterial::from_pem(KeyKind::Private, Zeroizing::new(pem.to_owned())))
    }
}
