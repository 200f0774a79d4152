//! OS-identity-bound symmetric encryptor.
//!
//! Ciphers are sealed under the scope key of the current user (or the local
//! machine) and bound to entropy built from a baked-in constant plus the
//! caller key. The encryptor is stateless, so each scope has exactly one
//! shared instance.

use crate::cipher;
use crate::encryptor::{DataEncryptor, DataEncryptorSession, EncryptorDescriptor, StatelessSession};
use crate::error::EncryptorResult;
use crate::scope::{scope_key, ProtectionScope};
use std::sync::{Arc, LazyLock};
use zeroize::Zeroizing;

/// Mixed with the caller key so entropy is never just the key name.
const BAKED_IN_ENTROPY: &str = "5E0C9A7B21D84F6A9C3B8E17F04D62A1B7C95E3F0A8D4C2167E9B3F5A0C8D1E4";

static CURRENT_USER: LazyLock<Arc<UserDataEncryptor>> =
    LazyLock::new(|| Arc::new(UserDataEncryptor { scope: ProtectionScope::CurrentUser }));

static LOCAL_MACHINE: LazyLock<Arc<UserDataEncryptor>> =
    LazyLock::new(|| Arc::new(UserDataEncryptor { scope: ProtectionScope::LocalMachine }));

/// Scope-bound encryptor. Obtain it through [`UserDataEncryptor::current_user`]
/// or [`UserDataEncryptor::local_machine`].
#[derive(Debug)]
pub struct UserDataEncryptor {
    scope: ProtectionScope,
}

impl UserDataEncryptor {
    /// The shared current-user instance.
    pub fn current_user() -> Arc<UserDataEncryptor> {
        CURRENT_USER.clone()
    }

    /// The shared local-machine instance.
    pub fn local_machine() -> Arc<UserDataEncryptor> {
        LOCAL_MACHINE.clone()
    }

    pub fn scope(&self) -> ProtectionScope {
        self.scope
    }

    /// Encrypts without entropy. Only for data written before per-key entropy existed.
    pub fn encrypt_without_entropy(&self, data: &[u8]) -> EncryptorResult<Vec<u8>> {
        cipher::seal(scope_key(self.scope)?, data, &[])
    }

    /// Decrypts a cipher written by [`UserDataEncryptor::encrypt_without_entropy`].
    pub fn decrypt_without_entropy(&self, cipher: &[u8]) -> EncryptorResult<Zeroizing<Vec<u8>>> {
        cipher::open(scope_key(self.scope)?, cipher, &[])
    }
}

/// UTF-16LE bytes of the baked-in constant followed by `key`.
fn entropy(key: &str) -> Vec<u8> {
    BAKED_IN_ENTROPY
        .encode_utf16()
        .chain(key.encode_utf16())
        .flat_map(u16::to_le_bytes)
        .collect()
}

impl DataEncryptor for UserDataEncryptor {
    fn encrypt(&self, key: &str, data: &[u8]) -> EncryptorResult<Vec<u8>> {
        cipher::seal(scope_key(self.scope)?, data, &entropy(key))
    }

    fn decrypt(&self, key: &str, cipher: &[u8]) -> EncryptorResult<Zeroizing<Vec<u8>>> {
        cipher::open(scope_key(self.scope)?, cipher, &entropy(key))
    }

    fn create_session(&self) -> EncryptorResult<Box<dyn DataEncryptorSession>> {
        let shared = match self.scope {
            ProtectionScope::CurrentUser => UserDataEncryptor::current_user(),
            ProtectionScope::LocalMachine => UserDataEncryptor::local_machine(),
        };
        Ok(Box::new(StatelessSession::new(shared)))
    }

    fn kind(&self) -> &'static str {
        match self.scope {
            ProtectionScope::CurrentUser => "current-user",
            ProtectionScope::LocalMachine => "local-machine",
        }
    }

    fn descriptor(&self) -> Option<EncryptorDescriptor> {
        Some(match self.scope {
            ProtectionScope::CurrentUser => EncryptorDescriptor::CurrentUser,
            ProtectionScope::LocalMachine => EncryptorDescriptor::LocalMachine,
        })
    }
}
