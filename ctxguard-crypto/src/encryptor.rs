//! The pluggable encryptor seam.
//!
//! A [`DataEncryptor`] turns bytes into a cipher and back, taking a string key
//! that implementations may bind into the cipher as extra entropy. Callers
//! doing many operations with one key open a [`DataEncryptorSession`] and
//! close it in the tightest scope they can.

use crate::error::{EncryptorError, EncryptorResult};
use crate::user::UserDataEncryptor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use zeroize::Zeroizing;

/// Encrypts and decrypts byte buffers.
///
/// Implementations must be safe to share across threads; stateful work goes
/// through [`DataEncryptor::create_session`].
pub trait DataEncryptor: Send + Sync {
    /// Encrypts `data` into a cipher. `key` may be empty.
    fn encrypt(&self, key: &str, data: &[u8]) -> EncryptorResult<Vec<u8>>;

    /// Decrypts a cipher produced by [`DataEncryptor::encrypt`] with the same `key`.
    /// The returned plaintext is wiped when dropped.
    fn decrypt(&self, key: &str, cipher: &[u8]) -> EncryptorResult<Zeroizing<Vec<u8>>>;

    /// Opens a session for repeated operations.
    fn create_session(&self) -> EncryptorResult<Box<dyn DataEncryptorSession>>;

    /// Stable name of the implementation, used to compare encryptors.
    fn kind(&self) -> &'static str;

    /// Serializable form of this encryptor, if it has one.
    fn descriptor(&self) -> Option<EncryptorDescriptor> {
        None
    }
}

/// A stateful encryptor handle.
///
/// `close` releases whatever the session holds and is idempotent. Every
/// operation after `close` fails with [`EncryptorError::Disposed`]. Dropping
/// an open session closes it.
pub trait DataEncryptorSession: DataEncryptor {
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Session over an encryptor that has no per-session state.
pub struct StatelessSession {
    inner: Option<Arc<dyn DataEncryptor>>,
}

impl StatelessSession {
    pub fn new(inner: Arc<dyn DataEncryptor>) -> Self {
        Self { inner: Some(inner) }
    }

    fn inner(&self) -> EncryptorResult<&Arc<dyn DataEncryptor>> {
        self.inner.as_ref().ok_or(EncryptorError::Disposed)
    }
}

impl DataEncryptor for StatelessSession {
    fn encrypt(&self, key: &str, data: &[u8]) -> EncryptorResult<Vec<u8>> {
        self.inner()?.encrypt(key, data)
    }

    fn decrypt(&self, key: &str, cipher: &[u8]) -> EncryptorResult<Zeroizing<Vec<u8>>> {
        self.inner()?.decrypt(key, cipher)
    }

    fn create_session(&self) -> EncryptorResult<Box<dyn DataEncryptorSession>> {
        Ok(Box::new(StatelessSession::new(self.inner()?.clone())))
    }

    fn kind(&self) -> &'static str {
        "stateless-session"
    }
}

impl DataEncryptorSession for StatelessSession {
    fn close(&mut self) {
        self.inner = None;
    }

    fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

/// Serialized form of an encryptor.
///
/// Stateless encryptors serialize as a marker and resolve back to their
/// process-wide shared instance instead of building a new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptorDescriptor {
    CurrentUser,
    LocalMachine,
}

impl Default for EncryptorDescriptor {
    fn default() -> Self {
        EncryptorDescriptor::CurrentUser
    }
}

impl EncryptorDescriptor {
    /// Returns the canonical instance this descriptor stands for.
    pub fn resolve(self) -> Arc<dyn DataEncryptor> {
        match self {
            EncryptorDescriptor::CurrentUser => UserDataEncryptor::current_user(),
            EncryptorDescriptor::LocalMachine => UserDataEncryptor::local_machine(),
        }
    }

    pub fn to_bytes(self) -> EncryptorResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> EncryptorResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
