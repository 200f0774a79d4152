//! OS identity binding for the scope-bound encryptors.
//!
//! A scope key is derived once per process with Argon2id from the machine
//! identity (and, for [`ProtectionScope::CurrentUser`], the effective user).
//! Ciphers sealed under a scope key can only be opened by a process running
//! with the same identity on the same machine.

use crate::cipher::KEY_SIZE;
use crate::error::{EncryptorError, EncryptorResult};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::debug;
use zeroize::Zeroizing;

/// Domain salt for scope key derivation. Identity material is low entropy by
/// nature; the salt only separates this derivation from any other.
const SCOPE_SALT: &[u8] = b"ctxguard-scope-key-v1";

const MACHINE_ID_PATHS: [&str; 2] = ["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Which OS identity a cipher is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtectionScope {
    /// Same user on the same machine.
    CurrentUser,
    /// Any user on the same machine.
    LocalMachine,
}

impl ProtectionScope {
    fn label(self) -> &'static str {
        match self {
            ProtectionScope::CurrentUser => "current-user",
            ProtectionScope::LocalMachine => "local-machine",
        }
    }
}

static CURRENT_USER_KEY: OnceLock<Result<Zeroizing<[u8; KEY_SIZE]>, String>> = OnceLock::new();
static LOCAL_MACHINE_KEY: OnceLock<Result<Zeroizing<[u8; KEY_SIZE]>, String>> = OnceLock::new();

/// Returns the scope key for `scope`, deriving it on first use.
pub(crate) fn scope_key(scope: ProtectionScope) -> EncryptorResult<&'static [u8; KEY_SIZE]> {
    let cell = match scope {
        ProtectionScope::CurrentUser => &CURRENT_USER_KEY,
        ProtectionScope::LocalMachine => &LOCAL_MACHINE_KEY,
    };
    match cell.get_or_init(|| derive_scope_key(scope).map_err(|e| e.to_string())) {
        Ok(key) => Ok(&**key),
        Err(msg) => Err(EncryptorError::Security(msg.clone())),
    }
}

fn derive_scope_key(scope: ProtectionScope) -> EncryptorResult<Zeroizing<[u8; KEY_SIZE]>> {
    let mut material = Zeroizing::new(format!("ctxguard/{}/{}", scope.label(), machine_identity()?));
    if scope == ProtectionScope::CurrentUser {
        material.push('/');
        material.push_str(&user_identity()?);
    }

    let params = Params::new(19 * 1024, 2, 1, Some(KEY_SIZE))
        .map_err(|e| EncryptorError::Crypto(format!("invalid argon2 params: {e}")))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    argon
        .hash_password_into(material.as_bytes(), SCOPE_SALT, &mut key[..])
        .map_err(|e| EncryptorError::Crypto(format!("scope key derivation failed: {e}")))?;

    debug!(scope = scope.label(), "derived scope key");
    Ok(key)
}

fn machine_identity() -> EncryptorResult<String> {
    for path in MACHINE_ID_PATHS {
        if let Ok(id) = std::fs::read_to_string(path) {
            let id = id.trim();
            if !id.is_empty() {
                return Ok(format!("machine-id:{id}"));
            }
        }
    }
    hostname::get()
        .map(|h| format!("host:{}", h.to_string_lossy()))
        .map_err(|e| EncryptorError::Security(format!("cannot resolve machine identity: {e}")))
}

#[cfg(unix)]
fn user_identity() -> EncryptorResult<String> {
    // SAFETY: geteuid has no preconditions and never fails.
    let uid = unsafe { libc::geteuid() };
    Ok(format!("uid:{uid}"))
}

#[cfg(not(unix))]
fn user_identity() -> EncryptorResult<String> {
    std::env::var("USERNAME")
        .map(|user| format!("user:{user}"))
        .map_err(|_| EncryptorError::Security("cannot resolve current user identity".into()))
}
