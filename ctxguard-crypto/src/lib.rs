//! Encryption layer for ctxguard.
//!
//! Provides interchangeable data encryptors behind the [`DataEncryptor`] seam:
//! - [`UserDataEncryptor`]: ChaCha20-Poly1305 under a key bound to the OS
//!   identity (current user or local machine), with per-key entropy
//! - [`AsymmetricDataEncryptor`]: RSA-OAEP with chunked block encryption and
//!   stateful sessions
//!
//! # Key material
//!
//! RSA key material is never held in the clear by an encryptor. A
//! [`KeyMaterialSource`] supplies it per operation:
//!
//! 1. **Generated**: a fresh keypair, re-protected under the current user
//!    the moment it exists.
//! 2. **Legacy store**: a machine-scope cipher provisioned out of band.
//! 3. **Certificate store**: the private or public key of a selected
//!    certificate, re-protected under the current user.
//!
//! # Adapters
//!
//! [`SerializationAdapter`] and [`EncryptionAdapter`] turn any serializable
//! value into an opaque, self-describing cipher and back.
//!
//! None of these types lock internally beyond what `Send + Sync` requires;
//! sessions are single-owner.

mod adapter;
mod asymmetric;
mod certificate;
mod cipher;
mod encryptor;
mod error;
mod json;
mod key;
mod scope;
mod string_encryptor;
mod user;

pub use adapter::{EncryptionAdapter, SerializationAdapter, TypeTag};
pub use asymmetric::{
    encrypt_block_size, AsymmetricDataEncryptor, AsymmetricSession, KEY_BITS, PADDING_OVERHEAD,
};
pub use certificate::{Certificate, CertificateStore, InMemoryCertificateStore, StoreLocation, StoreName};
pub use cipher::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use encryptor::{DataEncryptor, DataEncryptorSession, EncryptorDescriptor, StatelessSession};
pub use error::{EncryptorError, EncryptorResult};
pub use json::{from_json_slice, from_json_value, to_json_value, to_json_vec};
pub use key::{
    seal_legacy_key, EnvLegacyKeyStore, KeyKind, KeyMaterial, KeyMaterialSource, LegacyKeyStore,
    LegacyStoreKeySource, ProtectedKeySource, IN_MEMORY_KEY_NAME, LEGACY_KEY_ENV_VAR,
};
pub use scope::ProtectionScope;
pub use string_encryptor::StringEncryptor;
pub use user::UserDataEncryptor;
