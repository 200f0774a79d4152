//! Protection adapters.
//!
//! An [`EncryptionAdapter`] owns nothing but a cipher. A
//! [`SerializationAdapter`] serializes a value, hands the bytes to an
//! encryption adapter and remembers the value's type, so the type can be
//! inspected without decrypting. Plaintext bytes only ever live inside the
//! call that produced them.

use crate::encryptor::DataEncryptor;
use crate::error::{EncryptorError, EncryptorResult};
use crate::json::{from_json_slice, to_json_vec};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

/// Descriptor of the Rust type a value was written as.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(String);

impl TypeTag {
    pub fn of<T: ?Sized>() -> Self {
        TypeTag(std::any::type_name::<T>().to_owned())
    }

    pub fn new(name: impl Into<String>) -> Self {
        TypeTag(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An opaque cipher buffer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionAdapter {
    cipher: Vec<u8>,
}

impl EncryptionAdapter {
    /// Encrypts `data` with `encryptor`, using `key` as entropy.
    pub fn encrypt(encryptor: &dyn DataEncryptor, key: &str, data: &[u8]) -> EncryptorResult<Self> {
        Ok(Self { cipher: encryptor.encrypt(key, data)? })
    }

    /// Decrypts the cipher. Serialization of the result is the caller's job.
    pub fn decrypt(&self, encryptor: &dyn DataEncryptor, key: &str) -> EncryptorResult<Zeroizing<Vec<u8>>> {
        encryptor.decrypt(key, &self.cipher)
    }

    pub fn cipher(&self) -> &[u8] {
        &self.cipher
    }
}

/// A serialized and encrypted value together with its original type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializationAdapter {
    data_type: TypeTag,
    adapter: EncryptionAdapter,
}

impl SerializationAdapter {
    /// Serializes `value` to JSON and encrypts it through `encrypt`.
    ///
    /// Fails with [`EncryptorError::Validation`] if the value serializes to null.
    /// Non-finite floats are written as text and are not null.
    pub fn create<T, F>(value: &T, data_type: TypeTag, encrypt: F) -> EncryptorResult<Self>
    where
        T: Serialize + ?Sized,
        F: FnOnce(&[u8]) -> EncryptorResult<EncryptionAdapter>,
    {
        let data = Zeroizing::new(to_json_vec(value)?);
        if data.as_slice() == b"null" {
            return Err(EncryptorError::Validation(format!(
                "value of type {data_type} cannot be null"
            )));
        }

        let adapter = encrypt(data.as_slice())?;
        Ok(Self { data_type, adapter })
    }

    /// Decrypts through `decrypt` and deserializes back to `T`.
    pub fn read<T, F>(&self, decrypt: F) -> EncryptorResult<T>
    where
        T: DeserializeOwned,
        F: FnOnce(&EncryptionAdapter) -> EncryptorResult<Zeroizing<Vec<u8>>>,
    {
        let data = decrypt(&self.adapter)?;
        Ok(from_json_slice(&data)?)
    }

    pub fn data_type(&self) -> &TypeTag {
        &self.data_type
    }

    pub fn encryption_adapter(&self) -> &EncryptionAdapter {
        &self.adapter
    }
}
