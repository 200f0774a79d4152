//! RSA encryptor with chunked block encryption.
//!
//! RSA-OAEP bounds the plaintext of one operation, so longer buffers are split
//! into blocks that are encrypted one by one and concatenated. Cipher blocks
//! are always a full key size long, which is what decryption splits on.

use crate::certificate::{Certificate, CertificateStore, StoreLocation, StoreName};
use crate::encryptor::{DataEncryptor, DataEncryptorSession};
use crate::error::{EncryptorError, EncryptorResult};
use crate::key::{
    KeyKind, KeyMaterial, KeyMaterialSource, LegacyKeyStore, LegacyStoreKeySource, ProtectedKeySource,
};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::sync::Arc;
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

/// Strength of generated keys, in bits.
pub const KEY_BITS: usize = 2048;

/// Bytes of every block lost to OAEP with SHA-256 (`2 * 32 + 2`).
pub const PADDING_OVERHEAD: usize = 66;

/// Maximum plaintext block for a key of `key_size` bytes. Zero when the key
/// is too small for the padding.
pub fn encrypt_block_size(key_size: usize) -> usize {
    key_size.saturating_sub(PADDING_OVERHEAD)
}

/// RSA encryptor that fetches its key material for every operation.
pub struct AsymmetricDataEncryptor {
    source: Arc<dyn KeyMaterialSource>,
}

impl AsymmetricDataEncryptor {
    pub fn new(source: Arc<dyn KeyMaterialSource>) -> Self {
        Self { source }
    }

    /// Generates a fresh private key. The caller owns the material in the
    /// clear and should protect or drop it right away.
    pub fn generate_key() -> EncryptorResult<KeyMaterial> {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), KEY_BITS)
            .map_err(|e| EncryptorError::Crypto(format!("key generation failed: {e}")))?;
        KeyMaterial::from_private_key(&key)
    }

    /// Builds an encryptor around a freshly generated key, protected in
    /// memory under the current user.
    pub fn generate_random() -> EncryptorResult<Self> {
        let source = ProtectedKeySource::protect(Self::generate_key()?)?;
        debug!(bits = KEY_BITS, "generated in-memory RSA key");
        Ok(Self::new(Arc::new(source)))
    }

    /// Builds an encryptor from the legacy key store. Returns `Ok(None)` when
    /// the store has no key. The stored value is only validated on first use.
    pub fn read_legacy_store(store: &dyn LegacyKeyStore) -> EncryptorResult<Option<Self>> {
        match store.read_value()? {
            None => Ok(None),
            Some(encoded) => {
                let source = LegacyStoreKeySource::from_store_value(&encoded)?;
                Ok(Some(Self::new(Arc::new(source))))
            }
        }
    }

    /// Builds an encryptor from the private key of the first certificate
    /// matching `selector`.
    pub fn load_certificate_private_key<F>(
        store: &dyn CertificateStore,
        location: StoreLocation,
        name: StoreName,
        selector: F,
    ) -> EncryptorResult<Self>
    where
        F: Fn(&Certificate) -> bool,
    {
        Self::load_certificate_key(store, location, name, selector, Certificate::private_key_material)
    }

    /// Builds an encrypt-only encryptor from the public key of the first
    /// certificate matching `selector`.
    pub fn load_certificate_public_key<F>(
        store: &dyn CertificateStore,
        location: StoreLocation,
        name: StoreName,
        selector: F,
    ) -> EncryptorResult<Self>
    where
        F: Fn(&Certificate) -> bool,
    {
        Self::load_certificate_key(store, location, name, selector, |cert| Ok(cert.public_key_material()))
    }

    fn load_certificate_key<F, K>(
        store: &dyn CertificateStore,
        location: StoreLocation,
        name: StoreName,
        selector: F,
        key_selector: K,
    ) -> EncryptorResult<Self>
    where
        F: Fn(&Certificate) -> bool,
        K: FnOnce(&Certificate) -> EncryptorResult<KeyMaterial>,
    {
        let certificates = store.certificates(location, name)?;
        let certificate = certificates.iter().find(|cert| selector(cert)).ok_or_else(|| {
            EncryptorError::InvalidOperation("the requested certificate could not be loaded".into())
        })?;

        let source = ProtectedKeySource::protect(key_selector(certificate)?)?;
        debug!(subject = certificate.subject(), "loaded certificate key");
        Ok(Self::new(Arc::new(source)))
    }
}

impl DataEncryptor for AsymmetricDataEncryptor {
    fn encrypt(&self, _key: &str, data: &[u8]) -> EncryptorResult<Vec<u8>> {
        let handle = RsaHandle::instantiate(self.source.as_ref())?;
        handle.encrypt(data)
    }

    fn decrypt(&self, _key: &str, cipher: &[u8]) -> EncryptorResult<Zeroizing<Vec<u8>>> {
        let handle = RsaHandle::instantiate(self.source.as_ref())?;
        handle.decrypt(cipher)
    }

    fn create_session(&self) -> EncryptorResult<Box<dyn DataEncryptorSession>> {
        Ok(Box::new(AsymmetricSession::open(self.source.clone())?))
    }

    fn kind(&self) -> &'static str {
        "asymmetric"
    }
}

// ============================================================================
// Instantiated algorithm
// ============================================================================

/// One instantiated RSA key. The private key wipes itself on drop.
enum RsaHandle {
    Private { private: RsaPrivateKey, public: RsaPublicKey },
    Public(RsaPublicKey),
}

impl RsaHandle {
    fn instantiate(source: &dyn KeyMaterialSource) -> EncryptorResult<Self> {
        let material = source.fetch()?;
        match material.kind() {
            KeyKind::Private => {
                let private = material.private_key()?;
                let public = RsaPublicKey::from(&private);
                Ok(RsaHandle::Private { private, public })
            }
            KeyKind::Public => Ok(RsaHandle::Public(material.public_key()?)),
        }
    }

    fn public(&self) -> &RsaPublicKey {
        match self {
            RsaHandle::Private { public, .. } => public,
            RsaHandle::Public(public) => public,
        }
    }

    fn key_size(&self) -> usize {
        self.public().size()
    }

    fn encrypt(&self, data: &[u8]) -> EncryptorResult<Vec<u8>> {
        let block_size = encrypt_block_size(self.key_size());
        if block_size == 0 {
            return Err(EncryptorError::Crypto(format!(
                "{}-byte key is too small for OAEP padding",
                self.key_size()
            )));
        }
        let mut rng = rand::thread_rng();
        let blocks = split_blocks(block_size, data)
            .map(|block| {
                self.public()
                    .encrypt(&mut rng, Oaep::new::<Sha256>(), block)
                    .map_err(|e| EncryptorError::Crypto(format!("block encryption failed: {e}")))
            })
            .collect::<EncryptorResult<Vec<_>>>()?;
        Ok(concatenate(blocks))
    }

    fn decrypt(&self, cipher: &[u8]) -> EncryptorResult<Zeroizing<Vec<u8>>> {
        let RsaHandle::Private { private, .. } = self else {
            return Err(EncryptorError::Crypto("a public key cannot decrypt".into()));
        };

        let mut blocks = Vec::new();
        for block in split_blocks(self.key_size(), cipher) {
            match private.decrypt(Oaep::new::<Sha256>(), block) {
                Ok(plain) => blocks.push(plain),
                Err(e) => {
                    blocks.iter_mut().for_each(|b: &mut Vec<u8>| b.zeroize());
                    return Err(EncryptorError::Crypto(format!("block decryption failed: {e}")));
                }
            }
        }
        Ok(Zeroizing::new(concatenate(blocks)))
    }
}

/// Splits `data` into blocks of at most `block_size` bytes. An empty buffer
/// yields a single empty block.
fn split_blocks(block_size: usize, data: &[u8]) -> Box<dyn Iterator<Item = &[u8]> + '_> {
    if data.is_empty() {
        Box::new(std::iter::once(data))
    } else {
        Box::new(data.chunks(block_size))
    }
}

/// Joins blocks in order and wipes each block once copied.
fn concatenate(mut blocks: Vec<Vec<u8>>) -> Vec<u8> {
    let length = blocks.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(length);
    for block in &mut blocks {
        out.extend_from_slice(block);
        block.zeroize();
    }
    out
}

// ============================================================================
// Session
// ============================================================================

/// Stateful RSA session holding one instantiated key for repeated use.
pub struct AsymmetricSession {
    source: Arc<dyn KeyMaterialSource>,
    handle: Option<RsaHandle>,
}

impl AsymmetricSession {
    fn open(source: Arc<dyn KeyMaterialSource>) -> EncryptorResult<Self> {
        let handle = RsaHandle::instantiate(source.as_ref())?;
        Ok(Self { source, handle: Some(handle) })
    }

    fn handle(&self) -> EncryptorResult<&RsaHandle> {
        self.handle.as_ref().ok_or(EncryptorError::Disposed)
    }
}

impl DataEncryptor for AsymmetricSession {
    fn encrypt(&self, _key: &str, data: &[u8]) -> EncryptorResult<Vec<u8>> {
        self.handle()?.encrypt(data)
    }

    fn decrypt(&self, _key: &str, cipher: &[u8]) -> EncryptorResult<Zeroizing<Vec<u8>>> {
        self.handle()?.decrypt(cipher)
    }

    fn create_session(&self) -> EncryptorResult<Box<dyn DataEncryptorSession>> {
        self.handle()?;
        Ok(Box::new(AsymmetricSession::open(self.source.clone())?))
    }

    fn kind(&self) -> &'static str {
        "asymmetric-session"
    }
}

impl DataEncryptorSession for AsymmetricSession {
    fn close(&mut self) {
        if self.handle.take().is_some() {
            debug!("closed asymmetric session");
        }
    }

    fn is_closed(&self) -> bool {
        self.handle.is_none()
    }
}

impl Drop for AsymmetricSession {
    fn drop(&mut self) {
        self.close();
    }
}
