//! Certificate store abstraction used by the certificate key-sourcing strategy.

use crate::error::{EncryptorError, EncryptorResult};
use crate::key::{KeyKind, KeyMaterial};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use zeroize::Zeroizing;

/// Which store hierarchy to look in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreLocation {
    CurrentUser,
    LocalMachine,
}

/// Which named store to look in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreName {
    My,
    Root,
    TrustedPeople,
    TrustedPublisher,
    CertificateAuthority,
}

/// An RSA certificate entry: subject, public key and optional private key.
#[derive(Clone)]
pub struct Certificate {
    subject: String,
    thumbprint: String,
    public_key_pem: String,
    private_key_pem: Option<Zeroizing<String>>,
}

impl Certificate {
    /// Builds an entry from PEM text. The thumbprint is the hex SHA-256 of
    /// the public key's DER encoding.
    pub fn from_pem(
        subject: impl Into<String>,
        public_key_pem: &str,
        private_key_pem: Option<&str>,
    ) -> EncryptorResult<Self> {
        let public = RsaPublicKey::from_public_key_pem(public_key_pem)
            .map_err(|e| EncryptorError::Crypto(format!("malformed certificate public key: {e}")))?;
        if let Some(pem) = private_key_pem {
            let private = RsaPrivateKey::from_pkcs8_pem(pem)
                .map_err(|e| EncryptorError::Crypto(format!("malformed certificate private key: {e}")))?;
            if RsaPublicKey::from(&private) != public {
                return Err(EncryptorError::Crypto(
                    "certificate private key does not match its public key".into(),
                ));
            }
        }

        Ok(Self {
            subject: subject.into(),
            thumbprint: thumbprint(&public)?,
            public_key_pem: public_key_pem.to_owned(),
            private_key_pem: private_key_pem.map(|pem| Zeroizing::new(pem.to_owned())),
        })
    }

    /// Builds an entry that carries both halves of `key`.
    pub fn from_private_key(subject: impl Into<String>, key: &RsaPrivateKey) -> EncryptorResult<Self> {
        let private = KeyMaterial::from_private_key(key)?;
        let public = KeyMaterial::from_public_key(&RsaPublicKey::from(key))?;
        Self::from_pem(subject, public.pem(), Some(private.pem()))
    }

    /// Builds a public-only entry.
    pub fn from_public_key(subject: impl Into<String>, key: &RsaPublicKey) -> EncryptorResult<Self> {
        let public = KeyMaterial::from_public_key(key)?;
        Self::from_pem(subject, public.pem(), None)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    pub fn has_private_key(&self) -> bool {
        self.private_key_pem.is_some()
    }

    pub(crate) fn private_key_material(&self) -> EncryptorResult<KeyMaterial> {
        let pem = self.private_key_pem.as_ref().ok_or_else(|| {
            EncryptorError::InvalidOperation(format!(
                "certificate {} has no private key",
                self.subject
            ))
        })?;
        Ok(KeyMaterial::from_pem(KeyKind::Private, pem.clone()))
    }

    pub(crate) fn public_key_material(&self) -> KeyMaterial {
        KeyMaterial::from_pem(KeyKind::Public, Zeroizing::new(self.public_key_pem.clone()))
    }
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("thumbprint", &self.thumbprint)
            .field("has_private_key", &self.has_private_key())
            .finish()
    }
}

fn thumbprint(key: &RsaPublicKey) -> EncryptorResult<String> {
    let der = key
        .to_public_key_der()
        .map_err(|e| EncryptorError::Crypto(format!("public key encoding failed: {e}")))?;
    Ok(hex::encode(Sha256::digest(der.as_bytes())))
}

/// Source of certificates, grouped by location and store name.
pub trait CertificateStore {
    fn certificates(&self, location: StoreLocation, name: StoreName) -> EncryptorResult<Vec<Certificate>>;
}

/// Certificate store held in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCertificateStore {
    stores: HashMap<(StoreLocation, StoreName), Vec<Certificate>>,
}

impl InMemoryCertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, location: StoreLocation, name: StoreName, certificate: Certificate) {
        self.stores.entry((location, name)).or_default().push(certificate);
    }
}

impl CertificateStore for InMemoryCertificateStore {
    fn certificates(&self, location: StoreLocation, name: StoreName) -> EncryptorResult<Vec<Certificate>> {
        Ok(self.stores.get(&(location, name)).cloned().unwrap_or_default())
    }
}
