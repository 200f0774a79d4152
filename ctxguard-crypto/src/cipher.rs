//! ChaCha20-Poly1305 sealing used by the scope-bound encryptors.
//!
//! Wire format: `[ nonce (12 bytes) | ciphertext + tag (16 bytes) ]`.
//! The associated data carries the caller entropy, so a cipher opened with
//! different entropy fails authentication.

use crate::error::{EncryptorError, EncryptorResult};
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use zeroize::Zeroizing;

/// Size of a ChaCha20-Poly1305 key in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of the nonce prepended to every cipher.
pub const NONCE_SIZE: usize = 12;

/// Size of the Poly1305 authentication tag.
pub const TAG_SIZE: usize = 16;

/// Encrypts `plaintext` under `key`, binding `aad` into the tag.
pub fn seal(key: &[u8; KEY_SIZE], plaintext: &[u8], aad: &[u8]) -> EncryptorResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| EncryptorError::Crypto(format!("invalid scope key: {e}")))?;
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg: plaintext, aad })
        .map_err(|e| EncryptorError::Crypto(format!("seal failed: {e}")))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypts a sealed buffer produced by [`seal`] with the same `aad`.
pub fn open(key: &[u8; KEY_SIZE], sealed: &[u8], aad: &[u8]) -> EncryptorResult<Zeroizing<Vec<u8>>> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(EncryptorError::Crypto(format!(
            "cipher too short: {} bytes",
            sealed.len()
        )));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);

    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| EncryptorError::Crypto(format!("invalid scope key: {e}")))?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| {
            EncryptorError::Crypto("open failed (wrong scope, wrong entropy or tampered data)".into())
        })?;

    Ok(Zeroizing::new(plaintext))
}
