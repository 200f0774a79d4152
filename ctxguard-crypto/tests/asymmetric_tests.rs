use ctxguard_crypto::{
    encrypt_block_size, seal_legacy_key, AsymmetricDataEncryptor, Certificate, DataEncryptor,
    DataEncryptorSession, EncryptorError, EncryptorResult, InMemoryCertificateStore, KeyKind,
    KeyMaterial, ProtectedKeySource, StoreLocation, StoreName, KEY_BITS,
};
use pretty_assertions::assert_eq;
use std::sync::{Arc, LazyLock};
use zeroize::Zeroizing;

/// One generated key shared by the whole file; RSA generation is slow.
static KEY_PEM: LazyLock<String> = LazyLock::new(|| {
    AsymmetricDataEncryptor::generate_key()
        .expect("key generation must succeed")
        .pem()
        .to_owned()
});

static ENCRYPTOR: LazyLock<AsymmetricDataEncryptor> = LazyLock::new(|| encryptor_for(private_material()));

const BLOCK: usize = KEY_BITS / 8 - 66;

fn private_material() -> KeyMaterial {
    KeyMaterial::from_pem(KeyKind::Private, Zeroizing::new(KEY_PEM.clone()))
}

fn encryptor_for(material: KeyMaterial) -> AsymmetricDataEncryptor {
    let source = ProtectedKeySource::protect(material).expect("protecting key material must succeed");
    AsymmetricDataEncryptor::new(Arc::new(source))
}

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn test_certificates() -> InMemoryCertificateStore {
    let private = private_material();
    let public = private.public_half().unwrap();

    let mut store = InMemoryCertificateStore::new();
    store.add(
        StoreLocation::CurrentUser,
        StoreName::My,
        Certificate::from_pem("CN=other", public.pem(), None).unwrap(),
    );
    store.add(
        StoreLocation::CurrentUser,
        StoreName::My,
        Certificate::from_pem("CN=ctxguard", public.pem(), Some(private.pem())).unwrap(),
    );
    store.add(
        StoreLocation::LocalMachine,
        StoreName::TrustedPeople,
        Certificate::from_pem("CN=ctxguard-public", public.pem(), None).unwrap(),
    );
    store
}

// ── Chunking ─────────────────────────────────────────────────────

#[test]
fn block_size_matches_padding_overhead() {
    assert_eq!(encrypt_block_size(KEY_BITS / 8), BLOCK);
}

#[test]
fn round_trips_across_block_boundaries() {
    for len in [0, 1, BLOCK - 1, BLOCK, BLOCK + 1, 10 * BLOCK] {
        let data = patterned(len);
        let cipher = ENCRYPTOR.encrypt("any", &data).unwrap();
        let plain = ENCRYPTOR.decrypt("any", &cipher).unwrap();
        assert_eq!(plain.as_slice(), data.as_slice(), "length {len}");
    }
}

#[test]
fn cipher_is_whole_key_sized_blocks() {
    let key_bytes = KEY_BITS / 8;
    let cases = [(0, 1), (1, 1), (BLOCK, 1), (BLOCK + 1, 2), (10 * BLOCK, 10)];
    for (len, blocks) in cases {
        let cipher = ENCRYPTOR.encrypt("any", &patterned(len)).unwrap();
        assert_eq!(cipher.len(), blocks * key_bytes, "length {len}");
    }
}

#[test]
fn entropy_key_is_not_bound_into_the_cipher() {
    let cipher = ENCRYPTOR.encrypt("FIRST", b"payload").unwrap();
    let plain = ENCRYPTOR.decrypt("SECOND", &cipher).unwrap();
    assert_eq!(plain.as_slice(), b"payload");
}

#[test]
fn corrupted_byte_fails_with_crypto_error() {
    let data = patterned(3 * BLOCK);
    let cipher = ENCRYPTOR.encrypt("any", &data).unwrap();

    for position in [0, cipher.len() / 2, cipher.len() - 1] {
        let mut corrupted = cipher.clone();
        corrupted[position] ^= 0x5A;
        let err = ENCRYPTOR.decrypt("any", &corrupted).unwrap_err();
        assert!(matches!(err, EncryptorError::Crypto(_)), "position {position}: {err:?}");
    }
}

#[test]
fn truncated_cipher_fails_with_crypto_error() {
    let cipher = ENCRYPTOR.encrypt("any", &patterned(BLOCK + 1)).unwrap();
    let err = ENCRYPTOR.decrypt("any", &cipher[..cipher.len() - 1]).unwrap_err();
    assert!(matches!(err, EncryptorError::Crypto(_)));
}

#[test]
fn different_key_cannot_decrypt() {
    let other = AsymmetricDataEncryptor::generate_random().unwrap();
    let cipher = ENCRYPTOR.encrypt("any", b"secret").unwrap();
    assert!(matches!(other.decrypt("any", &cipher), Err(EncryptorError::Crypto(_))));
}

// ── Sessions ─────────────────────────────────────────────────────

#[test]
fn session_round_trips_and_interoperates() {
    let session = ENCRYPTOR.create_session().unwrap();
    let data = patterned(2 * BLOCK + 7);

    let cipher = session.encrypt("any", &data).unwrap();
    assert_eq!(ENCRYPTOR.decrypt("any", &cipher).unwrap().as_slice(), data.as_slice());

    let cipher = ENCRYPTOR.encrypt("any", &data).unwrap();
    assert_eq!(session.decrypt("any", &cipher).unwrap().as_slice(), data.as_slice());
}

#[test]
fn closing_twice_is_a_no_op() {
    let mut session = ENCRYPTOR.create_session().unwrap();
    assert!(!session.is_closed());
    session.close();
    session.close();
    assert!(session.is_closed());
}

#[test]
fn operations_after_close_fail_with_disposed() {
    let mut session = ENCRYPTOR.create_session().unwrap();
    let cipher = session.encrypt("any", b"data").unwrap();
    session.close();

    assert!(matches!(session.encrypt("any", b"data"), Err(EncryptorError::Disposed)));
    assert!(matches!(session.decrypt("any", &cipher), Err(EncryptorError::Disposed)));
    assert!(matches!(session.create_session(), Err(EncryptorError::Disposed)));
}

#[test]
fn session_spawned_from_session_is_independent() {
    let mut first = ENCRYPTOR.create_session().unwrap();
    let second = first.create_session().unwrap();
    first.close();
    assert!(second.encrypt("any", b"still open").is_ok());
}

// ── Legacy store ─────────────────────────────────────────────────

#[test]
fn legacy_store_without_value_yields_none() {
    let store = || -> EncryptorResult<Option<String>> { Ok(None) };
    assert!(AsymmetricDataEncryptor::read_legacy_store(&store).unwrap().is_none());
}

#[test]
fn legacy_store_value_round_trips() {
    let value = seal_legacy_key(&private_material()).unwrap();
    let store = move || -> EncryptorResult<Option<String>> { Ok(Some(value.clone())) };

    let legacy = AsymmetricDataEncryptor::read_legacy_store(&store).unwrap().unwrap();
    let cipher = legacy.encrypt("any", b"legacy data").unwrap();
    assert_eq!(ENCRYPTOR.decrypt("any", &cipher).unwrap().as_slice(), b"legacy data");
}

#[test]
fn legacy_store_rejects_public_material() {
    let public = private_material().public_half().unwrap();
    assert!(matches!(seal_legacy_key(&public), Err(EncryptorError::Validation(_))));
}

#[test]
fn malformed_legacy_value_surfaces_on_use() {
    let store = || -> EncryptorResult<Option<String>> { Ok(Some("bm90IGEgY2lwaGVy".into())) };
    let legacy = AsymmetricDataEncryptor::read_legacy_store(&store).unwrap().unwrap();
    assert!(matches!(legacy.encrypt("any", b"x"), Err(EncryptorError::Crypto(_))));
}

#[test]
fn legacy_value_that_is_not_base64_is_rejected() {
    let store = || -> EncryptorResult<Option<String>> { Ok(Some("%%%".into())) };
    let err = AsymmetricDataEncryptor::read_legacy_store(&store).err().unwrap();
    assert!(matches!(err, EncryptorError::Serialization(_)));
}

// ── Certificate store ────────────────────────────────────────────

#[test]
fn certificate_private_key_round_trips() {
    let store = test_certificates();
    let encryptor = AsymmetricDataEncryptor::load_certificate_private_key(
        &store,
        StoreLocation::CurrentUser,
        StoreName::My,
        |cert| cert.subject() == "CN=ctxguard",
    )
    .unwrap();

    let cipher = encryptor.encrypt("any", b"certificate data").unwrap();
    assert_eq!(encryptor.decrypt("any", &cipher).unwrap().as_slice(), b"certificate data");
}

#[test]
fn certificate_public_key_encrypts_for_private_holder() {
    let store = test_certificates();
    let public = AsymmetricDataEncryptor::load_certificate_public_key(
        &store,
        StoreLocation::LocalMachine,
        StoreName::TrustedPeople,
        |cert| cert.subject().starts_with("CN=ctxguard"),
    )
    .unwrap();

    let cipher = public.encrypt("any", b"for the key holder").unwrap();
    assert!(matches!(public.decrypt("any", &cipher), Err(EncryptorError::Crypto(_))));
    assert_eq!(ENCRYPTOR.decrypt("any", &cipher).unwrap().as_slice(), b"for the key holder");
}

#[test]
fn unmatched_certificate_is_an_invalid_operation() {
    let store = test_certificates();
    let err = AsymmetricDataEncryptor::load_certificate_private_key(
        &store,
        StoreLocation::CurrentUser,
        StoreName::Root,
        |_| true,
    )
    .err()
    .unwrap();
    assert!(matches!(err, EncryptorError::InvalidOperation(_)));
}

#[test]
fn private_key_of_public_only_certificate_is_an_invalid_operation() {
    let store = test_certificates();
    let err = AsymmetricDataEncryptor::load_certificate_private_key(
        &store,
        StoreLocation::CurrentUser,
        StoreName::My,
        |cert| cert.subject() == "CN=other",
    )
    .err()
    .unwrap();
    assert!(matches!(err, EncryptorError::InvalidOperation(_)));
}

#[test]
fn certificate_thumbprint_identifies_the_public_key() {
    let private = private_material();
    let public = private.public_half().unwrap();
    let a = Certificate::from_pem("CN=a", public.pem(), None).unwrap();
    let b = Certificate::from_pem("CN=b", public.pem(), Some(private.pem())).unwrap();
    assert_eq!(a.thumbprint(), b.thumbprint());
    assert_eq!(a.thumbprint().len(), 64);
    assert!(b.has_private_key());
}

#[test]
fn mismatched_certificate_halves_are_rejected() {
    let other = AsymmetricDataEncryptor::generate_key().unwrap();
    let public = private_material().public_half().unwrap();
    let err = Certificate::from_pem("CN=bad", public.pem(), Some(other.pem())).unwrap_err();
    assert!(matches!(err, EncryptorError::Crypto(_)));
}
