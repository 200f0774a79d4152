use ctxguard_crypto::{
    DataEncryptor, DataEncryptorSession, EncryptorDescriptor, EncryptorError, ProtectionScope,
    StringEncryptor, UserDataEncryptor, NONCE_SIZE, TAG_SIZE,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[test]
fn current_user_round_trip() {
    let encryptor = UserDataEncryptor::current_user();
    let cipher = encryptor.encrypt("ACCOUNT", b"4111-1111").unwrap();
    assert_ne!(cipher.as_slice(), b"4111-1111");
    assert_eq!(encryptor.decrypt("ACCOUNT", &cipher).unwrap().as_slice(), b"4111-1111");
}

#[test]
fn local_machine_round_trip() {
    let encryptor = UserDataEncryptor::local_machine();
    assert_eq!(encryptor.scope(), ProtectionScope::LocalMachine);
    let cipher = encryptor.encrypt("", b"machine data").unwrap();
    assert_eq!(encryptor.decrypt("", &cipher).unwrap().as_slice(), b"machine data");
}

#[test]
fn empty_buffer_round_trips() {
    let encryptor = UserDataEncryptor::current_user();
    let cipher = encryptor.encrypt("EMPTY", &[]).unwrap();
    assert_eq!(cipher.len(), NONCE_SIZE + TAG_SIZE);
    assert!(encryptor.decrypt("EMPTY", &cipher).unwrap().is_empty());
}

#[test]
fn same_plaintext_encrypts_differently() {
    let encryptor = UserDataEncryptor::current_user();
    let a = encryptor.encrypt("K", b"same").unwrap();
    let b = encryptor.encrypt("K", b"same").unwrap();
    assert_ne!(a, b);
}

// ── Entropy binding ──────────────────────────────────────────────

#[test]
fn wrong_key_fails_with_crypto_error() {
    let encryptor = UserDataEncryptor::current_user();
    let cipher = encryptor.encrypt("RIGHT", b"bound").unwrap();
    let err = encryptor.decrypt("WRONG", &cipher).unwrap_err();
    assert!(matches!(err, EncryptorError::Crypto(_)));
}

#[test]
fn key_comparison_is_exact() {
    let encryptor = UserDataEncryptor::current_user();
    let cipher = encryptor.encrypt("Account", b"bound").unwrap();
    assert!(encryptor.decrypt("ACCOUNT", &cipher).is_err());
}

#[test]
fn scopes_do_not_share_ciphers() {
    let cipher = UserDataEncryptor::current_user().encrypt("K", b"user only").unwrap();
    let err = UserDataEncryptor::local_machine().decrypt("K", &cipher).unwrap_err();
    assert!(matches!(err, EncryptorError::Crypto(_)));
}

#[test]
fn corrupted_cipher_fails_with_crypto_error() {
    let encryptor = UserDataEncryptor::current_user();
    let mut cipher = encryptor.encrypt("K", b"tamper me").unwrap();
    let last = cipher.len() - 1;
    cipher[last] ^= 0x01;
    assert!(matches!(encryptor.decrypt("K", &cipher), Err(EncryptorError::Crypto(_))));
}

#[test]
fn truncated_cipher_fails_with_crypto_error() {
    let encryptor = UserDataEncryptor::current_user();
    assert!(matches!(encryptor.decrypt("K", &[0u8; 5]), Err(EncryptorError::Crypto(_))));
}

// ── Legacy no-entropy variant ────────────────────────────────────

#[test]
fn without_entropy_round_trip() {
    let encryptor = UserDataEncryptor::local_machine();
    let cipher = encryptor.encrypt_without_entropy(b"legacy").unwrap();
    assert_eq!(encryptor.decrypt_without_entropy(&cipher).unwrap().as_slice(), b"legacy");
}

#[test]
fn entropy_and_no_entropy_ciphers_are_not_interchangeable() {
    let encryptor = UserDataEncryptor::current_user();
    let legacy = encryptor.encrypt_without_entropy(b"legacy").unwrap();
    assert!(encryptor.decrypt("", &legacy).is_err());

    let modern = encryptor.encrypt("", b"modern").unwrap();
    assert!(encryptor.decrypt_without_entropy(&modern).is_err());
}

// ── Shared instances ─────────────────────────────────────────────

#[test]
fn instances_are_process_wide_singletons() {
    assert!(Arc::ptr_eq(&UserDataEncryptor::current_user(), &UserDataEncryptor::current_user()));
    assert!(Arc::ptr_eq(&UserDataEncryptor::local_machine(), &UserDataEncryptor::local_machine()));
    assert!(!Arc::ptr_eq(&UserDataEncryptor::current_user(), &UserDataEncryptor::local_machine()));
}

#[test]
fn descriptor_resolves_to_shared_instance() {
    let encryptor = UserDataEncryptor::current_user();
    let descriptor = encryptor.descriptor().unwrap();
    assert_eq!(descriptor, EncryptorDescriptor::CurrentUser);

    let bytes = descriptor.to_bytes().unwrap();
    let resolved = EncryptorDescriptor::from_bytes(&bytes).unwrap().resolve();
    assert_eq!(resolved.kind(), "current-user");

    let cipher = resolved.encrypt("K", b"via descriptor").unwrap();
    assert_eq!(encryptor.decrypt("K", &cipher).unwrap().as_slice(), b"via descriptor");
}

#[test]
fn descriptor_serializes_as_marker() {
    let json = String::from_utf8(EncryptorDescriptor::LocalMachine.to_bytes().unwrap()).unwrap();
    assert_eq!(json, r#""local_machine""#);
    assert_eq!(EncryptorDescriptor::default(), EncryptorDescriptor::CurrentUser);
}

#[test]
fn unknown_descriptor_is_a_serialization_error() {
    let err = EncryptorDescriptor::from_bytes(br#""vault""#).unwrap_err();
    assert!(matches!(err, EncryptorError::Serialization(_)));
}

// ── Sessions ─────────────────────────────────────────────────────

#[test]
fn stateless_session_shares_ciphers_with_its_encryptor() {
    let encryptor = UserDataEncryptor::current_user();
    let session = encryptor.create_session().unwrap();
    let cipher = session.encrypt("K", b"from session").unwrap();
    assert_eq!(encryptor.decrypt("K", &cipher).unwrap().as_slice(), b"from session");
}

#[test]
fn stateless_session_rejects_use_after_close() {
    let mut session = UserDataEncryptor::current_user().create_session().unwrap();
    session.close();
    session.close();
    assert!(session.is_closed());
    assert!(matches!(session.encrypt("K", b"x"), Err(EncryptorError::Disposed)));
    assert!(matches!(session.decrypt("K", b"x"), Err(EncryptorError::Disposed)));
}

// ── String front-end ─────────────────────────────────────────────

#[test]
fn string_encryptor_round_trip() {
    let strings = StringEncryptor::new(UserDataEncryptor::current_user());
    let encoded = strings.encrypt("NAME", "Jane Q. Public").unwrap();
    assert!(!encoded.contains("Jane"));
    assert_eq!(strings.decrypt("NAME", &encoded).unwrap().as_str(), "Jane Q. Public");
}

#[test]
fn string_encryptor_rejects_invalid_base64() {
    let strings = StringEncryptor::new(UserDataEncryptor::current_user());
    let err = strings.decrypt("NAME", "not base64!").unwrap_err();
    assert!(matches!(err, EncryptorError::Serialization(_)));
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn any_buffer_round_trips(key in "[A-Za-z0-9_]{0,16}", data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let encryptor = UserDataEncryptor::current_user();
            let cipher = encryptor.encrypt(&key, &data).unwrap();
            prop_assert_eq!(cipher.len(), data.len() + NONCE_SIZE + TAG_SIZE);
            let plain = encryptor.decrypt(&key, &cipher).unwrap();
            prop_assert_eq!(plain.as_slice(), data.as_slice());
        }
    }
}
