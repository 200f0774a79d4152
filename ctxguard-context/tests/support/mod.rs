//! Shared helpers for context store integration tests.

#![allow(dead_code)]

use ctxguard_context::{Classification, ClassificationAuthority, StaticClassifier, WorkflowContext};
use ctxguard_crypto::{
    DataEncryptor, DataEncryptorSession, EncryptorError, EncryptorResult, StatelessSession, UserDataEncryptor,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

/// Routes `tracing` output to the test harness. `RUST_LOG` overrides the filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ctxguard_context=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// `SSN`, `Account.Pin` and `Patient` are high impact, `UserName` internal,
/// `Notes` low impact; everything else unknown.
pub fn test_classifier() -> StaticClassifier {
    StaticClassifier::new(Classification::Unknown)
        .with("SSN", Classification::HighImpact)
        .with("Account.Pin", Classification::HighImpact)
        .with("Patient", Classification::HighImpact)
        .with("UserName", Classification::Internal)
        .with("Notes", Classification::LowImpact)
}

pub fn classifier() -> Arc<dyn ClassificationAuthority> {
    Arc::new(test_classifier())
}

pub fn new_context() -> WorkflowContext {
    init_tracing();
    WorkflowContext::new(classifier())
}

/// Encryptor whose every operation fails with a fixed error.
pub struct FailingEncryptor {
    make: fn() -> EncryptorError,
}

impl FailingEncryptor {
    pub fn crypto() -> Arc<dyn DataEncryptor> {
        Arc::new(Self { make: || EncryptorError::Crypto("refused".into()) })
    }

    pub fn security() -> Arc<dyn DataEncryptor> {
        Arc::new(Self { make: || EncryptorError::Security("access denied".into()) })
    }

    pub fn invalid_operation() -> Arc<dyn DataEncryptor> {
        Arc::new(Self { make: || EncryptorError::InvalidOperation("no key".into()) })
    }
}

impl DataEncryptor for FailingEncryptor {
    fn encrypt(&self, _key: &str, _data: &[u8]) -> EncryptorResult<Vec<u8>> {
        Err((self.make)())
    }

    fn decrypt(&self, _key: &str, _cipher: &[u8]) -> EncryptorResult<Zeroizing<Vec<u8>>> {
        Err((self.make)())
    }

    fn create_session(&self) -> EncryptorResult<Box<dyn DataEncryptorSession>> {
        Err((self.make)())
    }

    fn kind(&self) -> &'static str {
        "failing"
    }
}

/// A current-user session that has already been closed.
pub fn closed_session() -> Arc<dyn DataEncryptor> {
    let mut session = StatelessSession::new(UserDataEncryptor::current_user());
    session.close();
    Arc::new(session)
}
