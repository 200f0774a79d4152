//! Classification-driven, selectively-encrypting workflow context store.
//!
//! A [`WorkflowContext`] is a keyed, grouped container. Every write asks a
//! [`ClassificationAuthority`] about the key; [`Classification::HighImpact`]
//! values are serialized and encrypted with the store's
//! [`DataEncryptor`](ctxguard_crypto::DataEncryptor) and decrypted again on
//! read. Everything else is stored as written.
//!
//! ```no_run
//! use ctxguard_context::{Classification, StaticClassifier, WorkflowContext};
//! use std::sync::Arc;
//!
//! let classifier = StaticClassifier::new(Classification::Internal).with("SSN", Classification::HighImpact);
//! let mut context = WorkflowContext::new(Arc::new(classifier));
//! context.add("UserName", "alice", None)?;
//! context.add("SSN", "123-45-6789", None)?;
//! assert!(context.stored("SSN").unwrap().is_protected());
//! # Ok::<(), ctxguard_context::ContextError>(())
//! ```

mod classification;
mod config;
mod context;
mod error;
mod keymap;
mod serialization;
mod value;

pub use classification::{Classification, ClassificationAuthority, StaticClassifier};
pub use config::ContextConfig;
pub use context::{WorkflowContext, DEFAULT_GROUP_NAME};
pub use error::{ContextError, ContextResult};
pub use keymap::KeyMap;
pub use value::{ContextValue, StoredItem};

pub use ctxguard_crypto::TypeTag;
