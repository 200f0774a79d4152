//! Context store configuration.

use crate::classification::{Classification, StaticClassifier};
use crate::context::DEFAULT_GROUP_NAME;
use crate::error::{require, ContextError, ContextResult};
use ctxguard_crypto::EncryptorDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Configuration for new context stores.
///
/// ```toml
/// default_group_name = "Default"
/// encryptor = "current_user"
///
/// [classifications]
/// SSN = "high_impact"
/// UserName = "internal"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Group that receives writes naming no group.
    pub default_group_name: String,

    /// Encryptor protecting high-impact values.
    pub encryptor: EncryptorDescriptor,

    /// Classification per key, used by [`ContextConfig::classifier`].
    pub classifications: BTreeMap<String, Classification>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            default_group_name: DEFAULT_GROUP_NAME.to_string(),
            encryptor: EncryptorDescriptor::default(),
            classifications: BTreeMap::new(),
        }
    }
}

impl ContextConfig {
    pub fn from_toml_str(text: &str) -> ContextResult<Self> {
        let config: ContextConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> ContextResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ContextError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> ContextResult<()> {
        require(&self.default_group_name, "default group name")
            .map_err(|_| ContextError::Config("default_group_name cannot be empty".into()))?;
        if let Some(key) = self.classifications.keys().find(|key| key.trim().is_empty()) {
            return Err(ContextError::Config(format!("classification key {key:?} is blank")));
        }
        Ok(())
    }

    /// Classifier over the configured levels; unlisted keys get `fallback`.
    pub fn classifier(&self, fallback: Classification) -> StaticClassifier {
        StaticClassifier::from_levels(self.classifications.iter().map(|(k, v)| (k, *v)), fallback)
    }
}
