//! Data classification levels and the authority that assigns them.
//!
//! The store never decides on its own which keys are sensitive. It asks a
//! [`ClassificationAuthority`] on every write and protects only
//! [`Classification::HighImpact`] values.

use crate::keymap::fold;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sensitivity level of a key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    #[default]
    Unknown,
    Internal,
    LowImpact,
    /// Must be encrypted at rest, even in memory.
    HighImpact,
}

impl Classification {
    pub fn requires_protection(self) -> bool {
        self == Classification::HighImpact
    }
}

/// Assigns a classification to a key name.
pub trait ClassificationAuthority: Send + Sync {
    fn classify(&self, key: &str) -> Classification;
}

impl<F> ClassificationAuthority for F
where
    F: Fn(&str) -> Classification + Send + Sync,
{
    fn classify(&self, key: &str) -> Classification {
        self(key)
    }
}

/// Fixed, case-insensitive key → level table with a fallback level.
#[derive(Clone, Debug, Default)]
pub struct StaticClassifier {
    levels: HashMap<String, Classification>,
    fallback: Classification,
}

impl StaticClassifier {
    pub fn new(fallback: Classification) -> Self {
        Self { levels: HashMap::new(), fallback }
    }

    /// Builds a classifier from `(key, level)` pairs. Later pairs win.
    pub fn from_levels<I, K>(levels: I, fallback: Classification) -> Self
    where
        I: IntoIterator<Item = (K, Classification)>,
        K: AsRef<str>,
    {
        let mut classifier = Self::new(fallback);
        for (key, level) in levels {
            classifier.insert(key.as_ref(), level);
        }
        classifier
    }

    pub fn with(mut self, key: &str, level: Classification) -> Self {
        self.insert(key, level);
        self
    }

    pub fn insert(&mut self, key: &str, level: Classification) {
        self.levels.insert(fold(key), level);
    }

    pub fn fallback(&self) -> Classification {
        self.fallback
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

impl ClassificationAuthority for StaticClassifier {
    fn classify(&self, key: &str) -> Classification {
        self.levels.get(&fold(key)).copied().unwrap_or(self.fallback)
    }
}
