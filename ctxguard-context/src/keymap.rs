//! Case-insensitive string-keyed map that remembers each key's original spelling.

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Folds a key for case-insensitive comparison, one character at a time.
///
/// Characters whose uppercase form is longer than one character (`ß`, `ﬁ`)
/// are kept as they are. Folding never changes a key's length in characters.
pub(crate) fn fold(key: &str) -> String {
    key.chars().map(fold_char).collect()
}

fn fold_char(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(single), None) => single,
        _ => c,
    }
}

pub(crate) fn same_key(a: &str, b: &str) -> bool {
    a == b || fold(a) == fold(b)
}

#[derive(Clone, Debug)]
struct Slot<V> {
    key: String,
    value: V,
}

/// Map with case-insensitive keys, iterated in folded-key order.
///
/// The spelling of the first insertion of a key is kept until the key is
/// removed.
#[derive(Clone, Debug)]
pub struct KeyMap<V> {
    slots: BTreeMap<String, Slot<V>>,
}

impl<V> Default for KeyMap<V> {
    fn default() -> Self {
        Self { slots: BTreeMap::new() }
    }
}

impl<V> KeyMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(&fold(key))
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.slots.get(&fold(key)).map(|slot| &slot.value)
    }

    /// Inserts `value`, keeping the existing spelling of `key` if present.
    pub fn insert(&mut self, key: &str, value: V) -> Option<V> {
        match self.slots.get_mut(&fold(key)) {
            Some(slot) => Some(std::mem::replace(&mut slot.value, value)),
            None => {
                self.slots.insert(fold(key), Slot { key: key.to_owned(), value });
                None
            }
        }
    }

    pub fn get_or_insert_with(&mut self, key: &str, make: impl FnOnce() -> V) -> &mut V {
        &mut self
            .slots
            .entry(fold(key))
            .or_insert_with(|| Slot { key: key.to_owned(), value: make() })
            .value
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.slots.get_mut(&fold(key)).map(|slot| &mut slot.value)
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.slots.remove(&fold(key)).map(|slot| slot.value)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Original spellings, in folded-key order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.values().map(|slot| slot.key.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.slots.values().map(|slot| &slot.value)
    }

    pub fn into_entries(self) -> impl Iterator<Item = (String, V)> {
        self.slots.into_values().map(|slot| (slot.key, slot.value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.slots.values().map(|slot| (slot.key.as_str(), &slot.value))
    }
}

impl<V: Serialize> Serialize for KeyMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for KeyMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = BTreeMap::<String, V>::deserialize(deserializer)?;
        let mut map = KeyMap::new();
        for (key, value) in entries {
            map.insert(&key, value);
        }
        Ok(map)
    }
}
