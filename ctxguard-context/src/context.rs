//! The workflow context store.
//!
//! Keys and group names are case-insensitive. Every write asks the
//! classification authority about the key; high-impact values are serialized
//! and encrypted with the store's encryptor before they are stored, and
//! decrypted again on every read. All other values are stored as written.
//!
//! Protection fails open and unprotection fails closed: a value that cannot be
//! protected is stored as written, and a protected value that cannot be
//! recovered reads as absent.
//!
//! A store is owned by one workflow at a time. Mutators take `&mut self` and
//! there is no internal locking; wrap the store in a `Mutex` to share it.

use crate::classification::ClassificationAuthority;
use crate::config::ContextConfig;
use crate::error::{require, ContextError, ContextResult};
use crate::keymap::{fold, same_key, KeyMap};
use crate::value::{ContextValue, StoredItem};
use ctxguard_crypto::{
    DataEncryptor, EncryptionAdapter, EncryptorError, SerializationAdapter, TypeTag, UserDataEncryptor,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Group used when a write names none.
pub const DEFAULT_GROUP_NAME: &str = "Default";

/// Keyed, grouped container that encrypts high-impact values in memory.
pub struct WorkflowContext {
    pub(crate) id: Uuid,
    pub(crate) default_group_name: String,
    pub(crate) items: KeyMap<StoredItem>,
    pub(crate) groups: KeyMap<Vec<String>>,
    pub(crate) encryptor: Arc<dyn DataEncryptor>,
    pub(crate) classifier: Arc<dyn ClassificationAuthority>,
}

impl WorkflowContext {
    /// Creates an empty store with a fresh id, the `"Default"` group and the
    /// shared current-user encryptor.
    pub fn new(classifier: Arc<dyn ClassificationAuthority>) -> Self {
        Self {
            id: Uuid::new_v4(),
            default_group_name: DEFAULT_GROUP_NAME.to_owned(),
            items: KeyMap::new(),
            groups: KeyMap::new(),
            encryptor: UserDataEncryptor::current_user(),
            classifier,
        }
    }

    /// Creates an empty store from validated configuration.
    pub fn from_config(config: &ContextConfig, classifier: Arc<dyn ClassificationAuthority>) -> ContextResult<Self> {
        config.validate()?;
        let mut context = Self::new(classifier);
        context.default_group_name = config.default_group_name.clone();
        context.encryptor = config.encryptor.resolve();
        Ok(context)
    }

    // ========================================================================
    // Properties
    // ========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    pub fn default_group_name(&self) -> &str {
        &self.default_group_name
    }

    pub fn set_default_group_name(&mut self, name: &str) -> ContextResult<()> {
        require(name, "default group name")?;
        self.default_group_name = name.to_owned();
        Ok(())
    }

    pub fn encryptor(&self) -> &Arc<dyn DataEncryptor> {
        &self.encryptor
    }

    /// Replaces the encryptor; `None` restores the shared current-user
    /// encryptor. Values already protected are not re-encrypted, so they only
    /// read back if the new encryptor can decrypt them.
    pub fn set_encryptor(&mut self, encryptor: Option<Arc<dyn DataEncryptor>>) {
        self.encryptor = encryptor.unwrap_or_else(|| UserDataEncryptor::current_user());
    }

    pub fn classifier(&self) -> &Arc<dyn ClassificationAuthority> {
        &self.classifier
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys()
    }

    pub fn item_keys(&self) -> impl Iterator<Item = &str> {
        self.items.keys()
    }

    /// Member keys of every group, in group-name order.
    pub fn group_values(&self) -> impl Iterator<Item = &[String]> {
        self.groups.values().map(Vec::as_slice)
    }

    /// Every readable value, in key order. Protected values that cannot be
    /// recovered are skipped.
    pub fn item_values(&self) -> ContextResult<Vec<ContextValue>> {
        let mut values = Vec::with_capacity(self.items.len());
        for (key, item) in self.items.iter() {
            if let Some(value) = self.unprotect(key, item)? {
                values.push(value);
            }
        }
        Ok(values)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Stores `value` under `key`, replacing any previous value, and registers
    /// the key in `group` (or the default group).
    pub fn add(&mut self, key: &str, value: impl Into<ContextValue>, group: Option<&str>) -> ContextResult<()> {
        let value = value.into();
        let group = match group {
            Some(group) if !group.trim().is_empty() => group.to_owned(),
            _ => {
                require(&self.default_group_name, "group name and default group name")?;
                self.default_group_name.clone()
            }
        };
        require(key, "key")?;
        if value.is_null() {
            return Err(ContextError::Validation(format!("value cannot be null for key {key}")));
        }

        self.add_to_group(&group, key)?;
        self.remove(key)?;

        let item = self.protect(key, value)?;
        self.items.insert(key, item);
        Ok(())
    }

    /// Serializes `value` and stores it like [`WorkflowContext::add`].
    pub fn add_serialized<T: serde::Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
        group: Option<&str>,
    ) -> ContextResult<()> {
        self.add(key, ContextValue::from_serialize(value)?, group)
    }

    /// Registers `key` in `group` without touching its value. Idempotent.
    pub fn add_to_group(&mut self, group: &str, key: &str) -> ContextResult<()> {
        require(group, "group name")?;
        require(key, "key")?;
        let members = self.groups.get_or_insert_with(group, Vec::new);
        if !members.iter().any(|member| same_key(member, key)) {
            members.push(key.to_owned());
        }
        Ok(())
    }

    /// Removes the value under `key`. Group membership is left alone.
    pub fn remove(&mut self, key: &str) -> ContextResult<bool> {
        require(key, "key")?;
        Ok(self.items.remove(key).is_some())
    }

    /// Removes every value of `group` and empties its key list. The group
    /// itself stays registered. `false` if the group is unknown or empty.
    pub fn remove_group(&mut self, group: &str) -> ContextResult<bool> {
        require(group, "group name")?;
        let Some(members) = self.groups.get_mut(group) else {
            return Ok(false);
        };
        if members.is_empty() {
            return Ok(false);
        }

        for key in std::mem::take(members) {
            self.items.remove(&key);
        }
        Ok(true)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.groups.clear();
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Reads the value under `key`, decrypting it if it was protected.
    ///
    /// `None` when the key is unknown or a protected value cannot be
    /// recovered.
    pub fn get(&self, key: &str) -> ContextResult<Option<ContextValue>> {
        require(key, "key")?;
        match self.items.get(key) {
            Some(item) => self.unprotect(key, item),
            None => Ok(None),
        }
    }

    /// Reads the value under `key` as `T`. Any failure past key validation
    /// reads as `None`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> ContextResult<Option<T>> {
        require(key, "key")?;
        Ok(self.get(key).ok().flatten().and_then(|value| value.deserialize()))
    }

    /// Like [`WorkflowContext::get_as`], falling back to `T::default()`.
    pub fn get_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> ContextResult<T> {
        Ok(self.get_as(key)?.unwrap_or_default())
    }

    /// Reads an opaque value stored under `key`.
    pub fn get_opaque<T: Any + Send + Sync>(&self, key: &str) -> ContextResult<Option<Arc<T>>> {
        require(key, "key")?;
        Ok(self.get(key).ok().flatten().and_then(|value| value.downcast()))
    }

    pub fn contains(&self, key: &str) -> ContextResult<bool> {
        require(key, "key")?;
        Ok(self.items.contains(key))
    }

    /// Type of the value under `key` as written, without decrypting it.
    pub fn value_type(&self, key: &str) -> ContextResult<Option<TypeTag>> {
        require(key, "key")?;
        Ok(self.items.get(key).map(|item| item.value_type().clone()))
    }

    /// The values of `group` that can be read, keyed case-insensitively by
    /// their spelling in the group.
    pub fn group(&self, group: &str) -> ContextResult<KeyMap<ContextValue>> {
        let mut values = KeyMap::new();
        for key in self.group_item_keys(group)? {
            if let Some(value) = self.get(&key)? {
                values.insert(&key, value);
            }
        }
        Ok(values)
    }

    /// Keys registered in `group`, in registration order. Empty for unknown groups.
    pub fn group_item_keys(&self, group: &str) -> ContextResult<Vec<String>> {
        require(group, "group name")?;
        Ok(self.groups.get(group).cloned().unwrap_or_default())
    }

    /// What is actually stored under `key`.
    pub fn stored(&self, key: &str) -> Option<&StoredItem> {
        self.items.get(key)
    }

    // ========================================================================
    // Protection
    // ========================================================================

    fn protect(&self, key: &str, value: ContextValue) -> ContextResult<StoredItem> {
        let ContextValue::Data { type_tag, value: data } = &value else {
            return Ok(StoredItem::Raw(value));
        };
        if !self.classifier.classify(key).requires_protection() {
            return Ok(StoredItem::Raw(value));
        }

        let entropy = fold(key);
        let encryptor = self.encryptor.as_ref();
        let created = SerializationAdapter::create(data, type_tag.clone(), |bytes| {
            EncryptionAdapter::encrypt(encryptor, &entropy, bytes)
        });

        match created {
            Ok(adapter) => Ok(StoredItem::Protected(adapter)),
            Err(e) if e.is_protection_failure() => {
                debug!(key, error = %e, "value could not be protected; storing it as written");
                Ok(StoredItem::Raw(value))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn unprotect(&self, key: &str, item: &StoredItem) -> ContextResult<Option<ContextValue>> {
        let adapter = match item {
            StoredItem::Raw(value) => return Ok(Some(value.clone())),
            StoredItem::Protected(adapter) => adapter,
        };

        let entropy = fold(key);
        let encryptor = self.encryptor.as_ref();
        let read: Result<Value, EncryptorError> = adapter.read(|inner| inner.decrypt(encryptor, &entropy));

        match read {
            Ok(value) => Ok(Some(ContextValue::Data { type_tag: adapter.data_type().clone(), value })),
            Err(e) if e.is_protection_failure() => {
                debug!(key, error = %e, "protected value could not be recovered");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    // ========================================================================
    // Equality
    // ========================================================================

    /// Approximate equality, meant for tests.
    ///
    /// Compares ids, default group names, encryptor kinds, group names, the
    /// keys of every group, item keys, and the display form of every readable
    /// value. Ciphers are never compared, since the same value encrypts
    /// differently each time.
    pub fn approx_eq(&self, other: &WorkflowContext) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.default_group_name != other.default_group_name
            || self.id != other.id
            || self.encryptor.kind() != other.encryptor.kind()
        {
            return false;
        }

        if !same_names(self.groups.keys(), other.groups.keys()) {
            return false;
        }
        for (name, members) in self.groups.iter() {
            let theirs = other.groups.get(name).map(Vec::as_slice).unwrap_or_default();
            if !same_names(members.iter().map(String::as_str), theirs.iter().map(String::as_str)) {
                return false;
            }
        }

        if !same_names(self.items.keys(), other.items.keys()) {
            return false;
        }
        self.items.keys().all(|key| match (self.get(key), other.get(key)) {
            (Ok(mine), Ok(theirs)) => mine.map(|v| v.to_string()) == theirs.map(|v| v.to_string()),
            _ => false,
        })
    }
}

/// Order-insensitive, case-sensitive comparison of two name lists.
fn same_names<'a>(a: impl Iterator<Item = &'a str>, b: impl Iterator<Item = &'a str>) -> bool {
    let mut a: Vec<&str> = a.collect();
    let mut b: Vec<&str> = b.collect();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

impl fmt::Debug for WorkflowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowContext")
            .field("id", &self.id)
            .field("default_group_name", &self.default_group_name)
            .field("groups", &self.groups.len())
            .field("items", &self.items.len())
            .field("encryptor", &self.encryptor.kind())
            .finish()
    }
}
