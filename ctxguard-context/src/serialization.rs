//! Whole-store serialization.
//!
//! A serialized store is a record of five independently deserializable
//! fields: the id as 16 raw bytes, the default group name as UTF-16 code
//! units, and byte blobs for the encryptor, the group map and the item map.
//! Protected items stay encrypted inside the item blob, so the blob can only
//! be read back by a process that can use the same encryptor.

use crate::classification::ClassificationAuthority;
use crate::context::WorkflowContext;
use crate::error::{require, ContextError, ContextResult};
use crate::keymap::KeyMap;
use crate::value::{ContextValue, StoredItem};
use ctxguard_crypto::{EncryptorDescriptor, EncryptorError, SerializationAdapter, TypeTag};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Serialize, Deserialize)]
struct SerializedContext {
    id: [u8; 16],
    default_group: Vec<u16>,
    encryptor: Vec<u8>,
    groups: Vec<u8>,
    items: Vec<u8>,
}

/// Storage form of one item.
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum SerializedItem {
    Raw { data_type: TypeTag, value: Value },
    Protected { adapter: SerializationAdapter },
}

impl SerializedItem {
    fn from_stored(key: &str, item: &StoredItem) -> ContextResult<Self> {
        match item {
            StoredItem::Raw(ContextValue::Data { type_tag, value }) => {
                Ok(SerializedItem::Raw { data_type: type_tag.clone(), value: value.clone() })
            }
            StoredItem::Raw(ContextValue::Opaque { type_tag, .. }) => Err(ContextError::Serialization(format!(
                "value of key {key} has non-serializable type {type_tag}"
            ))),
            StoredItem::Protected(adapter) => Ok(SerializedItem::Protected { adapter: adapter.clone() }),
        }
    }

    fn into_stored(self) -> StoredItem {
        match self {
            SerializedItem::Raw { data_type, value } => StoredItem::Raw(ContextValue::Data { type_tag: data_type, value }),
            SerializedItem::Protected { adapter } => StoredItem::Protected(adapter),
        }
    }
}

fn encryptor_blob(e: EncryptorError) -> ContextError {
    ContextError::Serialization(format!("encryptor: {e}"))
}

impl WorkflowContext {
    /// Serializes the whole store, encryptor included.
    ///
    /// Fails with [`ContextError::Serialization`] if the encryptor has no
    /// serializable form or any stored value is opaque.
    pub fn to_bytes(&self) -> ContextResult<Vec<u8>> {
        let descriptor = self.encryptor.descriptor().ok_or_else(|| {
            ContextError::Serialization(format!("encryptor {} cannot be serialized", self.encryptor.kind()))
        })?;

        let mut items = KeyMap::new();
        for (key, item) in self.items.iter() {
            items.insert(key, SerializedItem::from_stored(key, item)?);
        }

        let record = SerializedContext {
            id: *self.id.as_bytes(),
            default_group: self.default_group_name.encode_utf16().collect(),
            encryptor: descriptor.to_bytes().map_err(encryptor_blob)?,
            groups: serde_json::to_vec(&self.groups)?,
            items: serde_json::to_vec(&items)?,
        };
        debug!(id = %self.id, items = self.items.len(), "serialized context");
        Ok(serde_json::to_vec(&record)?)
    }

    /// Restores a store written by [`WorkflowContext::to_bytes`].
    ///
    /// The encryptor resolves to the process-wide shared instance it was
    /// serialized from.
    pub fn from_bytes(bytes: &[u8], classifier: Arc<dyn ClassificationAuthority>) -> ContextResult<Self> {
        let record: SerializedContext = serde_json::from_slice(bytes)?;

        let default_group_name = String::from_utf16(&record.default_group)
            .map_err(|e| ContextError::Serialization(format!("default group name: {e}")))?;
        require(&default_group_name, "default group name")?;
        let encryptor = EncryptorDescriptor::from_bytes(&record.encryptor).map_err(encryptor_blob)?.resolve();
        let groups: KeyMap<Vec<String>> = serde_json::from_slice(&record.groups)?;
        let serialized: KeyMap<SerializedItem> = serde_json::from_slice(&record.items)?;

        let mut items = KeyMap::new();
        for (key, item) in serialized.into_entries() {
            items.insert(&key, item.into_stored());
        }

        let mut context = WorkflowContext::new(classifier);
        context.id = Uuid::from_bytes(record.id);
        context.default_group_name = default_group_name;
        context.encryptor = encryptor;
        context.groups = groups;
        context.items = items;
        debug!(id = %context.id, items = context.items.len(), "deserialized context");
        Ok(context)
    }
}
