//! Values held by the context store.

use crate::error::ContextResult;
use ctxguard_crypto::{from_json_value, to_json_value, SerializationAdapter, TypeTag};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A value as the caller sees it.
///
/// `Data` values are kept in their JSON form and can be protected and
/// serialized. `Opaque` values are arbitrary shared objects: they are never
/// protected and make whole-store serialization fail.
#[derive(Clone)]
pub enum ContextValue {
    Data { type_tag: TypeTag, value: Value },
    Opaque { type_tag: TypeTag, value: Arc<dyn Any + Send + Sync> },
}

impl ContextValue {
    /// Captures any serializable value together with its type. A non-finite
    /// float is kept as its text form.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> ContextResult<Self> {
        Ok(ContextValue::Data { type_tag: TypeTag::of::<T>(), value: to_json_value(value)? })
    }

    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        ContextValue::Opaque { type_tag: TypeTag::of::<T>(), value: Arc::new(value) }
    }

    pub fn type_tag(&self) -> &TypeTag {
        match self {
            ContextValue::Data { type_tag, .. } | ContextValue::Opaque { type_tag, .. } => type_tag,
        }
    }

    /// Whether this value stands for "no value".
    pub fn is_null(&self) -> bool {
        matches!(self, ContextValue::Data { value: Value::Null, .. })
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, ContextValue::Opaque { .. })
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ContextValue::Data { value, .. } => Some(value),
            ContextValue::Opaque { .. } => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(Value::as_str)
    }

    /// Converts a `Data` value into `T`. `None` for opaque values or when the
    /// shape does not fit.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Option<T> {
        self.as_json().and_then(|value| from_json_value(value).ok())
    }

    /// Shared handle to an opaque value of type `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            ContextValue::Opaque { value, .. } => value.clone().downcast::<T>().ok(),
            ContextValue::Data { .. } => None,
        }
    }
}

/// Strings print bare, other data prints as JSON text and opaque values print
/// their type.
impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Data { value: Value::String(s), .. } => f.write_str(s),
            ContextValue::Data { value, .. } => write!(f, "{value}"),
            ContextValue::Opaque { type_tag, .. } => f.write_str(type_tag.name()),
        }
    }
}

impl fmt::Debug for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Data { type_tag, value } => {
                f.debug_struct("Data").field("type_tag", type_tag).field("value", value).finish()
            }
            ContextValue::Opaque { type_tag, .. } => {
                f.debug_struct("Opaque").field("type_tag", type_tag).finish_non_exhaustive()
            }
        }
    }
}

impl PartialEq for ContextValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ContextValue::Data { type_tag: a, value: x }, ContextValue::Data { type_tag: b, value: y }) => {
                a == b && x == y
            }
            (ContextValue::Opaque { value: x, .. }, ContextValue::Opaque { value: y, .. }) => Arc::ptr_eq(x, y),
            _ => false,
        }
    }
}

macro_rules! impl_from_json {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for ContextValue {
                fn from(value: $t) -> Self {
                    ContextValue::Data { type_tag: TypeTag::of::<$t>(), value: Value::from(value) }
                }
            }
        )*
    };
}

impl_from_json!(String, bool, i32, i64, u32, u64);

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        let value = if value.is_finite() { Value::from(value) } else { Value::String(value.to_string()) };
        ContextValue::Data { type_tag: TypeTag::of::<f64>(), value }
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::from(value.to_owned())
    }
}

impl From<Value> for ContextValue {
    fn from(value: Value) -> Self {
        ContextValue::Data { type_tag: TypeTag::of::<Value>(), value }
    }
}

// ============================================================================
// Storage form
// ============================================================================

/// What the store actually keeps under a key.
#[derive(Clone, Debug)]
pub enum StoredItem {
    /// Kept as written.
    Raw(ContextValue),
    /// Serialized and encrypted by the store's encryptor.
    Protected(SerializationAdapter),
}

impl StoredItem {
    pub fn is_protected(&self) -> bool {
        matches!(self, StoredItem::Protected(_))
    }

    /// Type of the value as written, readable without decrypting.
    pub fn value_type(&self) -> &TypeTag {
        match self {
            StoredItem::Raw(value) => value.type_tag(),
            StoredItem::Protected(adapter) => adapter.data_type(),
        }
    }
}
