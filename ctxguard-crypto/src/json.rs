//! JSON conversions that keep non-finite floats.
//!
//! JSON has no NaN or infinities and `serde_json` writes them as `null`. A
//! top-level non-finite float is written as its text form (`"NaN"`, `"inf"`,
//! `"-inf"`) instead and read back from it.

use serde::de::value::F64Deserializer;
use serde::de::{DeserializeOwned, IntoDeserializer};
use serde::ser::{self, Impossible, Serialize};
use serde_json::Value;

pub fn to_json_value<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Value> {
    match non_finite(value) {
        Some(float) => Ok(Value::String(float.to_string())),
        None => serde_json::to_value(value),
    }
}

pub fn to_json_vec<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
    match non_finite(value) {
        Some(float) => serde_json::to_vec(&float.to_string()),
        None => serde_json::to_vec(value),
    }
}

pub fn from_json_value<T: DeserializeOwned>(value: &Value) -> serde_json::Result<T> {
    serde_json::from_value(value.clone()).or_else(|e| match value.as_str().and_then(parse_non_finite) {
        Some(float) => from_float(float).map_err(|_| e),
        None => Err(e),
    })
}

pub fn from_json_slice<T: DeserializeOwned>(bytes: &[u8]) -> serde_json::Result<T> {
    serde_json::from_slice(bytes).or_else(|e| {
        match serde_json::from_slice::<String>(bytes).ok().as_deref().and_then(parse_non_finite) {
            Some(float) => from_float(float).map_err(|_| e),
            None => Err(e),
        }
    })
}

fn from_float<T: DeserializeOwned>(float: f64) -> serde_json::Result<T> {
    let deserializer: F64Deserializer<serde_json::Error> = float.into_deserializer();
    T::deserialize(deserializer)
}

fn parse_non_finite(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|float| !float.is_finite())
}

/// The value itself when it is a non-finite float, looking through options
/// and newtypes.
fn non_finite<T: Serialize + ?Sized>(value: &T) -> Option<f64> {
    value.serialize(NonFinite).ok().flatten()
}

// ============================================================================
// Detector
// ============================================================================

struct NonFinite;

type Skip = Impossible<Option<f64>, serde_json::Error>;

fn compound() -> serde_json::Error {
    ser::Error::custom("compound value")
}

impl ser::Serializer for NonFinite {
    type Ok = Option<f64>;
    type Error = serde_json::Error;
    type SerializeSeq = Skip;
    type SerializeTuple = Skip;
    type SerializeTupleStruct = Skip;
    type SerializeTupleVariant = Skip;
    type SerializeMap = Skip;
    type SerializeStruct = Skip;
    type SerializeStructVariant = Skip;

    fn serialize_f32(self, v: f32) -> Result<Self::Ok, Self::Error> {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Self::Ok, Self::Error> {
        Ok(Some(v).filter(|v| !v.is_finite()))
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Self::Ok, Self::Error> {
        value.serialize(self)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        value.serialize(self)
    }

    fn serialize_bool(self, _v: bool) -> Result<Self::Ok, Self::Error> {
        Ok(None)
    }

    fn serialize_i8(self, _v: i8) -> Result<Self::Ok, Self::Error> {
        Ok(None)
    }

    fn serialize_i16(self, _v: i16) -> Result<Self::Ok, Self::Error> {
        Ok(None)
    }

    fn serialize_i32(self, _v: i32) -> Result<Self::Ok, Self::Error> {
        Ok(None)
    }

    fn serialize_i64(self, _v: i64) -> Result<Self::Ok, Self::Error> {
        Ok(None)
    }

    fn serialize_u8(self, _v: u8) -> Result<Self::Ok, Self::Error> {
        Ok(None)
    }

    fn serialize_u16(self, _v: u16) -> Result<Self::Ok, Self::Error> {
        Ok(None)
    }

    fn serialize_u32(self, _v: u32) -> Result<Self::Ok, Self::Error> {
        Ok(None)
    }

    fn serialize_u64(self, _v: u64) -> Result<Self::Ok, Self::Error> {
        Ok(None)
    }

    fn serialize_char(self, _v: char) -> Result<Self::Ok, Self::Error> {
        Ok(None)
    }

    fn serialize_str(self, _v: &str) -> Result<Self::Ok, Self::Error> {
        Ok(None)
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<Self::Ok, Self::Error> {
        Ok(None)
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        Ok(None)
    }

    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        Ok(None)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok, Self::Error> {
        Ok(None)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        Ok(None)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        Ok(None)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Err(compound())
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Err(compound())
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Err(compound())
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Err(compound())
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Err(compound())
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct, Self::Error> {
        Err(compound())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Err(compound())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_written_as_text() {
        assert_eq!(to_json_value(&f64::NAN).unwrap(), Value::String("NaN".into()));
        assert_eq!(to_json_vec(&f64::NEG_INFINITY).unwrap(), br#""-inf""#.to_vec());
        assert_eq!(to_json_value(&Some(f32::INFINITY)).unwrap(), Value::String("inf".into()));
    }

    #[test]
    fn finite_values_are_untouched() {
        assert_eq!(to_json_value(&1.5f64).unwrap(), serde_json::json!(1.5));
        assert_eq!(to_json_value(&vec![f64::NAN]).unwrap(), serde_json::json!([null]));
        assert_eq!(to_json_value(&Option::<f64>::None).unwrap(), Value::Null);
    }

    #[test]
    fn non_finite_reads_back_as_float() {
        let nan: f64 = from_json_value(&to_json_value(&f64::NAN).unwrap()).unwrap();
        assert!(nan.is_nan());
        let inf: f64 = from_json_slice(&to_json_vec(&f64::INFINITY).unwrap()).unwrap();
        assert_eq!(inf, f64::INFINITY);
    }

    #[test]
    fn text_stays_text() {
        let text: String = from_json_value(&Value::String("NaN".into())).unwrap();
        assert_eq!(text, "NaN");
        assert!(from_json_value::<f64>(&Value::String("1.5".into())).is_err());
    }
}
