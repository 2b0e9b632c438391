//! Record shapes, read from a type's `Deserialize` impl.
//!
//! A derived `Deserialize` for a struct calls `deserialize_struct` with the
//! list of (serialized) field names before touching any input. Feeding it a
//! deserializer that records that list and bails out gives us the declared
//! attributes of a record type without needing a value of it.

use serde::de::{self, DeserializeOwned, Deserializer, Visitor};
use serde::forward_to_deserialize_any;

struct FieldCapture<'a> {
    fields: &'a mut Option<&'static [&'static str]>,
}

impl<'de, 'a> Deserializer<'de> for FieldCapture<'a> {
    type Error = de::value::Error;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        Err(de::Error::custom("not a struct"))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        *self.fields = Some(fields);
        Err(de::Error::custom("fields captured"))
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map enum identifier ignored_any
    }
}

/// Serialized field names of `T`, or `None` when `T` is not a plain struct
/// (maps, scalars, enums, and structs using `#[serde(flatten)]`).
pub fn record_fields<T: DeserializeOwned>() -> Option<&'static [&'static str]> {
    let mut fields = None;
    let _ = T::deserialize(FieldCapture {
        fields: &mut fields,
    });
    fields
}
