//! Helpers over JSON documents as the store sees them.

use crate::{INTERNAL_ATTRIBUTES, KEY_ATTRIBUTE};
use serde_json::{Map, Value};

/// The document's `_key`, if it is a non-empty string.
pub fn record_key(document: &Value) -> Option<&str> {
    document
        .get(KEY_ATTRIBUTE)
        .and_then(Value::as_str)
        .filter(|key| !key.is_empty())
}

/// Copy of `document` without `_id` and `_rev`.
pub fn strip_internal(document: &Map<String, Value>) -> Map<String, Value> {
    document
        .iter()
        .filter(|(name, _)| !INTERNAL_ATTRIBUTES.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Whether `remote` carries every attribute of `local` with an equal value.
///
/// Internal attributes are ignored on both sides; `remote` may hold extra
/// attributes. Comparison is per top-level attribute, so nested objects must
/// be equal as a whole.
pub fn contains_attributes(remote: &Map<String, Value>, local: &Map<String, Value>) -> bool {
    local
        .iter()
        .filter(|(name, _)| !INTERNAL_ATTRIBUTES.contains(&name.as_str()))
        .all(|(name, value)| remote.get(name) == Some(value))
}
