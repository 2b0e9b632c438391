//! Seed manifests: seed collections declared in a YAML file.
//!
//! ```yaml
//! collections:
//!   - field: Users
//!     check: keyOnly
//!     records:
//!       - { _key: u1, name: Ann }
//!   - field: Follows
//!     seed: forceUpdate
//!     records:
//!       - { _key: f1, _from: users/u1, _to: users/u2 }
//! ```

use crate::binding::{DocumentBinding, SeedRegistry};
use crate::descriptor::{MatchPolicy, WritePolicy};
use crate::SeedError;
use graphseed_store::CollectionKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedManifest {
    #[serde(default)]
    pub collections: Vec<ManifestCollection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestCollection {
    /// Field name; the collection name is derived from it.
    pub field: String,
    /// `document` or `edge`; inferred from the records when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<CollectionKind>,
    /// Match tag, `keyOnly` for key-only matching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    /// Write tag, `forceUpdate` for replace-by-key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,
    #[serde(default)]
    pub records: Vec<Value>,
}

impl SeedManifest {
    pub fn from_yaml_str(text: &str) -> Result<Self, SeedError> {
        serde_yaml::from_str(text)
            .map_err(|e| SeedError::configuration(format!("invalid seed manifest: {e}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SeedError::configuration(format!(
                "cannot read seed manifest {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml_str(&text)
    }

    /// One [`DocumentBinding`] per manifest collection, in file order.
    pub fn into_registry(self) -> Result<SeedRegistry, SeedError> {
        let mut registry = SeedRegistry::new();
        for collection in self.collections {
            registry.register(collection.into_binding()?);
        }
        Ok(registry)
    }
}

impl ManifestCollection {
    fn into_binding(self) -> Result<DocumentBinding, SeedError> {
        let mut records: Vec<Map<String, Value>> = Vec::with_capacity(self.records.len());
        for (index, record) in self.records.into_iter().enumerate() {
            match record {
                Value::Object(map) => records.push(map),
                other => {
                    return Err(SeedError::configuration(format!(
                        "invalid seed field type: not a struct (`{}` record {index} is {})",
                        self.field,
                        json_type(&other)
                    )))
                }
            }
        }

        let match_policy = self
            .check
            .as_deref()
            .map(MatchPolicy::from_annotation)
            .unwrap_or_default();
        let write_policy = self
            .seed
            .as_deref()
            .map(WritePolicy::from_annotation)
            .unwrap_or_default();
        let binding =
            DocumentBinding::new(self.field, records).with_policies(match_policy, write_policy);
        Ok(match self.kind {
            Some(kind) => binding.with_kind(kind),
            None => binding,
        })
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
