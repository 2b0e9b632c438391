//! Collection descriptors: what the engine knows about each seed collection.

use crate::binding::{SeedCollection, SeedSet};
use crate::SeedError;
use graphseed_store::{CollectionKind, SeedStatement};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Attribute whose presence on a record type makes its collection an edge collection.
pub const FROM_ATTRIBUTE: &str = "_from";

/// How local records are matched against stored ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MatchPolicy {
    /// Every declared attribute must be present remotely with the same value.
    #[default]
    Full,
    /// Only `_key` is compared.
    KeyOnly,
}

impl MatchPolicy {
    /// Policy from a `check` annotation: `keyOnly` or anything else.
    pub fn from_annotation(tag: &str) -> Self {
        match tag {
            "keyOnly" => Self::KeyOnly,
            _ => Self::Full,
        }
    }
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::KeyOnly => write!(f, "keyOnly"),
        }
    }
}

/// How local records are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum WritePolicy {
    /// Insert; records whose key already exists are left alone.
    #[default]
    InsertIgnore,
    /// Replace records with the same key, insert the others.
    UpsertReplace,
}

impl WritePolicy {
    /// Policy from a `seed` annotation: `forceUpdate` or anything else.
    pub fn from_annotation(tag: &str) -> Self {
        match tag {
            "forceUpdate" => Self::UpsertReplace,
            _ => Self::InsertIgnore,
        }
    }
}

impl fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsertIgnore => write!(f, "insert"),
            Self::UpsertReplace => write!(f, "forceUpdate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDescriptor {
    /// Field name as declared, e.g. `FriendRequests`.
    pub field: String,
    /// Collection name derived from the field, e.g. `friendRequests`.
    pub name: String,
    pub kind: CollectionKind,
    pub match_policy: MatchPolicy,
    pub write_policy: WritePolicy,
}

impl CollectionDescriptor {
    /// The query that loads the stored versions of `records`.
    pub fn read_statement(&self, records: Vec<Value>) -> SeedStatement {
        let collection = self.name.clone();
        match self.match_policy {
            MatchPolicy::Full => SeedStatement::MatchContained {
                collection,
                records,
            },
            MatchPolicy::KeyOnly => SeedStatement::MatchByKey {
                collection,
                records,
            },
        }
    }

    /// The query that writes `records`.
    pub fn write_statement(&self, records: Vec<Value>) -> SeedStatement {
        let collection = self.name.clone();
        match self.write_policy {
            WritePolicy::InsertIgnore => SeedStatement::InsertIgnore {
                collection,
                records,
            },
            WritePolicy::UpsertReplace => SeedStatement::UpsertReplace {
                collection,
                records,
            },
        }
    }
}

/// Collection name for a field: only the first character is lower-cased.
pub fn collection_name(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn describe(collection: &dyn SeedCollection) -> Result<CollectionDescriptor, SeedError> {
    let field = collection.field_name();
    if field.is_empty() {
        return Err(SeedError::configuration("invalid seed field name: empty"));
    }
    Ok(CollectionDescriptor {
        field: field.to_string(),
        name: collection_name(field),
        kind: collection.kind()?,
        match_policy: collection.match_policy(),
        write_policy: collection.write_policy(),
    })
}

/// Descriptors for every collection of `seeds`, in declaration order.
///
/// Fails on the first structurally invalid collection and when two fields map
/// to the same collection name.
pub fn inspect<S: SeedSet + ?Sized>(seeds: &mut S) -> Result<Vec<CollectionDescriptor>, SeedError> {
    describe_all(&seeds.collections_mut())
}

/// Descriptors for an already listed set of collections, index for index.
pub(crate) fn describe_all(
    collections: &[&mut dyn SeedCollection],
) -> Result<Vec<CollectionDescriptor>, SeedError> {
    let mut seen = BTreeSet::new();
    let mut descriptors = Vec::with_capacity(collections.len());
    for collection in collections {
        let descriptor = describe(&**collection)?;
        if !seen.insert(descriptor.name.clone()) {
            return Err(SeedError::configuration(format!(
                "invalid seed type: collection `{}` declared twice",
                descriptor.name
            )));
        }
        descriptors.push(descriptor);
    }
    Ok(descriptors)
}
