//! Seed declarations: collections owning their local records and mirror.

use crate::descriptor::{collection_name, MatchPolicy, WritePolicy, FROM_ATTRIBUTE};
use crate::shape::record_fields;
use crate::SeedError;
use graphseed_store::{decode_rows, CollectionKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;

/// One seed collection: locally declared records plus the mirror of what the
/// store holds for them.
pub trait SeedCollection {
    /// Field name as declared; the collection name is derived from it.
    fn field_name(&self) -> &str;

    fn match_policy(&self) -> MatchPolicy;

    fn write_policy(&self) -> WritePolicy;

    /// Kind inferred from the record shape.
    fn kind(&self) -> Result<CollectionKind, SeedError>;

    fn local_len(&self) -> usize;

    /// Local records as JSON objects, in declaration order.
    fn local_documents(&self) -> Result<Vec<Value>, SeedError>;

    fn mirror_len(&self) -> usize;

    fn clear_mirror(&mut self);

    /// Replace the mirror with a store result set.
    fn replace_mirror(&mut self, rows: Vec<Value>) -> Result<(), SeedError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// An ordered set of seed collections.
///
/// Implementors list only their collection fields; anything else on the
/// struct (settings, handles) is invisible to the engine. The list is the
/// single source of order for every phase: descriptors, writes and mirrors
/// are all taken from the same call.
pub trait SeedSet {
    fn collections_mut(&mut self) -> Vec<&mut dyn SeedCollection>;
}

// ============================================================================
// Typed collections
// ============================================================================

/// Collection of typed records.
///
/// `T` must (de)serialize as a struct. A `_from` field makes the collection an
/// edge collection, whether or not any record is declared.
#[derive(Debug, Clone)]
pub struct CollectionBinding<T> {
    field: String,
    match_policy: MatchPolicy,
    write_policy: WritePolicy,
    local: Vec<T>,
    mirror: Vec<T>,
}

impl<T> CollectionBinding<T> {
    pub fn new(field: impl Into<String>, local: Vec<T>) -> Self {
        Self {
            field: field.into(),
            match_policy: MatchPolicy::default(),
            write_policy: WritePolicy::default(),
            local,
            mirror: Vec::new(),
        }
    }

    /// Match stored records by `_key` only.
    pub fn key_only(mut self) -> Self {
        self.match_policy = MatchPolicy::KeyOnly;
        self
    }

    /// Replace stored records with the local version on every sync.
    pub fn force_update(mut self) -> Self {
        self.write_policy = WritePolicy::UpsertReplace;
        self
    }

    pub fn with_policies(mut self, match_policy: MatchPolicy, write_policy: WritePolicy) -> Self {
        self.match_policy = match_policy;
        self.write_policy = write_policy;
        self
    }

    pub fn name(&self) -> String {
        collection_name(&self.field)
    }

    pub fn local(&self) -> &[T] {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut Vec<T> {
        &mut self.local
    }

    /// Stored records matched by the last load.
    pub fn mirror(&self) -> &[T] {
        &self.mirror
    }
}

impl<T> SeedCollection for CollectionBinding<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    fn field_name(&self) -> &str {
        &self.field
    }

    fn match_policy(&self) -> MatchPolicy {
        self.match_policy
    }

    fn write_policy(&self) -> WritePolicy {
        self.write_policy
    }

    fn kind(&self) -> Result<CollectionKind, SeedError> {
        match record_fields::<T>() {
            Some(fields) if fields.contains(&FROM_ATTRIBUTE) => Ok(CollectionKind::Edge),
            Some(_) => Ok(CollectionKind::Document),
            None => Err(not_a_struct(&self.field)),
        }
    }

    fn local_len(&self) -> usize {
        self.local.len()
    }

    fn local_documents(&self) -> Result<Vec<Value>, SeedError> {
        self.local
            .iter()
            .map(|record| match serde_json::to_value(record) {
                Ok(doc @ Value::Object(_)) => Ok(doc),
                Ok(_) => Err(not_a_struct(&self.field)),
                Err(e) => Err(SeedError::configuration(format!(
                    "invalid seed field `{}`: {e}",
                    self.field
                ))),
            })
            .collect()
    }

    fn mirror_len(&self) -> usize {
        self.mirror.len()
    }

    fn clear_mirror(&mut self) {
        self.mirror.clear();
    }

    fn replace_mirror(&mut self, rows: Vec<Value>) -> Result<(), SeedError> {
        self.mirror = decode_rows(rows).map_err(|e| SeedError::collection(&self.name(), e))?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn not_a_struct(field: &str) -> SeedError {
    SeedError::configuration(format!("invalid seed field type: not a struct (`{field}`)"))
}

// ============================================================================
// Schemaless collections
// ============================================================================

/// Collection of untyped JSON objects, as declared in a seed manifest.
#[derive(Debug, Clone)]
pub struct DocumentBinding {
    field: String,
    kind: Option<CollectionKind>,
    match_policy: MatchPolicy,
    write_policy: WritePolicy,
    local: Vec<Map<String, Value>>,
    mirror: Vec<Map<String, Value>>,
}

impl DocumentBinding {
    pub fn new(field: impl Into<String>, local: Vec<Map<String, Value>>) -> Self {
        Self {
            field: field.into(),
            kind: None,
            match_policy: MatchPolicy::default(),
            write_policy: WritePolicy::default(),
            local,
            mirror: Vec::new(),
        }
    }

    /// Declare the kind instead of inferring it from the records.
    pub fn with_kind(mut self, kind: CollectionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_policies(mut self, match_policy: MatchPolicy, write_policy: WritePolicy) -> Self {
        self.match_policy = match_policy;
        self.write_policy = write_policy;
        self
    }

    pub fn name(&self) -> String {
        collection_name(&self.field)
    }

    pub fn local(&self) -> &[Map<String, Value>] {
        &self.local
    }

    pub fn mirror(&self) -> &[Map<String, Value>] {
        &self.mirror
    }
}

impl SeedCollection for DocumentBinding {
    fn field_name(&self) -> &str {
        &self.field
    }

    fn match_policy(&self) -> MatchPolicy {
        self.match_policy
    }

    fn write_policy(&self) -> WritePolicy {
        self.write_policy
    }

    /// Declared kind, else edge when any record carries `_from`.
    fn kind(&self) -> Result<CollectionKind, SeedError> {
        if let Some(kind) = self.kind {
            return Ok(kind);
        }
        let edge = self.local.iter().any(|doc| doc.contains_key(FROM_ATTRIBUTE));
        Ok(if edge {
            CollectionKind::Edge
        } else {
            CollectionKind::Document
        })
    }

    fn local_len(&self) -> usize {
        self.local.len()
    }

    fn local_documents(&self) -> Result<Vec<Value>, SeedError> {
        Ok(self.local.iter().cloned().map(Value::Object).collect())
    }

    fn mirror_len(&self) -> usize {
        self.mirror.len()
    }

    fn clear_mirror(&mut self) {
        self.mirror.clear();
    }

    fn replace_mirror(&mut self, rows: Vec<Value>) -> Result<(), SeedError> {
        self.mirror = decode_rows(rows).map_err(|e| SeedError::collection(&self.name(), e))?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Seed collections registered at startup, in registration order.
#[derive(Default)]
pub struct SeedRegistry {
    collections: Vec<Box<dyn SeedCollection>>,
}

impl fmt::Debug for SeedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.collections.iter().map(|c| c.field_name()))
            .finish()
    }
}

impl SeedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C: SeedCollection + 'static>(&mut self, collection: C) -> &mut Self {
        self.collections.push(Box::new(collection));
        self
    }

    pub fn with<C: SeedCollection + 'static>(mut self, collection: C) -> Self {
        self.register(collection);
        self
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Registered collections, in registration order.
    pub fn collections(&self) -> Vec<&dyn SeedCollection> {
        let mut out: Vec<&dyn SeedCollection> = Vec::with_capacity(self.collections.len());
        for collection in &self.collections {
            out.push(collection.as_ref());
        }
        out
    }

    /// Collection by derived name (`users`), not field name.
    pub fn get(&self, name: &str) -> Option<&dyn SeedCollection> {
        for collection in &self.collections {
            if collection_name(collection.field_name()) == name {
                return Some(collection.as_ref());
            }
        }
        None
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut dyn SeedCollection> {
        for collection in &mut self.collections {
            if collection_name(collection.field_name()) == name {
                return Some(collection.as_mut());
            }
        }
        None
    }

    pub fn binding<T: 'static>(&self, name: &str) -> Option<&CollectionBinding<T>> {
        self.get(name)?.as_any().downcast_ref()
    }

    pub fn binding_mut<T: 'static>(&mut self, name: &str) -> Option<&mut CollectionBinding<T>> {
        self.get_mut(name)?.as_any_mut().downcast_mut()
    }

    pub fn documents(&self, name: &str) -> Option<&DocumentBinding> {
        self.get(name)?.as_any().downcast_ref()
    }

    /// Local records of a typed collection.
    pub fn local<T: 'static>(&self, name: &str) -> Option<&[T]> {
        self.binding::<T>(name).map(CollectionBinding::local)
    }

    /// Mirror of a typed collection.
    pub fn mirror<T: 'static>(&self, name: &str) -> Option<&[T]> {
        self.binding::<T>(name).map(CollectionBinding::mirror)
    }
}

impl SeedSet for SeedRegistry {
    fn collections_mut(&mut self) -> Vec<&mut dyn SeedCollection> {
        let mut out: Vec<&mut dyn SeedCollection> = Vec::with_capacity(self.collections.len());
        for collection in &mut self.collections {
            out.push(collection.as_mut());
        }
        out
    }
}
