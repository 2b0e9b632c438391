//! graphseed seed engine
//!
//! Keeps a seed dataset declared in code (or in a manifest) synchronized with
//! a remote graph database:
//!
//! ```text
//! ┌────────────┐  inspect   ┌──────────────────────┐
//! │  SeedSet   │ ─────────► │ CollectionDescriptor │  name, kind, policies
//! │ (bindings) │            └──────────┬───────────┘
//! └─────┬──────┘                       │
//!       │            ┌─────────────────┼──────────────────┐
//!       │            ▼                 ▼                  ▼
//!       │       ┌─────────┐     ┌────────────┐     ┌─────────────┐
//!       │       │ migrate │     │ sync_seeds │ ──► │ load_distant│
//!       │       │         │     │  (write)   │     │ _seed (read)│
//!       │       └────┬────┘     └─────┬──────┘     └──────┬──────┘
//!       │            └────────────────┼───────────────────┘
//!       │                             ▼
//!       │                     ┌───────────────┐
//!       └── mirrors ◄──────── │ QueryExecutor │
//!                             └───────────────┘
//! ```
//!
//! - Each collection binding owns its local records and its mirror (the stored
//!   versions of those records, refreshed by every load).
//! - Collection names come from field names with the first letter lower-cased;
//!   a `_from` attribute on the record type makes an edge collection.
//! - Only records with a non-empty `_key` are written and verified.
//!
//! [`SeedManager`] wraps the phases with database creation and removal under
//! administrator credentials.

mod binding;
mod descriptor;
mod error;
mod loader;
mod manager;
mod manifest;
mod migrate;
mod shape;
mod upsert;

#[cfg(test)]
mod tests;

pub use binding::{CollectionBinding, DocumentBinding, SeedCollection, SeedRegistry, SeedSet};
pub use descriptor::{
    collection_name, describe, inspect, CollectionDescriptor, MatchPolicy, WritePolicy,
    FROM_ATTRIBUTE,
};
pub use error::SeedError;
pub use loader::{load_distant_seed, CollectionSync, SyncSummary};
pub use manager::{ConnectionConfig, ElevatedScope, SeedManager};
pub use manifest::{ManifestCollection, SeedManifest};
pub use migrate::{migrate, ProvisionReport, Provisioned};
pub use shape::record_fields;
pub use upsert::sync_seeds;
