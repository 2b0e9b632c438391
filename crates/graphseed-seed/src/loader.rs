//! LoadDistantSeed: read back the stored versions of the local records.

use crate::binding::{SeedCollection, SeedSet};
use crate::descriptor::{describe_all, CollectionDescriptor};
use crate::SeedError;
use graphseed_store::{record_key, QueryExecutor};
use serde_json::Value;
use std::collections::BTreeSet;

/// Per-collection counts of one load pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSync {
    pub name: String,
    /// Local records, keyed or not.
    pub declared: usize,
    /// Local records with a usable `_key`.
    pub eligible: usize,
    /// Stored records matched into the mirror.
    pub mirrored: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub collections: Vec<CollectionSync>,
}

impl SyncSummary {
    pub fn get(&self, name: &str) -> Option<&CollectionSync> {
        self.collections.iter().find(|c| c.name == name)
    }

    pub fn total_mirrored(&self) -> usize {
        self.collections.iter().map(|c| c.mirrored).sum()
    }
}

/// Key-bearing local records of `collection`, plus how many were left out.
///
/// Two local records sharing a `_key` would make the stored collection
/// disagree with the declaration whatever the write policy, so that is
/// rejected as a configuration error.
pub(crate) fn eligible_records(
    descriptor: &CollectionDescriptor,
    collection: &dyn SeedCollection,
) -> Result<(Vec<Value>, usize), SeedError> {
    let documents = collection.local_documents()?;
    let declared = documents.len();
    let mut keys = BTreeSet::new();
    let mut eligible = Vec::with_capacity(declared);
    for document in documents {
        let Some(key) = record_key(&document) else {
            continue;
        };
        if !keys.insert(key.to_string()) {
            return Err(SeedError::configuration(format!(
                "invalid seed records: duplicate _key `{key}` in `{}`",
                descriptor.name
            )));
        }
        eligible.push(document);
    }
    let skipped = declared - eligible.len();
    Ok((eligible, skipped))
}

/// Refresh every mirror of `seeds` from the store and verify completeness.
///
/// All mirrors are cleared first; collections without key-bearing records
/// stay empty. Fails with [`SeedError::Shortfall`] on the first collection
/// whose mirror holds fewer records than it has eligible local records.
/// Collections processed before a failure keep their refreshed mirror.
pub fn load_distant_seed<E, S>(executor: &mut E, seeds: &mut S) -> Result<SyncSummary, SeedError>
where
    E: QueryExecutor + ?Sized,
    S: SeedSet + ?Sized,
{
    let mut collections = seeds.collections_mut();
    let descriptors = describe_all(&collections)?;
    for collection in collections.iter_mut() {
        collection.clear_mirror();
    }

    let mut summary = SyncSummary::default();
    for (descriptor, collection) in descriptors.iter().zip(collections) {
        let declared = collection.local_len();
        let (records, _) = eligible_records(descriptor, &*collection)?;
        let eligible = records.len();
        if eligible == 0 {
            summary.collections.push(CollectionSync {
                name: descriptor.name.clone(),
                declared,
                eligible,
                mirrored: 0,
            });
            continue;
        }

        let rows = executor
            .run_statement(&descriptor.read_statement(records))
            .map_err(|e| SeedError::collection(&descriptor.name, e))?;
        collection.replace_mirror(rows)?;
        let mirrored = collection.mirror_len();
        tracing::debug!(
            collection = %descriptor.name,
            policy = %descriptor.match_policy,
            eligible,
            mirrored,
            "loaded distant seed"
        );

        if mirrored < eligible {
            tracing::warn!(
                collection = %descriptor.name,
                expected = eligible,
                found = mirrored,
                "seeds not synchronized"
            );
            return Err(SeedError::Shortfall {
                collection: descriptor.name.clone(),
                expected: eligible,
                found: mirrored,
            });
        }
        summary.collections.push(CollectionSync {
            name: descriptor.name.clone(),
            declared,
            eligible,
            mirrored,
        });
    }
    Ok(summary)
}
