//! SyncSeeds: write the key-bearing local records, then verify.

use crate::binding::SeedSet;
use crate::descriptor::describe_all;
use crate::loader::{eligible_records, load_distant_seed, SyncSummary};
use crate::SeedError;
use graphseed_store::QueryExecutor;

/// Write every key-bearing local record of `seeds` according to its
/// collection's write policy, then reload the mirrors.
///
/// Records without a `_key` are never written. A failed write stops the pass;
/// collections written before it stay written.
pub fn sync_seeds<E, S>(executor: &mut E, seeds: &mut S) -> Result<SyncSummary, SeedError>
where
    E: QueryExecutor + ?Sized,
    S: SeedSet + ?Sized,
{
    let collections = seeds.collections_mut();
    let descriptors = describe_all(&collections)?;
    for (descriptor, collection) in descriptors.iter().zip(collections) {
        if collection.local_len() == 0 {
            continue;
        }
        let (records, skipped) = eligible_records(descriptor, &*collection)?;
        if skipped > 0 {
            tracing::debug!(
                collection = %descriptor.name,
                skipped,
                "skipping seed records without _key"
            );
        }
        if records.is_empty() {
            continue;
        }

        let written = records.len();
        executor
            .run_statement(&descriptor.write_statement(records))
            .map_err(|e| SeedError::collection(&descriptor.name, e))?;
        tracing::info!(
            collection = %descriptor.name,
            policy = %descriptor.write_policy,
            records = written,
            "seeded collection"
        );
    }

    load_distant_seed(executor, seeds)
}
