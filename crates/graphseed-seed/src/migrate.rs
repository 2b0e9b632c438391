//! Migrate: one collection per seed field, created on demand.

use crate::binding::SeedSet;
use crate::descriptor::inspect;
use crate::SeedError;
use graphseed_store::{CollectionKind, QueryExecutor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    Created,
    AlreadyExisted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub name: String,
    pub kind: CollectionKind,
    pub outcome: Provisioned,
}

/// Create the collection of every seed field, in declaration order.
///
/// Existing collections are left as they are. Any other store failure stops
/// the pass; collections created before it are not rolled back.
pub fn migrate<E, S>(executor: &mut E, seeds: &mut S) -> Result<Vec<ProvisionReport>, SeedError>
where
    E: QueryExecutor + ?Sized,
    S: SeedSet + ?Sized,
{
    let mut reports = Vec::new();
    for descriptor in inspect(seeds)? {
        let outcome = match executor.create_collection(&descriptor.name, descriptor.kind) {
            Ok(()) => {
                tracing::info!(
                    collection = %descriptor.name,
                    kind = %descriptor.kind,
                    "created collection"
                );
                Provisioned::Created
            }
            Err(e) if e.is_duplicate_name() => {
                tracing::debug!(collection = %descriptor.name, "collection already exists");
                Provisioned::AlreadyExisted
            }
            Err(e) => return Err(SeedError::collection(&descriptor.name, e)),
        };
        reports.push(ProvisionReport {
            name: descriptor.name,
            kind: descriptor.kind,
            outcome,
        });
    }
    Ok(reports)
}
