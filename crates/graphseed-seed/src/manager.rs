//! Database lifecycle: create, drop, migrate, sync.

use crate::binding::SeedSet;
use crate::loader::{load_distant_seed, SyncSummary};
use crate::migrate::{migrate, ProvisionReport, Provisioned};
use crate::upsert::sync_seeds;
use crate::SeedError;
use graphseed_store::{Credentials, QueryExecutor, SYSTEM_DATABASE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Where the application's database lives and how the application logs in.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub endpoint: String,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl ConnectionConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.user, &self.password)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("endpoint", &self.endpoint)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Elevated scope
// ============================================================================

/// Administrator session on the system database.
///
/// The executor is switched to `admin` on `_system` when the scope is entered
/// and back to the application credentials and database when it is dropped,
/// on every exit path.
pub struct ElevatedScope<'a, E: QueryExecutor + ?Sized> {
    executor: &'a mut E,
    restore: Credentials,
    database: String,
}

impl<'a, E: QueryExecutor + ?Sized> ElevatedScope<'a, E> {
    pub fn enter(
        executor: &'a mut E,
        admin: Credentials,
        restore: Credentials,
        database: &str,
    ) -> Self {
        tracing::debug!(user = %admin.username, "elevating to administrator");
        executor.set_credentials(admin);
        executor.set_target_database(SYSTEM_DATABASE);
        Self {
            executor,
            restore,
            database: database.to_string(),
        }
    }
}

impl<E: QueryExecutor + ?Sized> Deref for ElevatedScope<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        &*self.executor
    }
}

impl<E: QueryExecutor + ?Sized> DerefMut for ElevatedScope<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut *self.executor
    }
}

impl<E: QueryExecutor + ?Sized> Drop for ElevatedScope<'_, E> {
    fn drop(&mut self) {
        self.executor.set_credentials(self.restore.clone());
        self.executor.set_target_database(&self.database);
        tracing::debug!(
            user = %self.restore.username,
            database = %self.database,
            "restored application credentials"
        );
    }
}

// ============================================================================
// Seed manager
// ============================================================================

/// Lifecycle controller over one executor and one seed set.
///
/// Outside of [`create`](Self::create) and [`drop_database`](Self::drop_database)
/// the executor always runs as the application user on the application
/// database.
pub struct SeedManager<E, S> {
    executor: E,
    seeds: S,
    connection: ConnectionConfig,
}

impl<E: QueryExecutor, S: SeedSet> SeedManager<E, S> {
    pub fn new(mut executor: E, seeds: S, connection: ConnectionConfig) -> Self {
        executor.set_credentials(connection.credentials());
        executor.set_target_database(&connection.database);
        Self {
            executor,
            seeds,
            connection,
        }
    }

    /// Create the application database, granting `admin` and the application
    /// user access. An existing database counts as success.
    pub fn create(&mut self, admin: &Credentials) -> Result<Provisioned, SeedError> {
        let users = [admin.clone(), self.connection.credentials()];
        let mut scope = ElevatedScope::enter(
            &mut self.executor,
            admin.clone(),
            self.connection.credentials(),
            &self.connection.database,
        );
        match scope.create_database(&self.connection.database, &users) {
            Ok(()) => {
                tracing::info!(database = %self.connection.database, "created database");
                Ok(Provisioned::Created)
            }
            Err(e) if e.is_duplicate_name() => {
                tracing::debug!(database = %self.connection.database, "database already exists");
                Ok(Provisioned::AlreadyExisted)
            }
            Err(e) => Err(SeedError::database(&self.connection.database, e)),
        }
    }

    /// Drop the application database. A missing database is an error.
    pub fn drop_database(&mut self, admin: &Credentials) -> Result<(), SeedError> {
        let mut scope = ElevatedScope::enter(
            &mut self.executor,
            admin.clone(),
            self.connection.credentials(),
            &self.connection.database,
        );
        scope
            .drop_database(&self.connection.database)
            .map_err(|e| SeedError::database(&self.connection.database, e))?;
        tracing::info!(database = %self.connection.database, "dropped database");
        Ok(())
    }

    pub fn migrate(&mut self) -> Result<Vec<ProvisionReport>, SeedError> {
        migrate(&mut self.executor, &mut self.seeds)
    }

    pub fn sync_seeds(&mut self) -> Result<SyncSummary, SeedError> {
        sync_seeds(&mut self.executor, &mut self.seeds)
    }

    pub fn load_distant_seed(&mut self) -> Result<SyncSummary, SeedError> {
        load_distant_seed(&mut self.executor, &mut self.seeds)
    }

    pub fn seeds(&self) -> &S {
        &self.seeds
    }

    pub fn seeds_mut(&mut self) -> &mut S {
        &mut self.seeds
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn connection(&self) -> &ConnectionConfig {
        &self.connection
    }

    pub fn into_parts(self) -> (E, S) {
        (self.executor, self.seeds)
    }
}
