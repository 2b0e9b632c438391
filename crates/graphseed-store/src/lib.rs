//! graphseed store layer
//!
//! The seed engine talks to the remote graph database through exactly one
//! capability, the [`QueryExecutor`] trait:
//!
//! ```text
//! ┌──────────────────┐      SeedStatement / Aql      ┌──────────────────────┐
//! │   seed engine    │ ────────────────────────────► │    QueryExecutor     │
//! │ (graphseed-seed) │ ◄──────────────────────────── │                      │
//! └──────────────────┘       Vec<serde_json::Value>  │  ArangoHttpClient    │
//!                                                    │  MemoryStore         │
//!                                                    └──────────────────────┘
//! ```
//!
//! - [`ArangoHttpClient`] speaks the ArangoDB REST API over blocking HTTP.
//! - [`MemoryStore`] is an in-process stand-in with the same observable
//!   behaviour for the requests the engine issues (used by tests and dry runs).
//!
//! Query text is store-specific AQL. The engine never writes AQL by hand: it
//! builds a [`SeedStatement`] and lets the executor render or evaluate it.

pub mod aql;
pub mod document;
pub mod error;
pub mod http;
pub mod memory;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub use aql::{Aql, SeedStatement};
pub use document::{contains_attributes, record_key, strip_internal};
pub use error::StoreError;
pub use http::{ArangoHttpClient, HttpOptions};
pub use memory::{FaultPoint, JournalEntry, MemoryStore, StoreOp};

/// Database every administrative request (create/drop database) targets.
pub const SYSTEM_DATABASE: &str = "_system";

/// Identity attribute of every stored document.
pub const KEY_ATTRIBUTE: &str = "_key";

/// Server-assigned attributes ignored when comparing documents.
pub const INTERNAL_ATTRIBUTES: [&str; 2] = ["_id", "_rev"];

// ============================================================================
// Core Types
// ============================================================================

/// Kind of a collection: plain documents or edges (`_from`/`_to`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Document,
    Edge,
}

impl CollectionKind {
    /// ArangoDB collection type code.
    pub fn type_code(self) -> u8 {
        match self {
            Self::Document => 2,
            Self::Edge => 3,
        }
    }

    pub fn from_type_code(code: u8) -> Option<Self> {
        match code {
            2 => Some(Self::Document),
            3 => Some(Self::Edge),
            _ => None,
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::Edge => write!(f, "edge"),
        }
    }
}

/// A username/password pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Query execution
// ============================================================================

/// The query-execution interface consumed by the seed engine.
///
/// Every call is a single round trip. Credential and target switches only
/// affect subsequent calls on the same executor.
pub trait QueryExecutor {
    fn create_collection(&mut self, name: &str, kind: CollectionKind) -> Result<(), StoreError>;

    /// Create database `name`, granting access to `users`.
    fn create_database(&mut self, name: &str, users: &[Credentials]) -> Result<(), StoreError>;

    fn drop_database(&mut self, name: &str) -> Result<(), StoreError>;

    /// Run a parameterized AQL query and return its complete result set.
    fn run_query(&mut self, query: &Aql) -> Result<Vec<Value>, StoreError>;

    /// Run one of the engine's seed statements.
    ///
    /// Backends that understand AQL can rely on the default rendering.
    fn run_statement(&mut self, statement: &SeedStatement) -> Result<Vec<Value>, StoreError> {
        self.run_query(&statement.to_aql())
    }

    fn set_credentials(&mut self, credentials: Credentials);

    fn set_target_database(&mut self, name: &str);
}

impl<E: QueryExecutor + ?Sized> QueryExecutor for Box<E> {
    fn create_collection(&mut self, name: &str, kind: CollectionKind) -> Result<(), StoreError> {
        (**self).create_collection(name, kind)
    }

    fn create_database(&mut self, name: &str, users: &[Credentials]) -> Result<(), StoreError> {
        (**self).create_database(name, users)
    }

    fn drop_database(&mut self, name: &str) -> Result<(), StoreError> {
        (**self).drop_database(name)
    }

    fn run_query(&mut self, query: &Aql) -> Result<Vec<Value>, StoreError> {
        (**self).run_query(query)
    }

    fn run_statement(&mut self, statement: &SeedStatement) -> Result<Vec<Value>, StoreError> {
        (**self).run_statement(statement)
    }

    fn set_credentials(&mut self, credentials: Credentials) {
        (**self).set_credentials(credentials)
    }

    fn set_target_database(&mut self, name: &str) {
        (**self).set_target_database(name)
    }
}

impl<E: QueryExecutor + ?Sized> QueryExecutor for &mut E {
    fn create_collection(&mut self, name: &str, kind: CollectionKind) -> Result<(), StoreError> {
        (**self).create_collection(name, kind)
    }

    fn create_database(&mut self, name: &str, users: &[Credentials]) -> Result<(), StoreError> {
        (**self).create_database(name, users)
    }

    fn drop_database(&mut self, name: &str) -> Result<(), StoreError> {
        (**self).drop_database(name)
    }

    fn run_query(&mut self, query: &Aql) -> Result<Vec<Value>, StoreError> {
        (**self).run_query(query)
    }

    fn run_statement(&mut self, statement: &SeedStatement) -> Result<Vec<Value>, StoreError> {
        (**self).run_statement(statement)
    }

    fn set_credentials(&mut self, credentials: Credentials) {
        (**self).set_credentials(credentials)
    }

    fn set_target_database(&mut self, name: &str) {
        (**self).set_target_database(name)
    }
}

/// Decode a result set into typed records.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, StoreError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(|e| StoreError::Decode(e.to_string())))
        .collect()
}
