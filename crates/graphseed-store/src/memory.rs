//! In-process store with ArangoDB-like behaviour.
//!
//! One [`MemoryStore`] value is a *session* (credentials + target database)
//! on a shared in-memory server. Sessions created through [`MemoryStore::handle`]
//! or [`MemoryStore::connect`] see the same databases, so a test can hand one
//! session to the seed engine and inspect the server through another.
//!
//! Only the requests the seed engine issues are understood: database and
//! collection management plus [`SeedStatement`] evaluation. Free-form AQL is
//! rejected with [`StoreError::Unsupported`].

use crate::document::{contains_attributes, strip_internal};
use crate::error::{ERROR_INVALID_EDGE_ATTRIBUTE, ERROR_USE_SYSTEM_DATABASE};
use crate::{
    Aql, CollectionKind, Credentials, QueryExecutor, SeedStatement, StoreError, KEY_ATTRIBUTE,
    SYSTEM_DATABASE,
};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

/// A request as recorded in the server journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    CreateDatabase(String),
    DropDatabase(String),
    CreateCollection(String),
    /// A match statement against the named collection.
    Read(String),
    /// An insert/upsert statement against the named collection.
    Write(String),
    /// Free-form AQL.
    Query,
}

/// Which request an injected fault applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultPoint {
    CreateDatabase,
    DropDatabase,
    CreateCollection(String),
    Read(String),
    Write(String),
}

impl FaultPoint {
    fn matches(&self, op: &StoreOp) -> bool {
        match (self, op) {
            (Self::CreateDatabase, StoreOp::CreateDatabase(_)) => true,
            (Self::DropDatabase, StoreOp::DropDatabase(_)) => true,
            (Self::CreateCollection(a), StoreOp::CreateCollection(b)) => a == b,
            (Self::Read(a), StoreOp::Read(b)) => a == b,
            (Self::Write(a), StoreOp::Write(b)) => a == b,
            _ => false,
        }
    }
}

/// One journaled request: what ran, as whom, against which database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub op: StoreOp,
    pub user: String,
    pub database: String,
    pub ok: bool,
}

#[derive(Debug)]
struct CollectionState {
    kind: CollectionKind,
    /// Insertion order is the iteration order of every read.
    documents: Vec<Map<String, Value>>,
}

impl CollectionState {
    fn position(&self, key: &str) -> Option<usize> {
        self.documents
            .iter()
            .position(|doc| doc.get(KEY_ATTRIBUTE).and_then(Value::as_str) == Some(key))
    }
}

#[derive(Debug, Default)]
struct DatabaseState {
    users: BTreeSet<String>,
    collections: BTreeMap<String, CollectionState>,
}

#[derive(Debug, Default)]
struct ServerState {
    users: BTreeMap<String, String>,
    databases: BTreeMap<String, DatabaseState>,
    journal: Vec<JournalEntry>,
    faults: VecDeque<(FaultPoint, StoreError)>,
    next_rev: u64,
}

impl ServerState {
    fn take_fault(&mut self, op: &StoreOp) -> Option<StoreError> {
        let index = self.faults.iter().position(|(point, _)| point.matches(op))?;
        self.faults.remove(index).map(|(_, err)| err)
    }

    fn authenticate(&self, credentials: &Credentials) -> Result<(), StoreError> {
        match self.users.get(&credentials.username) {
            Some(password) if *password == credentials.password => Ok(()),
            _ => Err(StoreError::Unauthorized),
        }
    }

    fn is_admin(&self, username: &str) -> bool {
        self.databases
            .get(SYSTEM_DATABASE)
            .is_some_and(|db| db.users.contains(username))
    }

    fn require_admin_on_system(
        &self,
        credentials: &Credentials,
        database: &str,
    ) -> Result<(), StoreError> {
        if database != SYSTEM_DATABASE {
            return Err(StoreError::Server {
                code: 403,
                error_num: ERROR_USE_SYSTEM_DATABASE,
                message: "operation only allowed in system database".to_string(),
            });
        }
        self.authenticate(credentials)?;
        if !self.is_admin(&credentials.username) {
            return Err(StoreError::Forbidden(format!(
                "user '{}' may not manage databases",
                credentials.username
            )));
        }
        Ok(())
    }

    fn database_mut(
        &mut self,
        credentials: &Credentials,
        name: &str,
    ) -> Result<&mut DatabaseState, StoreError> {
        self.authenticate(credentials)?;
        let admin = self.is_admin(&credentials.username);
        let db = self
            .databases
            .get_mut(name)
            .ok_or_else(|| StoreError::DatabaseNotFound(name.to_string()))?;
        if !admin && !db.users.contains(&credentials.username) {
            return Err(StoreError::Unauthorized);
        }
        Ok(db)
    }

    fn revision(&mut self) -> String {
        self.next_rev += 1;
        format!("_r{:08x}", self.next_rev)
    }
}

/// A session on a shared in-memory server.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    server: Arc<Mutex<ServerState>>,
    credentials: Credentials,
    database: String,
}

impl MemoryStore {
    /// Start a server whose only user is the administrator `root`.
    ///
    /// The returned session is logged in as `root` on `_system`.
    pub fn new(root: Credentials) -> Self {
        let mut state = ServerState::default();
        state
            .users
            .insert(root.username.clone(), root.password.clone());
        let mut system = DatabaseState::default();
        system.users.insert(root.username.clone());
        state.databases.insert(SYSTEM_DATABASE.to_string(), system);

        Self {
            server: Arc::new(Mutex::new(state)),
            credentials: root,
            database: SYSTEM_DATABASE.to_string(),
        }
    }

    /// Another session on the same server, with the same login.
    pub fn handle(&self) -> Self {
        self.clone()
    }

    /// Another session on the same server, logged in as `credentials` on `database`.
    pub fn connect(&self, credentials: Credentials, database: &str) -> Self {
        Self {
            server: Arc::clone(&self.server),
            credentials,
            database: database.to_string(),
        }
    }

    pub fn current_user(&self) -> &str {
        &self.credentials.username
    }

    pub fn current_database(&self) -> &str {
        &self.database
    }

    // ========================================================================
    // Inspection (no authentication)
    // ========================================================================

    pub fn database_exists(&self, name: &str) -> bool {
        self.server.lock().databases.contains_key(name)
    }

    pub fn collection_names(&self, database: &str) -> Vec<String> {
        self.server
            .lock()
            .databases
            .get(database)
            .map(|db| db.collections.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn collection_kind(&self, database: &str, collection: &str) -> Option<CollectionKind> {
        let server = self.server.lock();
        let db = server.databases.get(database)?;
        db.collections.get(collection).map(|c| c.kind)
    }

    /// Stored documents, in insertion order.
    pub fn documents(&self, database: &str, collection: &str) -> Option<Vec<Value>> {
        let server = self.server.lock();
        let coll = server.databases.get(database)?.collections.get(collection)?;
        Some(coll.documents.iter().cloned().map(Value::Object).collect())
    }

    /// Store `document` directly, bypassing authentication and seed statements.
    pub fn insert_document(
        &self,
        database: &str,
        collection: &str,
        document: Value,
    ) -> Result<(), StoreError> {
        let Value::Object(document) = document else {
            return Err(StoreError::Server {
                code: 400,
                error_num: 1227,
                message: "invalid document type".to_string(),
            });
        };
        let mut server = self.server.lock();
        let rev = server.revision();
        let coll = server
            .databases
            .get_mut(database)
            .ok_or_else(|| StoreError::DatabaseNotFound(database.to_string()))?
            .collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        let key = match document.get(KEY_ATTRIBUTE).and_then(Value::as_str) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => format!("{}", coll.documents.len() + 1),
        };
        if coll.position(&key).is_some() {
            return Err(StoreError::UniqueConstraint(key));
        }
        let stamped = stamp(&document, collection, &key, rev);
        coll.documents.push(stamped);
        Ok(())
    }

    pub fn remove_document(&self, database: &str, collection: &str, key: &str) -> bool {
        let mut server = self.server.lock();
        let Some(coll) = server
            .databases
            .get_mut(database)
            .and_then(|db| db.collections.get_mut(collection))
        else {
            return false;
        };
        match coll.position(key) {
            Some(index) => {
                coll.documents.remove(index);
                true
            }
            None => false,
        }
    }

    /// Register a server user without granting any database.
    pub fn add_user(&self, credentials: Credentials) {
        self.server
            .lock()
            .users
            .insert(credentials.username, credentials.password);
    }

    pub fn journal(&self) -> Vec<JournalEntry> {
        self.server.lock().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.server.lock().journal.clear();
    }

    /// Make the next request matching `point` fail with `error`.
    pub fn fail_next(&self, point: FaultPoint, error: StoreError) {
        self.server.lock().faults.push_back((point, error));
    }

    // ========================================================================
    // Request plumbing
    // ========================================================================

    fn execute<T>(
        &self,
        op: StoreOp,
        request: impl FnOnce(&mut ServerState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut server = self.server.lock();
        let result = match server.take_fault(&op) {
            Some(err) => Err(err),
            None => request(&mut server),
        };
        server.journal.push(JournalEntry {
            op,
            user: self.credentials.username.clone(),
            database: self.database.clone(),
            ok: result.is_ok(),
        });
        result
    }
}

impl QueryExecutor for MemoryStore {
    fn create_collection(&mut self, name: &str, kind: CollectionKind) -> Result<(), StoreError> {
        let credentials = self.credentials.clone();
        let database = self.database.clone();
        self.execute(StoreOp::CreateCollection(name.to_string()), |server| {
            let db = server.database_mut(&credentials, &database)?;
            if db.collections.contains_key(name) {
                return Err(StoreError::DuplicateName(name.to_string()));
            }
            db.collections.insert(
                name.to_string(),
                CollectionState {
                    kind,
                    documents: Vec::new(),
                },
            );
            Ok(())
        })
    }

    fn create_database(&mut self, name: &str, users: &[Credentials]) -> Result<(), StoreError> {
        let credentials = self.credentials.clone();
        let database = self.database.clone();
        self.execute(StoreOp::CreateDatabase(name.to_string()), |server| {
            server.require_admin_on_system(&credentials, &database)?;
            if server.databases.contains_key(name) {
                return Err(StoreError::DuplicateName(name.to_string()));
            }
            let mut db = DatabaseState::default();
            for user in users {
                server
                    .users
                    .entry(user.username.clone())
                    .or_insert_with(|| user.password.clone());
                db.users.insert(user.username.clone());
            }
            server.databases.insert(name.to_string(), db);
            Ok(())
        })
    }

    fn drop_database(&mut self, name: &str) -> Result<(), StoreError> {
        let credentials = self.credentials.clone();
        let database = self.database.clone();
        self.execute(StoreOp::DropDatabase(name.to_string()), |server| {
            server.require_admin_on_system(&credentials, &database)?;
            if name == SYSTEM_DATABASE {
                return Err(StoreError::Forbidden(
                    "the system database cannot be dropped".to_string(),
                ));
            }
            server
                .databases
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| StoreError::DatabaseNotFound(name.to_string()))
        })
    }

    fn run_query(&mut self, _query: &Aql) -> Result<Vec<Value>, StoreError> {
        self.execute(StoreOp::Query, |_| {
            Err(StoreError::Unsupported(
                "the memory store only evaluates seed statements".to_string(),
            ))
        })
    }

    fn run_statement(&mut self, statement: &SeedStatement) -> Result<Vec<Value>, StoreError> {
        let collection = statement.collection().to_string();
        let op = if statement.is_write() {
            StoreOp::Write(collection.clone())
        } else {
            StoreOp::Read(collection.clone())
        };
        let credentials = self.credentials.clone();
        let database = self.database.clone();
        self.execute(op, |server| {
            let mut next_rev = server.next_rev;
            let db = server.database_mut(&credentials, &database)?;
            let coll = db
                .collections
                .get_mut(&collection)
                .ok_or_else(|| StoreError::CollectionNotFound(collection.clone()))?;
            let rows = evaluate(statement, &collection, coll, &mut next_rev)?;
            server.next_rev = next_rev;
            Ok(rows)
        })
    }

    fn set_credentials(&mut self, credentials: Credentials) {
        self.credentials = credentials;
    }

    fn set_target_database(&mut self, name: &str) {
        self.database = name.to_string();
    }
}

// ============================================================================
// Statement evaluation
// ============================================================================

fn evaluate(
    statement: &SeedStatement,
    collection: &str,
    coll: &mut CollectionState,
    next_rev: &mut u64,
) -> Result<Vec<Value>, StoreError> {
    let local: Vec<&Map<String, Value>> = statement
        .records()
        .iter()
        .filter_map(Value::as_object)
        .collect();

    match statement {
        SeedStatement::MatchByKey { .. } => Ok(coll
            .documents
            .iter()
            .filter(|doc| {
                local
                    .iter()
                    .any(|rec| rec.get(KEY_ATTRIBUTE) == doc.get(KEY_ATTRIBUTE))
            })
            .cloned()
            .map(Value::Object)
            .collect()),

        SeedStatement::MatchContained { .. } => Ok(coll
            .documents
            .iter()
            .filter(|doc| {
                let remote = strip_internal(doc);
                local.iter().any(|rec| contains_attributes(&remote, rec))
            })
            .cloned()
            .map(Value::Object)
            .collect()),

        SeedStatement::InsertIgnore { .. } => {
            for rec in keyed(&local) {
                let (key, doc) = rec;
                if coll.position(key).is_some() || !edge_attributes_valid(coll.kind, doc) {
                    continue;
                }
                *next_rev += 1;
                coll.documents
                    .push(stamp(doc, collection, key, format!("_r{:08x}", *next_rev)));
            }
            Ok(Vec::new())
        }

        SeedStatement::UpsertReplace { .. } => {
            let writes: Vec<(&str, &Map<String, Value>)> = keyed(&local).collect();
            // Validate first: a failing query leaves the collection untouched.
            if writes
                .iter()
                .any(|(_, doc)| !edge_attributes_valid(coll.kind, doc))
            {
                return Err(StoreError::Server {
                    code: 400,
                    error_num: ERROR_INVALID_EDGE_ATTRIBUTE,
                    message: "edge attribute missing or invalid".to_string(),
                });
            }
            for (key, doc) in writes {
                *next_rev += 1;
                let stamped = stamp(doc, collection, key, format!("_r{:08x}", *next_rev));
                match coll.position(key) {
                    Some(index) => coll.documents[index] = stamped,
                    None => coll.documents.push(stamped),
                }
            }
            Ok(Vec::new())
        }
    }
}

fn keyed<'a>(
    local: &'a [&'a Map<String, Value>],
) -> impl Iterator<Item = (&'a str, &'a Map<String, Value>)> + 'a {
    local.iter().filter_map(|doc| {
        doc.get(KEY_ATTRIBUTE)
            .and_then(Value::as_str)
            .filter(|key| !key.is_empty())
            .map(|key| (key, *doc))
    })
}

fn edge_attributes_valid(kind: CollectionKind, doc: &Map<String, Value>) -> bool {
    match kind {
        CollectionKind::Document => true,
        CollectionKind::Edge => ["_from", "_to"]
            .iter()
            .all(|attr| doc.get(*attr).and_then(Value::as_str).is_some_and(|v| v.contains('/'))),
    }
}

fn stamp(doc: &Map<String, Value>, collection: &str, key: &str, rev: String) -> Map<String, Value> {
    let mut stored = strip_internal(doc);
    stored.insert(KEY_ATTRIBUTE.to_string(), Value::String(key.to_string()));
    stored.insert("_id".to_string(), Value::String(format!("{collection}/{key}")));
    stored.insert("_rev".to_string(), Value::String(rev));
    stored
}
