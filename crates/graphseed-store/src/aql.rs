//! AQL queries and the seed statements rendered from them.

use serde::Serialize;
use serde_json::{Map, Value};

/// A parameterized AQL query, serialized as an ArangoDB cursor request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aql {
    query: String,
    #[serde(rename = "bindVars", skip_serializing_if = "Map::is_empty")]
    bind_vars: Map<String, Value>,
    #[serde(rename = "batchSize", skip_serializing_if = "Option::is_none")]
    batch_size: Option<u32>,
}

impl Aql {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            bind_vars: Map::new(),
            batch_size: None,
        }
    }

    /// Bind `@name` (or `@@name` for a collection, passing `"@name"`).
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bind_vars.insert(name.into(), value.into());
        self
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn bind_vars(&self) -> &Map<String, Value> {
        &self.bind_vars
    }

    pub fn batch_size(&self) -> Option<u32> {
        self.batch_size
    }
}

// Local records are bound as `@records`, the collection as `@@collection`.
// `@records` may arrive as null, hence the guard in every read template.

const MATCH_BY_KEY: &str = r#"
FOR x IN @@collection
    FOR y IN (@records != null ? @records : [])
        FILTER x._key == y._key
        RETURN DISTINCT x
"#;

const MATCH_CONTAINED: &str = r#"
FOR x IN @@collection
    LET remote = UNSET(x, "_id", "_rev")
    FOR y IN (@records != null ? @records : [])
        LET local = UNSET(y, "_id", "_rev")
        FILTER MATCHES(remote, MERGE(remote, local))
        RETURN DISTINCT x
"#;

const INSERT_IGNORE: &str = r#"
FOR x IN (@records != null ? @records : [])
    FILTER x._key != "" && x._key != null
    INSERT x IN @@collection OPTIONS { ignoreErrors: true }
"#;

const UPSERT_REPLACE: &str = r#"
FOR x IN (@records != null ? @records : [])
    FILTER x._key != "" && x._key != null
    UPSERT { _key: x._key }
    INSERT x
    REPLACE x IN @@collection
"#;

/// The four queries the seed engine issues, with their bound records.
#[derive(Debug, Clone, PartialEq)]
pub enum SeedStatement {
    /// Remote documents whose `_key` equals a local record's `_key`.
    MatchByKey {
        collection: String,
        records: Vec<Value>,
    },
    /// Remote documents containing every attribute of a local record.
    MatchContained {
        collection: String,
        records: Vec<Value>,
    },
    /// Insert keyed records; duplicate keys are ignored.
    InsertIgnore {
        collection: String,
        records: Vec<Value>,
    },
    /// Replace keyed records in place, inserting the missing ones.
    UpsertReplace {
        collection: String,
        records: Vec<Value>,
    },
}

impl SeedStatement {
    pub fn collection(&self) -> &str {
        match self {
            Self::MatchByKey { collection, .. }
            | Self::MatchContained { collection, .. }
            | Self::InsertIgnore { collection, .. }
            | Self::UpsertReplace { collection, .. } => collection,
        }
    }

    pub fn records(&self) -> &[Value] {
        match self {
            Self::MatchByKey { records, .. }
            | Self::MatchContained { records, .. }
            | Self::InsertIgnore { records, .. }
            | Self::UpsertReplace { records, .. } => records,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Self::InsertIgnore { .. } | Self::UpsertReplace { .. })
    }

    fn template(&self) -> &'static str {
        match self {
            Self::MatchByKey { .. } => MATCH_BY_KEY,
            Self::MatchContained { .. } => MATCH_CONTAINED,
            Self::InsertIgnore { .. } => INSERT_IGNORE,
            Self::UpsertReplace { .. } => UPSERT_REPLACE,
        }
    }

    pub fn to_aql(&self) -> Aql {
        Aql::new(self.template())
            .bind("@collection", self.collection())
            .bind("records", Value::Array(self.records().to_vec()))
    }
}
