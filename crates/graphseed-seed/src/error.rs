use graphseed_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    /// The seed declaration breaks the structural contract. Never retried.
    #[error("{0}")]
    Configuration(String),

    /// A store request failed; `context` names the collection or database.
    #[error("{context}: {source}")]
    Store {
        context: String,
        #[source]
        source: StoreError,
    },

    /// Fewer remote records than eligible local records after a sync.
    #[error("seeds not synchronized: {collection} ({found} of {expected} records present)")]
    Shortfall {
        collection: String,
        expected: usize,
        found: usize,
    },
}

impl SeedError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn collection(name: &str, source: StoreError) -> Self {
        Self::Store {
            context: format!("collection `{name}`"),
            source,
        }
    }

    pub fn database(name: &str, source: StoreError) -> Self {
        Self::Store {
            context: format!("database `{name}`"),
            source,
        }
    }

    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store { source, .. } => Some(source),
            _ => None,
        }
    }
}
