//! Store errors, classified from ArangoDB error numbers.

/// `ERROR_FORBIDDEN`
pub const ERROR_FORBIDDEN: u32 = 11;
/// `ERROR_ARANGO_DATA_SOURCE_NOT_FOUND`
pub const ERROR_COLLECTION_NOT_FOUND: u32 = 1203;
/// `ERROR_ARANGO_DUPLICATE_NAME`
pub const ERROR_DUPLICATE_NAME: u32 = 1207;
/// `ERROR_ARANGO_UNIQUE_CONSTRAINT_VIOLATED`
pub const ERROR_UNIQUE_CONSTRAINT: u32 = 1210;
/// `ERROR_ARANGO_DATABASE_NOT_FOUND`
pub const ERROR_DATABASE_NOT_FOUND: u32 = 1228;
/// `ERROR_ARANGO_USE_SYSTEM_DATABASE`
pub const ERROR_USE_SYSTEM_DATABASE: u32 = 1230;
/// `ERROR_ARANGO_INVALID_EDGE_ATTRIBUTE`
pub const ERROR_INVALID_EDGE_ATTRIBUTE: u32 = 1233;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate name: {0}")]
    DuplicateName(String),

    #[error("unique constraint violated: {0}")]
    UniqueConstraint(String),

    #[error("collection or view not found: {0}")]
    CollectionNotFound(String),

    #[error("database not found: {0}")]
    DatabaseNotFound(String),

    #[error("not authorized to execute this request")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{message} (code {code}, errorNum {error_num})")]
    Server {
        code: u16,
        error_num: u32,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("unsupported request: {0}")]
    Unsupported(String),
}

impl StoreError {
    /// Classify an ArangoDB error response.
    pub fn from_response(code: u16, error_num: u32, message: impl Into<String>) -> Self {
        let message = message.into();
        match (code, error_num) {
            (401, _) => Self::Unauthorized,
            (_, ERROR_DUPLICATE_NAME) => Self::DuplicateName(message),
            (_, ERROR_UNIQUE_CONSTRAINT) => Self::UniqueConstraint(message),
            (_, ERROR_COLLECTION_NOT_FOUND) => Self::CollectionNotFound(message),
            (_, ERROR_DATABASE_NOT_FOUND) => Self::DatabaseNotFound(message),
            (403, _) | (_, ERROR_FORBIDDEN) => Self::Forbidden(message),
            _ => Self::Server {
                code,
                error_num,
                message,
            },
        }
    }

    /// "Already exists" failures from collection or database creation.
    pub fn is_duplicate_name(&self) -> bool {
        match self {
            Self::DuplicateName(_) => true,
            Self::Server { message, .. } => message.contains("duplicate name"),
            _ => false,
        }
    }

    /// The ArangoDB error number, when the error came from the server.
    pub fn error_num(&self) -> Option<u32> {
        match self {
            Self::DuplicateName(_) => Some(ERROR_DUPLICATE_NAME),
            Self::UniqueConstraint(_) => Some(ERROR_UNIQUE_CONSTRAINT),
            Self::CollectionNotFound(_) => Some(ERROR_COLLECTION_NOT_FOUND),
            Self::DatabaseNotFound(_) => Some(ERROR_DATABASE_NOT_FOUND),
            Self::Forbidden(_) => Some(ERROR_FORBIDDEN),
            Self::Server { error_num, .. } => Some(*error_num),
            _ => None,
        }
    }
}
