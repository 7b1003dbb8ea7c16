//! Error types for the storage crate.

use thiserror::Error;

pub use devreg_core::Error as RegistryError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Storage error types.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Row (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Storage/Database error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Unique index already holds the value.
    #[error("Unique constraint violated: {column} = {value}")]
    Conflict { column: &'static str, value: String },

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Composite value token could not be parsed.
    #[error("{0}")]
    Parse(String),

    /// Controlled properties unknown to the catalog or to a device model.
    #[error("{subject} does not support controlled properties: {}", .properties.join(", "))]
    UnsupportedProperty {
        subject: String,
        properties: Vec<String>,
    },

    /// Not found error.
    #[error("No {kind} found matching {id}")]
    NotFound { kind: &'static str, id: String },

    /// Referential invariant violated inside the store.
    #[error("Integrity error: {0}")]
    Integrity(String),
}

impl Error {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }
}

// Convert to the registry-wide taxonomy
impl From<Error> for RegistryError {
    fn from(e: Error) -> Self {
        match e {
            Error::InvalidInput(s) => RegistryError::Validation(s),
            Error::Parse(s) => RegistryError::Parse(s),
            Error::UnsupportedProperty {
                subject,
                properties,
            } => RegistryError::UnsupportedProperty {
                subject,
                properties,
            },
            Error::NotFound { kind, id } => RegistryError::not_found(kind, id),
            Error::Integrity(s) => RegistryError::Integrity(s),
            Error::Io(_) | Error::Serialization(_) | Error::Storage(_) | Error::Conflict { .. } => {
                RegistryError::Persistence(e.to_string())
            }
        }
    }
}

// External error conversions
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<redb::Error> for Error {
    fn from(e: redb::Error) -> Self {
        Error::Storage(format!("Redb error: {}", e))
    }
}

impl From<redb::TransactionError> for Error {
    fn from(e: redb::TransactionError) -> Self {
        Error::Storage(format!("Redb transaction error: {}", e))
    }
}

impl From<redb::TableError> for Error {
    fn from(e: redb::TableError) -> Self {
        Error::Storage(format!("Redb table error: {}", e))
    }
}

impl From<redb::StorageError> for Error {
    fn from(e: redb::StorageError) -> Self {
        Error::Storage(format!("Redb storage error: {}", e))
    }
}

impl From<redb::CommitError> for Error {
    fn from(e: redb::CommitError) -> Self {
        Error::Storage(format!("Redb commit error: {}", e))
    }
}

impl From<redb::DatabaseError> for Error {
    fn from(e: redb::DatabaseError) -> Self {
        Error::Storage(format!("Redb database error: {}", e))
    }
}
