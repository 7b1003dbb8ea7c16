//! Error taxonomy for the device registry.
//!
//! Every component reports failures through [`Error`]. The context adapter
//! maps each kind onto a protocol-level response without attempting recovery.

use thiserror::Error;

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Registry error kinds.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    /// Malformed or incomplete create/patch request.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A composite value token could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// One or more controlled properties are unknown to the catalog or
    /// missing from a device's model. Lists every offending name.
    #[error("{subject} does not support controlled properties: {}", .properties.join(", "))]
    UnsupportedProperty {
        subject: String,
        properties: Vec<String>,
    },

    /// A referenced device or device model does not exist.
    #[error("No {kind} found matching {id}")]
    NotFound { kind: String, id: String },

    /// An internal referential invariant is violated.
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// The underlying store failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The entity type is not handled by any context source.
    #[error("Entity of type {0} is not supported")]
    UnsupportedType(String),
}

impl Error {
    /// Create a not-found error for the given entity kind and id.
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Whether the caller caused this error (as opposed to the server).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Error::Integrity(_) | Error::Persistence(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Validation(e.to_string())
    }
}
