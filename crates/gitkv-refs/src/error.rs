//! Error types for reference operations.

use gitkv_backend::KvError;
use gitkv_store::StoreError;
use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The reference was not found.
    #[error("ref not found: {name}")]
    NotFound { name: String },

    /// The reference name is invalid.
    #[error("invalid ref name: {name}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A stored or supplied target is neither a hash nor `ref: <name>`.
    #[error("invalid ref target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },

    /// A compare-and-set found a different value than expected.
    #[error("reference has changed: {name}")]
    ReferenceChanged { name: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The operation has no meaning for a key-value backed repository.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    /// Failure in the key space or backend.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RefError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` for a failed compare-and-set or a backend conflict.
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::ReferenceChanged { .. } => true,
            Self::Store(e) => e.is_conflict(),
            _ => false,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }

    /// Attach operation context to a backend error.
    pub fn context(self, context: impl Into<String>) -> Self {
        match self {
            Self::Store(e) => Self::Store(e.context(context)),
            other => other,
        }
    }
}

impl From<KvError> for RefError {
    fn from(e: KvError) -> Self {
        Self::Store(StoreError::from(e))
    }
}

impl From<serde_json::Error> for RefError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Convenience type alias for ref operations.
pub type Result<T> = std::result::Result<T, RefError>;
