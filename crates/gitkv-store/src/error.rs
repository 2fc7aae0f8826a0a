use gitkv_backend::KvError;
use gitkv_types::ObjectId;

use crate::keyspace::KeyLayout;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// A stored value is malformed (a counter of the wrong width, a chunk
    /// sequence that disagrees with its header).
    #[error("corrupt data: {0}")]
    Corrupt(String),

    /// The object data is malformed or cannot be decoded.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: ObjectId, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Reading the object stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation has no meaning for a key-value backed repository.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    /// A key component was empty or otherwise unencodable.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The namespace was created with a different key layout.
    #[error("key layout mismatch: namespace uses {stored}, requested {requested}")]
    LayoutMismatch {
        stored: KeyLayout,
        requested: KeyLayout,
    },

    /// An object with the same id but a different header is already stored.
    #[error("object {id} already stored as {stored}, refusing {incoming}")]
    ConflictingObject {
        id: ObjectId,
        stored: String,
        incoming: String,
    },

    /// The object cannot be written in a single transaction.
    #[error("object {id} is too large: {size} bytes exceeds the {limit} byte transaction limit")]
    ObjectTooLarge { id: ObjectId, size: u64, limit: usize },

    /// Enumeration was requested for the `any` wildcard.
    #[error("cannot enumerate objects of type 'any'")]
    WildcardEnumeration,

    /// Attempted to write a null object ID.
    #[error("cannot store object with null ID")]
    NullObjectId,

    /// The backend failed.
    #[error("{context}: {source}")]
    Backend {
        context: String,
        #[source]
        source: KvError,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` if the failure was a transaction conflict, including
    /// one that exhausted the retry loop.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Backend { source, .. } if source.is_conflict())
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }

    /// Replace the context of a backend error. Other variants pass through.
    pub fn context(self, context: impl Into<String>) -> Self {
        match self {
            Self::Backend { source, .. } => Self::Backend {
                context: context.into(),
                source,
            },
            other => other,
        }
    }
}

impl From<KvError> for StoreError {
    fn from(source: KvError) -> Self {
        Self::Backend {
            context: "backend".into(),
            source,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
