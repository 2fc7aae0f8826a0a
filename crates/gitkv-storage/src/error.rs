use gitkv_backend::KvError;
use gitkv_refs::RefError;
use gitkv_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("configuration error: {0}")]
    Config(String),

    /// A stored document could not be decoded.
    #[error("corrupt {what}: {reason}")]
    Corrupt { what: &'static str, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Refs(#[from] RefError),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Store(e) => e.is_not_found(),
            Self::Refs(e) => e.is_not_found(),
            _ => false,
        }
    }

    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Store(e) => e.is_conflict(),
            Self::Refs(e) => e.is_conflict(),
            _ => false,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        match self {
            Self::Store(e) => e.is_unsupported(),
            Self::Refs(e) => e.is_unsupported(),
            _ => false,
        }
    }

    /// Attach operation context to a backend error.
    pub fn context(self, context: impl Into<String>) -> Self {
        match self {
            Self::Store(e) => Self::Store(e.context(context)),
            Self::Refs(e) => Self::Refs(e.context(context)),
            other => other,
        }
    }
}

impl From<KvError> for StorageError {
    fn from(e: KvError) -> Self {
        Self::Store(StoreError::from(e))
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
