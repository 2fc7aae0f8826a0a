//! Error types for backend operations.

use thiserror::Error;

/// Errors reported by the key-value backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KvError {
    /// A key read by the transaction was written by a transaction that
    /// committed after this one began.
    #[error("transaction conflict: a key read by this transaction was modified concurrently")]
    Conflict,

    /// The transaction began before the oldest commit the backend still
    /// tracks for conflict detection.
    #[error("transaction too old: read version {read_version} predates retained history")]
    TransactionTooOld { read_version: u64 },

    #[error("key too large: {size} bytes exceeds limit of {limit}")]
    KeyTooLarge { size: usize, limit: usize },

    #[error("value too large: {size} bytes exceeds limit of {limit}")]
    ValueTooLarge { size: usize, limit: usize },

    #[error("transaction too large: {size} bytes exceeds limit of {limit}")]
    TransactionTooLarge { size: usize, limit: usize },

    /// The retry loop gave up; `last` is the final retryable error.
    #[error("transaction failed after {attempts} attempts: {last}")]
    RetryLimitExceeded { attempts: usize, last: Box<KvError> },

    /// The backend could not be reached or refused the request.
    #[error("database unavailable: {0}")]
    Unavailable(String),

    /// A key could not be decoded as a tuple.
    #[error("invalid tuple encoding: {0}")]
    InvalidTuple(String),

    /// A directory path is empty or has an empty segment.
    #[error("invalid directory path: {0}")]
    InvalidPath(String),

    #[error("directory not found: {0}")]
    DirectoryNotFound(String),
}

impl KvError {
    /// Returns `true` if rerunning the transaction from scratch may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict | Self::TransactionTooOld { .. })
    }

    /// Returns `true` for every flavour of concurrency failure, including
    /// an exhausted retry loop.
    pub fn is_conflict(&self) -> bool {
        self.is_retryable() || matches!(self, Self::RetryLimitExceeded { .. })
    }
}

/// Convenience alias for backend results.
pub type KvResult<T> = Result<T, KvError>;
