//! The [`Database`] and [`Transaction`] traits.
//!
//! Any ordered transactional store (FoundationDB, an in-memory map, a test
//! double with injected faults) implements these to host gitkv.

use tracing::debug;

use crate::error::{KvError, KvResult};
use crate::limits::KvLimits;

/// A half-open key range `[begin, end)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyRange {
    pub begin: Vec<u8>,
    pub end: Vec<u8>,
}

impl KeyRange {
    pub fn new(begin: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        Self {
            begin: begin.into(),
            end: end.into(),
        }
    }

    /// The range holding exactly one key.
    pub fn single(key: &[u8]) -> Self {
        let mut end = key.to_vec();
        end.push(0x00);
        Self::new(key.to_vec(), end)
    }

    /// Every key that starts with `prefix`, including `prefix` itself.
    ///
    /// Trailing `0xff` bytes cannot be incremented and are dropped before the
    /// end key is computed; a prefix made only of `0xff` yields the range up
    /// to the end of the keyspace.
    pub fn starting_with(prefix: &[u8]) -> Self {
        let mut end = prefix.to_vec();
        while end.last() == Some(&0xff) {
            end.pop();
        }
        match end.last_mut() {
            Some(last) => *last += 1,
            None => end = vec![0xff; prefix.len() + 1],
        }
        Self::new(prefix.to_vec(), end)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        key >= self.begin.as_slice() && key < self.end.as_slice()
    }

    pub fn overlaps(&self, other: &KeyRange) -> bool {
        self.begin < other.end && other.begin < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.begin >= self.end
    }

    /// The same range with its lower bound moved just past `key`.
    pub fn after(&self, key: &[u8]) -> KeyRange {
        let mut begin = key.to_vec();
        begin.push(0x00);
        KeyRange::new(begin.max(self.begin.clone()), self.end.clone())
    }
}

/// A key and its value, as returned by range reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyValue {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// One unit of atomic work against a [`Database`].
///
/// Reads observe the transaction's own buffered writes. Nothing is visible to
/// other transactions until [`Database::commit`] succeeds; dropping a
/// transaction without committing discards it.
pub trait Transaction {
    /// The database version this transaction reads at.
    fn read_version(&self) -> u64;

    /// Read one key. Returns `Ok(None)` if the key is absent.
    fn get(&mut self, key: &[u8]) -> KvResult<Option<Vec<u8>>>;

    /// Read keys in `range` in ascending order, at most `limit` of them
    /// (`0` means no limit).
    fn get_range(&mut self, range: &KeyRange, limit: usize) -> KvResult<Vec<KeyValue>>;

    /// Buffer a write. Fails immediately if the key or value exceeds the
    /// backend's limits.
    fn set(&mut self, key: &[u8], value: &[u8]) -> KvResult<()>;

    /// Buffer the removal of one key.
    fn clear(&mut self, key: &[u8]);

    /// Buffer the removal of every key in `range`.
    fn clear_range(&mut self, range: &KeyRange);

    /// Buffer a little-endian wrapping addition of `param` to the value at
    /// `key`. An absent key counts as zero. Adds no read conflict, so
    /// concurrent adds to the same key never conflict with each other.
    fn atomic_add(&mut self, key: &[u8], param: &[u8]) -> KvResult<()>;
}

/// A transactional, ordered key-value database.
pub trait Database: Send + Sync {
    type Txn: Transaction;

    /// Start a transaction at the current version.
    fn begin(&self) -> KvResult<Self::Txn>;

    /// Validate and apply a transaction, returning its commit version.
    fn commit(&self, txn: Self::Txn) -> KvResult<u64>;

    fn limits(&self) -> &KvLimits;

    /// How many times [`transact`](Database::transact) reruns a closure after
    /// a retryable commit failure.
    fn retry_limit(&self) -> usize;

    /// Run `f` inside a transaction and commit it, rerunning `f` from scratch
    /// on retryable commit failures.
    ///
    /// Errors returned by `f` abort the transaction and are returned as-is;
    /// only commit failures are retried.
    fn transact<T, E, F>(&self, mut f: F) -> Result<T, E>
    where
        F: FnMut(&mut Self::Txn) -> Result<T, E>,
        E: From<KvError>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut txn = self.begin()?;
            let out = f(&mut txn)?;
            match self.commit(txn) {
                Ok(_) => return Ok(out),
                Err(err) if err.is_retryable() && attempt <= self.retry_limit() => {
                    debug!(attempt, error = %err, "retrying transaction");
                }
                Err(err) if err.is_retryable() => {
                    return Err(KvError::RetryLimitExceeded {
                        attempts: attempt,
                        last: Box::new(err),
                    }
                    .into());
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Run a closure that only reads.
    ///
    /// The transaction is still validated at the end, so every value the
    /// closure saw belongs to one consistent version of the database.
    fn read_transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnMut(&mut Self::Txn) -> Result<T, E>,
        E: From<KvError>,
    {
        self.transact(f)
    }
}
