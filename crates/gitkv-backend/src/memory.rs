//! In-memory backend for tests and embedding.
//!
//! [`MemoryDatabase`] keeps every key in a `BTreeMap` behind a `Mutex` and
//! runs optimistic concurrency control on top of it: transactions record the
//! ranges they read, commits record the ranges they wrote, and a commit is
//! refused when a range it read was written by a later commit. That is enough
//! to give the same serializable behaviour the real store provides, including
//! genuine conflicts between threads.
//!
//! Faults can be injected to exercise retry and failure paths.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace};

use crate::error::{KvError, KvResult};
use crate::limits::KvLimits;
use crate::traits::{Database, KeyRange, KeyValue, Transaction};

/// Tuning for a [`MemoryDatabase`].
#[derive(Clone, Debug)]
pub struct MemoryOptions {
    pub limits: KvLimits,
    /// Retries granted to [`Database::transact`].
    pub retry_limit: usize,
    /// Number of recent commits kept for conflict detection. Transactions
    /// older than the retained window fail with `TransactionTooOld`.
    pub history_limit: usize,
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            limits: KvLimits::default(),
            retry_limit: 10,
            history_limit: 10_000,
        }
    }
}

/// A buffered mutation, applied in order at commit.
#[derive(Clone, Debug)]
enum Mutation {
    Set(Vec<u8>, Vec<u8>),
    Clear(Vec<u8>),
    ClearRange(KeyRange),
    Add(Vec<u8>, Vec<u8>),
}

impl Mutation {
    /// Apply this mutation to the value currently held for `key`.
    fn apply_to(&self, key: &[u8], current: Option<Vec<u8>>) -> Option<Vec<u8>> {
        match self {
            Mutation::Set(k, v) if k == key => Some(v.clone()),
            Mutation::Clear(k) if k == key => None,
            Mutation::ClearRange(r) if r.contains(key) => None,
            Mutation::Add(k, p) if k == key => Some(add_le(current.as_deref(), p)),
            _ => current,
        }
    }
}

/// Little-endian wrapping addition with the width of `param`.
fn add_le(existing: Option<&[u8]>, param: &[u8]) -> Vec<u8> {
    let Some(existing) = existing else {
        return param.to_vec();
    };
    let mut out = Vec::with_capacity(param.len());
    let mut carry = 0u16;
    for (i, &p) in param.iter().enumerate() {
        let e = existing.get(i).copied().unwrap_or(0);
        let sum = e as u16 + p as u16 + carry;
        out.push(sum as u8);
        carry = sum >> 8;
    }
    out
}

struct CommitRecord {
    version: u64,
    writes: Vec<KeyRange>,
}

#[derive(Default)]
struct Faults {
    conflicts: usize,
    unavailable: usize,
}

struct State {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    version: u64,
    history: VecDeque<CommitRecord>,
    /// Every commit newer than this version is still in `history`.
    oldest_retained: u64,
    faults: Faults,
}

struct Shared {
    state: Mutex<State>,
    options: MemoryOptions,
}

impl Shared {
    fn lock(&self) -> KvResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| KvError::Unavailable(format!("lock poisoned: {e}")))
    }
}

/// An in-memory, optimistic, serializable key-value database.
///
/// Cloning yields another handle to the same data.
#[derive(Clone)]
pub struct MemoryDatabase {
    shared: Arc<Shared>,
}

impl MemoryDatabase {
    /// Create an empty database with default options.
    pub fn new() -> Self {
        Self::with_options(MemoryOptions::default())
    }

    pub fn with_options(options: MemoryOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    data: BTreeMap::new(),
                    version: 0,
                    history: VecDeque::new(),
                    oldest_retained: 0,
                    faults: Faults::default(),
                }),
                options,
            }),
        }
    }

    /// Number of keys currently stored.
    pub fn key_count(&self) -> usize {
        self.shared.lock().map(|s| s.data.len()).unwrap_or(0)
    }

    /// The version of the most recent commit.
    pub fn version(&self) -> u64 {
        self.shared.lock().map(|s| s.version).unwrap_or(0)
    }

    /// Make the next `n` commits fail with [`KvError::Conflict`].
    pub fn inject_conflicts(&self, n: usize) {
        if let Ok(mut state) = self.shared.lock() {
            state.faults.conflicts += n;
        }
    }

    /// Make the next `n` commits fail with [`KvError::Unavailable`].
    pub fn inject_unavailable(&self, n: usize) {
        if let Ok(mut state) = self.shared.lock() {
            state.faults.unavailable += n;
        }
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDatabase")
            .field("key_count", &self.key_count())
            .field("version", &self.version())
            .finish()
    }
}

/// A transaction against a [`MemoryDatabase`].
pub struct MemoryTransaction {
    shared: Arc<Shared>,
    read_version: u64,
    mutations: Vec<Mutation>,
    reads: Vec<KeyRange>,
    writes: Vec<KeyRange>,
    payload: usize,
}

impl MemoryTransaction {
    /// Bytes of mutations buffered so far.
    pub fn payload_size(&self) -> usize {
        self.payload
    }

    fn limits(&self) -> &KvLimits {
        &self.shared.options.limits
    }
}

impl Transaction for MemoryTransaction {
    fn read_version(&self) -> u64 {
        self.read_version
    }

    fn get(&mut self, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        let base = self.shared.lock()?.data.get(key).cloned();
        let value = self
            .mutations
            .iter()
            .fold(base, |current, m| m.apply_to(key, current));
        self.reads.push(KeyRange::single(key));
        Ok(value)
    }

    fn get_range(&mut self, range: &KeyRange, limit: usize) -> KvResult<Vec<KeyValue>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let mut view: BTreeMap<Vec<u8>, Vec<u8>> = {
            let state = self.shared.lock()?;
            state
                .data
                .range(range.begin.clone()..range.end.clone())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };

        // Overlay this transaction's own mutations, in order.
        for m in &self.mutations {
            match m {
                Mutation::Set(k, v) if range.contains(k) => {
                    view.insert(k.clone(), v.clone());
                }
                Mutation::Clear(k) => {
                    view.remove(k);
                }
                Mutation::ClearRange(r) => view.retain(|k, _| !r.contains(k)),
                Mutation::Add(k, p) if range.contains(k) => {
                    let sum = add_le(view.get(k).map(Vec::as_slice), p);
                    view.insert(k.clone(), sum);
                }
                _ => {}
            }
        }

        let take = if limit == 0 { usize::MAX } else { limit };
        let result: Vec<KeyValue> = view
            .into_iter()
            .take(take)
            .map(|(key, value)| KeyValue { key, value })
            .collect();

        // A truncated scan only depends on the keys up to the last one returned.
        let read = match result.last() {
            Some(last) if result.len() == take => {
                let mut end = last.key.clone();
                end.push(0x00);
                KeyRange::new(range.begin.clone(), end)
            }
            _ => range.clone(),
        };
        self.reads.push(read);
        Ok(result)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> KvResult<()> {
        self.limits().check_pair(key, value)?;
        self.payload += key.len() + value.len();
        self.writes.push(KeyRange::single(key));
        self.mutations.push(Mutation::Set(key.to_vec(), value.to_vec()));
        Ok(())
    }

    fn clear(&mut self, key: &[u8]) {
        self.payload += key.len();
        self.writes.push(KeyRange::single(key));
        self.mutations.push(Mutation::Clear(key.to_vec()));
    }

    fn clear_range(&mut self, range: &KeyRange) {
        self.payload += range.begin.len() + range.end.len();
        self.writes.push(range.clone());
        self.mutations.push(Mutation::ClearRange(range.clone()));
    }

    fn atomic_add(&mut self, key: &[u8], param: &[u8]) -> KvResult<()> {
        self.limits().check_pair(key, param)?;
        self.payload += key.len() + param.len();
        self.writes.push(KeyRange::single(key));
        self.mutations.push(Mutation::Add(key.to_vec(), param.to_vec()));
        Ok(())
    }
}

impl Database for MemoryDatabase {
    type Txn = MemoryTransaction;

    fn begin(&self) -> KvResult<MemoryTransaction> {
        let read_version = self.shared.lock()?.version;
        Ok(MemoryTransaction {
            shared: Arc::clone(&self.shared),
            read_version,
            mutations: Vec::new(),
            reads: Vec::new(),
            writes: Vec::new(),
            payload: 0,
        })
    }

    fn commit(&self, txn: MemoryTransaction) -> KvResult<u64> {
        let options = &self.shared.options;
        let mut state = self.shared.lock()?;

        if state.faults.unavailable > 0 {
            state.faults.unavailable -= 1;
            return Err(KvError::Unavailable("injected fault".into()));
        }
        if state.faults.conflicts > 0 {
            state.faults.conflicts -= 1;
            return Err(KvError::Conflict);
        }

        options.limits.check_transaction(txn.payload)?;

        if !txn.reads.is_empty() {
            if txn.read_version < state.oldest_retained {
                return Err(KvError::TransactionTooOld {
                    read_version: txn.read_version,
                });
            }
            let conflicted = state
                .history
                .iter()
                .filter(|rec| rec.version > txn.read_version)
                .any(|rec| {
                    rec.writes
                        .iter()
                        .any(|w| txn.reads.iter().any(|r| r.overlaps(w)))
                });
            if conflicted {
                debug!(read_version = txn.read_version, "commit rejected on read conflict");
                return Err(KvError::Conflict);
            }
        }

        if txn.mutations.is_empty() {
            return Ok(state.version);
        }

        for m in &txn.mutations {
            match m {
                Mutation::Set(k, v) => {
                    state.data.insert(k.clone(), v.clone());
                }
                Mutation::Clear(k) => {
                    state.data.remove(k);
                }
                Mutation::ClearRange(r) => {
                    let doomed: Vec<Vec<u8>> = state
                        .data
                        .range(r.begin.clone()..r.end.clone())
                        .map(|(k, _)| k.clone())
                        .collect();
                    for k in doomed {
                        state.data.remove(&k);
                    }
                }
                Mutation::Add(k, p) => {
                    let sum = add_le(state.data.get(k).map(Vec::as_slice), p);
                    state.data.insert(k.clone(), sum);
                }
            }
        }

        state.version += 1;
        let version = state.version;
        state.history.push_back(CommitRecord {
            version,
            writes: txn.writes,
        });
        while state.history.len() > options.history_limit {
            if let Some(dropped) = state.history.pop_front() {
                state.oldest_retained = dropped.version;
            }
        }
        trace!(version, mutations = txn.mutations.len(), "committed");
        Ok(version)
    }

    fn limits(&self) -> &KvLimits {
        &self.shared.options.limits
    }

    fn retry_limit(&self) -> usize {
        self.shared.options.retry_limit
    }
}
