//! Transactional ordered key-value capability for gitkv.
//!
//! gitkv does not implement a database. It consumes one that offers
//! strictly serializable multi-key transactions, atomic add, ordered range
//! scans, and hierarchical directories, in the style of FoundationDB. This
//! crate defines that capability as traits and ships an in-process backend
//! that honours the same contract for tests and embedding.
//!
//! # Modules
//!
//! - [`traits`] -- [`Database`] and [`Transaction`], plus the retry loop
//! - [`tuple`] -- order-preserving tuple encoding and [`Subspace`]
//! - [`directory`] -- path to short-prefix allocation
//! - [`limits`] -- key, value, and transaction size ceilings
//! - [`memory`] -- [`MemoryDatabase`], an optimistic in-memory backend
//!
//! # Transaction model
//!
//! Reads record conflict ranges, writes are buffered, and commit validates
//! that nothing read was overwritten by a transaction that committed in the
//! meantime. [`Database::transact`] reruns the whole closure when commit
//! reports a retryable error, so closures must not have side effects outside
//! the transaction.

pub mod directory;
pub mod error;
pub mod limits;
pub mod memory;
pub mod traits;
pub mod tuple;

pub use error::{KvError, KvResult};
pub use limits::KvLimits;
pub use memory::{MemoryDatabase, MemoryOptions, MemoryTransaction};
pub use traits::{Database, KeyRange, KeyValue, Transaction};
pub use tuple::{Element, Subspace};
