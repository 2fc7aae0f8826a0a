//! Working index document for gitkv.
//!
//! The index records which blob each tracked path holds, its mode and size,
//! and any unresolved merge stages. gitkv stores it as a single document per
//! repository and replaces it wholesale on every write.
//!
//! # Key Types
//!
//! - [`Index`] -- The index document, entries sorted by path and stage
//! - [`IndexEntry`] -- A tracked path at one stage
//! - [`EntryMode`] -- File mode (regular, executable, symlink, submodule)
//! - [`Stage`] -- Merge stage; anything but `Merged` is a conflict
//! - [`IndexFlags`] -- Per-entry flags

pub mod entry;
pub mod error;
pub mod index;

pub use entry::{EntryMode, IndexEntry, IndexFlags, Stage};
pub use error::{IndexError, IndexResult};
pub use index::Index;
