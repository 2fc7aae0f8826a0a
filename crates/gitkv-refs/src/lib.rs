//! Reference management for gitkv.
//!
//! References are the named entry points into the object graph: branches,
//! tags, remote tracking refs, and pseudo refs such as `HEAD`. Each is one
//! JSON record in the namespace's reference partition. A live counter of
//! stored references is kept exact by updating it in the same transaction
//! as the record it counts.
//!
//! # Modules
//!
//! - [`error`] -- Error types for ref operations
//! - [`types`] -- [`Reference`] and [`RefTarget`]
//! - [`names`] -- Reference name validation
//! - [`traits`] -- The [`RefStore`] trait defining the storage interface
//! - [`kv`] -- [`KvRefStore`], the backend implementation

pub mod error;
pub mod kv;
pub mod names;
pub mod traits;
pub mod types;

pub use error::{RefError, Result};
pub use kv::{KvRefStore, RefIter};
pub use names::validate_reference_name;
pub use traits::RefStore;
pub use types::{RefTarget, Reference, HEAD, REFS_HEADS, REFS_REMOTES, REFS_TAGS};
