//! Object storage for gitkv.
//!
//! Objects handed over by the version control toolkit are split into
//! fixed-size chunks and written, together with a small JSON header, in a
//! single transaction on a [`gitkv_backend::Database`]. Reads reassemble the
//! chunks inside one validated transaction, so a reader never sees half an
//! object.
//!
//! # Modules
//!
//! - [`keyspace`] -- [`KeySpace`] builds every key; [`KeyLayout`] picks which
//!   header keys exist
//! - [`counter`] -- atomic 64-bit counters
//! - [`codec`] -- [`ObjectCodec`] chunking and [`ObjectHeader`] encoding
//! - [`traits`] -- the [`ObjectStore`] contract
//! - [`kv`] -- [`KvObjectStore`], the backend implementation
//!
//! # Design Rules
//!
//! 1. No module other than [`keyspace`] computes a key.
//! 2. Objects are buffered whole before their transaction opens.
//! 3. Re-putting identical content is a no-op; a different header under an
//!    existing id is refused.
//! 4. Malformed stored data surfaces as an error, never as "not found".

pub mod codec;
pub mod counter;
pub mod error;
pub mod keyspace;
pub mod kv;
pub mod object;
pub mod traits;

pub use codec::{EncodedChunks, ObjectCodec, ObjectHeader, DEFAULT_CHUNK_SIZE};
pub use error::{StoreError, StoreResult};
pub use keyspace::{KeyLayout, KeySpace, Partition};
pub use kv::{KvObjectStore, ObjectIter, DEFAULT_PAGE_SIZE};
pub use object::EncodedObject;
pub use traits::ObjectStore;
