//! Foundation types for gitkv.
//!
//! This crate provides the identifiers shared by every gitkv crate. It has no
//! knowledge of the key-value backend; it only describes what the version
//! control toolkit hands to the storage layer.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- Content-addressed identifier (BLAKE3 over framed content)
//! - [`ObjectType`] -- Object type tag (commit, tree, blob, tag, or the `any` wildcard)

pub mod error;
pub mod kind;
pub mod object;

pub use error::TypeError;
pub use kind::ObjectType;
pub use object::ObjectId;
