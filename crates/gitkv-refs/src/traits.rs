//! The [`RefStore`] trait defining the reference storage interface.

use crate::error::{RefError, Result};
use crate::types::{Reference, HEAD, REFS_HEADS, REFS_REMOTES, REFS_TAGS};

/// Storage backend for named references.
///
/// Implementations must be thread-safe (`Send + Sync`). Writes are
/// last-writer-wins unless made through
/// [`check_and_set_reference`](RefStore::check_and_set_reference). The
/// namespace follows git's layout:
///
/// - `refs/heads/*` for branches
/// - `refs/tags/*` for tags
/// - `refs/remotes/{remote}/*` for remote tracking refs
/// - all-caps pseudo refs such as `HEAD`
pub trait RefStore: Send + Sync {
    /// Lazy enumeration of references in name order.
    type Iter: Iterator<Item = Result<Reference>>;

    /// Read a reference by its full name. Absent refs are `NotFound`.
    fn reference(&self, name: &str) -> Result<Reference>;

    /// Create or overwrite a reference.
    fn set_reference(&self, reference: &Reference) -> Result<()>;

    /// Write `new` only if the stored reference of the same name still
    /// points at `old`'s hash. With `old = None` this is a plain set.
    fn check_and_set_reference(&self, new: &Reference, old: Option<&Reference>) -> Result<()>;

    /// Delete a reference. Removing an absent reference is not an error.
    fn remove_reference(&self, name: &str) -> Result<()>;

    /// Every stored reference.
    fn references(&self) -> Result<Self::Iter>;

    /// References whose full name starts with `prefix`.
    fn references_with_prefix(&self, prefix: &str) -> Result<Self::Iter>;

    /// Number of stored references, as maintained by the write path.
    fn count_loose_refs(&self) -> Result<i64>;

    fn pack_refs(&self) -> Result<()> {
        Err(RefError::Unsupported("pack refs"))
    }

    fn head(&self) -> Result<Reference> {
        self.reference(HEAD)
    }

    /// All branch refs.
    fn branches(&self) -> Result<Self::Iter> {
        self.references_with_prefix(REFS_HEADS)
    }

    /// All tag refs.
    fn tags(&self) -> Result<Self::Iter> {
        self.references_with_prefix(REFS_TAGS)
    }

    /// All known remote names.
    fn remotes(&self) -> Result<Vec<String>> {
        let mut remotes = Vec::new();
        for reference in self.references_with_prefix(REFS_REMOTES)? {
            let reference = reference?;
            if let Some(remote) = reference
                .name()
                .strip_prefix(REFS_REMOTES)
                .and_then(|rest| rest.split('/').next())
            {
                remotes.push(remote.to_string());
            }
        }
        remotes.sort();
        remotes.dedup();
        Ok(remotes)
    }
}
