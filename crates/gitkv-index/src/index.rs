//! The [`Index`] document.
//!
//! Entries are kept sorted by `(path, stage)`, the order git writes them in.
//! The whole document is persisted as one record and replaced on every
//! write, so all operations here are in-memory.

use serde::{Deserialize, Serialize};

use crate::entry::{EntryMode, IndexEntry, Stage};
use crate::error::{IndexError, IndexResult};
use gitkv_types::ObjectId;

/// Index format version written by default.
pub const DEFAULT_VERSION: u32 = 2;

/// The working index: which blob each tracked path holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub version: u32,
    entries: Vec<IndexEntry>,
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_path(path: &str) -> IndexResult<()> {
    if path.is_empty() {
        return Err(IndexError::InvalidPath("empty path".to_string()));
    }
    if path.starts_with('/') || path.contains('\0') {
        return Err(IndexError::InvalidPath(path.to_string()));
    }
    if path
        .split('/')
        .any(|c| c.is_empty() || c == "." || c == "..")
    {
        return Err(IndexError::InvalidPath(path.to_string()));
    }
    Ok(())
}

impl Index {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self {
            version: DEFAULT_VERSION,
            entries: Vec::new(),
        }
    }

    /// Number of entries, counting each conflict stage separately.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in `(path, stage)` order.
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    fn position(&self, path: &str, stage: Stage) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|e| (e.path.as_str(), e.stage).cmp(&(path, stage)))
    }

    /// The merged entry for `path`.
    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.get_stage(path, Stage::Merged)
    }

    pub fn get_stage(&self, path: &str, stage: Stage) -> Option<&IndexEntry> {
        self.position(path, stage).ok().map(|i| &self.entries[i])
    }

    /// Insert or replace an entry.
    ///
    /// Adding a merged entry drops any conflict stages for the same path;
    /// adding a conflict stage drops the merged entry.
    pub fn add(&mut self, entry: IndexEntry) -> IndexResult<()> {
        validate_path(&entry.path)?;
        if entry.stage == Stage::Merged {
            self.entries
                .retain(|e| e.path != entry.path || e.stage == Stage::Merged);
        } else {
            self.entries
                .retain(|e| e.path != entry.path || e.stage != Stage::Merged);
        }
        match self.position(&entry.path, entry.stage) {
            Ok(i) => self.entries[i] = entry,
            Err(i) => self.entries.insert(i, entry),
        }
        Ok(())
    }

    /// Remove every stage of `path`.
    pub fn remove(&mut self, path: &str) -> IndexResult<Vec<IndexEntry>> {
        let (removed, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.entries)
                .into_iter()
                .partition(|e| e.path == path);
        self.entries = kept;
        if removed.is_empty() {
            return Err(IndexError::PathNotFound(path.to_string()));
        }
        Ok(removed)
    }

    /// Returns `true` if any entries have unresolved conflicts.
    pub fn has_conflicts(&self) -> bool {
        self.entries.iter().any(IndexEntry::is_conflicted)
    }

    /// Paths with unresolved conflicts, each listed once.
    pub fn conflict_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.is_conflicted())
            .map(|e| e.path.clone())
            .collect();
        paths.dedup();
        paths
    }

    /// Resolve a conflict by replacing all stages with one merged entry.
    pub fn resolve_conflict(
        &mut self,
        path: &str,
        object_id: ObjectId,
        mode: EntryMode,
        size: u64,
    ) -> IndexResult<()> {
        if !self
            .entries
            .iter()
            .any(|e| e.path == path && e.is_conflicted())
        {
            return Err(IndexError::NoConflict(path.to_string()));
        }
        self.add(IndexEntry::new(path, object_id, mode, size))
    }
}
