//! Index entry types for tracking working directory files.

use std::time::SystemTime;

use gitkv_types::ObjectId;
use serde::{Deserialize, Serialize};

/// File mode for an index entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryMode {
    /// Normal file (0o100644).
    Regular,
    /// Executable file (0o100755).
    Executable,
    /// Symbolic link (0o120000).
    Symlink,
    /// Submodule commit (0o160000).
    Submodule,
}

impl EntryMode {
    /// Octal mode value as git writes it.
    pub fn mode_bits(&self) -> u32 {
        match self {
            Self::Regular => 0o100644,
            Self::Executable => 0o100755,
            Self::Symlink => 0o120000,
            Self::Submodule => 0o160000,
        }
    }

    /// Parse from an octal mode value.
    pub fn from_mode_bits(bits: u32) -> Option<Self> {
        match bits {
            0o100644 => Some(Self::Regular),
            0o100755 => Some(Self::Executable),
            0o120000 => Some(Self::Symlink),
            0o160000 => Some(Self::Submodule),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:06o}", self.mode_bits())
    }
}

/// Merge stage of an entry. Anything but `Merged` is an unresolved conflict.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Stage {
    #[default]
    Merged,
    /// The common ancestor's version.
    Ancestor,
    /// Our side of the merge.
    Ours,
    /// Their side of the merge.
    Theirs,
}

/// Per-entry flags.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexFlags {
    /// Skip stat checks; assume the file is unchanged.
    pub assume_valid: bool,
    /// Sparse checkout: the file is not in the working tree.
    pub skip_worktree: bool,
    /// Added with `--intent-to-add`; no content staged yet.
    pub intent_to_add: bool,
}

/// An entry in the index, representing one tracked path at one stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Slash-separated path relative to the working tree root.
    pub path: String,
    /// Blob (or submodule commit) the path holds.
    pub object_id: ObjectId,
    pub mode: EntryMode,
    /// File size in bytes.
    pub size: u64,
    /// Last modification time, for quick dirty checks.
    pub mtime: SystemTime,
    #[serde(default)]
    pub stage: Stage,
    #[serde(default)]
    pub flags: IndexFlags,
}

impl IndexEntry {
    /// Create a merged entry.
    pub fn new(path: impl Into<String>, object_id: ObjectId, mode: EntryMode, size: u64) -> Self {
        Self {
            path: path.into(),
            object_id,
            mode,
            size,
            mtime: SystemTime::now(),
            stage: Stage::Merged,
            flags: IndexFlags::default(),
        }
    }

    /// The same entry at a conflict stage.
    pub fn at_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    pub fn is_conflicted(&self) -> bool {
        self.stage != Stage::Merged
    }
}
