//! Core reference types.
//!
//! A reference names either an object directly or, symbolically, another
//! reference. Records are persisted as `{"name": ..., "target": ...}` where
//! the target is a hex object id or `ref: <name>`.

use std::fmt;
use std::str::FromStr;

use gitkv_types::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::RefError;

pub const HEAD: &str = "HEAD";
pub const REFS_HEADS: &str = "refs/heads/";
pub const REFS_TAGS: &str = "refs/tags/";
pub const REFS_REMOTES: &str = "refs/remotes/";

const SYMBOLIC_PREFIX: &str = "ref: ";

/// What a reference points at.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RefTarget {
    /// An object id.
    Hash(ObjectId),
    /// The name of another reference.
    Symbolic(String),
}

impl fmt::Display for RefTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hash(id) => write!(f, "{}", id.to_hex()),
            Self::Symbolic(name) => write!(f, "{SYMBOLIC_PREFIX}{name}"),
        }
    }
}

impl FromStr for RefTarget {
    type Err = RefError;

    fn from_str(s: &str) -> Result<Self, RefError> {
        if let Some(name) = s.strip_prefix(SYMBOLIC_PREFIX) {
            if name.is_empty() {
                return Err(RefError::InvalidTarget {
                    target: s.to_string(),
                    reason: "symbolic target names no reference".into(),
                });
            }
            return Ok(Self::Symbolic(name.to_string()));
        }
        ObjectId::from_hex(s)
            .map(Self::Hash)
            .map_err(|e| RefError::InvalidTarget {
                target: s.to_string(),
                reason: e.to_string(),
            })
    }
}

/// A named reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "RefRecord", try_from = "RefRecord")]
pub struct Reference {
    name: String,
    target: RefTarget,
}

impl Reference {
    /// A reference pointing directly at an object.
    pub fn new_hash(name: impl Into<String>, id: ObjectId) -> Self {
        Self {
            name: name.into(),
            target: RefTarget::Hash(id),
        }
    }

    /// A reference pointing at another reference.
    pub fn new_symbolic(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: RefTarget::Symbolic(target.into()),
        }
    }

    /// Build from the persisted name and target strings.
    pub fn from_strings(name: &str, target: &str) -> Result<Self, RefError> {
        Ok(Self {
            name: name.to_string(),
            target: target.parse()?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &RefTarget {
        &self.target
    }

    /// The object id for a hash reference; `None` when symbolic.
    pub fn hash(&self) -> Option<ObjectId> {
        match &self.target {
            RefTarget::Hash(id) => Some(*id),
            RefTarget::Symbolic(_) => None,
        }
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self.target, RefTarget::Symbolic(_))
    }

    pub fn is_branch(&self) -> bool {
        self.name.starts_with(REFS_HEADS)
    }

    pub fn is_tag(&self) -> bool {
        self.name.starts_with(REFS_TAGS)
    }

    pub fn is_remote(&self) -> bool {
        self.name.starts_with(REFS_REMOTES)
    }

    /// The name without its `refs/heads/`, `refs/tags/`, or `refs/remotes/`
    /// prefix.
    pub fn short_name(&self) -> &str {
        [REFS_HEADS, REFS_TAGS, REFS_REMOTES]
            .iter()
            .find_map(|p| self.name.strip_prefix(p))
            .unwrap_or(self.name.as_str())
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.target, self.name)
    }
}

/// Persisted form of a [`Reference`].
#[derive(Clone, Debug, Serialize, Deserialize)]
struct RefRecord {
    name: String,
    target: String,
}

impl From<Reference> for RefRecord {
    fn from(r: Reference) -> Self {
        Self {
            target: r.target.to_string(),
            name: r.name,
        }
    }
}

impl TryFrom<RefRecord> for Reference {
    type Error = RefError;

    fn try_from(record: RefRecord) -> Result<Self, RefError> {
        Reference::from_strings(&record.name, &record.target)
    }
}
