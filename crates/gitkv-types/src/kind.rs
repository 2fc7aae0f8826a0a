use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The type tag of a stored object.
///
/// `Any` is a lookup wildcard only: callers pass it when they do not know (or
/// care about) the type of the object they are fetching. It is never the type
/// of a stored object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    /// Commit object: tree, parents, author, message.
    Commit,
    /// Directory listing.
    Tree,
    /// Raw file content.
    Blob,
    /// Annotated tag.
    Tag,
    /// Wildcard matching every concrete type.
    Any,
}

impl ObjectType {
    /// Every type an object can actually be stored as.
    pub const CONCRETE: [ObjectType; 4] = [Self::Commit, Self::Tree, Self::Blob, Self::Tag];

    /// Lowercase name, as used in keys and object framing.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Tree => "tree",
            Self::Blob => "blob",
            Self::Tag => "tag",
            Self::Any => "any",
        }
    }

    /// Returns `true` for the `Any` wildcard.
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Returns `true` if an object stored as `stored` satisfies a lookup for `self`.
    pub fn matches(&self, stored: ObjectType) -> bool {
        self.is_any() || *self == stored
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commit" => Ok(Self::Commit),
            "tree" => Ok(Self::Tree),
            "blob" => Ok(Self::Blob),
            "tag" => Ok(Self::Tag),
            "any" => Ok(Self::Any),
            other => Err(TypeError::UnknownObjectType(other.to_string())),
        }
    }
}
