//! The repository config document: core settings, remotes, and branch
//! tracking.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// `[core]` settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Repository has no working tree.
    pub bare: bool,
    /// Working tree location, when it is not the default.
    pub worktree: Option<String>,
}

/// A `[remote "<name>"]` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub name: String,
    pub urls: Vec<String>,
    /// Fetch refspecs, e.g. `+refs/heads/*:refs/remotes/origin/*`.
    #[serde(default)]
    pub fetch: Vec<String>,
}

impl RemoteConfig {
    /// A remote with one URL and the default fetch refspec.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        let name = name.into();
        let fetch = format!("+refs/heads/*:refs/remotes/{name}/*");
        Self {
            name,
            urls: vec![url.into()],
            fetch: vec![fetch],
        }
    }
}

/// A `[branch "<name>"]` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchConfig {
    pub name: String,
    /// Remote the branch tracks.
    #[serde(default)]
    pub remote: Option<String>,
    /// Upstream ref on that remote, e.g. `refs/heads/main`.
    #[serde(default)]
    pub merge: Option<String>,
}

/// Repository configuration as stored in the namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    pub core: CoreConfig,
    pub remotes: BTreeMap<String, RemoteConfig>,
    pub branches: BTreeMap<String, BranchConfig>,
}

impl RepoConfig {
    pub fn remote(&self, name: &str) -> Option<&RemoteConfig> {
        self.remotes.get(name)
    }

    /// Insert or replace a remote, keyed by its name.
    pub fn add_remote(&mut self, remote: RemoteConfig) {
        self.remotes.insert(remote.name.clone(), remote);
    }

    pub fn remove_remote(&mut self, name: &str) -> Option<RemoteConfig> {
        self.remotes.remove(name)
    }

    pub fn branch(&self, name: &str) -> Option<&BranchConfig> {
        self.branches.get(name)
    }

    pub fn set_branch(&mut self, branch: BranchConfig) {
        self.branches.insert(branch.name.clone(), branch);
    }

    /// Check that every section is well formed before the document is stored.
    pub fn validate(&self) -> StorageResult<()> {
        for (key, remote) in &self.remotes {
            if remote.name.is_empty() || *key != remote.name {
                return Err(StorageError::Config(format!(
                    "remote entry '{key}' is named '{}'",
                    remote.name
                )));
            }
            if remote.urls.is_empty() {
                return Err(StorageError::Config(format!(
                    "remote '{key}' has no URL"
                )));
            }
        }
        for (key, branch) in &self.branches {
            if branch.name.is_empty() || *key != branch.name {
                return Err(StorageError::Config(format!(
                    "branch entry '{key}' is named '{}'",
                    branch.name
                )));
            }
            if let Some(remote) = &branch.remote {
                if remote != "." && !self.remotes.contains_key(remote) {
                    return Err(StorageError::Config(format!(
                        "branch '{key}' tracks unknown remote '{remote}'"
                    )));
                }
            }
        }
        Ok(())
    }
}
