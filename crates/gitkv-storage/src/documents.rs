//! Single-key JSON documents: the index, the shallow list, and the
//! repository config each live under one fixed key and are replaced whole.

use std::fmt;
use std::marker::PhantomData;

use gitkv_backend::{Database, Transaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};

use crate::error::{StorageError, StorageResult};

/// A JSON document stored under a single key.
///
/// An absent or empty value reads as `T::default()`.
pub struct BlobCell<D, T> {
    db: D,
    key: Vec<u8>,
    what: &'static str,
    _doc: PhantomData<fn() -> T>,
}

impl<D: Clone, T> Clone for BlobCell<D, T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            key: self.key.clone(),
            what: self.what,
            _doc: PhantomData,
        }
    }
}

impl<D, T> fmt::Debug for BlobCell<D, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobCell")
            .field("what", &self.what)
            .field("key", &self.key)
            .finish()
    }
}

impl<D, T> BlobCell<D, T>
where
    D: Database,
    T: Serialize + DeserializeOwned + Default,
{
    /// `what` names the document in logs and errors.
    pub fn new(db: D, key: Vec<u8>, what: &'static str) -> Self {
        Self {
            db,
            key,
            what,
            _doc: PhantomData,
        }
    }

    pub fn get(&self) -> StorageResult<T> {
        let raw = self
            .db
            .read_transact(|tr| tr.get(&self.key).map_err(StorageError::from))
            .map_err(|e| e.context(format!("read {}", self.what)))?;
        match raw {
            Some(raw) if !raw.is_empty() => serde_json::from_slice(&raw).map_err(|e| {
                error!(document = self.what, error = %e, "failed to decode document");
                StorageError::Corrupt {
                    what: self.what,
                    reason: e.to_string(),
                }
            }),
            _ => {
                debug!(document = self.what, "document absent, using default");
                Ok(T::default())
            }
        }
    }

    pub fn set(&self, doc: &T) -> StorageResult<()> {
        let payload = serde_json::to_vec(doc)
            .map_err(|e| StorageError::Serialization(format!("{}: {e}", self.what)))?;
        self.db
            .transact(|tr| tr.set(&self.key, &payload).map_err(StorageError::from))
            .map_err(|e| e.context(format!("write {}", self.what)))?;
        debug!(document = self.what, size = payload.len(), "stored document");
        Ok(())
    }
}
