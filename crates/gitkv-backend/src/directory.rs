//! Directory layer: maps hierarchical paths to short key prefixes.
//!
//! A directory path such as `["repos", "alice", "project"]` is allocated a
//! prefix of a few bytes, so keys inside it stay short no matter how long the
//! path is. Allocations live under the reserved `0xfe` node subspace:
//!
//! ```text
//! 0xfe ("allocator")              -> next id, i64 little-endian
//! 0xfe ("node", seg, seg, ...)    -> allocated prefix bytes
//! ```
//!
//! An allocated prefix is the tuple encoding of the id as an integer, so it
//! can never start with `0xfe`.

use tracing::{debug, info};

use crate::error::{KvError, KvResult};
use crate::traits::{Database, KeyRange, Transaction};
use crate::tuple::{pack, Element, Subspace};

const NODE_PREFIX: u8 = 0xfe;

fn node_subspace() -> Subspace {
    Subspace::from_bytes(vec![NODE_PREFIX])
}

fn allocator_key() -> Vec<u8> {
    node_subspace().pack(&[Element::from("allocator")])
}

fn node_key<S: AsRef<str>>(path: &[S]) -> KvResult<Vec<u8>> {
    if path.is_empty() {
        return Err(KvError::InvalidPath("empty path".into()));
    }
    let mut elements = Vec::with_capacity(path.len());
    for segment in path {
        let segment = segment.as_ref();
        if segment.is_empty() {
            return Err(KvError::InvalidPath(display_path(path)));
        }
        elements.push(Element::from(segment));
    }
    Ok(node_subspace().sub("node").pack(&elements))
}

fn display_path<S: AsRef<str>>(path: &[S]) -> String {
    path.iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_counter(raw: Option<Vec<u8>>) -> KvResult<i64> {
    match raw {
        None => Ok(0),
        Some(bytes) => {
            let buf: [u8; 8] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| KvError::InvalidTuple("directory allocator is not 8 bytes".into()))?;
            Ok(i64::from_le_bytes(buf))
        }
    }
}

/// Open the directory at `path`, allocating a prefix for it if it does not
/// exist yet.
pub fn create_or_open<D, S>(db: &D, path: &[S]) -> KvResult<Subspace>
where
    D: Database,
    S: AsRef<str>,
{
    let key = node_key(path)?;
    db.transact(|tr| {
        if let Some(prefix) = tr.get(&key)? {
            return Ok(Subspace::from_bytes(prefix));
        }
        let alloc = allocator_key();
        let id = read_counter(tr.get(&alloc)?)? + 1;
        tr.set(&alloc, &id.to_le_bytes())?;
        let prefix = pack(&[Element::Int(id)]);
        tr.set(&key, &prefix)?;
        info!(path = %display_path(path), id, "allocated directory");
        Ok(Subspace::from_bytes(prefix))
    })
}

/// Open an existing directory.
pub fn open<D, S>(db: &D, path: &[S]) -> KvResult<Subspace>
where
    D: Database,
    S: AsRef<str>,
{
    let key = node_key(path)?;
    db.read_transact(|tr| tr.get(&key))?
        .map(Subspace::from_bytes)
        .ok_or_else(|| KvError::DirectoryNotFound(display_path(path)))
}

pub fn exists<D, S>(db: &D, path: &[S]) -> KvResult<bool>
where
    D: Database,
    S: AsRef<str>,
{
    let key = node_key(path)?;
    Ok(db.read_transact(|tr| tr.get(&key))?.is_some())
}

/// Remove the directory at `path`, every directory below it, and all keys
/// stored inside them, in one transaction.
pub fn remove<D, S>(db: &D, path: &[S]) -> KvResult<()>
where
    D: Database,
    S: AsRef<str>,
{
    let key = node_key(path)?;
    let nodes = KeyRange::starting_with(&key);
    let removed = db.transact(|tr| {
        let entries = tr.get_range(&nodes, 0)?;
        if entries.is_empty() {
            return Err(KvError::DirectoryNotFound(display_path(path)));
        }
        for entry in &entries {
            tr.clear_range(&KeyRange::starting_with(&entry.value));
        }
        tr.clear_range(&nodes);
        Ok(entries.len())
    })?;
    debug!(path = %display_path(path), directories = removed, "removed directory");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDatabase;

    #[test]
    fn create_or_open_is_stable() {
        let db = MemoryDatabase::new();
        let a = create_or_open(&db, &["repos", "a"]).unwrap();
        let again = create_or_open(&db, &["repos", "a"]).unwrap();
        assert_eq!(a, again);
        assert_eq!(open(&db, &["repos", "a"]).unwrap(), a);
    }

    #[test]
    fn distinct_paths_get_disjoint_prefixes() {
        let db = MemoryDatabase::new();
        let a = create_or_open(&db, &["a"]).unwrap();
        let b = create_or_open(&db, &["b"]).unwrap();
        let ab = create_or_open(&db, &["a", "b"]).unwrap();
        assert_ne!(a.prefix(), b.prefix());
        assert!(!a.prefix().starts_with(b.prefix()));
        assert!(!b.prefix().starts_with(a.prefix()));
        assert!(!ab.prefix().starts_with(a.prefix()));
        assert_ne!(a.prefix()[0], NODE_PREFIX);
    }

    #[test]
    fn open_missing_directory_fails() {
        let db = MemoryDatabase::new();
        assert!(matches!(
            open(&db, &["nope"]),
            Err(KvError::DirectoryNotFound(p)) if p == "nope"
        ));
        assert!(!exists(&db, &["nope"]).unwrap());
    }

    #[test]
    fn invalid_paths_are_rejected() {
        let db = MemoryDatabase::new();
        let empty: [&str; 0] = [];
        assert!(matches!(create_or_open(&db, &empty), Err(KvError::InvalidPath(_))));
        assert!(matches!(
            create_or_open(&db, &["a", ""]),
            Err(KvError::InvalidPath(_))
        ));
    }

    #[test]
    fn remove_clears_contents_and_children() {
        let db = MemoryDatabase::new();
        let parent = create_or_open(&db, &["p"]).unwrap();
        let child = create_or_open(&db, &["p", "c"]).unwrap();
        let sibling = create_or_open(&db, &["q"]).unwrap();
        db.transact(|tr| {
            tr.set(&parent.pack(&[Element::from("k")]), b"1")?;
            tr.set(&child.pack(&[Element::from("k")]), b"2")?;
            tr.set(&sibling.pack(&[Element::from("k")]), b"3")
        })
        .unwrap();

        remove(&db, &["p"]).unwrap();

        assert!(!exists(&db, &["p"]).unwrap());
        assert!(!exists(&db, &["p", "c"]).unwrap());
        assert!(exists(&db, &["q"]).unwrap());
        let left = db
            .read_transact(|tr| tr.get_range(&KeyRange::new(vec![0x00], vec![NODE_PREFIX]), 0))
            .unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].value, b"3".to_vec());
    }

    #[test]
    fn removed_path_is_reallocated_fresh() {
        let db = MemoryDatabase::new();
        let first = create_or_open(&db, &["r"]).unwrap();
        remove(&db, &["r"]).unwrap();
        let second = create_or_open(&db, &["r"]).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn remove_missing_directory_fails() {
        let db = MemoryDatabase::new();
        assert!(matches!(
            remove(&db, &["ghost"]),
            Err(KvError::DirectoryNotFound(_))
        ));
    }
}
