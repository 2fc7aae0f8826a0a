//! Repository storage for gitkv.
//!
//! A [`Storage`] is everything a version control toolkit persists for one
//! repository, kept in one namespace of a transactional key-value database:
//! content-addressed objects, named references, the working index, the
//! shallow commit list, and the repository config. Nothing is cached between
//! calls; each operation is one transaction.
//!
//! # Key Types
//!
//! - [`Storage`] -- The facade; implements [`ObjectStore`] and [`RefStore`]
//! - [`StorageConfig`] -- Namespace, key layout, chunk and page sizes (TOML)
//! - [`RepoConfig`] -- The stored repository config document
//! - [`BlobCell`] -- A JSON document under one key
//!
//! # Example
//!
//! ```
//! use gitkv_backend::MemoryDatabase;
//! use gitkv_refs::{RefStore, Reference};
//! use gitkv_storage::{Storage, StorageConfig};
//! use gitkv_store::{EncodedObject, ObjectStore};
//! use gitkv_types::ObjectType;
//!
//! let db = MemoryDatabase::new();
//! let storage = Storage::open(db, StorageConfig::for_namespace(["repos", "demo"])).unwrap();
//!
//! let id = storage
//!     .put(&EncodedObject::new(ObjectType::Blob, b"hello".to_vec()))
//!     .unwrap();
//! storage
//!     .set_reference(&Reference::new_hash("refs/heads/main", id))
//!     .unwrap();
//! assert_eq!(storage.size(&id).unwrap(), 5);
//! assert_eq!(storage.count_loose_refs().unwrap(), 1);
//! ```

pub mod config;
pub mod documents;
pub mod error;
pub mod repo_config;
pub mod storage;

pub use config::{StorageConfig, DEFAULT_RETRY_LIMIT};
pub use documents::BlobCell;
pub use error::{StorageError, StorageResult};
pub use repo_config::{BranchConfig, CoreConfig, RemoteConfig, RepoConfig};
pub use storage::{Storage, MODULES_SEGMENT};

pub use gitkv_refs::RefStore;
pub use gitkv_store::ObjectStore;

#[cfg(test)]
mod tests {
    use super::*;
    use gitkv_backend::MemoryDatabase;
    use gitkv_refs::{RefError, Reference};
    use gitkv_store::EncodedObject;
    use gitkv_types::{ObjectId, ObjectType};
    use rand::RngCore;

    fn open_from_toml(toml: &str) -> Storage<MemoryDatabase> {
        let config = StorageConfig::from_toml_str(toml).unwrap();
        let db = MemoryDatabase::with_options(config.memory_options());
        Storage::open(db, config).unwrap()
    }

    #[test]
    fn repository_workflow() {
        let storage = open_from_toml(
            r#"
            namespace = ["repos", "workflow"]
            scan_page_size = 2
            "#,
        );

        let mut big = vec![0u8; 25_007];
        rand::thread_rng().fill_bytes(&mut big);
        let blob = storage
            .put(&EncodedObject::new(ObjectType::Blob, big.clone()))
            .unwrap();
        let trees: Vec<ObjectId> = (0..5u8)
            .map(|n| {
                storage
                    .put(&EncodedObject::new(ObjectType::Tree, vec![n; 40]))
                    .unwrap()
            })
            .collect();
        let commit = storage
            .put(&EncodedObject::new(ObjectType::Commit, b"tree ...".to_vec()))
            .unwrap();

        assert_eq!(storage.size(&blob).unwrap(), 25_007);
        assert_eq!(storage.get(ObjectType::Any, &blob).unwrap().data, big);
        let mut listed: Vec<ObjectId> = storage
            .iter(ObjectType::Tree)
            .unwrap()
            .map(|o| o.unwrap().id)
            .collect();
        listed.sort();
        let mut expected = trees.clone();
        expected.sort();
        assert_eq!(listed, expected);

        storage
            .set_reference(&Reference::new_hash("refs/heads/main", commit))
            .unwrap();
        storage
            .set_reference(&Reference::new_symbolic("HEAD", "refs/heads/main"))
            .unwrap();
        storage
            .set_reference(&Reference::new_hash("refs/remotes/origin/main", commit))
            .unwrap();
        assert_eq!(storage.count_loose_refs().unwrap(), 3);
        assert_eq!(
            storage.head().unwrap(),
            Reference::new_symbolic("HEAD", "refs/heads/main")
        );
        assert_eq!(storage.branches().unwrap().count(), 1);
        assert_eq!(storage.remotes().unwrap(), vec!["origin"]);

        let stale = Reference::new_hash("refs/heads/main", trees[0]);
        let next = Reference::new_hash("refs/heads/main", blob);
        assert!(matches!(
            storage.check_and_set_reference(&next, Some(&stale)),
            Err(RefError::ReferenceChanged { .. })
        ));
        storage.remove_reference("refs/remotes/origin/main").unwrap();
        assert_eq!(storage.count_loose_refs().unwrap(), 2);

        storage.set_shallow(&[commit]).unwrap();
        let mut config = storage.config().unwrap();
        config.add_remote(RemoteConfig::new("origin", "https://example.com/r.git"));
        storage.set_config(&config).unwrap();
        assert_eq!(
            storage.config().unwrap().remote("origin").unwrap().urls,
            vec!["https://example.com/r.git"]
        );

        let db = storage.database().clone();
        storage.remove().unwrap();
        let reopened =
            Storage::open(db, StorageConfig::for_namespace(["repos", "workflow"])).unwrap();
        assert!(reopened.has(&blob).unwrap_err().is_not_found());
        assert!(reopened.shallow().unwrap().is_empty());
        assert_eq!(reopened.config().unwrap(), RepoConfig::default());
    }

    #[test]
    fn retries_and_faults_surface_through_the_facade() {
        let storage = open_from_toml("retry_limit = 2");
        let db = storage.database().clone();
        let object = EncodedObject::new(ObjectType::Blob, b"x".to_vec());

        db.inject_conflicts(2);
        storage.put(&object).unwrap();

        db.inject_conflicts(3);
        let err = storage
            .set_reference(&Reference::new_hash("refs/heads/main", object.id))
            .unwrap_err();
        assert!(err.is_conflict());

        db.inject_unavailable(1);
        let err = storage.index().unwrap_err();
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("read index"));
    }
}
