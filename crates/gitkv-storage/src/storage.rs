//! The [`Storage`] facade: one repository namespace holding objects,
//! references, the index, the shallow list, and the config document.

use std::time::SystemTime;

use gitkv_backend::{directory, Database};
use gitkv_index::Index;
use gitkv_refs::{KvRefStore, RefIter, RefStore, Reference};
use gitkv_store::{
    EncodedObject, KeySpace, KvObjectStore, ObjectCodec, ObjectHeader, ObjectIter, ObjectStore,
    StoreResult,
};
use gitkv_types::{ObjectId, ObjectType};
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::documents::BlobCell;
use crate::error::{StorageError, StorageResult};
use crate::repo_config::RepoConfig;

/// Directory segment under which submodule namespaces are created.
pub const MODULES_SEGMENT: &str = "modules";

/// Repository storage on a transactional key-value [`Database`].
///
/// Opening a storage allocates (or finds) the namespace directory and records
/// the key layout in it. Every operation is stateless and runs in its own
/// transaction, so any number of `Storage` values may share a namespace.
#[derive(Clone, Debug)]
pub struct Storage<D> {
    db: D,
    config: StorageConfig,
    keys: KeySpace,
    objects: KvObjectStore<D>,
    refs: KvRefStore<D>,
    index: BlobCell<D, Index>,
    shallow: BlobCell<D, Vec<ObjectId>>,
    repo_config: BlobCell<D, RepoConfig>,
}

impl<D: Database + Clone> Storage<D> {
    pub fn open(db: D, config: StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        let max_value = db.limits().max_value_size;
        if config.chunk_size > max_value {
            return Err(StorageError::Config(format!(
                "chunk_size {} exceeds the backend's max value size {max_value}",
                config.chunk_size
            )));
        }

        let root = directory::create_or_open(&db, &config.namespace)
            .map_err(|e| StorageError::from(e).context("open namespace"))?;
        let keys = KeySpace::new(root, config.layout);
        keys.ensure_layout(&db)?;

        let objects = KvObjectStore::new(db.clone(), keys.clone())
            .with_codec(ObjectCodec::new(config.chunk_size)?)
            .with_page_size(config.scan_page_size);
        let refs = KvRefStore::new(db.clone(), keys.clone()).with_page_size(config.scan_page_size);
        let index = BlobCell::new(db.clone(), keys.index_key(), "index");
        let shallow = BlobCell::new(db.clone(), keys.shallow_key(), "shallow");
        let repo_config = BlobCell::new(db.clone(), keys.config_key(), "config");

        info!(
            namespace = %config.namespace.join("/"),
            layout = %config.layout,
            "opened storage"
        );
        Ok(Self {
            db,
            config,
            keys,
            objects,
            refs,
            index,
            shallow,
            repo_config,
        })
    }

    pub fn namespace(&self) -> &[String] {
        &self.config.namespace
    }

    pub fn storage_config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    /// The working index; empty when none was stored.
    pub fn index(&self) -> StorageResult<Index> {
        self.index.get()
    }

    pub fn set_index(&self, index: &Index) -> StorageResult<()> {
        self.index.set(index)
    }

    /// Shallow commit boundary; empty when none was stored.
    pub fn shallow(&self) -> StorageResult<Vec<ObjectId>> {
        self.shallow.get()
    }

    pub fn set_shallow(&self, commits: &[ObjectId]) -> StorageResult<()> {
        self.shallow.set(&commits.to_vec())
    }

    /// The repository config; the default document when none was stored.
    pub fn config(&self) -> StorageResult<RepoConfig> {
        self.repo_config.get()
    }

    pub fn set_config(&self, config: &RepoConfig) -> StorageResult<()> {
        config.validate()?;
        self.repo_config.set(config)
    }

    /// Storage for the submodule `name`, in a child namespace of this one.
    pub fn module(&self, name: &str) -> StorageResult<Storage<D>> {
        if name.is_empty() {
            return Err(StorageError::Config("module name must not be empty".into()));
        }
        let mut config = self.config.clone();
        config.namespace.push(MODULES_SEGMENT.to_string());
        config.namespace.push(name.to_string());
        debug!(module = name, "opening module storage");
        Storage::open(self.db.clone(), config)
    }

    /// Delete everything in the namespace, submodules included, together
    /// with its directory entry.
    pub fn remove(self) -> StorageResult<()> {
        directory::remove(&self.db, &self.config.namespace)
            .map_err(|e| StorageError::from(e).context("remove namespace"))?;
        info!(namespace = %self.config.namespace.join("/"), "removed storage");
        Ok(())
    }
}

impl<D: Database + Clone> ObjectStore for Storage<D> {
    type Iter = ObjectIter<D>;

    fn has(&self, id: &ObjectId) -> StoreResult<()> {
        self.objects.has(id)
    }

    fn put(&self, object: &EncodedObject) -> StoreResult<ObjectId> {
        self.objects.put(object)
    }

    fn get(&self, kind: ObjectType, id: &ObjectId) -> StoreResult<EncodedObject> {
        self.objects.get(kind, id)
    }

    fn size(&self, id: &ObjectId) -> StoreResult<u64> {
        self.objects.size(id)
    }

    fn header(&self, id: &ObjectId) -> StoreResult<ObjectHeader> {
        self.objects.header(id)
    }

    fn iter(&self, kind: ObjectType) -> StoreResult<ObjectIter<D>> {
        self.objects.iter(kind)
    }

    fn iter_from(&self, kind: ObjectType, after: &ObjectId) -> StoreResult<ObjectIter<D>> {
        self.objects.iter_from(kind, after)
    }

    fn delete_loose(&self, id: &ObjectId) -> StoreResult<()> {
        self.objects.delete_loose(id)
    }

    fn loose_object_time(&self, id: &ObjectId) -> StoreResult<SystemTime> {
        self.objects.loose_object_time(id)
    }

    fn object_packs(&self) -> StoreResult<Vec<ObjectId>> {
        self.objects.object_packs()
    }

    fn delete_old_object_pack(&self, pack: &ObjectId, older_than: SystemTime) -> StoreResult<()> {
        self.objects.delete_old_object_pack(pack, older_than)
    }
}

impl<D: Database + Clone> RefStore for Storage<D> {
    type Iter = RefIter<D>;

    fn reference(&self, name: &str) -> gitkv_refs::Result<Reference> {
        self.refs.reference(name)
    }

    fn set_reference(&self, reference: &Reference) -> gitkv_refs::Result<()> {
        self.refs.set_reference(reference)
    }

    fn check_and_set_reference(
        &self,
        new: &Reference,
        old: Option<&Reference>,
    ) -> gitkv_refs::Result<()> {
        self.refs.check_and_set_reference(new, old)
    }

    fn remove_reference(&self, name: &str) -> gitkv_refs::Result<()> {
        self.refs.remove_reference(name)
    }

    fn references(&self) -> gitkv_refs::Result<RefIter<D>> {
        self.refs.references()
    }

    fn references_with_prefix(&self, prefix: &str) -> gitkv_refs::Result<RefIter<D>> {
        self.refs.references_with_prefix(prefix)
    }

    fn count_loose_refs(&self) -> gitkv_refs::Result<i64> {
        self.refs.count_loose_refs()
    }

    fn pack_refs(&self) -> gitkv_refs::Result<()> {
        self.refs.pack_refs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitkv_backend::MemoryDatabase;
    use gitkv_index::{EntryMode, IndexEntry};
    use gitkv_store::{KeyLayout, StoreError};

    fn open(db: &MemoryDatabase, ns: &[&str]) -> Storage<MemoryDatabase> {
        Storage::open(db.clone(), StorageConfig::for_namespace(ns.iter().copied())).unwrap()
    }

    fn id(n: u8) -> ObjectId {
        ObjectId::from_hash([n; 32])
    }

    #[test]
    fn fresh_namespace_has_default_documents() {
        let db = MemoryDatabase::new();
        let storage = open(&db, &["repo"]);
        assert!(storage.index().unwrap().is_empty());
        assert!(storage.shallow().unwrap().is_empty());
        assert_eq!(storage.config().unwrap(), RepoConfig::default());
        assert_eq!(storage.count_loose_refs().unwrap(), 0);
    }

    #[test]
    fn documents_round_trip() {
        let db = MemoryDatabase::new();
        let storage = open(&db, &["repo"]);

        let mut index = Index::new();
        index
            .add(IndexEntry::new("src/lib.rs", id(1), EntryMode::Regular, 42))
            .unwrap();
        storage.set_index(&index).unwrap();
        assert_eq!(storage.index().unwrap(), index);

        storage.set_shallow(&[id(2), id(3)]).unwrap();
        assert_eq!(storage.shallow().unwrap(), vec![id(2), id(3)]);

        let mut config = RepoConfig::default();
        config.core.bare = true;
        storage.set_config(&config).unwrap();
        assert!(storage.config().unwrap().core.bare);
    }

    #[test]
    fn invalid_repo_config_is_not_stored() {
        let db = MemoryDatabase::new();
        let storage = open(&db, &["repo"]);
        let mut config = RepoConfig::default();
        config.set_branch(crate::repo_config::BranchConfig {
            name: "main".into(),
            remote: Some("nowhere".into()),
            merge: None,
        });
        assert!(storage.set_config(&config).is_err());
        assert_eq!(storage.config().unwrap(), RepoConfig::default());
    }

    #[test]
    fn reopening_sees_the_same_data() {
        let db = MemoryDatabase::new();
        let id = open(&db, &["repo"])
            .put(&EncodedObject::new(ObjectType::Blob, b"persisted".to_vec()))
            .unwrap();
        let again = open(&db, &["repo"]);
        assert_eq!(again.get(ObjectType::Blob, &id).unwrap().data, b"persisted");
    }

    #[test]
    fn namespaces_are_isolated() {
        let db = MemoryDatabase::new();
        let a = open(&db, &["repos", "a"]);
        let b = open(&db, &["repos", "b"]);
        let id = a
            .put(&EncodedObject::new(ObjectType::Blob, b"only in a".to_vec()))
            .unwrap();
        a.set_reference(&Reference::new_hash("refs/heads/main", id))
            .unwrap();

        assert!(b.has(&id).unwrap_err().is_not_found());
        assert!(b.reference("refs/heads/main").unwrap_err().is_not_found());
        assert_eq!(b.count_loose_refs().unwrap(), 0);
    }

    #[test]
    fn reopening_with_another_layout_fails() {
        let db = MemoryDatabase::new();
        open(&db, &["repo"]);
        let mut config = StorageConfig::for_namespace(["repo"]);
        config.layout = KeyLayout::HashFirst;
        let err = Storage::open(db.clone(), config).unwrap_err();
        assert!(matches!(
            err,
            StorageError::Store(StoreError::LayoutMismatch {
                stored: KeyLayout::Dual,
                requested: KeyLayout::HashFirst,
            })
        ));
    }

    #[test]
    fn chunk_size_above_backend_limit_is_rejected() {
        let db = MemoryDatabase::with_options(gitkv_backend::MemoryOptions {
            limits: gitkv_backend::KvLimits {
                max_value_size: 1_000,
                ..Default::default()
            },
            ..Default::default()
        });
        let err = Storage::open(db, StorageConfig::default()).unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[test]
    fn module_lives_below_parent() {
        let db = MemoryDatabase::new();
        let parent = open(&db, &["repo"]);
        let module = parent.module("vendor/lib").unwrap();
        assert_eq!(module.namespace(), ["repo", "modules", "vendor/lib"]);
        assert_ne!(parent.keys().root().prefix(), module.keys().root().prefix());

        module.set_shallow(&[id(9)]).unwrap();
        assert!(parent.shallow().unwrap().is_empty());
        assert!(matches!(parent.module(""), Err(StorageError::Config(_))));
    }

    #[test]
    fn remove_clears_namespace_and_modules() {
        let db = MemoryDatabase::new();
        let keep = open(&db, &["keep"]);
        keep.set_shallow(&[id(1)]).unwrap();
        let baseline = db.key_count();

        let storage = open(&db, &["gone"]);
        let blob = storage
            .put(&EncodedObject::new(ObjectType::Blob, vec![7; 25_007]))
            .unwrap();
        storage
            .set_reference(&Reference::new_hash("refs/heads/main", blob))
            .unwrap();
        storage.set_index(&Index::new()).unwrap();
        storage.module("sub").unwrap().set_shallow(&[blob]).unwrap();

        storage.remove().unwrap();
        assert!(!directory::exists(&db, &["gone"]).unwrap());
        assert!(!directory::exists(&db, &["gone", "modules", "sub"]).unwrap());
        assert_eq!(keep.shallow().unwrap(), vec![id(1)]);
        // Only the directory allocator moved.
        assert_eq!(db.key_count(), baseline);

        let fresh = open(&db, &["gone"]);
        assert!(fresh.has(&blob).unwrap_err().is_not_found());
        assert_eq!(fresh.count_loose_refs().unwrap(), 0);
    }

    #[test]
    fn removing_twice_fails() {
        let db = MemoryDatabase::new();
        let storage = open(&db, &["repo"]);
        let copy = storage.clone();
        storage.remove().unwrap();
        assert!(copy.remove().is_err());
    }

    #[test]
    fn unsupported_operations_pass_through() {
        let db = MemoryDatabase::new();
        let storage = open(&db, &["repo"]);
        assert!(storage.object_packs().unwrap_err().is_unsupported());
        assert!(storage.delete_loose(&id(1)).unwrap_err().is_unsupported());
        assert!(storage.pack_refs().unwrap_err().is_unsupported());
    }
}
