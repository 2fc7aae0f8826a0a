use std::time::SystemTime;

use gitkv_types::{ObjectId, ObjectType};

use crate::codec::ObjectHeader;
use crate::error::{StoreError, StoreResult};
use crate::object::EncodedObject;

/// Object storage as the version control toolkit sees it.
///
/// Implementations must satisfy these invariants:
/// - Objects are immutable once written. Writing identical content again is
///   a no-op; writing different content under a stored id is refused.
/// - Every call is atomic: a reader sees either all of an object or none
///   of it, never chunks from two different writes.
/// - Malformed stored data is reported as an error, never as "not found".
pub trait ObjectStore: Send + Sync {
    /// Lazy enumeration of objects of one type.
    type Iter: Iterator<Item = StoreResult<EncodedObject>>;

    /// `Ok(())` if the object is stored, `NotFound` otherwise.
    fn has(&self, id: &ObjectId) -> StoreResult<()>;

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        match self.has(id) {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Store an object in one transaction and return its id.
    fn put(&self, object: &EncodedObject) -> StoreResult<ObjectId>;

    /// Fetch a whole object. `kind` may be [`ObjectType::Any`]; a concrete
    /// type that differs from the stored one reads as not found.
    fn get(&self, kind: ObjectType, id: &ObjectId) -> StoreResult<EncodedObject>;

    /// Size in bytes, read from the header alone.
    fn size(&self, id: &ObjectId) -> StoreResult<u64> {
        Ok(self.header(id)?.size)
    }

    fn header(&self, id: &ObjectId) -> StoreResult<ObjectHeader>;

    /// Enumerate every object of a concrete type, in id order.
    fn iter(&self, kind: ObjectType) -> StoreResult<Self::Iter>;

    /// Resume an enumeration after the object `after`.
    fn iter_from(&self, kind: ObjectType, after: &ObjectId) -> StoreResult<Self::Iter>;

    fn delete_loose(&self, _id: &ObjectId) -> StoreResult<()> {
        Err(StoreError::Unsupported("delete loose object"))
    }

    fn loose_object_time(&self, _id: &ObjectId) -> StoreResult<SystemTime> {
        Err(StoreError::Unsupported("loose object time"))
    }

    fn object_packs(&self) -> StoreResult<Vec<ObjectId>> {
        Err(StoreError::Unsupported("object packs"))
    }

    fn delete_old_object_pack(&self, _pack: &ObjectId, _older_than: SystemTime) -> StoreResult<()> {
        Err(StoreError::Unsupported("delete object pack"))
    }
}
