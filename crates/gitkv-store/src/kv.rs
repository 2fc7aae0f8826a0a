//! [`ObjectStore`] on a transactional key-value [`Database`].

use std::collections::VecDeque;

use gitkv_backend::{Database, KeyRange, Transaction};
use gitkv_types::{ObjectId, ObjectType};
use tracing::{debug, error, warn};

use crate::codec::{ObjectCodec, ObjectHeader};
use crate::error::{StoreError, StoreResult};
use crate::keyspace::{KeyLayout, KeySpace};
use crate::object::EncodedObject;
use crate::traits::ObjectStore;

/// Default number of header keys fetched per enumeration page.
pub const DEFAULT_PAGE_SIZE: usize = 256;

/// Object store backed by a [`Database`].
///
/// Each object occupies one header key per layout direction plus one key per
/// content chunk. Every call runs in a single transaction.
#[derive(Clone, Debug)]
pub struct KvObjectStore<D> {
    db: D,
    keys: KeySpace,
    codec: ObjectCodec,
    page_size: usize,
}

impl<D: Database + Clone> KvObjectStore<D> {
    pub fn new(db: D, keys: KeySpace) -> Self {
        Self {
            db,
            keys,
            codec: ObjectCodec::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_codec(mut self, codec: ObjectCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub fn codec(&self) -> &ObjectCodec {
        &self.codec
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    fn decode_header(&self, id: &ObjectId, raw: &[u8]) -> StoreResult<ObjectHeader> {
        self.codec.decode_header(raw).map_err(|e| {
            error!(hash = %id, error = %e, "failed to decode object header");
            StoreError::CorruptObject {
                id: *id,
                reason: format!("header: {e}"),
            }
        })
    }

    /// Read an object's header inside `tr`, following the key layout.
    fn read_header<T: Transaction>(
        &self,
        tr: &mut T,
        id: &ObjectId,
    ) -> StoreResult<Option<ObjectHeader>> {
        if self.keys.layout().writes_hash_first() {
            return match tr.get(&self.keys.header_key(id))? {
                Some(raw) if !raw.is_empty() => Ok(Some(self.decode_header(id, &raw)?)),
                _ => Ok(None),
            };
        }
        for kind in ObjectType::CONCRETE {
            if let Some(raw) = tr.get(&self.keys.typed_header_key(kind, id)?)? {
                if !raw.is_empty() {
                    return Ok(Some(self.decode_header(id, &raw)?));
                }
            }
        }
        Ok(None)
    }

    /// Read the chunks of an object whose header is `header`.
    fn read_parts<T: Transaction>(
        &self,
        tr: &mut T,
        id: &ObjectId,
        header: &ObjectHeader,
    ) -> StoreResult<Vec<Vec<u8>>> {
        let expected = self.codec.part_count(header);
        if expected == 0 {
            return Ok(Vec::new());
        }
        let found = tr.get_range(&self.keys.parts_range(id), expected as usize)?;
        let mut parts = Vec::with_capacity(found.len());
        for part in 0..expected {
            let key = self.keys.part_key(id, part)?;
            match found.get(part as usize) {
                Some(kv) if kv.key == key => parts.push(kv.value.clone()),
                _ => {
                    warn!(hash = %id, part, "object part not found");
                    return Err(StoreError::NotFound(*id));
                }
            }
        }
        Ok(parts)
    }

    fn header_in_txn(&self, id: &ObjectId) -> StoreResult<ObjectHeader> {
        let header = self.db.read_transact(|tr| self.read_header(tr, id))?;
        header.ok_or_else(|| {
            warn!(hash = %id, "object not found");
            StoreError::NotFound(*id)
        })
    }

    fn enumerate(&self, kind: ObjectType, range: KeyRange) -> StoreResult<ObjectIter<D>> {
        if kind.is_any() {
            return Err(StoreError::WildcardEnumeration);
        }
        if self.keys.layout() == KeyLayout::HashFirst {
            return Err(StoreError::Unsupported(
                "enumerating objects by type in a hash-first layout",
            ));
        }
        Ok(ObjectIter {
            store: self.clone(),
            kind,
            range,
            pending: VecDeque::new(),
            last: None,
            exhausted: false,
        })
    }
}

impl<D: Database + Clone> ObjectStore for KvObjectStore<D> {
    type Iter = ObjectIter<D>;

    fn has(&self, id: &ObjectId) -> StoreResult<()> {
        self.header_in_txn(id)
            .map(|_| ())
            .map_err(|e| e.context("check object"))
    }

    fn put(&self, object: &EncodedObject) -> StoreResult<ObjectId> {
        let id = object.id;
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        if object.kind.is_any() {
            return Err(StoreError::InvalidKey(format!(
                "object {id} has the wildcard type"
            )));
        }

        let encoded = self.codec.encode(object.kind, &object.data);
        let header = encoded.header;
        let header_raw = self.codec.encode_header(&header)?;

        let chunk_count = encoded.chunks.len();
        let mut writes = Vec::with_capacity(chunk_count + 2);
        for (part, chunk) in encoded.chunks.into_iter().enumerate() {
            writes.push((self.keys.part_key(&id, part as u64)?, chunk));
        }
        if self.keys.layout().writes_hash_first() {
            writes.push((self.keys.header_key(&id), header_raw.clone()));
        }
        if self.keys.layout().writes_type_first() {
            writes.push((self.keys.typed_header_key(header.kind, &id)?, header_raw));
        }

        let payload: usize = writes.iter().map(|(k, v)| k.len() + v.len()).sum();
        let limit = self.db.limits().max_transaction_size;
        if payload > limit {
            warn!(hash = %id, size = header.size, payload, limit, "object too large for one transaction");
            return Err(StoreError::ObjectTooLarge {
                id,
                size: payload as u64,
                limit,
            });
        }

        let written = self
            .db
            .transact(|tr| {
                if let Some(stored) = self.read_header(tr, &id)? {
                    if stored != header {
                        return Err(StoreError::ConflictingObject {
                            id,
                            stored: stored.to_string(),
                            incoming: header.to_string(),
                        });
                    }
                    match self.read_parts(tr, &id, &stored) {
                        Ok(parts) => {
                            let same = parts
                                .iter()
                                .eq(writes[..chunk_count].iter().map(|(_, chunk)| chunk));
                            if !same {
                                warn!(hash = %id, "re-put with different content");
                                return Err(StoreError::ConflictingObject {
                                    id,
                                    stored: stored.to_string(),
                                    incoming: format!("{header} with different content"),
                                });
                            }
                            return Ok(false);
                        }
                        // A stored header with missing parts is rewritten whole.
                        Err(StoreError::NotFound(_)) => {}
                        Err(e) => return Err(e),
                    }
                }
                for (key, value) in &writes {
                    tr.set(key, value)?;
                }
                Ok(true)
            })
            .map_err(|e| e.context("put object"))?;

        if written {
            debug!(hash = %id, kind = %header.kind, size = header.size, keys = writes.len(), "stored object");
        } else {
            debug!(hash = %id, "object already stored");
        }
        Ok(id)
    }

    fn get(&self, kind: ObjectType, id: &ObjectId) -> StoreResult<EncodedObject> {
        let (header, parts) = self
            .db
            .read_transact(|tr| {
                let header = match self.read_header(tr, id)? {
                    Some(h) => h,
                    None => {
                        warn!(hash = %id, kind = %kind, "object header not found on get");
                        return Err(StoreError::NotFound(*id));
                    }
                };
                if !kind.matches(header.kind) {
                    warn!(hash = %id, requested = %kind, stored = %header.kind, "object type mismatch");
                    return Err(StoreError::NotFound(*id));
                }
                let parts = self.read_parts(tr, id, &header)?;
                Ok((header, parts))
            })
            .map_err(|e| e.context("get object"))?;

        let data = self.codec.decode(&header, parts).map_err(|e| {
            error!(hash = %id, error = %e, "failed to assemble object");
            StoreError::CorruptObject {
                id: *id,
                reason: e.to_string(),
            }
        })?;
        debug!(hash = %id, size = header.size, "fetched object");
        Ok(EncodedObject::from_parts(*id, header.kind, data))
    }

    fn size(&self, id: &ObjectId) -> StoreResult<u64> {
        let header = self.header(id)?;
        debug!(hash = %id, size = header.size, "fetched object size");
        Ok(header.size)
    }

    fn header(&self, id: &ObjectId) -> StoreResult<ObjectHeader> {
        self.header_in_txn(id).map_err(|e| e.context("read object header"))
    }

    fn iter(&self, kind: ObjectType) -> StoreResult<ObjectIter<D>> {
        let range = self.keys.type_range(kind)?;
        self.enumerate(kind, range)
    }

    fn iter_from(&self, kind: ObjectType, after: &ObjectId) -> StoreResult<ObjectIter<D>> {
        let range = self
            .keys
            .type_range(kind)?
            .after(&self.keys.typed_header_key(kind, after)?);
        self.enumerate(kind, range)
    }
}

/// Lazy enumeration of the objects of one type, in id order.
///
/// Header keys are fetched a page at a time and each object is read in its
/// own transaction, so enumeration never holds a long transaction open.
/// [`cursor`](ObjectIter::cursor) reports the last object yielded;
/// [`ObjectStore::iter_from`] resumes after it.
pub struct ObjectIter<D> {
    store: KvObjectStore<D>,
    kind: ObjectType,
    range: KeyRange,
    pending: VecDeque<ObjectId>,
    last: Option<ObjectId>,
    exhausted: bool,
}

impl<D: Database + Clone> ObjectIter<D> {
    /// The id of the last object yielded, if any.
    pub fn cursor(&self) -> Option<ObjectId> {
        self.last
    }

    fn fetch_page(&mut self) -> StoreResult<()> {
        let page_size = self.store.page_size;
        let page = self
            .store
            .db
            .read_transact(|tr| tr.get_range(&self.range, page_size))
            .map_err(|e| StoreError::from(e).context("enumerate objects"))?;
        let ids = page
            .iter()
            .map(|kv| self.store.keys.id_from_typed_key(self.kind, &kv.key))
            .collect::<StoreResult<Vec<_>>>()?;
        if page.len() < page_size {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.range = self.range.after(&last.key);
        }
        self.pending.extend(ids);
        debug!(kind = %self.kind, count = page.len(), "fetched enumeration page");
        Ok(())
    }
}

impl<D: Database + Clone> Iterator for ObjectIter<D> {
    type Item = StoreResult<EncodedObject>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pending.is_empty() && !self.exhausted {
            if let Err(e) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        let id = self.pending.pop_front()?;
        match self.store.get(self.kind, &id) {
            Ok(object) => {
                self.last = Some(id);
                Some(Ok(object))
            }
            Err(e) => {
                self.exhausted = true;
                self.pending.clear();
                Some(Err(e))
            }
        }
    }
}

impl<D> std::fmt::Debug for ObjectIter<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectIter")
            .field("kind", &self.kind)
            .field("pending", &self.pending.len())
            .field("last", &self.last)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}
