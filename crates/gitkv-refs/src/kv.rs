//! [`RefStore`] on a transactional key-value [`Database`].
//!
//! Every write reads the current record inside its own transaction, so the
//! backend's conflict detection covers both the compare-and-set precondition
//! and the live counter: the counter moves only when a name goes from absent
//! to present or back, and it moves in the same commit as the record.

use std::collections::VecDeque;

use gitkv_backend::{Database, KeyRange, Transaction};
use gitkv_store::{counter, KeySpace, DEFAULT_PAGE_SIZE};
use tracing::{debug, error, warn};

use crate::error::{RefError, Result};
use crate::names::validate_reference_name;
use crate::traits::RefStore;
use crate::types::Reference;

/// Reference store backed by a [`Database`].
#[derive(Clone, Debug)]
pub struct KvRefStore<D> {
    db: D,
    keys: KeySpace,
    page_size: usize,
}

fn decode(name: &str, raw: &[u8]) -> Result<Reference> {
    serde_json::from_slice(raw).map_err(|e| {
        error!(name, error = %e, "failed to decode reference");
        RefError::Serialization(format!("reference {name}: {e}"))
    })
}

fn present(raw: &Option<Vec<u8>>) -> bool {
    raw.as_ref().is_some_and(|v| !v.is_empty())
}

impl<D: Database + Clone> KvRefStore<D> {
    pub fn new(db: D, keys: KeySpace) -> Self {
        Self {
            db,
            keys,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Store `reference` inside `tr`, adjusting the counter if the name was
    /// absent. `raw_current` is the record read in the same transaction.
    fn write<T: Transaction>(
        &self,
        tr: &mut T,
        key: &[u8],
        raw_current: &Option<Vec<u8>>,
        payload: &[u8],
        name: &str,
    ) -> Result<()> {
        tr.set(key, payload)?;
        if !present(raw_current) {
            if let Err(e) = counter::increment(tr, &self.keys.refs_counter_key()) {
                warn!(name, error = %e, "failed to increment refs counter");
            }
        }
        Ok(())
    }

    fn prepare(&self, reference: &Reference) -> Result<(Vec<u8>, Vec<u8>)> {
        validate_reference_name(reference.name())?;
        let key = self.keys.reference_key(reference.name())?;
        let payload = serde_json::to_vec(reference)?;
        Ok((key, payload))
    }

    fn iter_range(&self, range: KeyRange) -> RefIter<D> {
        RefIter {
            store: self.clone(),
            range,
            pending: VecDeque::new(),
            exhausted: false,
        }
    }
}

impl<D: Database + Clone> RefStore for KvRefStore<D> {
    type Iter = RefIter<D>;

    fn reference(&self, name: &str) -> Result<Reference> {
        let key = self.keys.reference_key(name)?;
        let raw = self
            .db
            .read_transact(|tr| tr.get(&key))
            .map_err(|e| RefError::from(e).context("read reference"))?;
        match raw {
            Some(raw) if !raw.is_empty() => {
                let reference = decode(name, &raw)?;
                debug!(name, target = %reference.target(), "fetched reference");
                Ok(reference)
            }
            _ => {
                debug!(name, "reference not found");
                Err(RefError::NotFound {
                    name: name.to_string(),
                })
            }
        }
    }

    fn set_reference(&self, reference: &Reference) -> Result<()> {
        let (key, payload) = self.prepare(reference)?;
        let name = reference.name();
        self.db
            .transact(|tr| {
                let current = tr.get(&key)?;
                self.write(tr, &key, &current, &payload, name)
            })
            .map_err(|e| e.context("set reference"))?;
        debug!(name, target = %reference.target(), "stored reference");
        Ok(())
    }

    fn check_and_set_reference(&self, new: &Reference, old: Option<&Reference>) -> Result<()> {
        let (key, payload) = self.prepare(new)?;
        let name = new.name();
        self.db
            .transact(|tr| {
                let current = tr.get(&key)?;
                if let (Some(old), Some(raw)) = (old, current.as_ref()) {
                    if !raw.is_empty() && decode(name, raw)?.hash() != old.hash() {
                        return Err(RefError::ReferenceChanged {
                            name: name.to_string(),
                        });
                    }
                }
                self.write(tr, &key, &current, &payload, name)
            })
            .map_err(|e| e.context("check and set reference"))?;
        debug!(name, target = %new.target(), "compare-and-set reference");
        Ok(())
    }

    fn remove_reference(&self, name: &str) -> Result<()> {
        let key = self.keys.reference_key(name)?;
        let counter_key = self.keys.refs_counter_key();
        let removed = self
            .db
            .transact(|tr| {
                if !present(&tr.get(&key)?) {
                    return Ok(false);
                }
                tr.clear(&key);
                if let Err(e) = counter::decrement(tr, &counter_key) {
                    warn!(name, error = %e, "failed to decrement refs counter");
                }
                Ok::<_, RefError>(true)
            })
            .map_err(|e| e.context("remove reference"))?;
        debug!(name, removed, "removed reference");
        Ok(())
    }

    fn references(&self) -> Result<RefIter<D>> {
        Ok(self.iter_range(self.keys.references_range()))
    }

    fn references_with_prefix(&self, prefix: &str) -> Result<RefIter<D>> {
        Ok(self.iter_range(self.keys.reference_prefix_range(prefix)))
    }

    fn count_loose_refs(&self) -> Result<i64> {
        let key = self.keys.refs_counter_key();
        let count = self
            .db
            .read_transact(|tr| counter::read(tr, &key))
            .map_err(|e| RefError::from(e).context("count references"))?;
        debug!(count, "counted loose refs");
        Ok(count)
    }
}

/// Lazy, page-at-a-time enumeration of references in name order.
pub struct RefIter<D> {
    store: KvRefStore<D>,
    range: KeyRange,
    pending: VecDeque<Reference>,
    exhausted: bool,
}

impl<D: Database + Clone> RefIter<D> {
    fn fetch_page(&mut self) -> Result<()> {
        let page_size = self.store.page_size;
        let page = self
            .store
            .db
            .read_transact(|tr| tr.get_range(&self.range, page_size))
            .map_err(|e| RefError::from(e).context("enumerate references"))?;
        let mut decoded = Vec::with_capacity(page.len());
        for kv in page.iter().filter(|kv| !kv.value.is_empty()) {
            let name = self.store.keys.reference_name_from_key(&kv.key)?;
            decoded.push(decode(&name, &kv.value)?);
        }
        if page.len() < page_size {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.range = self.range.after(&last.key);
        }
        self.pending.extend(decoded);
        Ok(())
    }
}

impl<D: Database + Clone> Iterator for RefIter<D> {
    type Item = Result<Reference>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pending.is_empty() && !self.exhausted {
            if let Err(e) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.pending.pop_front().map(Ok)
    }
}

impl<D> std::fmt::Debug for RefIter<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefIter")
            .field("pending", &self.pending.len())
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HEAD;
    use gitkv_backend::{MemoryDatabase, MemoryOptions, Subspace};
    use gitkv_store::KeyLayout;
    use gitkv_types::ObjectId;

    fn store() -> (MemoryDatabase, KvRefStore<MemoryDatabase>) {
        let db = MemoryDatabase::new();
        let keys = KeySpace::new(Subspace::from_bytes(vec![0x15, 0x02]), KeyLayout::Dual);
        (db.clone(), KvRefStore::new(db, keys))
    }

    fn id(n: u8) -> ObjectId {
        ObjectId::from_hash([n; 32])
    }

    fn branch(name: &str, n: u8) -> Reference {
        Reference::new_hash(format!("refs/heads/{name}"), id(n))
    }

    fn names(iter: RefIter<MemoryDatabase>) -> Vec<String> {
        iter.map(|r| r.unwrap().name().to_string()).collect()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn reference_lifecycle() {
        let (_db, store) = store();
        let main = branch("main", 1);
        store.set_reference(&main).unwrap();
        assert_eq!(store.reference("refs/heads/main").unwrap(), main);

        let moved = branch("main", 2);
        store.set_reference(&moved).unwrap();
        assert_eq!(store.reference("refs/heads/main").unwrap().hash(), Some(id(2)));

        store.remove_reference("refs/heads/main").unwrap();
        assert!(store.reference("refs/heads/main").unwrap_err().is_not_found());
    }

    #[test]
    fn symbolic_head_round_trips() {
        let (_db, store) = store();
        let head = Reference::new_symbolic(HEAD, "refs/heads/main");
        store.set_reference(&head).unwrap();
        assert_eq!(store.head().unwrap(), head);
    }

    #[test]
    fn missing_and_empty_records_are_not_found() {
        let (db, store) = store();
        assert!(store.reference("refs/heads/nope").unwrap_err().is_not_found());

        let key = store.keys.reference_key("refs/heads/empty").unwrap();
        db.transact(|tr| tr.set(&key, &[])).unwrap();
        assert!(store.reference("refs/heads/empty").unwrap_err().is_not_found());
    }

    #[test]
    fn corrupt_record_is_not_masked() {
        let (db, store) = store();
        let key = store.keys.reference_key("refs/heads/bad").unwrap();
        db.transact(|tr| tr.set(&key, b"not json")).unwrap();
        assert!(matches!(
            store.reference("refs/heads/bad"),
            Err(RefError::Serialization(_))
        ));
    }

    #[test]
    fn invalid_names_are_rejected() {
        let (_db, store) = store();
        let bad = Reference::new_hash("refs/heads/bad..name", id(1));
        assert!(matches!(
            store.set_reference(&bad),
            Err(RefError::InvalidName { .. })
        ));
        assert!(store.reference("").is_err());
    }

    #[test]
    fn removing_absent_reference_is_a_no_op() {
        let (_db, store) = store();
        store.remove_reference("refs/heads/ghost").unwrap();
        assert_eq!(store.count_loose_refs().unwrap(), 0);
    }

    // -----------------------------------------------------------------------
    // Compare-and-set
    // -----------------------------------------------------------------------

    #[test]
    fn cas_with_matching_old_succeeds() {
        let (_db, store) = store();
        let v1 = branch("main", 1);
        store.set_reference(&v1).unwrap();
        let v2 = branch("main", 2);
        store.check_and_set_reference(&v2, Some(&v1)).unwrap();
        assert_eq!(store.reference("refs/heads/main").unwrap(), v2);
    }

    #[test]
    fn stale_cas_fails_and_leaves_value_unchanged() {
        let (_db, store) = store();
        let v1 = branch("main", 1);
        let v2 = branch("main", 2);
        store.set_reference(&v1).unwrap();
        store.set_reference(&v2).unwrap();

        let err = store
            .check_and_set_reference(&branch("main", 3), Some(&v1))
            .unwrap_err();
        assert!(matches!(err, RefError::ReferenceChanged { .. }));
        assert!(err.is_conflict());
        assert_eq!(store.reference("refs/heads/main").unwrap(), v2);
    }

    #[test]
    fn cas_against_absent_record_writes() {
        let (_db, store) = store();
        let expected = branch("new", 1);
        let new = branch("new", 2);
        store.check_and_set_reference(&new, Some(&expected)).unwrap();
        assert_eq!(store.reference("refs/heads/new").unwrap(), new);
        assert_eq!(store.count_loose_refs().unwrap(), 1);
    }

    #[test]
    fn cas_without_old_is_a_plain_set() {
        let (_db, store) = store();
        store.set_reference(&branch("main", 1)).unwrap();
        store.check_and_set_reference(&branch("main", 9), None).unwrap();
        assert_eq!(store.reference("refs/heads/main").unwrap().hash(), Some(id(9)));
    }

    #[test]
    fn concurrent_cas_has_exactly_one_winner() {
        let db = MemoryDatabase::with_options(MemoryOptions {
            retry_limit: 100,
            ..MemoryOptions::default()
        });
        let keys = KeySpace::new(Subspace::from_bytes(vec![0x15, 0x03]), KeyLayout::Dual);
        let store = KvRefStore::new(db, keys);
        let base = branch("main", 0);
        store.set_reference(&base).unwrap();

        let handles: Vec<_> = (1..=6u8)
            .map(|n| {
                let store = store.clone();
                let base = base.clone();
                std::thread::spawn(move || store.check_and_set_reference(&branch("main", n), Some(&base)))
            })
            .collect();
        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .collect();

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, RefError::ReferenceChanged { .. })));
    }

    // -----------------------------------------------------------------------
    // Counter
    // -----------------------------------------------------------------------

    #[test]
    fn counter_tracks_distinct_live_names() {
        let (_db, store) = store();
        for n in 0..5u8 {
            store.set_reference(&branch(&format!("b{n}"), n)).unwrap();
        }
        // Overwrites do not count twice.
        store.set_reference(&branch("b0", 42)).unwrap();
        store.remove_reference("refs/heads/b1").unwrap();
        store.remove_reference("refs/heads/b2").unwrap();
        store.remove_reference("refs/heads/b2").unwrap();
        assert_eq!(store.count_loose_refs().unwrap(), 3);
        assert_eq!(store.references().unwrap().count(), 3);
    }

    #[test]
    fn counter_is_never_negative_under_sets() {
        let (_db, store) = store();
        for round in 0..3u8 {
            store.set_reference(&branch("main", round)).unwrap();
            assert_eq!(store.count_loose_refs().unwrap(), 1);
        }
    }

    #[test]
    fn counter_matches_distinct_names_under_concurrent_sets() {
        let db = MemoryDatabase::with_options(MemoryOptions {
            retry_limit: 1_000,
            ..MemoryOptions::default()
        });
        let keys = KeySpace::new(Subspace::from_bytes(vec![0x15, 0x04]), KeyLayout::Dual);
        let store = KvRefStore::new(db, keys);

        // Eight threads, each setting a private branch and two shared ones.
        let handles: Vec<_> = (0..8u8)
            .map(|n| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for round in 0..5u8 {
                        store.set_reference(&branch(&format!("own-{n}"), round))?;
                        store.set_reference(&branch("shared", n))?;
                        store.set_reference(&branch(&format!("pair-{}", n % 2), round))?;
                        assert!(store.count_loose_refs()? >= 0);
                    }
                    Ok::<_, RefError>(())
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread should not panic").unwrap();
        }

        // own-0..own-7, shared, pair-0, pair-1
        assert_eq!(store.count_loose_refs().unwrap(), 11);
        assert_eq!(store.references().unwrap().count(), 11);
    }

    #[test]
    fn counter_survives_injected_conflicts() {
        let (db, store) = store();
        db.inject_conflicts(2);
        store.set_reference(&branch("main", 1)).unwrap();
        assert_eq!(store.count_loose_refs().unwrap(), 1);
    }

    // -----------------------------------------------------------------------
    // Enumeration
    // -----------------------------------------------------------------------

    #[test]
    fn references_are_listed_in_name_order_across_pages() {
        let (_db, store) = store();
        let store = store.with_page_size(2);
        store
            .set_reference(&Reference::new_symbolic(HEAD, "refs/heads/main"))
            .unwrap();
        for name in ["main", "dev", "feature/x"] {
            store.set_reference(&branch(name, 1)).unwrap();
        }
        store
            .set_reference(&Reference::new_hash("refs/tags/v1", id(7)))
            .unwrap();

        assert_eq!(
            names(store.references().unwrap()),
            vec![
                "HEAD",
                "refs/heads/dev",
                "refs/heads/feature/x",
                "refs/heads/main",
                "refs/tags/v1"
            ]
        );
        assert_eq!(
            names(store.branches().unwrap()),
            vec!["refs/heads/dev", "refs/heads/feature/x", "refs/heads/main"]
        );
        assert_eq!(names(store.tags().unwrap()), vec!["refs/tags/v1"]);
    }

    #[test]
    fn listing_stops_at_a_corrupt_record() {
        let (db, store) = store();
        for name in ["a", "b", "c"] {
            store.set_reference(&branch(name, 1)).unwrap();
        }
        let key = store.keys.reference_key("refs/heads/zzz").unwrap();
        db.transact(|tr| tr.set(&key, b"not json")).unwrap();

        let mut iter = store.references().unwrap();
        assert!(matches!(iter.next(), Some(Err(RefError::Serialization(_)))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn empty_store_lists_nothing() {
        let (_db, store) = store();
        assert_eq!(store.references().unwrap().count(), 0);
    }

    #[test]
    fn remotes_are_deduplicated() {
        let (_db, store) = store();
        for name in [
            "refs/remotes/origin/main",
            "refs/remotes/origin/dev",
            "refs/remotes/upstream/main",
        ] {
            store.set_reference(&Reference::new_hash(name, id(1))).unwrap();
        }
        assert_eq!(store.remotes().unwrap(), vec!["origin", "upstream"]);
    }

    #[test]
    fn pack_refs_is_unsupported() {
        let (_db, store) = store();
        assert!(store.pack_refs().unwrap_err().is_unsupported());
    }

    #[test]
    fn unavailable_backend_surfaces_with_context() {
        let (db, store) = store();
        db.inject_unavailable(1);
        let err = store.set_reference(&branch("main", 1)).unwrap_err();
        assert!(err.to_string().starts_with("set reference:"), "{err}");
    }
}
