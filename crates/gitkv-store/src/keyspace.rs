//! Key construction for every gitkv record.
//!
//! All keys are tuple-encoded inside one namespace subspace. Nothing outside
//! this module builds a key by hand.
//!
//! ```text
//! (object, <hex>, meta, header)          hash-first header
//! (object, <hex>, part, <n>)             content chunk n
//! (object, <type>, <hex>, meta, header)  type-first header
//! (reference, <name>)                    reference record
//! (refs-counter)                         live reference count
//! (index) (shallow) (config)             single-document records
//! (layout)                               key layout marker
//! ```

use std::fmt;
use std::str::FromStr;

use gitkv_backend::{Database, Element, KeyRange, Subspace, Transaction};
use gitkv_types::{ObjectId, ObjectType};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{StoreError, StoreResult};

/// Which object header keys are written and consulted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyLayout {
    /// Headers keyed by hash only. Fast lookups, no enumeration by type.
    HashFirst,
    /// Headers keyed by type then hash. Lookups by hash probe each type.
    TypeFirst,
    /// Both header keys are written.
    #[default]
    Dual,
}

impl KeyLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HashFirst => "hash-first",
            Self::TypeFirst => "type-first",
            Self::Dual => "dual",
        }
    }

    pub fn writes_hash_first(&self) -> bool {
        matches!(self, Self::HashFirst | Self::Dual)
    }

    pub fn writes_type_first(&self) -> bool {
        matches!(self, Self::TypeFirst | Self::Dual)
    }
}

impl fmt::Display for KeyLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyLayout {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        match s {
            "hash-first" => Ok(Self::HashFirst),
            "type-first" => Ok(Self::TypeFirst),
            "dual" => Ok(Self::Dual),
            other => Err(StoreError::Serialization(format!(
                "unknown key layout '{other}'"
            ))),
        }
    }
}

/// Top-level partitions of a namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Partition {
    Object,
    Reference,
    Index,
    Config,
    Shallow,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Reference => "reference",
            Self::Index => "index",
            Self::Config => "config",
            Self::Shallow => "shallow",
        }
    }
}

fn s(v: &str) -> Element {
    Element::from(v)
}

/// Pack `elements` under `subspace`, refusing zero-length components.
fn pack_checked(subspace: &Subspace, elements: &[Element]) -> StoreResult<Vec<u8>> {
    if let Some(pos) = elements.iter().position(Element::is_empty) {
        return Err(StoreError::InvalidKey(format!(
            "empty key component at position {pos}"
        )));
    }
    Ok(subspace.pack(elements))
}

/// Builds the keys of one repository namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeySpace {
    root: Subspace,
    layout: KeyLayout,
}

impl KeySpace {
    pub fn new(root: Subspace, layout: KeyLayout) -> Self {
        Self { root, layout }
    }

    pub fn root(&self) -> &Subspace {
        &self.root
    }

    pub fn layout(&self) -> KeyLayout {
        self.layout
    }

    pub fn partition(&self, partition: Partition) -> Subspace {
        self.root.sub(partition.as_str())
    }

    // -- objects ------------------------------------------------------------

    /// `(object, <hex>, meta, header)`
    pub fn header_key(&self, id: &ObjectId) -> Vec<u8> {
        self.partition(Partition::Object)
            .pack(&[Element::String(id.to_hex()), s("meta"), s("header")])
    }

    /// `(object, <type>, <hex>, meta, header)`. `kind` must be concrete.
    pub fn typed_header_key(&self, kind: ObjectType, id: &ObjectId) -> StoreResult<Vec<u8>> {
        pack_checked(
            &self.type_subspace(kind)?,
            &[Element::String(id.to_hex()), s("meta"), s("header")],
        )
    }

    /// `(object, <hex>, part, <n>)`
    pub fn part_key(&self, id: &ObjectId, part: u64) -> StoreResult<Vec<u8>> {
        let part = i64::try_from(part)
            .map_err(|_| StoreError::InvalidKey(format!("part index {part} out of range")))?;
        pack_checked(
            &self.partition(Partition::Object),
            &[Element::String(id.to_hex()), s("part"), Element::Int(part)],
        )
    }

    /// Every part key of one object.
    pub fn parts_range(&self, id: &ObjectId) -> KeyRange {
        self.partition(Partition::Object)
            .sub(id.to_hex())
            .sub("part")
            .range()
    }

    /// Every type-first header key of objects of type `kind`, in hash order.
    pub fn type_range(&self, kind: ObjectType) -> StoreResult<KeyRange> {
        Ok(self.type_subspace(kind)?.range())
    }

    /// Recover the object id from a key inside [`type_range`](Self::type_range).
    pub fn id_from_typed_key(&self, kind: ObjectType, key: &[u8]) -> StoreResult<ObjectId> {
        let elements = self.type_subspace(kind)?.unpack(key)?;
        let hex = elements
            .first()
            .and_then(Element::as_str)
            .ok_or_else(|| StoreError::Corrupt("type-first key has no hash component".into()))?;
        ObjectId::from_hex(hex)
            .map_err(|e| StoreError::Corrupt(format!("type-first key hash '{hex}': {e}")))
    }

    fn type_subspace(&self, kind: ObjectType) -> StoreResult<Subspace> {
        if kind.is_any() {
            return Err(StoreError::WildcardEnumeration);
        }
        Ok(self.partition(Partition::Object).sub(kind.as_str()))
    }

    // -- references -----------------------------------------------------------

    /// `(reference, <name>)`
    pub fn reference_key(&self, name: &str) -> StoreResult<Vec<u8>> {
        pack_checked(&self.partition(Partition::Reference), &[s(name)])
    }

    /// Every reference record, in name order.
    pub fn references_range(&self) -> KeyRange {
        self.partition(Partition::Reference).range()
    }

    /// Reference records whose name starts with `prefix`.
    pub fn reference_prefix_range(&self, prefix: &str) -> KeyRange {
        let mut key = self.partition(Partition::Reference).pack(&[s(prefix)]);
        // Drop the string terminator so longer names still match.
        key.pop();
        KeyRange::starting_with(&key)
    }

    pub fn reference_name_from_key(&self, key: &[u8]) -> StoreResult<String> {
        let elements = self.partition(Partition::Reference).unpack(key)?;
        match elements.as_slice() {
            [Element::String(name)] => Ok(name.clone()),
            _ => Err(StoreError::Corrupt("malformed reference key".into())),
        }
    }

    pub fn refs_counter_key(&self) -> Vec<u8> {
        self.root.pack(&[s("refs-counter")])
    }

    // -- single documents -----------------------------------------------------

    pub fn index_key(&self) -> Vec<u8> {
        self.root.pack(&[s(Partition::Index.as_str())])
    }

    pub fn shallow_key(&self) -> Vec<u8> {
        self.root.pack(&[s(Partition::Shallow.as_str())])
    }

    pub fn config_key(&self) -> Vec<u8> {
        self.root.pack(&[s(Partition::Config.as_str())])
    }

    pub fn layout_key(&self) -> Vec<u8> {
        self.root.pack(&[s("layout")])
    }

    /// Everything stored in the namespace.
    pub fn namespace_range(&self) -> KeyRange {
        KeyRange::starting_with(self.root.prefix())
    }

    /// Record this key space's layout in the namespace, or verify it matches
    /// the one recorded when the namespace was first opened.
    pub fn ensure_layout<D: Database>(&self, db: &D) -> StoreResult<()> {
        let key = self.layout_key();
        let requested = self.layout;
        db.transact(|tr| match tr.get(&key)? {
            Some(raw) if !raw.is_empty() => {
                let stored = std::str::from_utf8(&raw)
                    .map_err(|e| StoreError::Corrupt(format!("layout marker: {e}")))?
                    .parse::<KeyLayout>()?;
                if stored != requested {
                    return Err(StoreError::LayoutMismatch { stored, requested });
                }
                Ok(())
            }
            _ => {
                tr.set(&key, requested.as_str().as_bytes())?;
                info!(layout = %requested, "recorded key layout");
                Ok(())
            }
        })
        .map_err(|e| e.context("record key layout"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitkv_backend::MemoryDatabase;

    fn keyspace(layout: KeyLayout) -> KeySpace {
        KeySpace::new(Subspace::from_bytes(vec![0x15, 0x01]), layout)
    }

    fn id(n: u8) -> ObjectId {
        ObjectId::from_hash([n; 32])
    }

    #[test]
    fn zero_length_components_are_refused() {
        let ks = keyspace(KeyLayout::Dual);
        let root = ks.partition(Partition::Object);
        for elements in [
            vec![s("")],
            vec![s("abc"), Element::Bytes(Vec::new())],
        ] {
            match pack_checked(&root, &elements) {
                Err(StoreError::InvalidKey(msg)) => assert!(msg.contains("empty"), "{msg}"),
                other => panic!("unexpected: {other:?}"),
            }
        }
        assert_eq!(
            pack_checked(&root, &[s("abc"), Element::Int(0)]).unwrap(),
            root.pack(&[s("abc"), Element::Int(0)])
        );
    }

    #[test]
    fn parts_sort_numerically_inside_their_range() {
        let ks = keyspace(KeyLayout::Dual);
        let range = ks.parts_range(&id(1));
        let p2 = ks.part_key(&id(1), 2).unwrap();
        let p10 = ks.part_key(&id(1), 10).unwrap();
        assert!(range.contains(&p2));
        assert!(range.contains(&p10));
        assert!(p2 < p10);
        assert!(!range.contains(&ks.header_key(&id(1))));
        assert!(!range.contains(&ks.part_key(&id(2), 0).unwrap()));
    }

    #[test]
    fn type_range_holds_only_that_type() {
        let ks = keyspace(KeyLayout::Dual);
        let blobs = ks.type_range(ObjectType::Blob).unwrap();
        assert!(blobs.contains(&ks.typed_header_key(ObjectType::Blob, &id(3)).unwrap()));
        assert!(!blobs.contains(&ks.typed_header_key(ObjectType::Tree, &id(3)).unwrap()));
        assert!(!blobs.contains(&ks.header_key(&id(3))));
    }

    #[test]
    fn id_recovered_from_typed_key() {
        let ks = keyspace(KeyLayout::TypeFirst);
        let key = ks.typed_header_key(ObjectType::Commit, &id(9)).unwrap();
        assert_eq!(ks.id_from_typed_key(ObjectType::Commit, &key).unwrap(), id(9));
    }

    #[test]
    fn wildcard_type_has_no_keys() {
        let ks = keyspace(KeyLayout::Dual);
        assert!(matches!(
            ks.type_range(ObjectType::Any),
            Err(StoreError::WildcardEnumeration)
        ));
        assert!(ks.typed_header_key(ObjectType::Any, &id(1)).is_err());
    }

    #[test]
    fn empty_reference_name_is_rejected() {
        let ks = keyspace(KeyLayout::Dual);
        assert!(matches!(ks.reference_key(""), Err(StoreError::InvalidKey(_))));
        assert!(ks.reference_key("HEAD").is_ok());
    }

    #[test]
    fn reference_prefix_range_matches_by_string_prefix() {
        let ks = keyspace(KeyLayout::Dual);
        let heads = ks.reference_prefix_range("refs/heads/");
        assert!(heads.contains(&ks.reference_key("refs/heads/main").unwrap()));
        assert!(!heads.contains(&ks.reference_key("refs/tags/v1").unwrap()));
        assert!(!heads.contains(&ks.reference_key("HEAD").unwrap()));

        let all = ks.references_range();
        assert!(all.contains(&ks.reference_key("HEAD").unwrap()));
        assert!(!all.contains(&ks.refs_counter_key()));
    }

    #[test]
    fn reference_name_round_trips_through_key() {
        let ks = keyspace(KeyLayout::Dual);
        let key = ks.reference_key("refs/heads/feature/x").unwrap();
        assert_eq!(ks.reference_name_from_key(&key).unwrap(), "refs/heads/feature/x");
    }

    #[test]
    fn single_document_keys_are_distinct_and_inside_namespace() {
        let ks = keyspace(KeyLayout::Dual);
        let keys = [
            ks.index_key(),
            ks.shallow_key(),
            ks.config_key(),
            ks.layout_key(),
            ks.refs_counter_key(),
        ];
        for (i, a) in keys.iter().enumerate() {
            assert!(ks.namespace_range().contains(a));
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn layout_is_recorded_then_enforced() {
        let db = MemoryDatabase::new();
        keyspace(KeyLayout::Dual).ensure_layout(&db).unwrap();
        keyspace(KeyLayout::Dual).ensure_layout(&db).unwrap();
        let err = keyspace(KeyLayout::HashFirst).ensure_layout(&db).unwrap_err();
        assert!(matches!(
            err,
            StoreError::LayoutMismatch {
                stored: KeyLayout::Dual,
                requested: KeyLayout::HashFirst
            }
        ));
    }

    #[test]
    fn layout_names_parse() {
        for layout in [KeyLayout::HashFirst, KeyLayout::TypeFirst, KeyLayout::Dual] {
            assert_eq!(layout.as_str().parse::<KeyLayout>().unwrap(), layout);
        }
        assert!("sideways".parse::<KeyLayout>().is_err());
        assert_eq!(KeyLayout::default(), KeyLayout::Dual);
    }
}
