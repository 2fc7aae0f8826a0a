use gitkv_types::{ObjectId, ObjectType};

/// A whole object as exchanged with the toolkit: id, type, and raw content.
///
/// The store never interprets `data`. It trusts `id` as given; use
/// [`EncodedObject::new`] to derive it from the content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedObject {
    pub id: ObjectId,
    pub kind: ObjectType,
    pub data: Vec<u8>,
}

impl EncodedObject {
    /// Create an object and hash it with the toolkit's framing.
    pub fn new(kind: ObjectType, data: Vec<u8>) -> Self {
        let id = ObjectId::for_content(kind, &data);
        Self { id, kind, data }
    }

    /// Create an object whose id was computed elsewhere.
    pub fn from_parts(id: ObjectId, kind: ObjectType, data: Vec<u8>) -> Self {
        Self { id, kind, data }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Returns `true` if `id` is the framed hash of the content.
    pub fn verify(&self) -> bool {
        ObjectId::for_content(self.kind, &self.data) == self.id
    }
}
