//! Object header encoding and content chunking.
//!
//! Backend values are capped well below the size of a large blob, so object
//! content is split into fixed-size chunks stored under consecutive part
//! indices. The header (type and total size) is stored apart from the chunks
//! so size queries never touch content.

use std::io::Read;

use gitkv_types::ObjectType;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Default chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Type and total size of a stored object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectHeader {
    #[serde(rename = "type")]
    pub kind: ObjectType,
    pub size: u64,
}

impl ObjectHeader {
    pub fn new(kind: ObjectType, size: u64) -> Self {
        Self { kind, size }
    }
}

impl std::fmt::Display for ObjectHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} of {} bytes", self.kind, self.size)
    }
}

/// An object split for storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedChunks {
    pub header: ObjectHeader,
    pub chunks: Vec<Vec<u8>>,
}

impl EncodedChunks {
    /// Content bytes across all chunks.
    pub fn payload_size(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }
}

/// Splits object content into chunks and reassembles it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectCodec {
    chunk_size: usize,
}

impl Default for ObjectCodec {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ObjectCodec {
    /// A codec with the given chunk size. Zero is rejected.
    pub fn new(chunk_size: usize) -> StoreResult<Self> {
        if chunk_size == 0 {
            return Err(StoreError::Serialization("chunk size must be positive".into()));
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of parts an object described by `header` occupies.
    pub fn part_count(&self, header: &ObjectHeader) -> u64 {
        header.size.div_ceil(self.chunk_size as u64)
    }

    pub fn encode(&self, kind: ObjectType, data: &[u8]) -> EncodedChunks {
        EncodedChunks {
            header: ObjectHeader::new(kind, data.len() as u64),
            chunks: data.chunks(self.chunk_size).map(<[u8]>::to_vec).collect(),
        }
    }

    /// Encode content read from a stream. The stream is read to the end.
    pub fn encode_reader<R: Read>(&self, kind: ObjectType, mut reader: R) -> StoreResult<EncodedChunks> {
        let mut chunks = Vec::new();
        let mut size = 0u64;
        loop {
            let mut chunk = Vec::with_capacity(self.chunk_size);
            let n = (&mut reader)
                .take(self.chunk_size as u64)
                .read_to_end(&mut chunk)?;
            if n == 0 {
                break;
            }
            size += n as u64;
            chunks.push(chunk);
            if n < self.chunk_size {
                break;
            }
        }
        Ok(EncodedChunks {
            header: ObjectHeader::new(kind, size),
            chunks,
        })
    }

    /// Concatenate `chunks` in order and check the result against `header`.
    pub fn decode<I>(&self, header: &ObjectHeader, chunks: I) -> StoreResult<Vec<u8>>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let mut data = Vec::with_capacity(header.size as usize);
        for chunk in chunks {
            data.extend_from_slice(&chunk);
        }
        if data.len() as u64 != header.size {
            return Err(StoreError::Corrupt(format!(
                "assembled {} bytes for a {header}",
                data.len()
            )));
        }
        Ok(data)
    }

    pub fn encode_header(&self, header: &ObjectHeader) -> StoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(header)?)
    }

    pub fn decode_header(&self, raw: &[u8]) -> StoreResult<ObjectHeader> {
        Ok(serde_json::from_slice(raw)?)
    }
}
