//! Order-preserving tuple encoding and subspaces.
//!
//! Keys are built from tuples of elements so that byte order matches
//! element order and every tuple has exactly one encoding. The encoding is
//! FoundationDB's tuple layer restricted to the three element kinds gitkv
//! needs:
//!
//! ```text
//! bytes   0x01 <bytes, 0x00 escaped as 0x00 0xff> 0x00
//! string  0x02 <utf-8, 0x00 escaped as 0x00 0xff> 0x00
//! int     0x14                      zero
//!         0x14 + n <n bytes BE>     positive, n = 1..=8
//!         0x14 - n <n bytes BE, ones' complement of |v|>   negative
//! ```

use crate::error::{KvError, KvResult};
use crate::traits::KeyRange;

const BYTES_CODE: u8 = 0x01;
const STRING_CODE: u8 = 0x02;
const INT_ZERO_CODE: u8 = 0x14;
const ESCAPE: u8 = 0xff;

/// One component of a tuple key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Element {
    Bytes(Vec<u8>),
    String(String),
    Int(i64),
}

impl Element {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns `true` for a zero-length string or byte string.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Bytes(b) => b.is_empty(),
            Self::String(s) => s.is_empty(),
            Self::Int(_) => false,
        }
    }
}

impl From<&str> for Element {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Element {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Element {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<Vec<u8>> for Element {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

/// Encode a tuple.
pub fn pack(elements: &[Element]) -> Vec<u8> {
    let mut out = Vec::new();
    for element in elements {
        pack_into(&mut out, element);
    }
    out
}

/// Append the encoding of one element to `out`.
pub fn pack_into(out: &mut Vec<u8>, element: &Element) {
    match element {
        Element::Bytes(b) => pack_escaped(out, BYTES_CODE, b),
        Element::String(s) => pack_escaped(out, STRING_CODE, s.as_bytes()),
        Element::Int(v) => pack_int(out, *v),
    }
}

fn pack_escaped(out: &mut Vec<u8>, code: u8, bytes: &[u8]) {
    out.push(code);
    for &b in bytes {
        out.push(b);
        if b == 0x00 {
            out.push(ESCAPE);
        }
    }
    out.push(0x00);
}

fn pack_int(out: &mut Vec<u8>, v: i64) {
    if v == 0 {
        out.push(INT_ZERO_CODE);
        return;
    }
    let magnitude = v.unsigned_abs();
    let len = byte_len(magnitude);
    let be = magnitude.to_be_bytes();
    if v > 0 {
        out.push(INT_ZERO_CODE + len as u8);
        out.extend_from_slice(&be[8 - len..]);
    } else {
        out.push(INT_ZERO_CODE - len as u8);
        let complement = (!magnitude).to_be_bytes();
        out.extend_from_slice(&complement[8 - len..]);
    }
}

fn byte_len(v: u64) -> usize {
    8 - (v.leading_zeros() as usize / 8)
}

/// Decode a complete tuple.
pub fn unpack(bytes: &[u8]) -> KvResult<Vec<Element>> {
    let mut elements = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let (element, next) = unpack_one(bytes, pos)?;
        elements.push(element);
        pos = next;
    }
    Ok(elements)
}

fn unpack_one(bytes: &[u8], pos: usize) -> KvResult<(Element, usize)> {
    let code = bytes[pos];
    match code {
        BYTES_CODE => {
            let (raw, next) = unpack_escaped(bytes, pos + 1)?;
            Ok((Element::Bytes(raw), next))
        }
        STRING_CODE => {
            let (raw, next) = unpack_escaped(bytes, pos + 1)?;
            let s = String::from_utf8(raw)
                .map_err(|e| KvError::InvalidTuple(format!("string element: {e}")))?;
            Ok((Element::String(s), next))
        }
        0x0c..=0x1c => unpack_int(bytes, pos),
        other => Err(KvError::InvalidTuple(format!(
            "unsupported type code {other:#04x} at offset {pos}"
        ))),
    }
}

fn unpack_escaped(bytes: &[u8], mut pos: usize) -> KvResult<(Vec<u8>, usize)> {
    let mut out = Vec::new();
    while pos < bytes.len() {
        let b = bytes[pos];
        if b == 0x00 {
            if bytes.get(pos + 1) == Some(&ESCAPE) {
                out.push(0x00);
                pos += 2;
                continue;
            }
            return Ok((out, pos + 1));
        }
        out.push(b);
        pos += 1;
    }
    Err(KvError::InvalidTuple("unterminated string element".into()))
}

fn unpack_int(bytes: &[u8], pos: usize) -> KvResult<(Element, usize)> {
    let code = bytes[pos];
    if code == INT_ZERO_CODE {
        return Ok((Element::Int(0), pos + 1));
    }
    let negative = code < INT_ZERO_CODE;
    let len = if negative {
        (INT_ZERO_CODE - code) as usize
    } else {
        (code - INT_ZERO_CODE) as usize
    };
    let end = pos + 1 + len;
    let body = bytes
        .get(pos + 1..end)
        .ok_or_else(|| KvError::InvalidTuple("truncated integer element".into()))?;
    let mut buf = [0u8; 8];
    buf[8 - len..].copy_from_slice(body);
    let raw = u64::from_be_bytes(buf);

    let value = if negative {
        let mask = if len == 8 { u64::MAX } else { (1u64 << (len * 8)) - 1 };
        let magnitude = !raw & mask;
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(raw).ok()
    };
    let value =
        value.ok_or_else(|| KvError::InvalidTuple("integer element out of i64 range".into()))?;
    Ok((Element::Int(value), end))
}

/// A key prefix under which tuple-encoded keys live.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subspace {
    prefix: Vec<u8>,
}

impl Subspace {
    /// A subspace whose prefix is the given raw bytes.
    pub fn from_bytes(prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// A subspace whose prefix is the encoding of `elements`.
    pub fn from_tuple(elements: &[Element]) -> Self {
        Self {
            prefix: pack(elements),
        }
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// The child subspace extended by one element.
    pub fn sub(&self, element: impl Into<Element>) -> Subspace {
        let mut prefix = self.prefix.clone();
        pack_into(&mut prefix, &element.into());
        Subspace { prefix }
    }

    /// Encode `elements` under this subspace.
    pub fn pack(&self, elements: &[Element]) -> Vec<u8> {
        let mut key = self.prefix.clone();
        for element in elements {
            pack_into(&mut key, element);
        }
        key
    }

    /// Decode the tuple that follows this subspace's prefix in `key`.
    pub fn unpack(&self, key: &[u8]) -> KvResult<Vec<Element>> {
        let rest = key.strip_prefix(self.prefix.as_slice()).ok_or_else(|| {
            KvError::InvalidTuple("key is not contained in subspace".into())
        })?;
        unpack(rest)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        key.starts_with(&self.prefix)
    }

    /// Every tuple key strictly inside this subspace (the bare prefix itself
    /// is excluded).
    pub fn range(&self) -> KeyRange {
        let mut begin = self.prefix.clone();
        begin.push(0x00);
        let mut end = self.prefix.clone();
        end.push(0xff);
        KeyRange::new(begin, end)
    }
}
