//! Signed 64-bit counters maintained with atomic add.
//!
//! Counters are stored as 8-byte little-endian `i64` values. Increments and
//! decrements never read the key, so concurrent updates do not conflict.

use gitkv_backend::Transaction;

use crate::error::{StoreError, StoreResult};

pub fn increment<T: Transaction>(tr: &mut T, key: &[u8]) -> StoreResult<()> {
    add(tr, key, 1)
}

pub fn decrement<T: Transaction>(tr: &mut T, key: &[u8]) -> StoreResult<()> {
    add(tr, key, -1)
}

pub fn add<T: Transaction>(tr: &mut T, key: &[u8], delta: i64) -> StoreResult<()> {
    tr.atomic_add(key, &delta.to_le_bytes())?;
    Ok(())
}

/// Current value; an absent or empty key reads as zero.
pub fn read<T: Transaction>(tr: &mut T, key: &[u8]) -> StoreResult<i64> {
    match tr.get(key)? {
        None => Ok(0),
        Some(raw) if raw.is_empty() => Ok(0),
        Some(raw) => {
            let buf: [u8; 8] = raw.as_slice().try_into().map_err(|_| {
                StoreError::Corrupt(format!("counter holds {} bytes, expected 8", raw.len()))
            })?;
            Ok(i64::from_le_bytes(buf))
        }
    }
}
