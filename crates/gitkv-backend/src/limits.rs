//! Key, value, and transaction size ceilings.
//!
//! The defaults are FoundationDB's hard limits. Every write is checked
//! against them before it is buffered so an oversized request fails at the
//! call that caused it rather than at commit.

use serde::{Deserialize, Serialize};

use crate::error::{KvError, KvResult};

/// Maximum key size in bytes.
pub const DEFAULT_MAX_KEY_SIZE: usize = 10_000;

/// Maximum value size in bytes.
pub const DEFAULT_MAX_VALUE_SIZE: usize = 100_000;

/// Maximum bytes of mutations in one transaction.
pub const DEFAULT_MAX_TRANSACTION_SIZE: usize = 10_000_000;

/// Size ceilings enforced by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KvLimits {
    pub max_key_size: usize,
    pub max_value_size: usize,
    pub max_transaction_size: usize,
}

impl Default for KvLimits {
    fn default() -> Self {
        Self {
            max_key_size: DEFAULT_MAX_KEY_SIZE,
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
            max_transaction_size: DEFAULT_MAX_TRANSACTION_SIZE,
        }
    }
}

impl KvLimits {
    pub fn check_key(&self, key: &[u8]) -> KvResult<()> {
        if key.len() > self.max_key_size {
            return Err(KvError::KeyTooLarge {
                size: key.len(),
                limit: self.max_key_size,
            });
        }
        Ok(())
    }

    pub fn check_value(&self, value: &[u8]) -> KvResult<()> {
        if value.len() > self.max_value_size {
            return Err(KvError::ValueTooLarge {
                size: value.len(),
                limit: self.max_value_size,
            });
        }
        Ok(())
    }

    /// Check a key/value pair, key first.
    pub fn check_pair(&self, key: &[u8], value: &[u8]) -> KvResult<()> {
        self.check_key(key)?;
        self.check_value(value)
    }

    pub fn check_transaction(&self, size: usize) -> KvResult<()> {
        if size > self.max_transaction_size {
            return Err(KvError::TransactionTooLarge {
                size,
                limit: self.max_transaction_size,
            });
        }
        Ok(())
    }
}
