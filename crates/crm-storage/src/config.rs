//! Storage configuration

use crate::chunked::DEFAULT_CHUNK_SIZE;
use crate::store::PLATFORM_ITEM_LIMIT;
use serde::{Deserialize, Serialize};

/// Argon2id parameters for passphrase-derived store keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Iterations
    pub iterations: u32,
    /// Lanes
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        // 64 MiB, 3 iterations, 4 lanes
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// Secure store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Values longer than this (bytes) are chunked
    pub chunk_size: usize,
    /// Per-item limit enforced by the store (`None` = unlimited)
    pub item_limit: Option<usize>,
    /// Key derivation parameters for passphrase-opened stores
    pub kdf: KdfParams,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            item_limit: Some(PLATFORM_ITEM_LIMIT),
            kdf: KdfParams::default(),
        }
    }
}
