//! Secure key/value store abstraction
//!
//! Mobile platforms expose secure storage as a string key/value primitive
//! (Android Keystore-backed preferences, iOS Keychain). Those primitives reject
//! values above a small per-item size limit, which is why values are routed
//! through [`crate::ChunkedStore`] before they reach an implementation of this
//! trait.
//!
//! Implementations are injected into the codec and the session cache rather
//! than reached through process-wide state, so tests can use
//! [`MockSecureStore`] without touching device storage.

use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Per-item limit observed on the strictest target platform (bytes)
pub const PLATFORM_ITEM_LIMIT: usize = 2048;

/// Secure key/value store primitive
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Read the value stored at `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write `value` at `key`, replacing any previous value
    ///
    /// Fails with [`Error::ValueTooLarge`] if the value exceeds
    /// [`SecureStore::item_limit`].
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Largest value (in bytes) a single item may hold, if limited
    fn item_limit(&self) -> Option<usize> {
        None
    }
}

#[async_trait]
impl<T: SecureStore + ?Sized> SecureStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }

    fn item_limit(&self) -> Option<usize> {
        (**self).item_limit()
    }
}

/// Operation recorded by [`MockSecureStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// `get(key)`
    Get(String),
    /// `set(key, _)`
    Set(String),
    /// `delete(key)`
    Delete(String),
}

/// In-memory store for testing and platforms without native integration
///
/// Enforces a per-item limit like the real platform stores and can be told to
/// fail operations on specific keys.
pub struct MockSecureStore {
    items: Mutex<BTreeMap<String, String>>,
    item_limit: Option<usize>,
    failing_keys: Mutex<HashSet<String>>,
    ops: Mutex<Vec<StoreOp>>,
}

impl MockSecureStore {
    /// Create a mock store enforcing [`PLATFORM_ITEM_LIMIT`]
    pub fn new() -> Self {
        Self::with_item_limit(Some(PLATFORM_ITEM_LIMIT))
    }

    /// Create with a custom item limit (`None` = unlimited)
    pub fn with_item_limit(item_limit: Option<usize>) -> Self {
        Self {
            items: Mutex::new(BTreeMap::new()),
            item_limit,
            failing_keys: Mutex::new(HashSet::new()),
            ops: Mutex::new(Vec::new()),
        }
    }

    /// Make every operation touching `key` fail
    pub fn fail_on(&self, key: &str) {
        self.failing_keys.lock().insert(key.to_string());
    }

    /// Stop injecting failures
    pub fn clear_failures(&self) {
        self.failing_keys.lock().clear();
    }

    /// Whether an item exists at `key`
    pub fn contains(&self, key: &str) -> bool {
        self.items.lock().contains_key(key)
    }

    /// Raw value at `key`, bypassing failure injection and the op log
    pub fn raw(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        self.items.lock().keys().cloned().collect()
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the store holds no items
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Operations performed so far, in order
    pub fn operations(&self) -> Vec<StoreOp> {
        self.ops.lock().clone()
    }

    /// Forget recorded operations
    pub fn reset_operations(&self) {
        self.ops.lock().clear();
    }

    fn check_failure(&self, key: &str) -> Result<()> {
        if self.failing_keys.lock().contains(key) {
            return Err(Error::Storage(format!("injected failure for '{}'", key)));
        }
        Ok(())
    }
}

impl Default for MockSecureStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecureStore for MockSecureStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.ops.lock().push(StoreOp::Get(key.to_string()));
        self.check_failure(key)?;
        Ok(self.items.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.ops.lock().push(StoreOp::Set(key.to_string()));
        self.check_failure(key)?;
        if let Some(limit) = self.item_limit {
            if value.len() > limit {
                return Err(Error::ValueTooLarge {
                    key: key.to_string(),
                    len: value.len(),
                    limit,
                });
            }
        }
        self.items.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.ops.lock().push(StoreOp::Delete(key.to_string()));
        self.check_failure(key)?;
        self.items.lock().remove(key);
        Ok(())
    }

    fn item_limit(&self) -> Option<usize> {
        self.item_limit
    }
}
