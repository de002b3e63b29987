//! Chunked value codec over a size-limited secure store
//!
//! Values up to the chunk threshold are stored as a single item at `key`.
//! Larger values are split into `key_chunk_0 .. key_chunk_{n-1}` plus a control
//! item `key_chunks` holding `n` as a decimal string.
//!
//! Lengths are measured in UTF-8 bytes and chunks are cut on character
//! boundaries, so a chunk never exceeds the threshold in bytes and is always a
//! valid string on its own.
//!
//! Backing store calls are issued one after another. On a chunked write the
//! control item is the last item written, so an interrupted first-time chunked
//! write leaves the previous unchunked value readable.

use crate::{Error, Result, SecureStore};
use tracing::{debug, warn};

/// Default chunk threshold in bytes (headroom below the ~2048-byte platform limit)
pub const DEFAULT_CHUNK_SIZE: usize = 2000;

/// Smallest threshold that can always hold one UTF-8 character
pub const MIN_CHUNK_SIZE: usize = 4;

/// Suffix of the control item holding the chunk count
pub const CHUNK_COUNT_SUFFIX: &str = "_chunks";

/// Infix of numbered chunk items
pub const CHUNK_ITEM_INFIX: &str = "_chunk_";

/// Key of the control item for `key`
pub fn chunk_count_key(key: &str) -> String {
    format!("{}{}", key, CHUNK_COUNT_SUFFIX)
}

/// Key of chunk `index` for `key`
pub fn chunk_item_key(key: &str, index: usize) -> String {
    format!("{}{}{}", key, CHUNK_ITEM_INFIX, index)
}

/// Split `value` into slices of at most `limit` bytes on char boundaries
fn split_chunks(value: &str, limit: usize) -> Vec<&str> {
    let mut chunks = Vec::with_capacity(value.len().div_ceil(limit));
    let mut rest = value;
    while !rest.is_empty() {
        let mut end = rest.len().min(limit);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (head, tail) = rest.split_at(end);
        chunks.push(head);
        rest = tail;
    }
    chunks
}

/// Chunked secure value store
pub struct ChunkedStore<S> {
    store: S,
    chunk_size: usize,
}

impl<S: SecureStore> ChunkedStore<S> {
    /// Wrap `store` with the default threshold, lowered to the store's item
    /// limit if that is smaller
    pub fn new(store: S) -> Self {
        let chunk_size = store
            .item_limit()
            .map_or(DEFAULT_CHUNK_SIZE, |limit| DEFAULT_CHUNK_SIZE.min(limit));
        Self { store, chunk_size }
    }

    /// Wrap `store` with a custom threshold
    ///
    /// The threshold must be at least [`MIN_CHUNK_SIZE`] and must not exceed
    /// the store's item limit.
    pub fn with_chunk_size(store: S, chunk_size: usize) -> Result<Self> {
        if chunk_size < MIN_CHUNK_SIZE {
            return Err(Error::Validation(format!(
                "Chunk size must be at least {} bytes, got {}",
                MIN_CHUNK_SIZE, chunk_size
            )));
        }
        if let Some(limit) = store.item_limit() {
            if chunk_size > limit {
                return Err(Error::Validation(format!(
                    "Chunk size {} exceeds the store item limit {}",
                    chunk_size, limit
                )));
            }
        }
        Ok(Self { store, chunk_size })
    }

    /// Chunk threshold in bytes
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Underlying store, for unchunked fields
    pub fn inner(&self) -> &S {
        &self.store
    }

    /// Store `value` under `key`, chunking it if it exceeds the threshold
    pub async fn write(&self, key: &str, value: &str) -> Result<()> {
        let result = self.write_inner(key, value).await;
        if let Err(e) = &result {
            warn!("Chunked write of '{}' failed: {}", key, e);
        }
        result
    }

    /// Read the value stored under `key`, reassembling chunks
    pub async fn read(&self, key: &str) -> Result<Option<String>> {
        let result = self.read_inner(key).await;
        if let Err(e) = &result {
            warn!("Chunked read of '{}' failed: {}", key, e);
        }
        result
    }

    /// Remove every item stored for `key`, chunked or not
    ///
    /// Each step is attempted even if an earlier one failed; the first
    /// failure is returned afterwards.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut first_err = None;

        match self.stored_chunk_count(key).await {
            Ok(count) => {
                for index in 0..count.unwrap_or(0) {
                    record(&mut first_err, self.store.delete(&chunk_item_key(key, index)).await);
                }
            }
            Err(e) => record(&mut first_err, Err(e)),
        }
        record(&mut first_err, self.store.delete(&chunk_count_key(key)).await);
        record(&mut first_err, self.store.delete(key).await);

        match first_err {
            Some(e) => {
                warn!("Chunked delete of '{}' incomplete: {}", key, e);
                Err(e)
            }
            None => Ok(()),
        }
    }

    async fn write_inner(&self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() {
            return Err(Error::Validation("Key must not be empty".to_string()));
        }

        // Previous chunk count, so stale chunk items can be removed afterwards.
        // An unreadable control item is overwritten or deleted below anyway.
        let previous = self.stored_chunk_count(key).await.unwrap_or_else(|e| {
            debug!("Ignoring unreadable chunk count for '{}': {}", key, e);
            None
        });

        if value.len() <= self.chunk_size {
            self.store.set(key, value).await?;
            self.store.delete(&chunk_count_key(key)).await?;
            for index in 0..previous.unwrap_or(0) {
                self.store.delete(&chunk_item_key(key, index)).await?;
            }
            return Ok(());
        }

        let chunks = split_chunks(value, self.chunk_size);
        for (index, chunk) in chunks.iter().enumerate() {
            self.store.set(&chunk_item_key(key, index), chunk).await?;
        }
        self.store
            .set(&chunk_count_key(key), &chunks.len().to_string())
            .await?;
        self.store.delete(key).await?;
        for index in chunks.len()..previous.unwrap_or(0) {
            self.store.delete(&chunk_item_key(key, index)).await?;
        }

        debug!("Stored '{}' as {} chunks ({} bytes)", key, chunks.len(), value.len());
        Ok(())
    }

    async fn read_inner(&self, key: &str) -> Result<Option<String>> {
        let Some(count) = self.stored_chunk_count(key).await? else {
            return self.store.get(key).await;
        };

        let mut value = String::new();
        for index in 0..count {
            match self.store.get(&chunk_item_key(key, index)).await? {
                Some(chunk) => value.push_str(&chunk),
                None => warn!("Chunk {} of '{}' is missing, skipping", index, key),
            }
        }
        Ok(Some(value))
    }

    async fn stored_chunk_count(&self, key: &str) -> Result<Option<usize>> {
        let Some(raw) = self.store.get(&chunk_count_key(key)).await? else {
            return Ok(None);
        };
        raw.trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| Error::Corrupt {
                key: key.to_string(),
                reason: format!("invalid chunk count {:?}: {}", raw, e),
            })
    }
}

fn record(first_err: &mut Option<Error>, result: Result<()>) {
    if let Err(e) = result {
        if first_err.is_none() {
            *first_err = Some(e);
        } else {
            debug!("Additional delete failure: {}", e);
        }
    }
}
