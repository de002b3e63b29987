//! Secure storage for the CRM mobile client
//!
//! Provides the secure key/value store abstraction, the chunked value codec
//! that works around per-item size limits of mobile secure storage, and an
//! encrypted SQLite store for desktop and development use.
//!
//! ## Storage layout
//!
//! - **Unchunked**: values up to the chunk threshold live at their key
//! - **Chunked**: `<key>_chunks` holds the count, `<key>_chunk_<i>` the slices
//! - **Sealing** (SQLite store): ChaCha20-Poly1305, Argon2id passphrase KDF

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chunked;
pub mod config;
pub mod error;
pub mod security;
pub mod sqlite_store;
pub mod store;

pub use chunked::{
    chunk_count_key, chunk_item_key, ChunkedStore, CHUNK_COUNT_SUFFIX, CHUNK_ITEM_INFIX,
    DEFAULT_CHUNK_SIZE, MIN_CHUNK_SIZE,
};
pub use config::{KdfParams, StoreConfig};
pub use error::{Error, Result};
pub use security::{generate_salt, StoreKey};
pub use sqlite_store::SqliteSecureStore;
pub use store::{MockSecureStore, SecureStore, StoreOp, PLATFORM_ITEM_LIMIT};
