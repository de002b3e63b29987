//! Error types

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Encryption error
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Backing store rejected a value above its per-item limit
    #[error("Value for '{key}' is {len} bytes, above the {limit}-byte item limit")]
    ValueTooLarge {
        /// Item key
        key: String,
        /// Value length in bytes
        len: usize,
        /// Item limit in bytes
        limit: usize,
    },

    /// Stored representation is inconsistent (e.g. unparseable chunk count)
    #[error("Corrupt value for '{key}': {reason}")]
    Corrupt {
        /// Item key
        key: String,
        /// What was wrong
        reason: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backing store failure (generic)
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
