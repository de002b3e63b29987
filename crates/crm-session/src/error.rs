//! Error types

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Persisting or reading the session failed
    #[error("Storage error: {0}")]
    Storage(#[from] crm_storage::Error),

    /// Permission lookup failed
    #[error("API error: {0}")]
    Api(#[from] crm_api::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Input rejected before anything was written
    #[error("Validation error: {0}")]
    Validation(String),

    /// No stored session to operate on
    #[error("No active session")]
    NoSession,
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
