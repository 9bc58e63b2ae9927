//! # Sync Error Types
//!
//! ## Error Philosophy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Local writes already committed when a sync error surfaces.         │
//! │  A failed push therefore NEVER means lost data: the outbox          │
//! │  markers stay pending and the next cycle retries. Errors exist to   │
//! │  be recorded (attempts, last_error) and reported, not to undo.      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Errors that can occur in the sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local database operation failed.
    #[error(transparent)]
    Database(#[from] almacen_db::DbError),

    /// The remote store rejected or failed an operation.
    #[error("Remote store error: {0}")]
    Remote(String),

    /// A remote document could not be decoded into a domain type.
    #[error("Malformed remote document '{key}': {reason}")]
    MalformedDocument { key: String, reason: String },

    /// Serializing a local row into a remote document failed.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be saved.
    #[error("Failed to save configuration: {0}")]
    ConfigSaveFailed(String),

    /// Config file I/O failed.
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed.
    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Config could not be serialized.
    #[error("Config serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl SyncError {
    /// True for transient failures the next sync cycle may clear.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Remote(_))
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
