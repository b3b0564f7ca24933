//! Error types for browser-dl
//!
//! Only conditions a caller can react to are modeled here. Filesystem
//! contention, the persistence-order race and uniquification exhaustion are
//! recovered inside the manager and never surface as errors; lifecycle
//! contract violations are assertions.

use thiserror::Error;

use crate::types::ItemKey;

/// Result type alias for browser-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for browser-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download_dir")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Download-related error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The service has shut down and no longer accepts requests
    #[error("shutdown in progress: not accepting requests")]
    ShuttingDown,

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Download-related errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// No live item carries this key
    #[error("download {key} not found")]
    NotFound {
        /// The key that was not found
        key: ItemKey,
    },

    /// Cannot perform operation in current state
    #[error("cannot {operation} download {key} in state {current_state}")]
    InvalidState {
        /// The item the operation was attempted on
        key: ItemKey,
        /// The operation that was attempted (e.g., "pause", "open")
        operation: String,
        /// The state that prevents the operation
        current_state: String,
    },

    /// Extension may not be registered for automatic opening
    #[error("extension {extension:?} cannot be opened automatically")]
    ExtensionNotAllowed {
        /// The rejected extension
        extension: String,
    },
}
