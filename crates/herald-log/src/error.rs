//! Error types for the broadcast log.

/// Errors that can occur during broadcast log operations.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// A database operation failed.
    #[error("broadcast log database error: {0}")]
    Database(#[from] rusqlite::Error),
}
