//! Error types for the store module.

use labeller_core::UserId;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A row the operation depends on does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Another writer already holds this position.
    #[error("conflict for user {user_id}: sequence index {sequence_index} already committed")]
    Conflict { user_id: UserId, sequence_index: i64 },

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// The blocking task running the query failed or the lock was poisoned.
    #[error("store task failed: {0}")]
    Task(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
