//! Error types for the medical-warehouse-rust library.
//!
//! This module provides custom error types using `thiserror` for better error
//! handling and more specific error messages throughout the pipeline.

use thiserror::Error;

/// Errors that can occur in the warehouse pipeline.
#[derive(Error, Debug)]
pub enum WarehouseError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Detection-results CSV errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid date format in input data
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A pipeline stage failed; downstream stages were skipped
    #[error("Pipeline stage '{stage}' failed: {message}")]
    StageFailed {
        /// Name of the failed stage
        stage: &'static str,
        /// Failure detail
        message: String,
    },

    /// Another pipeline run holds the writer lock
    #[error("Pipeline is already running (writer lock held)")]
    LockHeld,

    /// General error with context
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Result with `WarehouseError`
pub type Result<T> = std::result::Result<T, WarehouseError>;

impl From<anyhow::Error> for WarehouseError {
    fn from(err: anyhow::Error) -> Self {
        WarehouseError::Other(err.to_string())
    }
}
