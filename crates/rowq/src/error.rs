//! Error types and result handling for rowq.
//!
//! This module defines the core error type [`Error`] used throughout the crate, as well as the [`Result`] alias for fallible operations.
//!
//! ## What
//!
//! - [`Error`] enumerates every failure rowq surfaces: configuration problems, oversized or
//!   undecodable payloads, and genuine backing-store failures.
//! - [`Result<T>`] is a convenient alias for `Result<T, Error>`.
//!
//! Losing a race on a conditional write is *not* an error. `lock()`, `requeue()` and
//! `success()` report those outcomes as `false` (or `None` for lookups).
//!
//! ### Example
//!
//! ```rust
//! use rowq::error::{Error, Result};
//!
//! fn open_queue() -> Result<()> {
//!     Err(Error::QueueNotFound { name: "jobs".to_string() })
//! }
//! ```
use thiserror::Error;

/// Result type for rowq operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error type for heterogeneous error sources
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error types for rowq operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Row decoding or driver-level failure (SQLx errors)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON serialization of a payload failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Required configuration field is missing
    #[error("Missing required configuration: {field}")]
    MissingConfig { field: String },

    /// Configuration field has an invalid value
    #[error("Invalid configuration value for {field}: {message}")]
    InvalidConfig { field: String, message: String },

    /// The queue name has no matching identity row
    #[error("Queue '{name}' not found")]
    QueueNotFound { name: String },

    /// Attempted to create a queue that already exists
    #[error("Queue '{name}' already exists")]
    QueueAlreadyExists { name: String },

    /// Encoded payload exceeds the storage ceiling; nothing was written
    #[error("Payload size {actual_bytes} exceeds limit {max_bytes}")]
    PayloadTooLarge {
        actual_bytes: usize,
        max_bytes: usize,
    },

    /// A stored payload could not be decoded; the row is left untouched
    #[error("Failed to decode payload of element {element_id}: {message}")]
    Deserialization { element_id: i64, message: String },

    /// Database schema validation failed
    #[error("Schema validation failed: {message}")]
    SchemaValidation { message: String },

    /// Database connection failed or was lost
    #[error("Database connection failed: {source}. Context: {context}")]
    ConnectionFailed { source: BoxError, context: String },

    /// SQL statement failed
    #[error("Database query failed: {query}. Context: {context}. Source: {source}")]
    QueryFailed {
        source: BoxError,
        query: String,
        context: String,
    },

    /// Unexpected internal error occurred
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// True for failures reported by the backing store itself.
    ///
    /// These are never retried by rowq; retry policy belongs to the caller.
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            Error::Database(_) | Error::ConnectionFailed { .. } | Error::QueryFailed { .. }
        )
    }

    /// True for errors raised while validating construction arguments.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::MissingConfig { .. } | Error::InvalidConfig { .. } | Error::QueueNotFound { .. }
        )
    }

    pub(crate) fn query_failed(
        query: impl Into<String>,
        context: impl Into<String>,
        source: sqlx::Error,
    ) -> Self {
        Error::QueryFailed {
            query: query.into(),
            context: context.into(),
            source: Box::new(source),
        }
    }
}
