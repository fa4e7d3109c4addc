//! Core error types for the barline ingestion engine.
//!
//! This module defines database-agnostic error types. Storage-specific errors
//! (from Diesel, SQLite, etc.) are converted to these types by the storage layer.

use barline_market_data::{ErrorKind as MarketDataErrorKind, Interval, MarketDataError};
use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the ingestion engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Market data operation failed: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    /// A paginated repair or backfill stopped part way. Every page stored
    /// before the failure is durable; re-running the repair over the same
    /// range only fetches what is still missing.
    #[error("Backfill of {instrument} {interval} stopped at cursor {}: {source}", display_cursor(.last_cursor))]
    Backfill {
        instrument: String,
        interval: Interval,
        /// `after` cursor of the request that failed; everything at or past
        /// it was already stored.
        last_cursor: Option<i64>,
        #[source]
        source: Box<Error>,
    },

    #[error("Ingestion service is not initialized")]
    NotInitialized,

    #[error("Invalid range [{start}, {end})")]
    InvalidRange { start: i64, end: i64 },

    #[error("Input validation failed: {0}")]
    Validation(String),

    #[error("Invalid configuration value: {0}")]
    Config(String),
}

fn display_cursor(cursor: &Option<i64>) -> String {
    cursor
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Coarse error family, used by callers to pick a retry or alerting policy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Transport,
    Api,
    Storage,
    Other,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MarketData(e) => match e.kind() {
                MarketDataErrorKind::Transport => ErrorKind::Transport,
                MarketDataErrorKind::Api => ErrorKind::Api,
                MarketDataErrorKind::Other => ErrorKind::Other,
            },
            Error::Database(_) => ErrorKind::Storage,
            Error::Backfill { source, .. } => source.kind(),
            Error::NotInitialized
            | Error::InvalidRange { .. }
            | Error::Validation(_)
            | Error::Config(_) => ErrorKind::Other,
        }
    }
}

/// Database-agnostic error type for storage operations.
///
/// This enum uses `String` for all error details, allowing the storage layer
/// to convert storage-specific errors (Diesel, SQLite, etc.) into this format.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish a database connection.
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to create or configure the connection pool.
    #[error("Failed to create database pool: {0}")]
    PoolCreationFailed(String),

    /// A database query failed to execute.
    #[error("Database query failed: {0}")]
    QueryFailed(String),

    /// A stored row could not be mapped back to a domain value.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// Database migration failed.
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Internal/unexpected database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}
