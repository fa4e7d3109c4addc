//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`RetryClass`]: Classification for determining retry behavior
//! - [`ErrorKind`]: The transport / api split exposed to callers

mod retry;

pub use retry::{ErrorKind, RetryClass};

use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method, which determines how the retrying transport should handle the error.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// Transient failures persisted through every allowed attempt.
    /// Carries the last underlying cause.
    #[error("Transport failed after {attempts} attempt(s): {cause}")]
    Transport {
        /// Number of attempts made
        attempts: u32,
        /// Last underlying cause
        cause: String,
    },

    /// The upstream answered with a non-success HTTP status. 429 and 5xx
    /// are retried and surface as [`Transport`](Self::Transport) once the
    /// attempts run out, so callers only see other 4xx here.
    #[error("Request rejected with HTTP {status}: {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// The upstream answered with a structured error code
    /// (e.g. unknown instrument). Not retried.
    #[error("API error {code}: {message}")]
    Api {
        /// Upstream error code
        code: String,
        /// Upstream error message
        message: String,
    },

    /// The endpoint cannot serve this bar size.
    #[error("Interval {interval} is not supported by the {endpoint} endpoint")]
    UnsupportedInterval {
        /// The requested interval
        interval: String,
        /// Endpoint family ("realtime", "historical", "any")
        endpoint: &'static str,
    },

    /// The response body could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Data validation failed.
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// Description of the validation failure
        message: String,
    },
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// ```
    /// use barline_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::Api { code: "51001".into(), message: "Instrument ID does not exist".into() };
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            // The transport already spent its retry budget on these
            Self::Transport { .. } => RetryClass::Never,

            Self::Rejected { status, .. } if *status == 429 || *status >= 500 => {
                RetryClass::WithBackoff
            }

            Self::Rejected { .. }
            | Self::Api { .. }
            | Self::UnsupportedInterval { .. }
            | Self::InvalidResponse(_)
            | Self::ValidationFailed { .. } => RetryClass::Never,
        }
    }

    /// Returns the error family.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } | Self::Rejected { .. } => ErrorKind::Transport,
            Self::Api { .. } => ErrorKind::Api,
            Self::UnsupportedInterval { .. }
            | Self::InvalidResponse(_)
            | Self::ValidationFailed { .. } => ErrorKind::Other,
        }
    }
}
