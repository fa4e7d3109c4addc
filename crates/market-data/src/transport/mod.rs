//! Outbound HTTP plumbing shared by providers.
//!
//! - [`RateLimiter`]: per-tier sliding-window permit gate
//! - [`RetryingTransport`]: GET with bounded exponential backoff

mod rate_limiter;
mod retrying;

pub use rate_limiter::RateLimiter;
pub use retrying::{
    run_with_retry, AttemptOutcome, RetryPolicy, RetryingTransport, DEFAULT_REQUEST_TIMEOUT,
    MAX_TOTAL_ATTEMPTS,
};
