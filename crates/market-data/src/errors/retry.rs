/// Classification for retry policy.
///
/// Used by the retrying transport to decide whether a failed attempt is worth
/// repeating.
///
/// # Behavior Summary
///
/// | Class | Retried by transport? | Retried by ingestion? |
/// |-------|-----------------------|-----------------------|
/// | `Never` | No | No |
/// | `WithBackoff` | Yes, until attempts are exhausted | No |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - bad instrument, validation error, client-side rejection
    /// or an already exhausted retry loop.
    Never,

    /// Retry with exponential backoff.
    ///
    /// Used for network failures, 5xx responses and rate-limit rejections.
    WithBackoff,
}

/// Coarse error family surfaced to callers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Network, 5xx, rate-limit exhaustion or a non-transient HTTP rejection.
    Transport,
    /// Structured upstream error code.
    Api,
    /// Decoding, validation or caller error.
    Other,
}
