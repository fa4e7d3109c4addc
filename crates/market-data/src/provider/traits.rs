//! Candle provider trait definitions.
//!
//! This module defines the `CandleProvider` trait that every upstream candle
//! source implements. The ingestion service only talks to this trait, so tests
//! can substitute a scripted provider for the network client.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{Candle, Interval};

use super::capabilities::ProviderCapabilities;

/// Trait for upstream candle sources.
///
/// Both fetch methods return candles **newest first**, the way the upstream
/// pages them. Callers that need chronological order reverse the batch.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use barline_market_data::provider::{CandleProvider, ProviderCapabilities};
///
/// struct Replay {
///     candles: Vec<Candle>,
/// }
///
/// #[async_trait]
/// impl CandleProvider for Replay {
///     fn id(&self) -> &'static str {
///         "REPLAY"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities { /* ... */ }
///
///     // ... implement the fetch methods
/// }
/// ```
#[async_trait]
pub trait CandleProvider: Send + Sync {
    /// Unique identifier for this provider, used in logs.
    fn id(&self) -> &'static str;

    /// Describes what this provider can serve.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Fetch the most recent candles from the realtime tier.
    ///
    /// # Arguments
    ///
    /// * `instrument` - Upstream instrument identifier (e.g. "BTC-USDT")
    /// * `interval` - Bar size; must be served by the realtime endpoint
    /// * `limit` - Maximum number of candles, clamped to the tier maximum
    ///
    /// # Errors
    ///
    /// `UnsupportedInterval` when the realtime endpoint cannot serve
    /// `interval`, otherwise whatever the transport reports.
    async fn get_realtime_candles(
        &self,
        instrument: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketDataError>;

    /// Fetch one page of candles from the historical tier.
    ///
    /// Cursor semantics follow the upstream pagination:
    ///
    /// * `after` - only candles with `open_time < after` are returned
    /// * `before` - only candles with `open_time > before` are returned
    ///
    /// With no cursor the newest available page is returned.
    async fn get_historical_candles(
        &self,
        instrument: &str,
        interval: Interval,
        before: Option<i64>,
        after: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketDataError>;
}
