//! Candle storage trait.
//!
//! This module defines the storage interface for candle series. The trait
//! abstracts the persistence layer so the ingestion service can run against
//! SQLite in production and an in-memory mock in tests.

use async_trait::async_trait;
use barline_market_data::{Candle, Interval};

use super::model::Gap;
use crate::errors::Result;

/// Durable, ordered, deduplicated candle storage keyed by
/// `(instrument, interval, open_time)`.
///
/// # Design Notes
///
/// - Async methods are used for writes, which go through a single writer
/// - Sync methods are used for reads, which are short indexed queries
/// - `range` and `find_gaps` are mutually exhaustive over any range
#[async_trait]
pub trait CandleStore: Send + Sync {
    // =========================================================================
    // Mutations
    // =========================================================================

    /// Inserts or updates candles in one transaction.
    ///
    /// A stored row is overwritten only when it is unconfirmed or the incoming
    /// row is confirmed, so a confirmed row is never downgraded. Applying the
    /// same batch twice leaves the same rows.
    ///
    /// A batch holding any candle that fails [`Candle::validate`] is refused
    /// with [`Error::Validation`](crate::errors::Error::Validation) and
    /// nothing is written.
    ///
    /// # Returns
    ///
    /// The number of rows inserted or updated (rows kept because of the
    /// confirmed rule are not counted)
    async fn upsert_candles(&self, candles: &[Candle]) -> Result<usize>;

    /// Deletes rows with `open_time < cutoff`.
    ///
    /// # Returns
    ///
    /// The number of rows deleted
    async fn prune_older_than(
        &self,
        instrument: &str,
        interval: Interval,
        cutoff: i64,
    ) -> Result<usize>;

    // =========================================================================
    // Queries
    // =========================================================================

    /// Candles with `start <= open_time < end`, ascending.
    fn range(
        &self,
        instrument: &str,
        interval: Interval,
        start: i64,
        end: i64,
    ) -> Result<Vec<Candle>>;

    /// Maximal runs of missing slots in `[start, end)`, ascending.
    fn find_gaps(
        &self,
        instrument: &str,
        interval: Interval,
        start: i64,
        end: i64,
    ) -> Result<Vec<Gap>>;

    /// Open time of the newest stored candle.
    fn latest_open_time(&self, instrument: &str, interval: Interval) -> Result<Option<i64>>;
}
