//! Domain models for candle ingestion.

use barline_market_data::Interval;
use serde::{Deserialize, Serialize};

/// A maximal run of missing slots, `[start, end)`.
///
/// `start` is always a slot boundary. Gaps are derived on demand and never
/// stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gap {
    pub start: i64,
    pub end: i64,
}

impl Gap {
    /// Open times of the missing slots.
    pub fn slots(&self, interval: Interval) -> impl Iterator<Item = i64> {
        let step = interval.as_millis();
        let end = self.end;
        std::iter::successors(Some(self.start), move |t| Some(t + step)).take_while(move |t| *t < end)
    }

    pub fn slot_count(&self, interval: Interval) -> i64 {
        interval.slots_between(self.start, self.end)
    }
}

/// Lifecycle of an ingestion service.
///
/// `Polling` and `Repairing` are reported while such an operation is in
/// flight; when both are running, `Repairing` wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestionState {
    Uninitialized,
    Initialized,
    Polling,
    Repairing,
}

/// Upstream tier a fetch went through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Realtime,
    Historical,
}

/// Outcome of a repair or backfill over one range.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    pub instrument: String,
    pub start: i64,
    pub end: i64,
    /// Gaps present before the repair started.
    pub gaps_found: usize,
    /// Historical pages requested.
    pub pages: usize,
    /// Candles received inside the repaired gaps.
    pub fetched: usize,
    /// Rows actually written.
    pub written: usize,
    /// Gaps the upstream could not fill.
    pub residual_gaps: Vec<Gap>,
    /// Set when the range could not be processed at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl RepairReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.residual_gaps.is_empty()
    }
}

/// Outcome of one realtime poll.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchReport {
    pub instrument: String,
    pub tier: Tier,
    pub fetched: usize,
    pub written: usize,
    /// Historical fill run because the store was more than one page behind.
    pub catch_up: Option<RepairReport>,
}
