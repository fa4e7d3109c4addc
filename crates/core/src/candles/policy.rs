//! Ingestion policy and time source.

use chrono::{DateTime, Months, TimeZone, Utc};
use serde::{Deserialize, Serialize};

const DAY_MS: i64 = 86_400_000;

/// Tunables for backfill, retention and the repair queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionPolicy {
    /// Upper bound of the backfill lookback, in days.
    pub backfill_days: u32,
    /// Backfill lookback in bars. The effective window is the shorter of the two.
    pub backfill_bars: u32,
    /// Rows older than this many calendar months are pruned.
    pub retention_months: u32,
    /// Day windows the repair queue processes per scheduler cycle.
    pub repair_days_per_cycle: usize,
}

impl Default for IngestionPolicy {
    fn default() -> Self {
        Self {
            backfill_days: 90,
            backfill_bars: 300,
            retention_months: 1,
            repair_days_per_cycle: 3,
        }
    }
}

impl IngestionPolicy {
    /// Retention cutoff for `now`, by calendar-month subtraction.
    ///
    /// Falls back to the epoch if the subtraction underflows.
    pub fn retention_cutoff(&self, now: i64) -> i64 {
        Utc.timestamp_millis_opt(now)
            .single()
            .and_then(|dt: DateTime<Utc>| dt.checked_sub_months(Months::new(self.retention_months)))
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(0)
    }

    /// Start of the backfill window for bars of `interval_ms` at `now`.
    ///
    /// Never earlier than the retention cutoff, so freshly backfilled bars are
    /// not immediately pruned.
    pub fn backfill_start(&self, now: i64, interval_ms: i64) -> i64 {
        let by_days = i64::from(self.backfill_days).saturating_mul(DAY_MS);
        let by_bars = i64::from(self.backfill_bars).saturating_mul(interval_ms);
        let lookback = by_days.min(by_bars);

        now.saturating_sub(lookback).max(self.retention_cutoff(now))
    }
}

/// Source of the current time, in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}
