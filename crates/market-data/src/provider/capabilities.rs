//! Provider capabilities and per-tier rate limits.
//!
//! This module describes what a candle source can serve and how hard each of
//! its API tiers may be called.

use crate::models::Interval;

/// Describes the capabilities of a candle provider.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Bar sizes the realtime endpoint accepts.
    pub realtime_intervals: &'static [Interval],

    /// Bar sizes the historical endpoint accepts.
    pub historical_intervals: &'static [Interval],

    /// Largest page the realtime endpoint returns.
    pub realtime_max_limit: usize,

    /// Largest page the historical endpoint returns.
    pub history_max_limit: usize,
}

impl ProviderCapabilities {
    pub fn supports_realtime(&self, interval: Interval) -> bool {
        self.realtime_intervals.contains(&interval)
    }

    pub fn supports_historical(&self, interval: Interval) -> bool {
        self.historical_intervals.contains(&interval)
    }
}

/// Permits per second for each API tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TierLimits {
    pub realtime_qps: u32,
    pub history_qps: u32,
}

impl Default for TierLimits {
    fn default() -> Self {
        Self {
            realtime_qps: 1,
            history_qps: 10,
        }
    }
}
