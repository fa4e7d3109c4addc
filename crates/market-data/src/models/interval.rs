use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

const SECOND_MS: i64 = 1_000;
const MINUTE_MS: i64 = 60 * SECOND_MS;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// 1970-01-05 was the first Monday after the epoch.
const WEEK_ANCHOR_MS: i64 = 4 * DAY_MS;

/// Fixed-width bar size.
///
/// Calendar-month bars are deliberately absent: slot arithmetic requires a
/// constant width.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1s")]
    OneSecond,
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "3m")]
    ThreeMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1H")]
    OneHour,
    #[serde(rename = "2H")]
    TwoHours,
    #[serde(rename = "4H")]
    FourHours,
    #[serde(rename = "6H")]
    SixHours,
    #[serde(rename = "12H")]
    TwelveHours,
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "1W")]
    OneWeek,
}

impl Interval {
    pub const ALL: [Interval; 13] = [
        Interval::OneSecond,
        Interval::OneMinute,
        Interval::ThreeMinutes,
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::ThirtyMinutes,
        Interval::OneHour,
        Interval::TwoHours,
        Interval::FourHours,
        Interval::SixHours,
        Interval::TwelveHours,
        Interval::OneDay,
        Interval::OneWeek,
    ];

    /// Width of one bar in milliseconds.
    pub const fn as_millis(self) -> i64 {
        match self {
            Interval::OneSecond => SECOND_MS,
            Interval::OneMinute => MINUTE_MS,
            Interval::ThreeMinutes => 3 * MINUTE_MS,
            Interval::FiveMinutes => 5 * MINUTE_MS,
            Interval::FifteenMinutes => 15 * MINUTE_MS,
            Interval::ThirtyMinutes => 30 * MINUTE_MS,
            Interval::OneHour => HOUR_MS,
            Interval::TwoHours => 2 * HOUR_MS,
            Interval::FourHours => 4 * HOUR_MS,
            Interval::SixHours => 6 * HOUR_MS,
            Interval::TwelveHours => 12 * HOUR_MS,
            Interval::OneDay => DAY_MS,
            Interval::OneWeek => 7 * DAY_MS,
        }
    }

    /// Canonical short code, also used as the storage key.
    pub const fn as_str(self) -> &'static str {
        match self {
            Interval::OneSecond => "1s",
            Interval::OneMinute => "1m",
            Interval::ThreeMinutes => "3m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneHour => "1H",
            Interval::TwoHours => "2H",
            Interval::FourHours => "4H",
            Interval::SixHours => "6H",
            Interval::TwelveHours => "12H",
            Interval::OneDay => "1D",
            Interval::OneWeek => "1W",
        }
    }

    /// Bar code sent to OKX. Bars of 6H and above use the UTC-aligned
    /// variants so that slots line up with epoch arithmetic.
    pub const fn okx_bar(self) -> &'static str {
        match self {
            Interval::SixHours => "6Hutc",
            Interval::TwelveHours => "12Hutc",
            Interval::OneDay => "1Dutc",
            Interval::OneWeek => "1Wutc",
            other => other.as_str(),
        }
    }

    /// The realtime candles endpoint only serves bars of one minute or wider.
    pub const fn supports_realtime(self) -> bool {
        self.as_millis() >= MINUTE_MS
    }

    const fn anchor(self) -> i64 {
        match self {
            Interval::OneWeek => WEEK_ANCHOR_MS,
            _ => 0,
        }
    }

    /// Largest slot boundary `<= ts`.
    pub fn align_down(self, ts: i64) -> i64 {
        let step = self.as_millis();
        let anchor = self.anchor();
        anchor + (ts - anchor).div_euclid(step) * step
    }

    /// Smallest slot boundary `>= ts`.
    pub fn align_up(self, ts: i64) -> i64 {
        let down = self.align_down(ts);
        if down == ts {
            ts
        } else {
            down + self.as_millis()
        }
    }

    pub fn is_aligned(self, ts: i64) -> bool {
        self.align_down(ts) == ts
    }

    /// Number of slots in `[start, end)`.
    pub fn slots_between(self, start: i64, end: i64) -> i64 {
        let first = self.align_up(start);
        if first >= end {
            return 0;
        }
        (end - first + self.as_millis() - 1) / self.as_millis()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Interval::ALL
            .into_iter()
            .find(|interval| {
                interval.as_str() == trimmed
                    || interval.okx_bar() == trimmed
                    || interval.as_str().eq_ignore_ascii_case(trimmed) && trimmed.ends_with(['h', 'd', 'w'])
            })
            .ok_or_else(|| MarketDataError::UnsupportedInterval {
                interval: trimmed.to_string(),
                endpoint: "any",
            })
    }
}
