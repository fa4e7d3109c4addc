use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::interval::Interval;
use crate::errors::MarketDataError;

/// One OHLCV bar of a fixed interval for one instrument.
///
/// `(instrument, interval, open_time)` is the natural key. Once `confirmed`
/// is set the upstream source will not revise the bar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    /// Instrument identifier (e.g. "BTC-USDT")
    pub instrument: String,

    /// Bar size
    pub interval: Interval,

    /// Epoch milliseconds, left-closed boundary of the bar
    pub open_time: i64,

    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,

    /// Base-currency volume
    pub volume: Decimal,

    /// Quote-currency volume (zero when the upstream does not report it)
    #[serde(default)]
    pub quote_volume: Decimal,

    /// Bar is closed and final
    pub confirmed: bool,
}

impl Candle {
    /// Checks the OHLC envelope, volume sign and slot alignment.
    pub fn validate(&self) -> Result<(), MarketDataError> {
        let body_low = self.open.min(self.close);
        let body_high = self.open.max(self.close);

        if self.low > body_low || body_high > self.high {
            return Err(MarketDataError::ValidationFailed {
                message: format!(
                    "{} {} @ {}: OHLC invariant violated (o={} h={} l={} c={})",
                    self.instrument,
                    self.interval,
                    self.open_time,
                    self.open,
                    self.high,
                    self.low,
                    self.close
                ),
            });
        }

        if self.volume.is_sign_negative() || self.quote_volume.is_sign_negative() {
            return Err(MarketDataError::ValidationFailed {
                message: format!(
                    "{} {} @ {}: negative volume",
                    self.instrument, self.interval, self.open_time
                ),
            });
        }

        if !self.interval.is_aligned(self.open_time) {
            return Err(MarketDataError::ValidationFailed {
                message: format!(
                    "{} {} @ {}: open time is not on a slot boundary",
                    self.instrument, self.interval, self.open_time
                ),
            });
        }

        Ok(())
    }

    /// Merge rule for a stored row and an incoming row with the same key.
    ///
    /// A confirmed row is only ever replaced by another confirmed row.
    pub fn should_replace(stored: &Candle, incoming: &Candle) -> bool {
        !stored.confirmed || incoming.confirmed
    }

    /// Exclusive end of the bar.
    pub fn close_time(&self) -> i64 {
        self.open_time + self.interval.as_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle {
            instrument: "BTC-USDT".to_string(),
            interval: Interval::OneMinute,
            open_time: 1_700_000_040_000,
            open,
            high,
            low,
            close,
            volume: dec!(1.5),
            quote_volume: dec!(0),
            confirmed: true,
        }
    }

    #[test]
    fn test_valid_candle() {
        let c = candle(dec!(100), dec!(110), dec!(95), dec!(105));
        assert!(c.validate().is_ok());
        assert_eq!(c.close_time(), 1_700_000_100_000);
    }

    #[test]
    fn test_high_below_close_rejected() {
        let c = candle(dec!(100), dec!(104), dec!(95), dec!(105));
        assert!(matches!(
            c.validate(),
            Err(MarketDataError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn test_low_above_open_rejected() {
        let c = candle(dec!(100), dec!(110), dec!(101), dec!(105));
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_negative_volume_rejected() {
        let mut c = candle(dec!(100), dec!(110), dec!(95), dec!(105));
        c.volume = dec!(-1);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_misaligned_open_time_rejected() {
        let mut c = candle(dec!(100), dec!(110), dec!(95), dec!(105));
        c.open_time += 1;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_confirmed_rows_are_never_downgraded() {
        let confirmed = candle(dec!(100), dec!(110), dec!(95), dec!(105));
        let mut pending = confirmed.clone();
        pending.confirmed = false;

        assert!(!Candle::should_replace(&confirmed, &pending));
        assert!(Candle::should_replace(&confirmed, &confirmed));
        assert!(Candle::should_replace(&pending, &confirmed));
        assert!(Candle::should_replace(&pending, &pending));
    }
}
