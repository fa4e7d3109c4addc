//! Database model for candles.

use std::str::FromStr;

use diesel::prelude::*;
use rust_decimal::Decimal;

use barline_market_data::{Candle, Interval};

use crate::errors::StorageError;

/// Database model for a candle row.
///
/// Prices and volumes are stored as TEXT so no precision is lost on the way
/// through SQLite.
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::candles)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CandleDB {
    pub instrument: String,
    pub interval: String,
    pub open_time: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub quote_volume: String,
    pub confirmed: bool,
}

impl From<&Candle> for CandleDB {
    fn from(candle: &Candle) -> Self {
        Self {
            instrument: candle.instrument.clone(),
            interval: candle.interval.as_str().to_string(),
            open_time: candle.open_time,
            open: candle.open.to_string(),
            high: candle.high.to_string(),
            low: candle.low.to_string(),
            close: candle.close.to_string(),
            volume: candle.volume.to_string(),
            quote_volume: candle.quote_volume.to_string(),
            confirmed: candle.confirmed,
        }
    }
}

fn parse_decimal(field: &str, value: &str, open_time: i64) -> Result<Decimal, StorageError> {
    Decimal::from_str(value).map_err(|e| {
        StorageError::CorruptRow(format!(
            "{} '{}' at open_time {}: {}",
            field, value, open_time, e
        ))
    })
}

impl TryFrom<CandleDB> for Candle {
    type Error = StorageError;

    fn try_from(row: CandleDB) -> Result<Self, Self::Error> {
        let interval = Interval::from_str(&row.interval).map_err(|e| {
            StorageError::CorruptRow(format!("interval '{}': {}", row.interval, e))
        })?;

        Ok(Candle {
            open: parse_decimal("open", &row.open, row.open_time)?,
            high: parse_decimal("high", &row.high, row.open_time)?,
            low: parse_decimal("low", &row.low, row.open_time)?,
            close: parse_decimal("close", &row.close, row.open_time)?,
            volume: parse_decimal("volume", &row.volume, row.open_time)?,
            quote_volume: parse_decimal("quote_volume", &row.quote_volume, row.open_time)?,
            instrument: row.instrument,
            interval,
            open_time: row.open_time,
            confirmed: row.confirmed,
        })
    }
}
