//! OKX v5 wire format.
//!
//! Every endpoint wraps its payload in `{"code": "0", "msg": "", "data": [...]}`.
//! Numbers arrive as strings; candle rows are positional arrays
//! `[ts, o, h, l, c, vol, volCcy, volCcyQuote, confirm]`.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::models::{BookLevel, Candle, InstrumentInfo, Interval, OrderBook, Ticker, Trade};

/// Success code in the response envelope.
const OK_CODE: &str = "0";

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

/// Decode the envelope and surface a non-zero code as [`MarketDataError::Api`].
pub(crate) fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, MarketDataError> {
    let envelope: Envelope<T> = serde_json::from_str(body)
        .map_err(|e| MarketDataError::InvalidResponse(format!("malformed envelope: {}", e)))?;

    if envelope.code != OK_CODE {
        return Err(MarketDataError::Api {
            code: envelope.code,
            message: envelope.msg,
        });
    }

    Ok(envelope.data)
}

fn decimal_field(raw: &str, field: &str) -> Result<Decimal, MarketDataError> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|e| MarketDataError::InvalidResponse(format!("bad {} '{}': {}", field, raw, e)))
}

fn optional_decimal(raw: &Option<String>) -> Option<Decimal> {
    raw.as_deref()
        .filter(|s| !s.is_empty())
        .and_then(|s| Decimal::from_str(s).ok())
}

fn millis_field(raw: &str, field: &str) -> Result<i64, MarketDataError> {
    raw.parse::<i64>()
        .map_err(|e| MarketDataError::InvalidResponse(format!("bad {} '{}': {}", field, raw, e)))
}

/// Parse one positional candle row.
pub(crate) fn parse_candle_row(
    instrument: &str,
    interval: Interval,
    row: &[String],
) -> Result<Candle, MarketDataError> {
    if row.len() < 6 {
        return Err(MarketDataError::InvalidResponse(format!(
            "candle row has {} fields, expected at least 6",
            row.len()
        )));
    }

    let quote_volume = match row.get(7) {
        Some(raw) if !raw.is_empty() => decimal_field(raw, "volCcyQuote")?,
        _ => Decimal::ZERO,
    };

    // Rows without a confirm flag come from the history endpoint, which only
    // serves closed bars.
    let confirmed = row.get(8).map(|flag| flag == "1").unwrap_or(true);

    Ok(Candle {
        instrument: instrument.to_string(),
        interval,
        open_time: millis_field(&row[0], "ts")?,
        open: decimal_field(&row[1], "open")?,
        high: decimal_field(&row[2], "high")?,
        low: decimal_field(&row[3], "low")?,
        close: decimal_field(&row[4], "close")?,
        volume: decimal_field(&row[5], "volume")?,
        quote_volume,
        confirmed,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawInstrument {
    inst_id: String,
    inst_type: String,
    #[serde(default)]
    base_ccy: Option<String>,
    #[serde(default)]
    quote_ccy: Option<String>,
    #[serde(default)]
    tick_sz: Option<String>,
    #[serde(default)]
    lot_sz: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

impl From<RawInstrument> for InstrumentInfo {
    fn from(raw: RawInstrument) -> Self {
        InstrumentInfo {
            tick_size: optional_decimal(&raw.tick_sz),
            lot_size: optional_decimal(&raw.lot_sz),
            instrument: raw.inst_id,
            instrument_type: raw.inst_type,
            base_currency: non_empty(raw.base_ccy),
            quote_currency: non_empty(raw.quote_ccy),
            state: non_empty(raw.state),
        }
    }
}

/// Book levels are `[price, size, deprecated, orders]`.
#[derive(Debug, Deserialize)]
pub(crate) struct RawBook {
    #[serde(default)]
    asks: Vec<Vec<String>>,
    #[serde(default)]
    bids: Vec<Vec<String>>,
    ts: String,
}

fn parse_level(level: &[String]) -> Result<BookLevel, MarketDataError> {
    if level.len() < 2 {
        return Err(MarketDataError::InvalidResponse(
            "book level has fewer than 2 fields".to_string(),
        ));
    }
    Ok(BookLevel {
        price: decimal_field(&level[0], "price")?,
        size: decimal_field(&level[1], "size")?,
        orders: level.get(3).and_then(|n| n.parse().ok()).unwrap_or(0),
    })
}

impl RawBook {
    pub(crate) fn into_order_book(self, instrument: &str) -> Result<OrderBook, MarketDataError> {
        Ok(OrderBook {
            instrument: instrument.to_string(),
            asks: self
                .asks
                .iter()
                .map(|l| parse_level(l))
                .collect::<Result<_, _>>()?,
            bids: self
                .bids
                .iter()
                .map(|l| parse_level(l))
                .collect::<Result<_, _>>()?,
            timestamp: millis_field(&self.ts, "ts")?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawTrade {
    inst_id: String,
    trade_id: String,
    px: String,
    sz: String,
    side: String,
    ts: String,
}

impl TryFrom<RawTrade> for Trade {
    type Error = MarketDataError;

    fn try_from(raw: RawTrade) -> Result<Self, Self::Error> {
        Ok(Trade {
            price: decimal_field(&raw.px, "px")?,
            size: decimal_field(&raw.sz, "sz")?,
            timestamp: millis_field(&raw.ts, "ts")?,
            instrument: raw.inst_id,
            trade_id: raw.trade_id,
            side: raw.side,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawTicker {
    inst_id: String,
    last: String,
    #[serde(default)]
    bid_px: Option<String>,
    #[serde(default)]
    ask_px: Option<String>,
    #[serde(default)]
    open24h: Option<String>,
    #[serde(default)]
    high24h: Option<String>,
    #[serde(default)]
    low24h: Option<String>,
    #[serde(default)]
    vol24h: Option<String>,
    ts: String,
}

impl TryFrom<RawTicker> for Ticker {
    type Error = MarketDataError;

    fn try_from(raw: RawTicker) -> Result<Self, Self::Error> {
        Ok(Ticker {
            last: decimal_field(&raw.last, "last")?,
            bid: optional_decimal(&raw.bid_px),
            ask: optional_decimal(&raw.ask_px),
            open_24h: optional_decimal(&raw.open24h),
            high_24h: optional_decimal(&raw.high24h),
            low_24h: optional_decimal(&raw.low24h),
            volume_24h: optional_decimal(&raw.vol24h),
            timestamp: millis_field(&raw.ts, "ts")?,
            instrument: raw.inst_id,
        })
    }
}
