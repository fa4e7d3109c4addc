use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tradable instrument as listed by the upstream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentInfo {
    pub instrument: String,
    /// SPOT, SWAP, FUTURES, OPTION
    pub instrument_type: String,
    pub base_currency: Option<String>,
    pub quote_currency: Option<String>,
    pub tick_size: Option<Decimal>,
    pub lot_size: Option<Decimal>,
    pub state: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub size: Decimal,
    pub orders: u32,
}

/// Order book snapshot; asks ascending, bids descending.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBook {
    pub instrument: String,
    pub asks: Vec<BookLevel>,
    pub bids: Vec<BookLevel>,
    pub timestamp: i64,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }

    pub fn spread(&self) -> Option<Decimal> {
        Some(self.best_ask()?.price - self.best_bid()?.price)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    pub instrument: String,
    pub last: Decimal,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub open_24h: Option<Decimal>,
    pub high_24h: Option<Decimal>,
    pub low_24h: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub instrument: String,
    pub trade_id: String,
    pub price: Decimal,
    pub size: Decimal,
    /// "buy" or "sell" (taker side)
    pub side: String,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_spread() {
        let book = OrderBook {
            instrument: "BTC-USDT".to_string(),
            asks: vec![BookLevel {
                price: dec!(101.5),
                size: dec!(2),
                orders: 3,
            }],
            bids: vec![BookLevel {
                price: dec!(100.5),
                size: dec!(1),
                orders: 1,
            }],
            timestamp: 0,
        };
        assert_eq!(book.spread(), Some(dec!(1.0)));
    }

    #[test]
    fn test_spread_on_empty_side() {
        let book = OrderBook {
            instrument: "BTC-USDT".to_string(),
            asks: vec![],
            bids: vec![],
            timestamp: 0,
        };
        assert!(book.spread().is_none());
    }
}
