//! Market data models
//!
//! - `interval` - Fixed-width bar sizes and slot arithmetic (Interval)
//! - `candle` - OHLCV bar (Candle)
//! - `snapshot` - Instrument listings, order books, tickers and trades returned
//!   by the simple upstream wrappers

mod candle;
mod interval;
mod snapshot;

pub use candle::Candle;
pub use interval::Interval;
pub use snapshot::{BookLevel, InstrumentInfo, OrderBook, Ticker, Trade};
