//! Barline Market Data Crate
//!
//! Upstream candle access for the barline ingestion engine.
//!
//! # Overview
//!
//! - [`Candle`] and [`Interval`]: the OHLCV bar model and fixed-width bar sizes
//! - [`RateLimiter`]: one instance per API tier, shared by all workers
//! - [`RetryingTransport`]: HTTP GET with bounded exponential backoff
//! - [`CandleProvider`]: the client contract, implemented by [`OkxClient`]
//!
//! ```text
//! IngestionService --> CandleProvider (OkxClient)
//!                          |-- realtime tier   --> RateLimiter("realtime")   --+
//!                          |-- historical tier --> RateLimiter("historical") --+--> RetryingTransport
//!                          '-- public wrappers ------------------------------+
//! ```

pub mod errors;
pub mod models;
pub mod provider;
pub mod transport;

pub use errors::{ErrorKind, MarketDataError, RetryClass};
pub use models::{BookLevel, Candle, InstrumentInfo, Interval, OrderBook, Ticker, Trade};
pub use provider::okx::{OkxClient, OkxConfig};
pub use provider::{CandleProvider, ProviderCapabilities, TierLimits};
pub use transport::{RateLimiter, RetryPolicy, RetryingTransport};
