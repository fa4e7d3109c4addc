//! OKX public REST provider.
//!
//! Candles come from two tiers with separate rate limits:
//!
//! - Realtime: `GET /api/v5/market/candles` (most recent bars, up to 300 per page)
//! - Historical: `GET /api/v5/market/history-candles` (paged backwards, up to 100 per page)
//!
//! The remaining public endpoints (instruments, books, trades, ticker) are
//! exposed as typed wrappers without a tier limiter.

mod models;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, NoProxy, Proxy};

use crate::errors::MarketDataError;
use crate::models::{Candle, InstrumentInfo, Interval, OrderBook, Ticker, Trade};
use crate::provider::{CandleProvider, ProviderCapabilities, TierLimits};
use crate::transport::{RateLimiter, RetryPolicy, RetryingTransport, DEFAULT_REQUEST_TIMEOUT};

use models::{decode_envelope, parse_candle_row, RawBook, RawInstrument, RawTicker, RawTrade};

const PROVIDER_ID: &str = "OKX";
pub const DEFAULT_BASE_URL: &str = "https://www.okx.com";

const CANDLES_PATH: &str = "/api/v5/market/candles";
const HISTORY_CANDLES_PATH: &str = "/api/v5/market/history-candles";
const INSTRUMENTS_PATH: &str = "/api/v5/public/instruments";
const BOOKS_PATH: &str = "/api/v5/market/books";
const TRADES_PATH: &str = "/api/v5/market/trades";
const TICKER_PATH: &str = "/api/v5/market/ticker";

pub const REALTIME_MAX_LIMIT: usize = 300;
pub const HISTORY_MAX_LIMIT: usize = 100;
const BOOK_MAX_DEPTH: usize = 400;
const TRADES_MAX_LIMIT: usize = 500;

const REALTIME_INTERVALS: &[Interval] = &[
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

/// Client configuration.
#[derive(Clone, Debug)]
pub struct OkxConfig {
    pub base_url: String,
    /// Per-attempt HTTP timeout
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub tier_limits: TierLimits,
    /// Explicit HTTP(S) proxy URL
    pub proxy: Option<String>,
    /// Comma-separated hosts that bypass the proxy
    pub no_proxy: Option<String>,
}

impl Default for OkxConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
            tier_limits: TierLimits::default(),
            proxy: None,
            no_proxy: None,
        }
    }
}

/// OKX candle provider and public market data client.
///
/// One instance (and therefore one pair of tier limiters) should be shared by
/// every ingestion worker in the process.
///
/// # Example
///
/// ```ignore
/// let client = OkxClient::new(OkxConfig::default())?;
/// let candles = client.get_realtime_candles("BTC-USDT", Interval::OneMinute, 10).await?;
/// ```
pub struct OkxClient {
    transport: RetryingTransport,
    realtime_limiter: Arc<RateLimiter>,
    history_limiter: Arc<RateLimiter>,
}

impl OkxClient {
    pub fn new(config: OkxConfig) -> Result<Self, MarketDataError> {
        let mut builder = Client::builder().timeout(config.timeout);

        if let Some(proxy_url) = config.proxy.as_deref().filter(|p| !p.is_empty()) {
            let proxy = Proxy::all(proxy_url)
                .map_err(|e| MarketDataError::ValidationFailed {
                    message: format!("invalid proxy '{}': {}", proxy_url, e),
                })?
                .no_proxy(config.no_proxy.as_deref().and_then(NoProxy::from_string));
            debug!("OKX client using proxy {}", proxy_url);
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| MarketDataError::ValidationFailed {
            message: format!("failed to build HTTP client: {}", e),
        })?;

        Ok(Self::with_client(client, config))
    }

    /// Build on top of an existing HTTP client.
    pub fn with_client(client: Client, config: OkxConfig) -> Self {
        let tier_limits = config.tier_limits;
        Self {
            transport: RetryingTransport::new(client, config.base_url, config.retry),
            realtime_limiter: Arc::new(RateLimiter::new("realtime", tier_limits.realtime_qps)),
            history_limiter: Arc::new(RateLimiter::new("historical", tier_limits.history_qps)),
        }
    }

    async fn fetch_candles(
        &self,
        path: &str,
        limiter: &RateLimiter,
        instrument: &str,
        interval: Interval,
        params: Vec<(&str, String)>,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let body = self.transport.get(path, &params, Some(limiter)).await?;
        let rows: Vec<Vec<String>> = decode_envelope(&body)?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in rows {
            let candle = match parse_candle_row(instrument, interval, &row) {
                Ok(candle) => candle,
                Err(e) => {
                    warn!("Skipping unparseable {} {} row: {}", instrument, interval, e);
                    continue;
                }
            };

            if let Err(e) = candle.validate() {
                warn!("Skipping invalid candle: {}", e);
                continue;
            }
            candles.push(candle);
        }

        debug!(
            "{} {} {}: {} candle(s) from {}",
            PROVIDER_ID,
            instrument,
            interval,
            candles.len(),
            path
        );
        Ok(candles)
    }

    /// Tradable instruments of one type (SPOT, SWAP, FUTURES, OPTION).
    pub async fn list_instruments(
        &self,
        inst_type: &str,
    ) -> Result<Vec<InstrumentInfo>, MarketDataError> {
        let body = self
            .transport
            .get(INSTRUMENTS_PATH, &[("instType", inst_type.to_string())], None)
            .await?;
        let raw: Vec<RawInstrument> = decode_envelope(&body)?;
        Ok(raw.into_iter().map(InstrumentInfo::from).collect())
    }

    pub async fn get_order_book(
        &self,
        instrument: &str,
        depth: usize,
    ) -> Result<OrderBook, MarketDataError> {
        let params = [
            ("instId", instrument.to_string()),
            ("sz", depth.clamp(1, BOOK_MAX_DEPTH).to_string()),
        ];
        let body = self.transport.get(BOOKS_PATH, &params, None).await?;
        let raw: Vec<RawBook> = decode_envelope(&body)?;

        raw.into_iter()
            .next()
            .ok_or_else(|| MarketDataError::InvalidResponse(format!("no order book for {}", instrument)))?
            .into_order_book(instrument)
    }

    /// Most recent public trades, newest first.
    pub async fn get_trades(
        &self,
        instrument: &str,
        limit: usize,
    ) -> Result<Vec<Trade>, MarketDataError> {
        let params = [
            ("instId", instrument.to_string()),
            ("limit", limit.clamp(1, TRADES_MAX_LIMIT).to_string()),
        ];
        let body = self.transport.get(TRADES_PATH, &params, None).await?;
        let raw: Vec<RawTrade> = decode_envelope(&body)?;
        raw.into_iter().map(Trade::try_from).collect()
    }

    pub async fn get_ticker(&self, instrument: &str) -> Result<Ticker, MarketDataError> {
        let body = self
            .transport
            .get(TICKER_PATH, &[("instId", instrument.to_string())], None)
            .await?;
        let raw: Vec<RawTicker> = decode_envelope(&body)?;

        raw.into_iter()
            .next()
            .ok_or_else(|| MarketDataError::InvalidResponse(format!("no ticker for {}", instrument)))
            .and_then(Ticker::try_from)
    }
}

#[async_trait]
impl CandleProvider for OkxClient {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            realtime_intervals: REALTIME_INTERVALS,
            historical_intervals: &Interval::ALL,
            realtime_max_limit: REALTIME_MAX_LIMIT,
            history_max_limit: HISTORY_MAX_LIMIT,
        }
    }

    async fn get_realtime_candles(
        &self,
        instrument: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketDataError> {
        if !interval.supports_realtime() {
            return Err(MarketDataError::UnsupportedInterval {
                interval: interval.to_string(),
                endpoint: "realtime",
            });
        }

        let params = vec![
            ("instId", instrument.to_string()),
            ("bar", interval.okx_bar().to_string()),
            ("limit", limit.clamp(1, REALTIME_MAX_LIMIT).to_string()),
        ];
        self.fetch_candles(CANDLES_PATH, &self.realtime_limiter, instrument, interval, params)
            .await
    }

    async fn get_historical_candles(
        &self,
        instrument: &str,
        interval: Interval,
        before: Option<i64>,
        after: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let mut params = vec![
            ("instId", instrument.to_string()),
            ("bar", interval.okx_bar().to_string()),
            ("limit", limit.clamp(1, HISTORY_MAX_LIMIT).to_string()),
        ];
        if let Some(after) = after {
            params.push(("after", after.to_string()));
        }
        if let Some(before) = before {
            params.push(("before", before.to_string()));
        }

        self.fetch_candles(
            HISTORY_CANDLES_PATH,
            &self.history_limiter,
            instrument,
            interval,
            params,
        )
        .await
    }
}
