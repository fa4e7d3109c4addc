use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use barline_core::IngestionPolicy;
use barline_market_data::{Interval, OkxConfig, RetryPolicy, TierLimits};

const DEFAULT_DB_PATH: &str = "./db/candles.db";
const DEFAULT_INSTRUMENTS: &str = "BTC-USDT,ETH-USDT";
const DEFAULT_INTERVALS: &str = "1m,5m,15m,1H";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8088";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub db_path: String,
    pub okx: OkxConfig,
    pub instruments: Vec<String>,
    pub intervals: Vec<Interval>,
    pub policy: IngestionPolicy,
    pub poll_interval: Duration,
    pub log_format: LogFormat,
    /// Address of the read API started by `serve`.
    pub listen_addr: SocketAddr,
}

impl Config {
    /// Reads `BARLINE_*` variables, after loading an optional `.env` file.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = var("BARLINE_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        let instruments = split_list(
            &var("BARLINE_INSTRUMENTS").unwrap_or_else(|| DEFAULT_INSTRUMENTS.to_string()),
        )
        .map(str::to_uppercase)
        .collect::<Vec<_>>();
        if instruments.is_empty() {
            bail!("BARLINE_INSTRUMENTS must name at least one instrument");
        }

        let intervals = split_list(
            &var("BARLINE_INTERVALS").unwrap_or_else(|| DEFAULT_INTERVALS.to_string()),
        )
        .map(|s| Interval::from_str(s).with_context(|| format!("BARLINE_INTERVALS: '{}'", s)))
        .collect::<anyhow::Result<Vec<_>>>()?;
        if intervals.is_empty() {
            bail!("BARLINE_INTERVALS must name at least one interval");
        }

        let defaults = OkxConfig::default();
        let retry_defaults = RetryPolicy::default();
        let tier_defaults = TierLimits::default();
        let policy_defaults = IngestionPolicy::default();

        let retry_backoff_secs: f64 = parse_var(
            &var,
            "BARLINE_RETRY_BACKOFF_SECS",
            retry_defaults.retry_backoff.as_secs_f64(),
        )?;
        let Ok(retry_backoff) = Duration::try_from_secs_f64(retry_backoff_secs) else {
            bail!("BARLINE_RETRY_BACKOFF_SECS must be a non-negative number of seconds");
        };

        let okx = OkxConfig {
            base_url: var("BARLINE_BASE_URL").unwrap_or(defaults.base_url),
            timeout: Duration::from_millis(parse_var(
                &var,
                "BARLINE_REQUEST_TIMEOUT_MS",
                defaults.timeout.as_millis() as u64,
            )?),
            retry: RetryPolicy {
                max_retries: parse_var(&var, "BARLINE_MAX_RETRIES", retry_defaults.max_retries)?,
                retry_backoff,
            },
            tier_limits: TierLimits {
                realtime_qps: positive(parse_var(
                    &var,
                    "BARLINE_REALTIME_QPS",
                    tier_defaults.realtime_qps,
                )?, "BARLINE_REALTIME_QPS")?,
                history_qps: positive(parse_var(
                    &var,
                    "BARLINE_HISTORY_QPS",
                    tier_defaults.history_qps,
                )?, "BARLINE_HISTORY_QPS")?,
            },
            proxy: var("BARLINE_PROXY"),
            no_proxy: var("BARLINE_NO_PROXY"),
        };

        let policy = IngestionPolicy {
            backfill_days: parse_var(&var, "BARLINE_BACKFILL_DAYS", policy_defaults.backfill_days)?,
            backfill_bars: parse_var(&var, "BARLINE_BACKFILL_BARS", policy_defaults.backfill_bars)?,
            retention_months: parse_var(
                &var,
                "BARLINE_RETENTION_MONTHS",
                policy_defaults.retention_months,
            )?,
            repair_days_per_cycle: parse_var(
                &var,
                "BARLINE_REPAIR_DAYS_PER_CYCLE",
                policy_defaults.repair_days_per_cycle,
            )?,
        };

        let poll_interval = Duration::from_secs(positive(
            parse_var(&var, "BARLINE_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?,
            "BARLINE_POLL_INTERVAL_SECS",
        )?);

        let listen_addr = var("BARLINE_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .trim()
            .parse::<SocketAddr>()
            .context("BARLINE_LISTEN_ADDR must be a socket address such as 127.0.0.1:8088")?;

        let log_format = match var("BARLINE_LOG_FORMAT") {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            db_path,
            okx,
            instruments,
            intervals,
            policy,
            poll_interval,
            log_format,
            listen_addr,
        })
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_var<T>(var: impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{}: invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}

fn positive<T: PartialOrd + Default>(value: T, key: &str) -> anyhow::Result<T> {
    if value <= T::default() {
        bail!("{} must be greater than zero", key);
    }
    Ok(value)
}
