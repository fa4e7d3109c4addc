use std::sync::Arc;

use barline_core::{CandleStore, Clock, IngestionService, RangeLocks, SystemClock};
use barline_market_data::{CandleProvider, Interval, OkxClient};
use barline_storage_sqlite::open_candle_store;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{Config, LogFormat};

pub struct AppState {
    /// One service per configured interval, all sharing the client (and
    /// therefore its tier limiters) and one set of range locks.
    pub services: Vec<Arc<IngestionService>>,
    /// Read side for the API.
    pub store: Arc<dyn CandleStore>,
    pub clock: Arc<dyn Clock>,
    pub config: Config,
}

impl AppState {
    pub fn service_for(&self, interval: Interval) -> Option<&Arc<IngestionService>> {
        self.services.iter().find(|s| s.interval() == interval)
    }
}

pub fn init_tracing(log_format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init(),
    }
}

pub fn build_client(config: &Config) -> anyhow::Result<Arc<OkxClient>> {
    Ok(Arc::new(OkxClient::new(config.okx.clone())?))
}

/// Opens the store and wires one ingestion service per interval. Must be
/// called from within a Tokio runtime (the store starts its writer task).
pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let store = open_candle_store(&config.db_path)?;
    tracing::info!("Database path in use: {}", config.db_path);

    let client = build_client(config)?;
    let locks = RangeLocks::new();

    let services = config
        .intervals
        .iter()
        .map(|&interval| {
            let provider: Arc<dyn CandleProvider> = client.clone();
            let candle_store: Arc<dyn CandleStore> = store.clone();
            Arc::new(
                IngestionService::new(provider, candle_store, interval, config.instruments.clone())
                    .with_policy(config.policy.clone())
                    .with_range_locks(locks.clone()),
            )
        })
        .collect();

    Ok(Arc::new(AppState {
        services,
        store,
        clock: Arc::new(SystemClock),
        config: config.clone(),
    }))
}
