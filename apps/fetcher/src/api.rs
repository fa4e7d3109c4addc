//! Read API over the stored candle series.
//!
//! `GET /api/v1/candles` returns the newest `limit` bars of one series,
//! oldest first. With `refresh=true` the series is polled upstream before it
//! is read.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use barline_core::{CandleStore, Clock, FetchReport};
use barline_market_data::{Candle, Interval};
use serde::{Deserialize, Serialize};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

const DEFAULT_LIMIT: usize = 300;
const MAX_LIMIT: usize = 2000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub async fn healthz() -> &'static str {
    "ok"
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandlesQuery {
    instrument: String,
    interval: String,
    limit: Option<usize>,
    #[serde(default)]
    refresh: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CandlesResponse {
    instrument: String,
    interval: Interval,
    count: usize,
    data: Vec<Candle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh: Option<FetchReport>,
}

async fn get_candles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CandlesQuery>,
) -> ApiResult<Json<CandlesResponse>> {
    let instrument = query.instrument.trim().to_uppercase();
    if instrument.is_empty() {
        return Err(ApiError::BadRequest("instrument is required".into()));
    }
    let interval = Interval::from_str(&query.interval)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }

    let refresh = if query.refresh {
        let service = state.service_for(interval).ok_or_else(|| {
            ApiError::BadRequest(format!("interval {} is not ingested", interval))
        })?;
        Some(service.fetch_realtime(&instrument).await?)
    } else {
        None
    };

    // The bar still in progress is included
    let end = interval.align_down(state.clock.now_millis()) + interval.as_millis();
    let start = end - limit as i64 * interval.as_millis();
    let data = state.store.range(&instrument, interval, start, end)?;

    Ok(Json(CandlesResponse {
        instrument,
        interval,
        count: data.len(),
        data,
        refresh,
    }))
}

pub fn app_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/healthz", get(healthz))
        .route("/candles", get(get_candles));

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
}
