use std::sync::Arc;

use barline_core::candles::{CandleStore, Gap};
use barline_core::errors::Error;
use barline_market_data::{Candle, Interval};
use barline_storage_sqlite::{open_candle_store, CandleRepository};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;

const MINUTE: i64 = 60_000;
// 2024-01-01T00:00:00Z
const T0: i64 = 1_704_067_200_000;

fn setup() -> (TempDir, Arc<CandleRepository>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("candles.db");
    let store = open_candle_store(path.to_str().unwrap()).unwrap();
    (dir, store)
}

fn bar(instrument: &str, open_time: i64, close: Decimal, confirmed: bool) -> Candle {
    Candle {
        instrument: instrument.to_string(),
        interval: Interval::OneMinute,
        open_time,
        open: dec!(100),
        high: dec!(110),
        low: dec!(90),
        close,
        volume: dec!(1.5),
        quote_volume: dec!(150.25),
        confirmed,
    }
}

fn minutes(instrument: &str, slots: impl IntoIterator<Item = i64>) -> Vec<Candle> {
    slots
        .into_iter()
        .map(|i| bar(instrument, T0 + i * MINUTE, Decimal::from(100 + i), true))
        .collect()
}

#[tokio::test]
async fn upsert_is_idempotent() {
    let (_dir, store) = setup();
    let batch = minutes("BTC-USDT", 0..10);

    assert_eq!(store.upsert_candles(&batch).await.unwrap(), 10);
    assert_eq!(store.upsert_candles(&batch).await.unwrap(), 10);

    let stored = store
        .range("BTC-USDT", Interval::OneMinute, T0, T0 + 10 * MINUTE)
        .unwrap();
    assert_eq!(stored, batch);
    assert_eq!(store.count("BTC-USDT", Interval::OneMinute).unwrap(), 10);
}

#[tokio::test]
async fn empty_batch_writes_nothing() {
    let (_dir, store) = setup();
    assert_eq!(store.upsert_candles(&[]).await.unwrap(), 0);
    assert_eq!(
        store.latest_open_time("BTC-USDT", Interval::OneMinute).unwrap(),
        None
    );
}

#[tokio::test]
async fn invalid_candles_are_refused_and_gaps_stay_whole() {
    let (_dir, store) = setup();
    let mut unaligned = bar("BTC-USDT", T0 + 30_000, dec!(100), true);
    unaligned.high = dec!(1);
    unaligned.low = dec!(90);

    let err = store.upsert_candles(&[unaligned]).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // A valid bar in the same batch is not written either
    let mut batch = minutes("BTC-USDT", 0..1);
    let mut inverted = bar("BTC-USDT", T0 + MINUTE, dec!(100), true);
    inverted.low = dec!(200);
    batch.push(inverted);
    assert!(matches!(
        store.upsert_candles(&batch).await,
        Err(Error::Validation(_))
    ));

    let end = T0 + 2 * MINUTE;
    assert!(store
        .range("BTC-USDT", Interval::OneMinute, T0, end)
        .unwrap()
        .is_empty());
    assert_eq!(
        store.find_gaps("BTC-USDT", Interval::OneMinute, T0, end).unwrap(),
        vec![Gap { start: T0, end }]
    );
}

#[tokio::test]
async fn confirmed_rows_are_never_downgraded() {
    let (_dir, store) = setup();
    let confirmed = bar("BTC-USDT", T0, dec!(101), true);
    store.upsert_candles(&[confirmed.clone()]).await.unwrap();

    let provisional = bar("BTC-USDT", T0, dec!(999), false);
    assert_eq!(store.upsert_candles(&[provisional]).await.unwrap(), 0);

    let stored = store
        .range("BTC-USDT", Interval::OneMinute, T0, T0 + MINUTE)
        .unwrap();
    assert_eq!(stored, vec![confirmed]);
}

#[tokio::test]
async fn provisional_rows_are_revised_then_confirmed() {
    let (_dir, store) = setup();
    store
        .upsert_candles(&[bar("BTC-USDT", T0, dec!(101), false)])
        .await
        .unwrap();

    let revised = bar("BTC-USDT", T0, dec!(102), false);
    assert_eq!(store.upsert_candles(&[revised.clone()]).await.unwrap(), 1);
    assert_eq!(
        store.range("BTC-USDT", Interval::OneMinute, T0, T0 + MINUTE).unwrap(),
        vec![revised]
    );

    let closed = bar("BTC-USDT", T0, dec!(103), true);
    assert_eq!(store.upsert_candles(&[closed.clone()]).await.unwrap(), 1);
    assert_eq!(
        store.range("BTC-USDT", Interval::OneMinute, T0, T0 + MINUTE).unwrap(),
        vec![closed]
    );
}

#[tokio::test]
async fn range_is_half_open_and_ascending() {
    let (_dir, store) = setup();
    let mut batch = minutes("BTC-USDT", 0..6);
    batch.reverse();
    store.upsert_candles(&batch).await.unwrap();

    let stored = store
        .range("BTC-USDT", Interval::OneMinute, T0 + MINUTE, T0 + 4 * MINUTE)
        .unwrap();
    let times: Vec<i64> = stored.iter().map(|c| c.open_time).collect();
    assert_eq!(times, vec![T0 + MINUTE, T0 + 2 * MINUTE, T0 + 3 * MINUTE]);
}

#[tokio::test]
async fn gaps_and_range_partition_the_slots() {
    let (_dir, store) = setup();
    let slots = [0, 1, 4, 5, 6, 9];
    store
        .upsert_candles(&minutes("BTC-USDT", slots))
        .await
        .unwrap();

    let (start, end) = (T0, T0 + 12 * MINUTE);
    let gaps = store
        .find_gaps("BTC-USDT", Interval::OneMinute, start, end)
        .unwrap();
    assert_eq!(
        gaps,
        vec![
            Gap { start: T0 + 2 * MINUTE, end: T0 + 4 * MINUTE },
            Gap { start: T0 + 7 * MINUTE, end: T0 + 9 * MINUTE },
            Gap { start: T0 + 10 * MINUTE, end },
        ]
    );

    let stored = store.range("BTC-USDT", Interval::OneMinute, start, end).unwrap();
    let missing: i64 = gaps.iter().map(|g| g.slot_count(Interval::OneMinute)).sum();
    assert_eq!(stored.len() as i64 + missing, 12);
}

#[tokio::test]
async fn empty_range_has_no_gaps() {
    let (_dir, store) = setup();
    assert!(store
        .find_gaps("BTC-USDT", Interval::OneMinute, T0, T0)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn series_are_isolated_by_instrument_and_interval() {
    let (_dir, store) = setup();
    store
        .upsert_candles(&minutes("BTC-USDT", 0..3))
        .await
        .unwrap();
    store
        .upsert_candles(&minutes("ETH-USDT", 5..8))
        .await
        .unwrap();

    assert_eq!(
        store.latest_open_time("BTC-USDT", Interval::OneMinute).unwrap(),
        Some(T0 + 2 * MINUTE)
    );
    assert_eq!(
        store.latest_open_time("ETH-USDT", Interval::OneMinute).unwrap(),
        Some(T0 + 7 * MINUTE)
    );
    assert_eq!(
        store.latest_open_time("BTC-USDT", Interval::OneHour).unwrap(),
        None
    );
}

#[tokio::test]
async fn concurrent_writers_are_serialized() {
    let (_dir, store) = setup();

    let handles: Vec<_> = ["BTC-USDT", "ETH-USDT", "SOL-USDT", "XRP-USDT"]
        .into_iter()
        .map(|instrument| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .upsert_candles(&minutes(instrument, 0..50))
                    .await
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), 50);
    }
    assert_eq!(store.count("SOL-USDT", Interval::OneMinute).unwrap(), 50);
}

#[tokio::test]
async fn prune_removes_only_older_rows_of_the_series() {
    let (_dir, store) = setup();
    store
        .upsert_candles(&minutes("BTC-USDT", 0..10))
        .await
        .unwrap();
    store
        .upsert_candles(&minutes("ETH-USDT", 0..10))
        .await
        .unwrap();

    let deleted = store
        .prune_older_than("BTC-USDT", Interval::OneMinute, T0 + 4 * MINUTE)
        .await
        .unwrap();
    assert_eq!(deleted, 4);

    let remaining = store
        .range("BTC-USDT", Interval::OneMinute, T0, T0 + 10 * MINUTE)
        .unwrap();
    assert_eq!(remaining.first().map(|c| c.open_time), Some(T0 + 4 * MINUTE));
    assert_eq!(store.count("ETH-USDT", Interval::OneMinute).unwrap(), 10);
}

#[tokio::test]
async fn data_survives_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("candles.db");
    let path = path.to_str().unwrap();

    {
        let store = open_candle_store(path).unwrap();
        store
            .upsert_candles(&minutes("BTC-USDT", 0..3))
            .await
            .unwrap();
    }

    let reopened = open_candle_store(path).unwrap();
    assert_eq!(
        reopened
            .latest_open_time("BTC-USDT", Interval::OneMinute)
            .unwrap(),
        Some(T0 + 2 * MINUTE)
    );
}
