use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{BigInt, Bool, Text};
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use barline_core::candles::{find_gaps, CandleStore, Gap};
use barline_core::errors::{Error, Result};
use barline_market_data::{Candle, Interval};

use super::model::CandleDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::candles;
use crate::schema::candles::dsl;

/// Insert a candle, or overwrite the stored row unless that would replace a
/// confirmed bar with an unconfirmed one. SQLite reports zero changes when
/// the WHERE clause keeps the stored row.
const UPSERT_CANDLE_SQL: &str = "
    INSERT INTO candles (instrument, interval, open_time, open, high, low, close, volume, quote_volume, confirmed)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (instrument, interval, open_time) DO UPDATE SET
        open = excluded.open,
        high = excluded.high,
        low = excluded.low,
        close = excluded.close,
        volume = excluded.volume,
        quote_volume = excluded.quote_volume,
        confirmed = excluded.confirmed
    WHERE candles.confirmed = 0 OR excluded.confirmed = 1
";

pub struct CandleRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl CandleRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    fn upsert_rows(conn: &mut SqliteConnection, rows: &[CandleDB]) -> Result<usize> {
        let mut written = 0;
        for row in rows {
            written += sql_query(UPSERT_CANDLE_SQL)
                .bind::<Text, _>(&row.instrument)
                .bind::<Text, _>(&row.interval)
                .bind::<BigInt, _>(row.open_time)
                .bind::<Text, _>(&row.open)
                .bind::<Text, _>(&row.high)
                .bind::<Text, _>(&row.low)
                .bind::<Text, _>(&row.close)
                .bind::<Text, _>(&row.volume)
                .bind::<Text, _>(&row.quote_volume)
                .bind::<Bool, _>(row.confirmed)
                .execute(conn)
                .map_err(StorageError::QueryFailed)?;
        }
        Ok(written)
    }

    /// Stored open times in `[start, end)`, ascending.
    fn open_times(
        &self,
        instrument: &str,
        interval: Interval,
        start: i64,
        end: i64,
    ) -> Result<Vec<i64>> {
        let mut conn = get_connection(&self.pool)?;
        dsl::candles
            .select(dsl::open_time)
            .filter(dsl::instrument.eq(instrument))
            .filter(dsl::interval.eq(interval.as_str()))
            .filter(dsl::open_time.ge(start))
            .filter(dsl::open_time.lt(end))
            .order(dsl::open_time.asc())
            .load::<i64>(&mut conn)
            .into_core()
    }

    /// Number of stored candles for one series.
    pub fn count(&self, instrument: &str, interval: Interval) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        dsl::candles
            .filter(dsl::instrument.eq(instrument))
            .filter(dsl::interval.eq(interval.as_str()))
            .count()
            .get_result::<i64>(&mut conn)
            .into_core()
    }
}

#[async_trait]
impl CandleStore for CandleRepository {
    async fn upsert_candles(&self, candles: &[Candle]) -> Result<usize> {
        if candles.is_empty() {
            return Ok(0);
        }

        // A bar off its slot grid or with inconsistent prices would break the
        // stored/gap partition, so the whole batch is refused
        for candle in candles {
            candle
                .validate()
                .map_err(|e| Error::Validation(e.to_string()))?;
        }

        let rows: Vec<CandleDB> = candles.iter().map(CandleDB::from).collect();
        self.writer
            .exec(move |conn| Self::upsert_rows(conn, &rows))
            .await
    }

    async fn prune_older_than(
        &self,
        instrument: &str,
        interval: Interval,
        cutoff: i64,
    ) -> Result<usize> {
        let instrument = instrument.to_string();
        self.writer
            .exec(move |conn| {
                let deleted = diesel::delete(
                    candles::table
                        .filter(dsl::instrument.eq(&instrument))
                        .filter(dsl::interval.eq(interval.as_str()))
                        .filter(dsl::open_time.lt(cutoff)),
                )
                .execute(conn)
                .map_err(StorageError::QueryFailed)?;
                Ok(deleted)
            })
            .await
    }

    fn range(
        &self,
        instrument: &str,
        interval: Interval,
        start: i64,
        end: i64,
    ) -> Result<Vec<Candle>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = dsl::candles
            .filter(dsl::instrument.eq(instrument))
            .filter(dsl::interval.eq(interval.as_str()))
            .filter(dsl::open_time.ge(start))
            .filter(dsl::open_time.lt(end))
            .order(dsl::open_time.asc())
            .select(CandleDB::as_select())
            .load::<CandleDB>(&mut conn)
            .into_core()?;

        rows.into_iter()
            .map(|row| Candle::try_from(row).into_core())
            .collect()
    }

    fn find_gaps(
        &self,
        instrument: &str,
        interval: Interval,
        start: i64,
        end: i64,
    ) -> Result<Vec<Gap>> {
        if start >= end {
            return Ok(Vec::new());
        }
        let stored = self.open_times(instrument, interval, start, end)?;
        Ok(find_gaps(&stored, start, end, interval))
    }

    fn latest_open_time(&self, instrument: &str, interval: Interval) -> Result<Option<i64>> {
        let mut conn = get_connection(&self.pool)?;
        dsl::candles
            .filter(dsl::instrument.eq(instrument))
            .filter(dsl::interval.eq(interval.as_str()))
            .select(diesel::dsl::max(dsl::open_time))
            .first::<Option<i64>>(&mut conn)
            .into_core()
    }
}
