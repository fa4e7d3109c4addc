//! Candle ingestion service.
//!
//! This module provides the `IngestionService` which drives a
//! [`CandleProvider`] and a [`CandleStore`] for one interval and a set of
//! tracked instruments.
//!
//! # Architecture
//!
//! ```text
//! IngestionService
//!       │
//!       ├─► CandleProvider (realtime + historical tiers, rate limited)
//!       ├─► CandleStore (upsert, range, gaps, prune)
//!       └─► RangeLocks (no overlapping work on one series)
//! ```
//!
//! # Historical pagination
//!
//! Each gap is walked backwards from its end with the `after` cursor. After
//! every page the store is asked which part of the gap is still missing and
//! the cursor jumps to the end of the newest remaining hole, so it moves
//! strictly backwards. The walk of a gap stops when the upstream returns an
//! empty page, a short page (its retention boundary) or a page that does not
//! move the cursor. Whatever is still missing afterwards is reported as a
//! residual gap and not retried in the same call.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use barline_market_data::{Candle, CandleProvider, Interval};
use log::{debug, info, warn};

use super::locks::RangeLocks;
use super::model::{FetchReport, Gap, IngestionState, RepairReport, Tier};
use super::policy::{Clock, IngestionPolicy, SystemClock};
use super::repair_queue::{day_windows, DayWindow, RepairQueue};
use super::store::CandleStore;
use crate::errors::{Error, Result};

// =============================================================================
// State tracking
// =============================================================================

#[derive(Debug, Default)]
struct StateTracker {
    initialized: AtomicBool,
    polling: AtomicUsize,
    repairing: AtomicUsize,
}

#[derive(Clone, Copy, Debug)]
enum Activity {
    Polling,
    Repairing,
}

/// Marks an operation as in flight until dropped.
struct ActivityGuard<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl StateTracker {
    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::SeqCst);
    }

    fn begin(&self, activity: Activity) -> ActivityGuard<'_> {
        let counter = match activity {
            Activity::Polling => &self.polling,
            Activity::Repairing => &self.repairing,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        ActivityGuard { counter }
    }

    fn current(&self) -> IngestionState {
        if !self.is_initialized() {
            IngestionState::Uninitialized
        } else if self.repairing.load(Ordering::SeqCst) > 0 {
            IngestionState::Repairing
        } else if self.polling.load(Ordering::SeqCst) > 0 {
            IngestionState::Polling
        } else {
            IngestionState::Initialized
        }
    }
}

/// Keep valid candles of this series, oldest first, one per open time.
fn normalize_batch(candles: Vec<Candle>, instrument: &str, interval: Interval) -> Vec<Candle> {
    let mut batch: Vec<Candle> = candles
        .into_iter()
        .filter(|c| c.instrument == instrument && c.interval == interval)
        .filter(|c| match c.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!("Dropping invalid candle: {}", e);
                false
            }
        })
        .collect();
    batch.sort_by_key(|c| c.open_time);
    batch.dedup_by_key(|c| c.open_time);
    batch
}

// =============================================================================
// Service
// =============================================================================

/// Keeps the candle series of the tracked instruments complete for one
/// interval.
pub struct IngestionService {
    provider: Arc<dyn CandleProvider>,
    store: Arc<dyn CandleStore>,
    interval: Interval,
    instruments: Vec<String>,
    policy: IngestionPolicy,
    clock: Arc<dyn Clock>,
    locks: Arc<RangeLocks>,
    state: StateTracker,
}

impl IngestionService {
    pub fn new(
        provider: Arc<dyn CandleProvider>,
        store: Arc<dyn CandleStore>,
        interval: Interval,
        instruments: Vec<String>,
    ) -> Self {
        Self {
            provider,
            store,
            interval,
            instruments,
            policy: IngestionPolicy::default(),
            clock: Arc::new(SystemClock),
            locks: RangeLocks::new(),
            state: StateTracker::default(),
        }
    }

    pub fn with_policy(mut self, policy: IngestionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share range locks with other services writing the same store.
    pub fn with_range_locks(mut self, locks: Arc<RangeLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    pub fn policy(&self) -> &IngestionPolicy {
        &self.policy
    }

    pub fn state(&self) -> IngestionState {
        self.state.current()
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.state.is_initialized() {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn backfill_error(&self, instrument: &str, cursor: i64, source: Error) -> Error {
        Error::Backfill {
            instrument: instrument.to_string(),
            interval: self.interval,
            last_cursor: Some(cursor),
            source: Box::new(source),
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Backfill the lookback window of every tracked instrument, then accept
    /// polling and repair calls.
    ///
    /// The window is the shorter of `backfill_days` and `backfill_bars`, and
    /// never reaches past the retention cutoff. Instruments are backfilled
    /// independently: a failed one gets a report carrying the failure and is
    /// left to the repair queue. Only when every instrument fails does the
    /// service stay uninitialized; whatever was stored is kept and the next
    /// call only fetches what is still missing.
    ///
    /// Fails with [`Error::Config`] when the provider has no history for the
    /// interval, since neither backfill nor repair could ever run.
    pub async fn initialize(&self) -> Result<Vec<RepairReport>> {
        if self.state.is_initialized() {
            debug!("{} ingestion already initialized", self.interval);
            return Ok(Vec::new());
        }

        if !self.provider.capabilities().supports_historical(self.interval) {
            return Err(Error::Config(format!(
                "{} has no {} history to backfill from",
                self.provider.id(),
                self.interval
            )));
        }

        let now = self.clock.now_millis();
        let end = self.interval.align_down(now);
        let start = self.policy.backfill_start(now, self.interval.as_millis());

        info!(
            "Initializing {} ingestion for {} instrument(s), backfilling [{}, {})",
            self.interval,
            self.instruments.len(),
            start,
            end
        );

        let mut reports = Vec::with_capacity(self.instruments.len());
        let mut first_error = None;
        for instrument in &self.instruments {
            match self.repair_locked(instrument, start, end).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!(
                        "Backfill of {} {} failed ({:?}), leaving it to repair: {}",
                        instrument,
                        self.interval,
                        e.kind(),
                        e
                    );
                    reports.push(RepairReport {
                        instrument: instrument.clone(),
                        start,
                        end,
                        failure: Some(e.to_string()),
                        ..RepairReport::default()
                    });
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            if reports.iter().all(|r| r.failure.is_some()) {
                return Err(e);
            }
        }

        self.state.mark_initialized();
        Ok(reports)
    }

    /// Poll the most recent candles of `instrument` and store them.
    ///
    /// Intervals the realtime tier cannot serve (sub-minute bars) go through
    /// the historical tier. The request is sized to the bars elapsed since
    /// the newest stored candle; when that exceeds one page, the hole between
    /// the stored series and the fetched page is repaired through the
    /// historical tier.
    pub async fn fetch_realtime(&self, instrument: &str) -> Result<FetchReport> {
        self.ensure_initialized()?;
        let _activity = self.state.begin(Activity::Polling);

        let step = self.interval.as_millis();
        let now = self.clock.now_millis();
        let current_slot = self.interval.align_down(now);

        let caps = self.provider.capabilities();
        let (tier, page_max) =
            if self.interval.supports_realtime() && caps.supports_realtime(self.interval) {
                (Tier::Realtime, caps.realtime_max_limit)
            } else {
                (Tier::Historical, caps.history_max_limit)
            };
        let page_max = page_max.max(1);

        let latest = self.store.latest_open_time(instrument, self.interval)?;
        // The newest stored bar may still have been open, so it is refetched
        let bars_needed = latest
            .map(|t| ((current_slot - t) / step).max(0) as usize + 1)
            .unwrap_or(page_max);
        let limit = bars_needed.clamp(1, page_max);
        let window_start = current_slot - (limit as i64 - 1) * step;

        let (fetched, written, oldest) = {
            let _guard = self
                .locks
                .acquire(instrument, self.interval, window_start, current_slot + step)
                .await;

            let raw = match tier {
                Tier::Realtime => {
                    self.provider
                        .get_realtime_candles(instrument, self.interval, limit)
                        .await?
                }
                Tier::Historical => {
                    self.provider
                        .get_historical_candles(instrument, self.interval, None, None, limit)
                        .await?
                }
            };

            let batch = normalize_batch(raw, instrument, self.interval);
            let written = if batch.is_empty() {
                0
            } else {
                self.store.upsert_candles(&batch).await?
            };
            (batch.len(), written, batch.first().map(|c| c.open_time))
        };

        debug!(
            "Polled {} {} via {:?} tier: {} fetched, {} written",
            instrument, self.interval, tier, fetched, written
        );

        let catch_up = match latest {
            Some(latest) if bars_needed > page_max => {
                let fill_end = oldest.unwrap_or(window_start);
                if latest < fill_end {
                    info!(
                        "{} {} is {} bar(s) behind, catching up [{}, {})",
                        instrument, self.interval, bars_needed, latest, fill_end
                    );
                    Some(self.repair_locked(instrument, latest, fill_end).await?)
                } else {
                    None
                }
            }
            _ => None,
        };

        Ok(FetchReport {
            instrument: instrument.to_string(),
            tier,
            fetched,
            written,
            catch_up,
        })
    }

    /// Fill the gaps of `instrument` in `[start, end)` from the historical
    /// tier.
    ///
    /// On failure the error carries the cursor of the failed request. Pages
    /// stored before it stay stored, so calling again resumes where this
    /// call stopped.
    pub async fn repair_range(&self, instrument: &str, start: i64, end: i64) -> Result<RepairReport> {
        self.ensure_initialized()?;
        if start >= end {
            return Err(Error::InvalidRange { start, end });
        }

        let _activity = self.state.begin(Activity::Repairing);
        self.repair_locked(instrument, start, end).await
    }

    /// Prune rows older than the retention horizon for every tracked
    /// instrument. Returns the number of rows deleted.
    pub async fn cleanup_old_data(&self) -> Result<usize> {
        self.ensure_initialized()?;

        let cutoff = self.policy.retention_cutoff(self.clock.now_millis());
        let mut total = 0;
        for instrument in &self.instruments {
            let pruned = self
                .store
                .prune_older_than(instrument, self.interval, cutoff)
                .await?;
            if pruned > 0 {
                info!(
                    "Pruned {} {} candle(s) of {} older than {}",
                    pruned, self.interval, instrument, cutoff
                );
            }
            total += pruned;
        }
        Ok(total)
    }

    // =========================================================================
    // Repair queue
    // =========================================================================

    /// Day windows of the lookback that contain gaps, newest day first.
    pub fn plan_repair_windows(&self) -> Result<Vec<DayWindow>> {
        let now = self.clock.now_millis();
        let end = self.interval.align_down(now);
        let start = self.policy.backfill_start(now, self.interval.as_millis());

        let mut windows = Vec::new();
        for (window_start, window_end) in day_windows(start, end) {
            for instrument in &self.instruments {
                let gaps = self
                    .store
                    .find_gaps(instrument, self.interval, window_start, window_end)?;
                if !gaps.is_empty() {
                    windows.push(DayWindow {
                        instrument: instrument.clone(),
                        start: window_start,
                        end: window_end,
                    });
                }
            }
        }
        Ok(windows)
    }

    /// Repair the next `repair_days_per_cycle` windows, replanning when the
    /// queue is empty. Windows whose repair wrote nothing but left gaps are
    /// settled and skipped by later plans.
    pub async fn run_repair_cycle(&self, queue: &mut RepairQueue) -> Result<Vec<RepairReport>> {
        self.ensure_initialized()?;

        if queue.is_empty() {
            queue.refill(self.plan_repair_windows()?);
            if !queue.is_empty() {
                debug!("{} repair queue refilled with {} window(s)", self.interval, queue.len());
            }
        }

        let mut reports = Vec::new();
        let mut batch = queue.pop_batch(self.policy.repair_days_per_cycle).into_iter();
        while let Some(window) = batch.next() {
            let report = match self
                .repair_range(&window.instrument, window.start, window.end)
                .await
            {
                Ok(report) => report,
                Err(e) => {
                    let mut unrepaired = vec![window];
                    unrepaired.extend(batch);
                    queue.requeue_front(unrepaired);
                    return Err(e);
                }
            };
            if report.written == 0 && !report.is_complete() {
                queue.settle(window);
            }
            reports.push(report);
        }
        Ok(reports)
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    async fn repair_locked(&self, instrument: &str, start: i64, end: i64) -> Result<RepairReport> {
        let _guard = self
            .locks
            .acquire(instrument, self.interval, start, end)
            .await;

        let gaps = self.store.find_gaps(instrument, self.interval, start, end)?;
        let mut report = RepairReport {
            instrument: instrument.to_string(),
            start,
            end,
            gaps_found: gaps.len(),
            ..RepairReport::default()
        };

        if gaps.is_empty() {
            debug!(
                "No gaps in {} {} [{}, {})",
                instrument, self.interval, start, end
            );
            return Ok(report);
        }

        let page_max = self.provider.capabilities().history_max_limit.max(1);

        // Newest gap first so recent data lands before deep history
        for gap in gaps.iter().rev() {
            self.fill_gap(instrument, *gap, page_max, &mut report)
                .await?;
        }

        report.residual_gaps = self.store.find_gaps(instrument, self.interval, start, end)?;
        if !report.residual_gaps.is_empty() {
            let missing: i64 = report
                .residual_gaps
                .iter()
                .map(|g| g.slot_count(self.interval))
                .sum();
            warn!(
                "{} {} [{}, {}): {} slot(s) in {} gap(s) unavailable upstream: {:?}",
                instrument,
                self.interval,
                start,
                end,
                missing,
                report.residual_gaps.len(),
                report.residual_gaps
            );
        }

        info!(
            "Repaired {} {} [{}, {}): {} gap(s), {} page(s), {} fetched, {} written",
            instrument,
            self.interval,
            start,
            end,
            report.gaps_found,
            report.pages,
            report.fetched,
            report.written
        );
        Ok(report)
    }

    async fn fill_gap(
        &self,
        instrument: &str,
        gap: Gap,
        page_max: usize,
        report: &mut RepairReport,
    ) -> Result<()> {
        let mut cursor = gap.end;

        loop {
            let remaining = self.interval.slots_between(gap.start, cursor);
            if remaining <= 0 {
                return Ok(());
            }
            let limit = page_max.min(remaining as usize);

            let page = self
                .provider
                .get_historical_candles(instrument, self.interval, None, Some(cursor), limit)
                .await
                .map_err(|e| self.backfill_error(instrument, cursor, e.into()))?;
            report.pages += 1;

            let received = page.len();
            let Some(oldest) = page.iter().map(|c| c.open_time).min() else {
                info!(
                    "No {} {} history before {}",
                    instrument, self.interval, cursor
                );
                return Ok(());
            };

            let batch: Vec<Candle> = normalize_batch(page, instrument, self.interval)
                .into_iter()
                .filter(|c| c.open_time >= gap.start && c.open_time < gap.end)
                .collect();
            report.fetched += batch.len();

            if !batch.is_empty() {
                report.written += self
                    .store
                    .upsert_candles(&batch)
                    .await
                    .map_err(|e| self.backfill_error(instrument, cursor, e))?;
            }

            if oldest >= cursor {
                warn!(
                    "{} {} history page did not move before cursor {}, stopping",
                    instrument, self.interval, cursor
                );
                return Ok(());
            }
            if oldest <= gap.start {
                return Ok(());
            }
            if received < limit {
                info!(
                    "{} {} history ends at {} ({} of {} bars), upstream retention boundary",
                    instrument, self.interval, oldest, received, limit
                );
                return Ok(());
            }

            let still_missing = self
                .store
                .find_gaps(instrument, self.interval, gap.start, oldest)
                .map_err(|e| self.backfill_error(instrument, cursor, e))?;
            match still_missing.last() {
                Some(hole) => cursor = hole.end,
                None => return Ok(()),
            }
        }
    }
}
