//! Per-range exclusive locks.
//!
//! Polling and repair over overlapping ranges of the same series must not
//! interleave. Holders of disjoint ranges proceed concurrently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use barline_market_data::Interval;
use log::{debug, warn};
use tokio::sync::Notify;

#[derive(Debug)]
struct HeldRange {
    id: u64,
    instrument: String,
    interval: Interval,
    start: i64,
    end: i64,
}

impl HeldRange {
    fn overlaps(&self, instrument: &str, interval: Interval, start: i64, end: i64) -> bool {
        self.instrument == instrument
            && self.interval == interval
            && self.start < end
            && start < self.end
    }
}

/// Registry of held `[start, end)` ranges per instrument and interval.
#[derive(Debug, Default)]
pub struct RangeLocks {
    held: Mutex<Vec<HeldRange>>,
    released: Notify,
    next_id: AtomicU64,
}

impl RangeLocks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock_held(&self) -> MutexGuard<'_, Vec<HeldRange>> {
        self.held.lock().unwrap_or_else(|poisoned| {
            warn!("Range lock registry mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn try_register(&self, instrument: &str, interval: Interval, start: i64, end: i64) -> Option<u64> {
        let mut held = self.lock_held();
        if held
            .iter()
            .any(|range| range.overlaps(instrument, interval, start, end))
        {
            return None;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        held.push(HeldRange {
            id,
            instrument: instrument.to_string(),
            interval,
            start,
            end,
        });
        Some(id)
    }

    /// Wait until no overlapping range is held, then hold `[start, end)`.
    pub async fn acquire(
        self: &Arc<Self>,
        instrument: &str,
        interval: Interval,
        start: i64,
        end: i64,
    ) -> RangeGuard {
        loop {
            // Register for wakeups before checking, so a release between the
            // check and the await is not missed.
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(id) = self.try_register(instrument, interval, start, end) {
                return RangeGuard {
                    locks: Arc::clone(self),
                    id,
                };
            }

            debug!(
                "Waiting for overlapping work on {} {} [{}, {})",
                instrument, interval, start, end
            );
            notified.await;
        }
    }

    /// Hold `[start, end)` only if nothing overlapping is held.
    pub fn try_acquire(
        self: &Arc<Self>,
        instrument: &str,
        interval: Interval,
        start: i64,
        end: i64,
    ) -> Option<RangeGuard> {
        self.try_register(instrument, interval, start, end)
            .map(|id| RangeGuard {
                locks: Arc::clone(self),
                id,
            })
    }

    fn release(&self, id: u64) {
        self.lock_held().retain(|range| range.id != id);
        self.released.notify_waiters();
    }
}

/// RAII guard that releases the range when dropped.
#[derive(Debug)]
pub struct RangeGuard {
    locks: Arc<RangeLocks>,
    id: u64,
}

impl Drop for RangeGuard {
    fn drop(&mut self) {
        self.locks.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_overlapping_ranges_exclude_each_other() {
        let locks = RangeLocks::new();
        let guard = locks.try_acquire("BTC-USDT", Interval::OneMinute, 0, 100).unwrap();

        assert!(locks.try_acquire("BTC-USDT", Interval::OneMinute, 50, 150).is_none());
        // Half-open: touching ranges do not overlap
        assert!(locks.try_acquire("BTC-USDT", Interval::OneMinute, 100, 200).is_some());
        // Other series are independent
        assert!(locks.try_acquire("ETH-USDT", Interval::OneMinute, 0, 100).is_some());
        assert!(locks.try_acquire("BTC-USDT", Interval::FiveMinutes, 0, 100).is_some());

        drop(guard);
        assert!(locks.try_acquire("BTC-USDT", Interval::OneMinute, 50, 150).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_proceeds_after_release() {
        let locks = RangeLocks::new();
        let guard = locks.acquire("BTC-USDT", Interval::OneMinute, 0, 100).await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire("BTC-USDT", Interval::OneMinute, 10, 20).await;
                tokio::time::Instant::now()
            })
        };

        tokio::time::sleep(Duration::from_secs(5)).await;
        let released_at = tokio::time::Instant::now();
        drop(guard);

        let acquired_at = waiter.await.unwrap();
        assert!(acquired_at >= released_at);
    }

    #[tokio::test]
    async fn test_disjoint_ranges_run_concurrently() {
        let locks = RangeLocks::new();
        let _a = locks.acquire("BTC-USDT", Interval::OneMinute, 0, 100).await;
        let _b = tokio::time::timeout(
            Duration::from_secs(1),
            locks.acquire("BTC-USDT", Interval::OneMinute, 100, 200),
        )
        .await
        .expect("disjoint range should not wait");
    }
}
