//! Sliding-window rate limiter for one upstream API tier.
//!
//! Each limiter remembers the instants of the grants made during the last
//! second. A caller is admitted only while fewer than `permits_per_second`
//! grants fall inside the window, so no rolling one-second window ever sees
//! more grants than the configured QPS, however many tasks share the limiter.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

/// Length of the rolling window.
const WINDOW: Duration = Duration::from_secs(1);

/// Grant log for a single limiter.
#[derive(Debug)]
struct SlidingWindow {
    /// Instants of grants still inside the window, oldest first.
    grants: VecDeque<Instant>,
    /// Maximum grants per window.
    capacity: usize,
}

impl SlidingWindow {
    fn new(capacity: usize) -> Self {
        Self {
            grants: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Drop grants that left the window.
    fn evict(&mut self, now: Instant) {
        while let Some(oldest) = self.grants.front() {
            if *oldest + WINDOW <= now {
                self.grants.pop_front();
            } else {
                break;
            }
        }
    }

    /// Try to record a grant at `now`.
    fn try_acquire(&mut self, now: Instant) -> bool {
        self.evict(now);

        if self.grants.len() < self.capacity {
            self.grants.push_back(now);
            true
        } else {
            false
        }
    }

    /// Instant at which the oldest grant leaves the window.
    fn next_free_at(&self, now: Instant) -> Instant {
        self.grants
            .front()
            .map(|oldest| *oldest + WINDOW)
            .unwrap_or(now)
    }
}

/// Rate limiter for one API tier (realtime or historical).
///
/// Thread-safe; share it behind an `Arc` between every worker that talks to
/// the same tier. `acquire` never rejects, it waits until a slot frees up.
pub struct RateLimiter {
    /// Tier name for logging.
    name: &'static str,
    window: Mutex<SlidingWindow>,
}

impl RateLimiter {
    /// Create a limiter granting at most `permits_per_second` acquisitions per
    /// rolling second. Zero is treated as one.
    pub fn new(name: &'static str, permits_per_second: u32) -> Self {
        let capacity = permits_per_second.max(1) as usize;
        Self {
            name,
            window: Mutex::new(SlidingWindow::new(capacity)),
        }
    }

    /// Lock the window, recovering from poison if necessary.
    ///
    /// The window only holds instants, so a poisoned lock cannot leave it in
    /// an inconsistent state.
    fn lock_window(&self) -> MutexGuard<'_, SlidingWindow> {
        self.window.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter '{}' mutex was poisoned, recovering", self.name);
            poisoned.into_inner()
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Configured permits per second.
    pub fn permits_per_second(&self) -> usize {
        self.lock_window().capacity
    }

    /// Wait (asynchronously) until a permit is granted.
    pub async fn acquire(&self) {
        loop {
            let wake_at = {
                let mut window = self.lock_window();
                let now = Instant::now();

                if window.try_acquire(now) {
                    debug!("Rate limiter '{}': permit granted", self.name);
                    return;
                }

                window.next_free_at(now)
            };

            debug!(
                "Rate limiter '{}': waiting {:?} for a free slot",
                self.name,
                wake_at.saturating_duration_since(Instant::now())
            );
            tokio::time::sleep_until(wake_at).await;
        }
    }

    /// Try to acquire a permit without waiting.
    pub fn try_acquire(&self) -> bool {
        self.lock_window().try_acquire(Instant::now())
    }

    /// Permits that could be granted right now.
    pub fn available(&self) -> usize {
        let mut window = self.lock_window();
        window.evict(Instant::now());
        window.capacity - window.grants.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Largest number of grants observed in any half-open one-second window.
    fn max_grants_per_window(mut grants: Vec<Instant>) -> usize {
        grants.sort();
        let mut max = 0;
        for (i, start) in grants.iter().enumerate() {
            let in_window = grants[i..]
                .iter()
                .take_while(|t| **t < *start + WINDOW)
                .count();
            max = max.max(in_window);
        }
        max
    }

    #[test]
    fn test_window_admits_up_to_capacity() {
        let now = Instant::now();
        let mut window = SlidingWindow::new(3);

        assert!(window.try_acquire(now));
        assert!(window.try_acquire(now));
        assert!(window.try_acquire(now));
        assert!(!window.try_acquire(now));
        assert_eq!(window.next_free_at(now), now + WINDOW);
    }

    #[test]
    fn test_window_frees_slots_after_one_second() {
        let start = Instant::now();
        let mut window = SlidingWindow::new(1);

        assert!(window.try_acquire(start));
        assert!(!window.try_acquire(start + Duration::from_millis(999)));
        assert!(window.try_acquire(start + WINDOW));
    }

    #[test]
    fn test_zero_qps_is_treated_as_one() {
        let limiter = RateLimiter::new("realtime", 0);
        assert_eq!(limiter.permits_per_second(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_acquire_and_available() {
        let limiter = RateLimiter::new("historical", 2);
        assert_eq!(limiter.available(), 2);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        assert_eq!(limiter.available(), 0);

        tokio::time::advance(WINDOW).await;
        assert_eq!(limiter.available(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_window() {
        let limiter = RateLimiter::new("realtime", 1);
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_never_exceed_qps() {
        const QPS: u32 = 10;
        let limiter = Arc::new(RateLimiter::new("historical", QPS));
        let grants = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            let grants = Arc::clone(&grants);
            handles.push(tokio::spawn(async move {
                for _ in 0..15 {
                    limiter.acquire().await;
                    grants.lock().unwrap().push(Instant::now());
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let grants = grants.lock().unwrap().clone();
        assert_eq!(grants.len(), 120);
        assert!(max_grants_per_window(grants) <= QPS as usize);
    }

    #[tokio::test(start_paused = true)]
    async fn test_instances_are_independent() {
        let realtime = RateLimiter::new("realtime", 1);
        let historical = RateLimiter::new("historical", 10);

        realtime.acquire().await;
        assert!(!realtime.try_acquire());
        assert!(historical.try_acquire());
    }
}
