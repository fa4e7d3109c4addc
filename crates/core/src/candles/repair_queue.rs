//! Day-window repair queue.
//!
//! The scheduler does not repair the whole lookback at once. It splits the
//! lookback into UTC days, queues the days that contain gaps (newest first)
//! and repairs a few of them per cycle.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

const DAY_MS: i64 = 86_400_000;

/// One UTC day (or the clipped part of one) of one instrument.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayWindow {
    pub instrument: String,
    pub start: i64,
    pub end: i64,
}

/// `[start, end)` split at UTC midnights, newest window first.
pub fn day_windows(start: i64, end: i64) -> Vec<(i64, i64)> {
    let mut windows = Vec::new();
    let mut window_end = end;

    while window_end > start {
        let midnight = (window_end - 1).div_euclid(DAY_MS) * DAY_MS;
        let window_start = midnight.max(start);
        windows.push((window_start, window_end));
        window_end = window_start;
    }

    windows
}

/// Pending day windows plus the windows known to hold only upstream
/// absences.
#[derive(Debug, Default)]
pub struct RepairQueue {
    pending: VecDeque<DayWindow>,
    settled: HashSet<DayWindow>,
}

impl RepairQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Replace the pending windows, skipping settled ones. Settled windows
    /// that are no longer offered (they aged out of the lookback) are
    /// forgotten.
    pub fn refill(&mut self, windows: Vec<DayWindow>) {
        let offered: HashSet<&DayWindow> = windows.iter().collect();
        self.settled.retain(|w| offered.contains(w));

        self.pending = windows
            .into_iter()
            .filter(|w| !self.settled.contains(w))
            .collect();
    }

    /// Take up to `n` windows from the front.
    pub fn pop_batch(&mut self, n: usize) -> Vec<DayWindow> {
        let n = n.min(self.pending.len());
        self.pending.drain(..n).collect()
    }

    /// Put windows back at the front, in their original order, so an
    /// interrupted batch is retried first.
    pub fn requeue_front(&mut self, windows: Vec<DayWindow>) {
        for window in windows.into_iter().rev() {
            self.pending.push_front(window);
        }
    }

    /// Remember that a full repair of `window` wrote nothing, so its
    /// remaining gaps are upstream absences.
    pub fn settle(&mut self, window: DayWindow) {
        self.settled.insert(window);
    }

    pub fn is_settled(&self, window: &DayWindow) -> bool {
        self.settled.contains(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: i64, end: i64) -> DayWindow {
        DayWindow {
            instrument: "BTC-USDT".to_string(),
            start,
            end,
        }
    }

    #[test]
    fn test_day_windows_split_at_midnight_newest_first() {
        let start = DAY_MS + 3_600_000;
        let end = 3 * DAY_MS + 7_200_000;

        assert_eq!(
            day_windows(start, end),
            vec![
                (3 * DAY_MS, end),
                (2 * DAY_MS, 3 * DAY_MS),
                (start, 2 * DAY_MS),
            ]
        );
    }

    #[test]
    fn test_day_windows_on_boundaries() {
        assert_eq!(day_windows(0, DAY_MS), vec![(0, DAY_MS)]);
        assert!(day_windows(DAY_MS, DAY_MS).is_empty());
    }

    #[test]
    fn test_pop_batch() {
        let mut queue = RepairQueue::new();
        queue.refill(vec![window(2, 3), window(1, 2), window(0, 1)]);

        assert_eq!(queue.pop_batch(2), vec![window(2, 3), window(1, 2)]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_batch(5), vec![window(0, 1)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_requeue_front_keeps_order_ahead_of_pending() {
        let mut queue = RepairQueue::new();
        queue.refill(vec![window(3, 4), window(2, 3), window(1, 2), window(0, 1)]);

        let batch = queue.pop_batch(3);
        queue.requeue_front(batch[1..].to_vec());

        assert_eq!(
            queue.pop_batch(10),
            vec![window(2, 3), window(1, 2), window(0, 1)]
        );
    }

    #[test]
    fn test_settled_windows_are_skipped_until_they_age_out() {
        let mut queue = RepairQueue::new();
        queue.settle(window(1, 2));

        queue.refill(vec![window(2, 3), window(1, 2)]);
        assert_eq!(queue.pop_batch(10), vec![window(2, 3)]);

        // window(1, 2) is no longer offered and is forgotten
        queue.refill(vec![window(2, 3)]);
        assert!(!queue.is_settled(&window(1, 2)));
    }
}
