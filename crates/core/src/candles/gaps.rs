//! Gap computation over sorted open times.

use barline_market_data::Interval;

use super::model::Gap;

/// Maximal runs of missing slots in `[start, end)`.
///
/// `stored` must be ascending. Expected slots start at the first slot
/// boundary `>= start`. Duplicates, unaligned values and values outside the
/// range are ignored. Single pass, no backtracking.
pub fn find_gaps(stored: &[i64], start: i64, end: i64, interval: Interval) -> Vec<Gap> {
    let step = interval.as_millis();
    let mut expected = interval.align_up(start);
    let mut gaps = Vec::new();

    for &open_time in stored {
        if open_time >= end {
            break;
        }
        if open_time < expected || !interval.is_aligned(open_time) {
            continue;
        }
        if open_time > expected {
            gaps.push(Gap {
                start: expected,
                end: open_time,
            });
        }
        expected = open_time + step;
    }

    if expected < end {
        gaps.push(Gap {
            start: expected,
            end,
        });
    }

    gaps
}
