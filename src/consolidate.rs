//! Cross-source sample consolidation
//!
//! When a metric is recorded by more than one source at once (phone and
//! watch counting the same steps, a third-party app writing its own
//! samples), the raw query result double-counts the underlying activity.
//! This module reduces such a batch to a single non-overlapping series,
//! keeping the highest-value reading whenever windows from different
//! sources overlap.
//!
//! The cursor/scan shape of the algorithm is load-bearing: which sample is
//! compared against, which group member wins, and how far the cursor jumps
//! all affect the downstream series. Behavior here matches the platform
//! implementations this crate replaces, including the index-based cursor
//! jump (see `consolidate_if_needed`).

use std::collections::HashSet;

use crate::types::Sample;

/// Resolve cross-source temporal overlaps in a sample batch.
///
/// With at most one distinct source the input is returned unchanged, in its
/// given order. Otherwise samples are stable-sorted by start time (samples
/// sharing a start time keep their input order) and scanned left to right:
///
/// - each `current` sample is compared against every later sample from a
///   *different* source, always against `current` itself rather than any
///   intermediate group member;
/// - all later samples whose window overlaps `current` form one group, and
///   only the group's highest-value member is kept;
/// - the cursor then jumps past the *index* of the last overlapping sample
///   found, so a same-source sample sitting between `current` and that index
///   is dropped without ever being evaluated. Kept for compatibility with
///   the series already stored by existing backends.
///
/// Re-running consolidation on its own output returns it unchanged.
pub fn consolidate_if_needed(samples: Vec<Sample>) -> Vec<Sample> {
    let mut sources: HashSet<&str> = HashSet::new();
    for sample in &samples {
        sources.insert(sample.source_id.as_str());
    }
    if sources.len() <= 1 {
        return samples;
    }

    let mut sorted = samples;
    sorted.sort_by_key(|s| s.start_time);

    let mut cursor = 0;
    let mut consolidated: Vec<Sample> = Vec::new();

    while cursor < sorted.len() {
        let current = &sorted[cursor];
        let mut last_overlapped: Option<usize> = None;
        let mut overlapped: Vec<usize> = Vec::new();

        for i in (cursor + 1)..sorted.len() {
            let next = &sorted[i];
            if current.source_id != next.source_id && check_overlap(current, next).is_some() {
                if overlapped.is_empty() {
                    overlapped.push(cursor);
                }
                overlapped.push(i);
                last_overlapped = Some(i);
            }
        }

        if let Some(last) = last_overlapped {
            cursor = last + 1;
            overlapped.sort_by(|&a, &b| sorted[a].value.total_cmp(&sorted[b].value));
            // pick the biggest from the overlapping group
            if let Some(&winner) = overlapped.last() {
                consolidated.push(sorted[winner].clone());
            }
        } else {
            consolidated.push(current.clone());
            cursor += 1;
        }
    }

    consolidated
}

/// Pairwise overlap test.
///
/// The sample with the strictly earlier start is treated as the older
/// window; on equal starts `b` is the older one. The pair overlaps when the
/// later-starting sample begins inside the older sample's half-open window
/// `[start, end)`. Returns `(older, later)` on overlap.
pub fn check_overlap<'a>(a: &'a Sample, b: &'a Sample) -> Option<(&'a Sample, &'a Sample)> {
    let (older, later) = if a.start_time < b.start_time {
        (a, b)
    } else {
        (b, a)
    };

    let starts_at_or_after = later.start_time >= older.start_time;
    let starts_before_end = later.start_time < older.end_time;

    if starts_at_or_after && starts_before_end {
        Some((older, later))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 8, 23, 6, 0, 0).unwrap()
    }

    fn sample(source: &str, offset_hours: i64, duration_hours: i64, value: f64) -> Sample {
        let start = now() + Duration::hours(offset_hours);
        Sample::new(source, start, start + Duration::hours(duration_hours), value).unwrap()
    }

    #[test]
    fn test_same_source_not_consolidated() {
        let samples = vec![
            sample("phone", 0, 3, 150.0),
            sample("phone", 5, 1, 50.0),
            sample("phone", 2, 2, 80.0),
        ];
        let consolidated = consolidate_if_needed(samples.clone());
        // Single source: identity, input order preserved (no sort)
        assert_eq!(consolidated, samples);
    }

    #[test]
    fn test_consolidates_contained_points() {
        let samples = vec![
            sample("phone", 0, 3, 150.0),
            sample("watch", 1, 1, 25.0),
            sample("phone", 5, 1, 50.0),
            sample("watch", 2, 1, 50.0),
        ];
        let consolidated = consolidate_if_needed(samples);
        assert_eq!(consolidated.len(), 2);
        assert_eq!(consolidated[0].value, 150.0);
        assert_eq!(consolidated[1].value, 50.0);
    }

    #[test]
    fn test_consolidates_escalated_points() {
        let samples = vec![
            sample("phone", 0, 3, 150.0),
            sample("watch", 1, 3, 25.0),
            sample("phone", 5, 1, 50.0),
            sample("watch", 2, 2, 200.0),
        ];
        let consolidated = consolidate_if_needed(samples);
        assert_eq!(consolidated.len(), 2);
        // Highest value in the overlap group wins, not the widest window
        assert_eq!(consolidated[0].value, 200.0);
    }

    #[test]
    fn test_consolidates_same_start_points() {
        let samples = vec![
            sample("phone", 0, 3, 150.0),
            sample("watch", 0, 2, 100.0),
            sample("phone", 5, 1, 50.0),
        ];
        let consolidated = consolidate_if_needed(samples);
        assert_eq!(consolidated.len(), 2);
        assert_eq!(consolidated[0].value, 150.0);
    }

    #[test]
    fn test_consolidates_all_into_first_group() {
        let samples = vec![
            sample("phone", 0, 3, 150.0),
            sample("watch", 1, 1, 50.0),
            sample("phone", 5, 1, 50.0),
            sample("watch", 2, 2, 100.0),
        ];
        let consolidated = consolidate_if_needed(samples);
        assert_eq!(consolidated.len(), 2);
        // Both watch samples fall into the group keyed off the first phone
        // sample and lose to its 150
        assert_eq!(consolidated[0].value, 150.0);
    }

    #[test]
    fn test_idempotent_on_own_output() {
        let samples = vec![
            sample("phone", 0, 3, 150.0),
            sample("watch", 1, 3, 25.0),
            sample("phone", 5, 1, 50.0),
            sample("watch", 2, 2, 200.0),
        ];
        let once = consolidate_if_needed(samples);
        let twice = consolidate_if_needed(once.clone());
        assert_eq!(twice, once);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(consolidate_if_needed(Vec::new()), Vec::<Sample>::new());
    }

    #[test]
    fn test_output_never_longer_than_input() {
        let samples = vec![
            sample("phone", 0, 3, 150.0),
            sample("watch", 0, 2, 100.0),
            sample("app", 1, 4, 75.0),
            sample("watch", 2, 2, 10.0),
            sample("phone", 6, 1, 40.0),
        ];
        let len = samples.len();
        assert!(consolidate_if_needed(samples).len() <= len);
    }

    #[test]
    fn test_no_cross_source_overlap_in_output() {
        let samples = vec![
            sample("phone", 0, 3, 150.0),
            sample("watch", 1, 1, 25.0),
            sample("app", 2, 3, 60.0),
            sample("watch", 6, 1, 30.0),
            sample("phone", 6, 2, 90.0),
        ];
        let consolidated = consolidate_if_needed(samples);
        for (i, a) in consolidated.iter().enumerate() {
            for b in consolidated.iter().skip(i + 1) {
                if a.source_id != b.source_id {
                    assert!(
                        check_overlap(a, b).is_none(),
                        "retained samples overlap: {a:?} vs {b:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_compares_against_original_current_not_group_members() {
        let start = now() + Duration::minutes(210); // 3.5h
        let tail = Sample::new("app", start, start + Duration::hours(2), 999.0).unwrap();
        let samples = vec![
            sample("phone", 0, 3, 150.0),
            sample("watch", 2, 2, 10.0),
            tail,
        ];
        let consolidated = consolidate_if_needed(samples);
        // The app sample starts inside the watch window but outside the
        // phone window, so it never joins the phone-keyed group
        assert_eq!(consolidated.len(), 2);
        assert_eq!(consolidated[0].value, 150.0);
        assert_eq!(consolidated[1].value, 999.0);
    }

    #[test]
    fn test_cursor_skips_by_index_past_same_source_samples() {
        let samples = vec![
            sample("phone", 0, 10, 100.0),
            sample("phone", 1, 1, 5.0),
            sample("watch", 3, 1, 7.0),
        ];
        let consolidated = consolidate_if_needed(samples);
        // The jump to last_overlapped + 1 drops the inner phone sample even
        // though it was never part of the overlap group
        assert_eq!(consolidated.len(), 1);
        assert_eq!(consolidated[0].value, 100.0);
    }

    #[test]
    fn test_overlap_orders_pair_by_start() {
        let a = sample("phone", 0, 3, 150.0);
        let b = sample("watch", 1, 1, 25.0);
        let (older, later) = check_overlap(&b, &a).expect("windows overlap");
        assert_eq!(older, &a);
        assert_eq!(later, &b);
    }

    #[test]
    fn test_overlap_equal_starts_treats_second_argument_as_older() {
        let a = sample("phone", 0, 3, 150.0);
        let b = sample("watch", 0, 2, 100.0);
        let (older, later) = check_overlap(&a, &b).expect("windows overlap");
        assert_eq!(older, &b);
        assert_eq!(later, &a);
    }

    #[test]
    fn test_touching_windows_do_not_overlap() {
        // Half-open windows: [0h,2h) and [2h,3h) merely touch
        let a = sample("phone", 0, 2, 100.0);
        let b = sample("watch", 2, 1, 50.0);
        assert!(check_overlap(&a, &b).is_none());
        assert!(check_overlap(&b, &a).is_none());
    }
}
