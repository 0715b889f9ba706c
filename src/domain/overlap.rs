//! Collision checks between blocks that share a day.
//!
//! Intervals are half-open: a block ending at 10:00 and one starting at 10:00
//! do not overlap.

use crate::domain::models::TimeBlock;
use crate::domain::time_grid::snap_to_grid;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

pub fn intervals_overlap(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    other_start: DateTime<Utc>,
    other_end: DateTime<Utc>,
) -> bool {
    start < other_end && end > other_start
}

/// Whether `[start, start + duration)` collides with none of `existing`,
/// ignoring the block whose id is `excluding`.
pub fn can_place(
    start: DateTime<Utc>,
    duration: Duration,
    existing: &[TimeBlock],
    excluding: Option<&str>,
) -> bool {
    let end = start + duration;
    !existing
        .iter()
        .filter(|block| excluding != Some(block.id.as_str()))
        .any(|block| intervals_overlap(start, end, block.start_at, block.end_at))
}

pub fn first_conflict<'a>(
    start: DateTime<Utc>,
    duration: Duration,
    existing: &'a [TimeBlock],
    excluding: Option<&str>,
) -> Option<&'a TimeBlock> {
    let end = start + duration;
    existing
        .iter()
        .filter(|block| excluding != Some(block.id.as_str()))
        .find(|block| intervals_overlap(start, end, block.start_at, block.end_at))
}

#[derive(Debug, Clone, Copy)]
pub struct SlotSearch {
    pub interval_minutes: u32,
    /// Latest admissible start, inclusive.
    pub latest_start: DateTime<Utc>,
    pub tz: Tz,
}

/// Probes forward from `snap_to_grid(after)` one grid step at a time and
/// returns the first start where `duration` fits.
pub fn find_next_free_slot(
    after: DateTime<Utc>,
    duration: Duration,
    existing: &[TimeBlock],
    search: SlotSearch,
) -> Option<DateTime<Utc>> {
    let step = Duration::minutes(i64::from(search.interval_minutes.max(1)));
    let mut candidate = snap_to_grid(after, search.interval_minutes, search.tz);
    while candidate <= search.latest_start {
        if can_place(candidate, duration, existing, None) {
            return Some(candidate);
        }
        candidate += step;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn block(id: &str, start: &str, end: &str) -> TimeBlock {
        TimeBlock::new(
            id,
            id,
            fixed_time(start),
            fixed_time(end),
            fixed_time("2026-02-16T00:00:00Z"),
        )
    }

    fn search() -> SlotSearch {
        SlotSearch {
            interval_minutes: 15,
            latest_start: fixed_time("2026-02-16T23:45:00Z"),
            tz: Tz::UTC,
        }
    }

    #[test]
    fn touching_endpoints_do_not_overlap() {
        let existing = vec![block("a", "2026-02-16T09:00:00Z", "2026-02-16T10:00:00Z")];
        assert!(can_place(fixed_time("2026-02-16T10:00:00Z"), Duration::minutes(30), &existing, None));
        assert!(can_place(fixed_time("2026-02-16T08:30:00Z"), Duration::minutes(30), &existing, None));
        assert!(!can_place(fixed_time("2026-02-16T08:45:00Z"), Duration::minutes(30), &existing, None));
        assert!(!can_place(fixed_time("2026-02-16T09:30:00Z"), Duration::minutes(30), &existing, None));
    }

    #[test]
    fn excluded_block_is_ignored() {
        let existing = vec![block("a", "2026-02-16T09:00:00Z", "2026-02-16T10:00:00Z")];
        let start = fixed_time("2026-02-16T09:15:00Z");
        assert!(!can_place(start, Duration::hours(1), &existing, None));
        assert!(can_place(start, Duration::hours(1), &existing, Some("a")));
        assert!(!can_place(start, Duration::hours(1), &existing, Some("b")));
    }

    #[test]
    fn first_conflict_names_the_colliding_block() {
        let existing = vec![
            block("a", "2026-02-16T09:00:00Z", "2026-02-16T10:00:00Z"),
            block("b", "2026-02-16T11:00:00Z", "2026-02-16T12:00:00Z"),
        ];
        let conflict = first_conflict(fixed_time("2026-02-16T11:30:00Z"), Duration::minutes(15), &existing, None);
        assert_eq!(conflict.map(|block| block.id.as_str()), Some("b"));
    }

    #[test]
    fn next_free_slot_skips_occupied_time() {
        let existing = vec![block("a", "2026-02-16T09:00:00Z", "2026-02-16T10:00:00Z")];
        let slot = find_next_free_slot(
            fixed_time("2026-02-16T09:00:00Z"),
            Duration::minutes(30),
            &existing,
            search(),
        );
        assert_eq!(slot, Some(fixed_time("2026-02-16T10:00:00Z")));
    }

    #[test]
    fn next_free_slot_snaps_the_starting_point() {
        let slot = find_next_free_slot(
            fixed_time("2026-02-16T07:52:10Z"),
            Duration::minutes(30),
            &[],
            search(),
        );
        assert_eq!(slot, Some(fixed_time("2026-02-16T07:45:00Z")));
    }

    #[test]
    fn next_free_slot_gives_up_after_latest_start() {
        let existing = vec![block("a", "2026-02-16T22:00:00Z", "2026-02-17T00:00:00Z")];
        let slot = find_next_free_slot(
            fixed_time("2026-02-16T22:00:00Z"),
            Duration::minutes(15),
            &existing,
            search(),
        );
        assert_eq!(slot, None);
    }

    proptest! {
        #[test]
        fn found_slot_never_collides(
            starts in prop::collection::vec(0i64..90, 0..8),
            after in 0i64..96,
            length in 1i64..8,
        ) {
            let day_start = fixed_time("2026-02-16T00:00:00Z");
            let mut existing: Vec<TimeBlock> = Vec::new();
            for (index, slot) in starts.into_iter().enumerate() {
                let start = day_start + Duration::minutes(slot * 15);
                let duration = Duration::minutes(30);
                if can_place(start, duration, &existing, None) {
                    let mut placed = block(&format!("b{index}"), "2026-02-16T00:00:00Z", "2026-02-16T00:15:00Z");
                    placed.start_at = start;
                    placed.end_at = start + duration;
                    existing.push(placed);
                }
            }
            let duration = Duration::minutes(length * 15);
            let found = find_next_free_slot(day_start + Duration::minutes(after * 15), duration, &existing, search());
            if let Some(start) = found {
                prop_assert!(can_place(start, duration, &existing, None));
                prop_assert!(start <= search().latest_start);
            }
        }
    }
}
