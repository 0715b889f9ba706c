use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

pub const DEFAULT_GRID_INTERVAL_MINUTES: u32 = 15;
pub const DEFAULT_HOUR_HEIGHT: f64 = 60.0;
const MINUTES_PER_HOUR: f64 = 60.0;

/// The half-open interval `[start, end)` covering one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub day: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub tz: Tz,
}

impl DayRange {
    pub fn for_day(day: NaiveDate, tz: Tz) -> Self {
        let start = local_midnight(day, tz);
        let end = day
            .succ_opt()
            .map(|next| local_midnight(next, tz))
            .unwrap_or(start + Duration::hours(24));
        Self { day, start, end, tz }
    }

    pub fn containing(instant: DateTime<Utc>, tz: Tz) -> Self {
        Self::for_day(instant.with_timezone(&tz).date_naive(), tz)
    }

    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// Whether `[start, end)` lies inside the day. Ending exactly at the next
    /// midnight is allowed.
    pub fn contains_interval(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start >= self.start && end <= self.end && start < end
    }

    pub fn at_local_time(&self, time: NaiveTime) -> DateTime<Utc> {
        local_instant(self.day.and_time(time), self.tz)
            .unwrap_or_else(|| self.start + Duration::minutes(minutes_of_time(time)))
    }
}

fn local_midnight(day: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = day.and_time(NaiveTime::MIN);
    // Some zones skip midnight on DST transitions; the day then starts an hour later.
    local_instant(midnight, tz)
        .or_else(|| local_instant(midnight + Duration::hours(1), tz))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

fn local_instant(naive: chrono::NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

fn minutes_of_time(time: NaiveTime) -> i64 {
    i64::from(time.hour()) * 60 + i64::from(time.minute())
}

/// Floors the local minute of `instant` to a multiple of `interval_minutes`
/// and drops seconds, keeping the hour and day.
pub fn snap_to_grid(instant: DateTime<Utc>, interval_minutes: u32, tz: Tz) -> DateTime<Utc> {
    let interval = interval_minutes.max(1);
    let local = instant.with_timezone(&tz);
    let excess_minutes = local.minute() % interval;
    instant
        - Duration::minutes(i64::from(excess_minutes))
        - Duration::seconds(i64::from(local.second()))
        - Duration::nanoseconds(i64::from(local.nanosecond()))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeGrid {
    tz: Tz,
    hour_height: f64,
    interval_minutes: u32,
}

impl TimeGrid {
    pub fn new(tz: Tz, hour_height: f64, interval_minutes: u32) -> Self {
        Self {
            tz,
            hour_height,
            interval_minutes: interval_minutes.max(1),
        }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn hour_height(&self) -> f64 {
        self.hour_height
    }

    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    pub fn interval(&self) -> Duration {
        Duration::minutes(i64::from(self.interval_minutes))
    }

    pub fn day(&self, day: NaiveDate) -> DayRange {
        DayRange::for_day(day, self.tz)
    }

    /// `y` grows linearly with the minutes elapsed since the start of the
    /// day, so the repeated hour of a fall-back day gets its own rows.
    /// Instants past the end of the day map to the bottom of the column.
    pub fn position_for_instant(&self, instant: DateTime<Utc>, day: &DayRange) -> f64 {
        let minutes = instant.clamp(day.start, day.end) - day.start;
        minutes.num_minutes() as f64 / MINUTES_PER_HOUR * self.hour_height
    }

    /// Inverse of [`Self::position_for_instant`], truncated to the minute and
    /// clamped to the day.
    pub fn instant_for_position(&self, y: f64, day: &DayRange) -> DateTime<Utc> {
        let raw_minutes = if self.hour_height > 0.0 {
            (y / self.hour_height * MINUTES_PER_HOUR).floor()
        } else {
            0.0
        };
        let last_minute = (day.minutes() - 1).max(0);
        day.start + Duration::minutes((raw_minutes as i64).clamp(0, last_minute))
    }

    pub fn snap_to_grid(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        snap_to_grid(instant, self.interval_minutes, self.tz)
    }

    pub fn height_for(&self, start: DateTime<Utc>, end: DateTime<Utc>, day: &DayRange) -> f64 {
        (self.position_for_instant(end, day) - self.position_for_instant(start, day)).max(0.0)
    }
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self::new(Tz::UTC, DEFAULT_HOUR_HEIGHT, DEFAULT_GRID_INTERVAL_MINUTES)
    }
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

    fn day(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn position_is_linear_in_minutes_since_midnight() {
        let grid = TimeGrid::default();
        let range = grid.day(day("2026-02-16"));
        assert_eq!(grid.position_for_instant(fixed_time("2026-02-16T09:30:00Z"), &range), 570.0);
        assert_eq!(grid.position_for_instant(range.start, &range), 0.0);
        assert_eq!(grid.position_for_instant(range.end, &range), 1440.0);

        let tall = TimeGrid::new(Tz::UTC, 100.0, 15);
        assert_eq!(tall.position_for_instant(fixed_time("2026-02-16T01:15:00Z"), &range), 125.0);
    }

    #[test]
    fn instant_for_position_truncates_to_the_minute() {
        let grid = TimeGrid::default();
        let range = grid.day(day("2026-02-16"));
        assert_eq!(grid.instant_for_position(570.9, &range), fixed_time("2026-02-16T09:30:00Z"));
        assert_eq!(grid.instant_for_position(-20.0, &range), range.start);
        assert_eq!(
            grid.instant_for_position(5_000.0, &range),
            fixed_time("2026-02-16T23:59:00Z")
        );
    }

    #[test]
    fn snap_floors_minutes_and_drops_seconds() {
        let snapped = snap_to_grid(fixed_time("2026-02-16T09:37:42Z"), 15, Tz::UTC);
        assert_eq!(snapped, fixed_time("2026-02-16T09:30:00Z"));
        let on_grid = snap_to_grid(fixed_time("2026-02-16T10:45:00Z"), 15, Tz::UTC);
        assert_eq!(on_grid, fixed_time("2026-02-16T10:45:00Z"));
    }

    #[test]
    fn snap_uses_local_minutes_in_offset_zones() {
        // Kathmandu is UTC+05:45, so 09:37 local is 03:52 UTC.
        let tz: Tz = "Asia/Kathmandu".parse().expect("known zone");
        let snapped = snap_to_grid(fixed_time("2026-02-16T03:52:00Z"), 10, tz);
        assert_eq!(snapped.with_timezone(&tz).time(), NaiveTime::from_hms_opt(9, 30, 0).expect("time"));
    }

    #[test]
    fn day_range_follows_local_midnight_across_dst() {
        let tz: Tz = "Europe/Berlin".parse().expect("known zone");
        let range = DayRange::for_day(day("2026-03-29"), tz);
        assert_eq!(range.start, fixed_time("2026-03-28T23:00:00Z"));
        assert_eq!(range.end - range.start, Duration::hours(23));
        assert!(range.contains(fixed_time("2026-03-29T12:00:00Z")));
        assert!(!range.contains(range.end));
        assert!(range.contains_interval(fixed_time("2026-03-29T21:00:00Z"), range.end));
    }

    #[test]
    fn repeated_hour_of_fall_back_day_gets_its_own_rows() {
        let tz: Tz = "America/New_York".parse().expect("known zone");
        let grid = TimeGrid::new(tz, 60.0, 15);
        let range = grid.day(day("2026-11-01"));
        assert_eq!(range.minutes(), 25 * 60);

        // 01:30 EDT and 01:30 EST share a wall-clock time.
        let first = fixed_time("2026-11-01T05:30:00Z");
        let second = fixed_time("2026-11-01T06:30:00Z");
        assert_eq!(grid.position_for_instant(first, &range), 90.0);
        assert_eq!(grid.position_for_instant(second, &range), 150.0);
        assert_eq!(grid.position_for_instant(range.end, &range), 1500.0);
        assert_eq!(grid.instant_for_position(150.0, &range), second);
        assert_eq!(grid.height_for(first, second, &range), 60.0);
    }

    #[test]
    fn at_local_time_resolves_wall_clock() {
        let range = DayRange::for_day(day("2026-02-16"), Tz::UTC);
        let latest = range.at_local_time(NaiveTime::from_hms_opt(23, 45, 0).expect("time"));
        assert_eq!(latest, fixed_time("2026-02-16T23:45:00Z"));
    }

    proptest! {
        #[test]
        fn snapping_is_idempotent(
            seconds in 0i64..(400 * 24 * 3600),
            interval in prop::sample::select(vec![1u32, 5, 10, 15, 20, 30, 60]),
        ) {
            let instant = fixed_time("2026-01-01T00:00:00Z") + Duration::seconds(seconds);
            let once = snap_to_grid(instant, interval, Tz::UTC);
            prop_assert_eq!(snap_to_grid(once, interval, Tz::UTC), once);
            prop_assert!(once <= instant);
            prop_assert!(instant - once < Duration::minutes(i64::from(interval)));
        }
    }
}
