//! Login streaks
//!
//! A streak counts consecutive days with a recorded session. On every session
//! start the previous `last_seen` is compared with the current time:
//!
//! | whole days elapsed | effect            |
//! |--------------------|-------------------|
//! | 0                  | unchanged         |
//! | 1                  | streak + 1        |
//! | > 1                | reset to 1        |
//! | < 0 (clock skew)   | unchanged         |
//!
//! Days are whole 24-hour periods (`floor(elapsed / 1 day)`), not calendar
//! boundaries. The [`activity`](crate::activity) tracker applies the same rule
//! to calendar dates.

use chrono::{DateTime, Utc};
use serde::Serialize;

const SECONDS_PER_DAY: i64 = 86_400;

/// How a login affected the streak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakChange {
    /// Same-day login
    Unchanged,
    /// Consecutive-day login
    Extended,
    /// Streak broken, restarted at 1
    Reset,
    /// `last_seen` lies in the future; left unchanged
    ClockSkew,
}

/// Outcome of a streak computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreakUpdate {
    pub streak: u32,
    pub change: StreakChange,
    pub diff_days: i64,
}

/// Whole days between `last_seen` and `now`, floored
pub fn elapsed_days(last_seen: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - last_seen).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Apply the streak rule for a day difference
pub fn apply(previous: u32, diff_days: i64) -> StreakUpdate {
    let (streak, change) = match diff_days {
        d if d < 0 => (previous, StreakChange::ClockSkew),
        0 => (previous, StreakChange::Unchanged),
        1 => (previous.saturating_add(1), StreakChange::Extended),
        _ => (1, StreakChange::Reset),
    };

    StreakUpdate {
        streak,
        change,
        diff_days,
    }
}

/// Compute the streak for a login at `now`
pub fn advance(previous: u32, last_seen: DateTime<Utc>, now: DateTime<Utc>) -> StreakUpdate {
    let update = apply(previous, elapsed_days(last_seen, now));

    if update.change == StreakChange::ClockSkew {
        tracing::warn!(
            last_seen = %last_seen,
            now = %now,
            "last_seen is in the future, keeping streak unchanged"
        );
    }

    update
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_same_day_keeps_streak() {
        let update = advance(3, now() - Duration::hours(5), now());
        assert_eq!(update.streak, 3);
        assert_eq!(update.change, StreakChange::Unchanged);
        assert_eq!(update.diff_days, 0);
    }

    #[test]
    fn test_one_day_ago_extends() {
        let update = advance(4, now() - Duration::days(1), now());
        assert_eq!(update.streak, 5);
        assert_eq!(update.change, StreakChange::Extended);
    }

    #[test]
    fn test_ten_days_ago_resets() {
        let update = advance(5, now() - Duration::days(10), now());
        assert_eq!(update.streak, 1);
        assert_eq!(update.change, StreakChange::Reset);
        assert_eq!(update.diff_days, 10);
    }

    #[test]
    fn test_days_are_floored_24h_periods() {
        // 23h59m is still day 0, 47h59m is day 1
        assert_eq!(elapsed_days(now() - Duration::minutes(23 * 60 + 59), now()), 0);
        assert_eq!(elapsed_days(now() - Duration::minutes(47 * 60 + 59), now()), 1);
        assert_eq!(elapsed_days(now() - Duration::hours(48), now()), 2);
    }

    #[test]
    fn test_future_last_seen_is_clock_skew() {
        let update = advance(7, now() + Duration::hours(2), now());
        assert_eq!(update.streak, 7);
        assert_eq!(update.change, StreakChange::ClockSkew);
        assert_eq!(update.diff_days, -1);
    }

    #[test]
    fn test_zero_streak_extends_to_one() {
        assert_eq!(apply(0, 1).streak, 1);
    }

    #[test]
    fn test_rule_table() {
        for previous in [0u32, 1, 4, 100] {
            assert_eq!(apply(previous, 0).streak, previous);
            assert_eq!(apply(previous, 1).streak, previous + 1);
            for gap in [2, 3, 30, 365] {
                assert_eq!(apply(previous, gap).streak, 1);
            }
        }
    }

    #[test]
    fn test_saturates() {
        assert_eq!(apply(u32::MAX, 1).streak, u32::MAX);
    }
}
