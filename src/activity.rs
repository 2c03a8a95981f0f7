//! Local activity tracker
//!
//! Counts visits per calendar day for one user and keeps a streak by date.
//! The log is stored as `{data_dir}/activity/{user_id}.json`.
//!
//! Unlike the profile's login streak, days here are calendar dates, so a
//! visit at 23:50 followed by one at 00:10 counts as consecutive.

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::persist::{self, PersistResult};
use crate::streak;

/// Visits on a single day
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DailyActivity {
    pub visits: u32,
    /// Distinct activity kinds, in first-seen order
    pub activities: Vec<String>,
}

/// Persisted activity log of one user
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ActivityLog {
    pub streak: u32,
    pub last_active: Option<NaiveDate>,
    pub total_visits: u64,
    pub daily_activity: BTreeMap<NaiveDate, DailyActivity>,
}

/// Counters returned after recording a visit
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct VisitSummary {
    pub streak: u32,
    pub total_visits: u64,
    pub today_visits: u32,
}

impl ActivityLog {
    /// Record one visit of `kind` on `today`
    pub fn record(&mut self, kind: &str, today: NaiveDate) -> VisitSummary {
        self.total_visits += 1;

        let day = self.daily_activity.entry(today).or_default();
        day.visits += 1;
        if !day.activities.iter().any(|a| a == kind) {
            day.activities.push(kind.to_string());
        }
        let today_visits = day.visits;

        self.streak = match self.last_active {
            Some(last) => streak::apply(self.streak, (today - last).num_days()).streak,
            None => 1,
        };
        // a visit dated before the last one must not move the marker back
        if self.last_active.map_or(true, |last| today > last) {
            self.last_active = Some(today);
        }

        VisitSummary {
            streak: self.streak,
            total_visits: self.total_visits,
            today_visits,
        }
    }

    /// Visit counts for the 7 days ending at `today`, most recent first
    pub fn weekly_activity(&self, today: NaiveDate) -> Vec<(NaiveDate, u32)> {
        (0..7)
            .map(|i| {
                let date = today - Duration::days(i);
                let visits = self.daily_activity.get(&date).map_or(0, |d| d.visits);
                (date, visits)
            })
            .collect()
    }
}

/// File-backed activity log for one user
pub struct ActivityTracker {
    path: PathBuf,
    log: ActivityLog,
}

impl ActivityTracker {
    /// Open the tracker, starting empty if nothing is stored yet
    pub fn open(data_dir: &Path, user_id: &str) -> PersistResult<Self> {
        let path = Self::path_for(data_dir, user_id);
        let log = persist::load_json(&path)?.unwrap_or_default();
        Ok(Self { path, log })
    }

    pub fn path_for(data_dir: &Path, user_id: &str) -> PathBuf {
        data_dir.join("activity").join(format!("{}.json", user_id))
    }

    /// Record a visit today (UTC) and save
    pub fn track(&mut self, kind: &str) -> PersistResult<VisitSummary> {
        self.track_on(kind, Utc::now().date_naive())
    }

    pub fn track_on(&mut self, kind: &str, today: NaiveDate) -> PersistResult<VisitSummary> {
        let summary = self.log.record(kind, today);
        persist::save_json(&self.path, &self.log)?;

        tracing::debug!(
            kind = kind,
            streak = summary.streak,
            total = summary.total_visits,
            "Recorded activity"
        );
        Ok(summary)
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn test_first_visit_starts_streak() {
        let mut log = ActivityLog::default();
        let summary = log.record("login", day(1));
        assert_eq!(summary.streak, 1);
        assert_eq!(summary.total_visits, 1);
        assert_eq!(summary.today_visits, 1);
        assert_eq!(log.last_active, Some(day(1)));
    }

    #[test]
    fn test_streak_by_calendar_day() {
        let mut log = ActivityLog::default();
        log.record("login", day(1));
        log.record("goals", day(1));
        assert_eq!(log.streak, 1);

        log.record("login", day(2));
        assert_eq!(log.record("login", day(3)).streak, 3);

        // skipped day 4
        assert_eq!(log.record("login", day(5)).streak, 1);
    }

    #[test]
    fn test_activity_kinds_are_distinct() {
        let mut log = ActivityLog::default();
        log.record("login", day(1));
        log.record("goals", day(1));
        log.record("login", day(1));

        let today = &log.daily_activity[&day(1)];
        assert_eq!(today.visits, 3);
        assert_eq!(today.activities, vec!["login", "goals"]);
    }

    #[test]
    fn test_weekly_activity_covers_seven_days() {
        let mut log = ActivityLog::default();
        log.record("login", day(3));
        log.record("login", day(9));
        log.record("login", day(9));

        let week = log.weekly_activity(day(9));
        assert_eq!(week.len(), 7);
        assert_eq!(week[0], (day(9), 2));
        assert_eq!(week[6], (day(3), 1));
        assert!(week[1..6].iter().all(|(_, visits)| *visits == 0));
    }

    #[test]
    fn test_tracker_persists_between_opens() {
        let dir = TempDir::new().unwrap();

        let mut tracker = ActivityTracker::open(dir.path(), "u1").unwrap();
        tracker.track_on("login", day(1)).unwrap();
        tracker.track_on("login", day(2)).unwrap();

        let reopened = ActivityTracker::open(dir.path(), "u1").unwrap();
        assert_eq!(reopened.log().streak, 2);
        assert_eq!(reopened.log().total_visits, 2);
        assert!(ActivityTracker::path_for(dir.path(), "u1").exists());

        let other = ActivityTracker::open(dir.path(), "u2").unwrap();
        assert_eq!(other.log().total_visits, 0);
    }
}
