//! Goal types
//!
//! - `Goal`: a stored goal row
//! - `NewGoal` / `GoalUpdate`: create and partial-update payloads
//! - `Progress`: completion percentage, always within 0..=100
//! - `GoalPriority` and `GoalStatus`: classification enums

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::timestamp;

/// A goal owned by one user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(with = "timestamp")]
    pub due_date: DateTime<Utc>,
    pub priority: GoalPriority,
    pub status: GoalStatus,
    #[serde(default)]
    pub progress: Progress,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Goal {
    pub fn is_completed(&self) -> bool {
        self.status == GoalStatus::Completed
    }

    /// Not completed yet
    pub fn is_active(&self) -> bool {
        !self.is_completed()
    }
}

/// Create payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewGoal {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub priority: GoalPriority,
}

impl NewGoal {
    pub fn new(title: impl Into<String>, due_date: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            description: None,
            due_date,
            priority: GoalPriority::default(),
        }
    }

    /// Builder method: set description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method: set priority
    pub fn priority(mut self, priority: GoalPriority) -> Self {
        self.priority = priority;
        self
    }
}

/// Partial update; only present fields are sent
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GoalUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<GoalPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<GoalStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
}

impl GoalUpdate {
    pub fn status(status: GoalStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn progress(progress: Progress) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &GoalUpdate::default()
    }
}

/// Goal priority
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GoalPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl GoalPriority {
    /// Sort rank, most urgent first
    pub fn rank(&self) -> u8 {
        match self {
            GoalPriority::High => 0,
            GoalPriority::Medium => 1,
            GoalPriority::Low => 2,
        }
    }
}

impl std::fmt::Display for GoalPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GoalPriority::Low => write!(f, "low"),
            GoalPriority::Medium => write!(f, "medium"),
            GoalPriority::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for GoalPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(GoalPriority::Low),
            "medium" => Ok(GoalPriority::Medium),
            "high" => Ok(GoalPriority::High),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Goal status; any status may follow any other
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl std::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GoalStatus::NotStarted => write!(f, "not_started"),
            GoalStatus::InProgress => write!(f, "in_progress"),
            GoalStatus::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for GoalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "not_started" => Ok(GoalStatus::NotStarted),
            "in_progress" => Ok(GoalStatus::InProgress),
            "completed" => Ok(GoalStatus::Completed),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// Completion percentage in 0..=100
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "u8")]
pub struct Progress(u8);

impl Progress {
    pub const MAX: u8 = 100;

    /// Validate a percentage
    pub fn new(value: i64) -> Result<Self, ProgressError> {
        if (0..=Self::MAX as i64).contains(&value) {
            Ok(Progress(value as u8))
        } else {
            Err(ProgressError(value))
        }
    }

    /// Clamp any input into range (slider input)
    pub fn clamped(value: i64) -> Self {
        Progress(value.clamp(0, Self::MAX as i64) as u8)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<f64> for Progress {
    type Error = ProgressError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(ProgressError(i64::MIN));
        }
        Progress::new(value.round() as i64)
    }
}

impl From<Progress> for u8 {
    fn from(p: Progress) -> u8 {
        p.0
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Out-of-range progress value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Progress must be between 0 and 100 (got {0})")]
pub struct ProgressError(pub i64);

/// Filter for the goal list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GoalFilter {
    #[default]
    All,
    Status(GoalStatus),
}

impl GoalFilter {
    pub fn matches(&self, goal: &Goal) -> bool {
        match self {
            GoalFilter::All => true,
            GoalFilter::Status(status) => goal.status == *status,
        }
    }
}

impl std::str::FromStr for GoalFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            Ok(GoalFilter::All)
        } else {
            s.parse().map(GoalFilter::Status)
        }
    }
}

/// Sort key for the goal list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GoalSort {
    #[default]
    DueDate,
    Priority,
}

impl GoalSort {
    pub fn compare(&self, a: &Goal, b: &Goal) -> Ordering {
        match self {
            GoalSort::DueDate => a.due_date.cmp(&b.due_date),
            GoalSort::Priority => a.priority.rank().cmp(&b.priority.rank()),
        }
    }
}

impl std::str::FromStr for GoalSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "due_date" | "due" => Ok(GoalSort::DueDate),
            "priority" => Ok(GoalSort::Priority),
            _ => Err(format!("Unknown sort: {}", s)),
        }
    }
}

/// Dashboard counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GoalStats {
    pub total: usize,
    pub completed: usize,
    pub active: usize,
    pub in_progress: usize,
}

impl GoalStats {
    pub fn from_goals(goals: &[Goal]) -> Self {
        Self {
            total: goals.len(),
            completed: goals.iter().filter(|g| g.is_completed()).count(),
            active: goals.iter().filter(|g| g.is_active()).count(),
            in_progress: goals
                .iter()
                .filter(|g| g.status == GoalStatus::InProgress)
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn goal(id: &str, status: GoalStatus, priority: GoalPriority, day: u32) -> Goal {
        let ts = Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap();
        Goal {
            id: id.to_string(),
            user_id: "u1".to_string(),
            title: format!("goal {}", id),
            description: None,
            due_date: ts,
            priority,
            status,
            progress: Progress::default(),
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn test_progress_validation() {
        assert_eq!(Progress::new(0).unwrap().value(), 0);
        assert_eq!(Progress::new(100).unwrap().value(), 100);
        assert_eq!(Progress::new(101), Err(ProgressError(101)));
        assert_eq!(Progress::new(-1), Err(ProgressError(-1)));
    }

    #[test]
    fn test_progress_clamped() {
        assert_eq!(Progress::clamped(150).value(), 100);
        assert_eq!(Progress::clamped(-20).value(), 0);
        assert_eq!(Progress::clamped(42).value(), 42);
    }

    #[test]
    fn test_progress_serde() {
        let p: Progress = serde_json::from_value(json!(55)).unwrap();
        assert_eq!(p.value(), 55);

        let p: Progress = serde_json::from_value(json!(55.0)).unwrap();
        assert_eq!(p.value(), 55);

        assert!(serde_json::from_value::<Progress>(json!(120)).is_err());
        assert_eq!(serde_json::to_value(Progress::clamped(7)).unwrap(), json!(7));
    }

    #[test]
    fn test_goal_from_row_with_date_only_due() {
        let goal: Goal = serde_json::from_value(json!({
            "id": "g1",
            "user_id": "u1",
            "title": "Read a book",
            "description": null,
            "due_date": "2024-05-03",
            "priority": "high",
            "status": "in_progress",
            "progress": 40,
            "created_at": "2024-05-01T08:00:00.123456+00:00",
            "updated_at": "2024-05-01T08:00:00"
        }))
        .unwrap();

        assert_eq!(goal.priority, GoalPriority::High);
        assert_eq!(goal.status, GoalStatus::InProgress);
        assert_eq!(goal.due_date, Utc.with_ymd_and_hms(2024, 5, 3, 0, 0, 0).unwrap());
        assert_eq!(goal.progress.value(), 40);
    }

    #[test]
    fn test_update_serializes_only_present_fields() {
        let update = GoalUpdate::status(GoalStatus::Completed);
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value, json!({"status": "completed"}));
        assert!(GoalUpdate::default().is_empty());
    }

    #[test]
    fn test_status_parse_and_display() {
        for status in [GoalStatus::NotStarted, GoalStatus::InProgress, GoalStatus::Completed] {
            assert_eq!(status.to_string().parse::<GoalStatus>().unwrap(), status);
        }
        assert_eq!("in-progress".parse::<GoalStatus>().unwrap(), GoalStatus::InProgress);
        assert!("done".parse::<GoalStatus>().is_err());
    }

    #[test]
    fn test_priority_rank_orders_high_first() {
        let mut goals = vec![
            goal("a", GoalStatus::NotStarted, GoalPriority::Low, 1),
            goal("b", GoalStatus::NotStarted, GoalPriority::High, 2),
            goal("c", GoalStatus::NotStarted, GoalPriority::Medium, 3),
        ];
        goals.sort_by(|x, y| GoalSort::Priority.compare(x, y));
        let ids: Vec<_> = goals.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_filter_and_stats() {
        let goals = vec![
            goal("a", GoalStatus::Completed, GoalPriority::Low, 1),
            goal("b", GoalStatus::InProgress, GoalPriority::High, 2),
            goal("c", GoalStatus::NotStarted, GoalPriority::Medium, 3),
        ];

        let filter: GoalFilter = "completed".parse().unwrap();
        assert_eq!(goals.iter().filter(|g| filter.matches(g)).count(), 1);
        assert_eq!("all".parse::<GoalFilter>().unwrap(), GoalFilter::All);

        let stats = GoalStats::from_goals(&goals);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.in_progress, 1);
    }
}
