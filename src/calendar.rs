//! Activity Calendar
//!
//! Month view generation for the activity calendar:
//! - `month_grid`: the 42 dates (6 weeks x 7 days) shown for a month
//! - `CalendarGrid`: the same dates annotated with the goals due on each day
//!
//! The grid starts on the Sunday on or before the 1st of the month and pads
//! the tail with days of the following month. Everything here is pure.

use chrono::{Datelike, Days, FixedOffset, NaiveDate, Offset, Utc};
use serde::Serialize;

use crate::models::{Goal, GoalStatus};

/// Number of cells in a month view
pub const GRID_CELLS: usize = 42;

/// A calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CalendarMonth {
    pub year: i32,
    /// 1-12
    pub month: u32,
}

impl CalendarMonth {
    /// Create a month, rejecting month numbers outside 1-12
    ///
    /// Months at the very ends of the date range are rejected too: all 42
    /// days of their grid must be representable.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        first.checked_sub_days(Days::new(6))?;
        first.checked_add_days(Days::new(GRID_CELLS as u64))?;
        Some(Self { year, month })
    }

    /// The month a date falls in
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The current month in UTC
    pub fn current() -> Self {
        Self::containing(Utc::now().date_naive())
    }

    pub fn first_day(&self) -> NaiveDate {
        // month is validated on construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn days_in_month(&self) -> u32 {
        let next = self.next().first_day();
        (next - self.first_day()).num_days() as u32
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl std::fmt::Display for CalendarMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for CalendarMonth {
    type Err = String;

    /// Parse `YYYY-MM`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| format!("Invalid month (expected YYYY-MM): {}", s))?;
        let year: i32 = year.parse().map_err(|_| format!("Invalid year: {}", year))?;
        let month: u32 = month.parse().map_err(|_| format!("Invalid month: {}", month))?;
        CalendarMonth::new(year, month).ok_or_else(|| format!("Invalid month: {}", s))
    }
}

/// The 42 dates shown for a month
///
/// Dates past the ends of the representable range repeat the last valid
/// date; months built with [`CalendarMonth::new`] never reach them.
pub fn month_grid(month: CalendarMonth) -> [NaiveDate; GRID_CELLS] {
    let first = month.first_day();
    let lead = first.weekday().num_days_from_sunday() as u64;
    let start = first.checked_sub_days(Days::new(lead)).unwrap_or(NaiveDate::MIN);

    let mut days = [start; GRID_CELLS];
    for (offset, day) in days.iter_mut().enumerate() {
        *day = start
            .checked_add_days(Days::new(offset as u64))
            .unwrap_or(NaiveDate::MAX);
    }
    days
}

/// Goals due on a calendar day, ignoring time of day
pub fn goals_on<'a>(date: NaiveDate, goals: &'a [Goal], offset: FixedOffset) -> Vec<&'a Goal> {
    goals
        .iter()
        .filter(|g| g.due_date.with_timezone(&offset).date_naive() == date)
        .collect()
}

/// Visual classification of a day by the status of its goals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayTone {
    /// No goals due
    Empty,
    /// Goals due, none started
    Open,
    /// None completed, at least one in progress
    InProgress,
    /// Some but not all completed
    SomeCompleted,
    /// Every goal completed
    AllCompleted,
}

impl DayTone {
    pub fn classify(goals: &[&Goal]) -> Self {
        if goals.is_empty() {
            return DayTone::Empty;
        }

        let completed = goals.iter().filter(|g| g.status == GoalStatus::Completed).count();
        if completed == goals.len() {
            DayTone::AllCompleted
        } else if completed > 0 {
            DayTone::SomeCompleted
        } else if goals.iter().any(|g| g.status == GoalStatus::InProgress) {
            DayTone::InProgress
        } else {
            DayTone::Open
        }
    }
}

/// One day in the month view
#[derive(Debug, Clone, Serialize)]
pub struct CalendarCell {
    pub date: NaiveDate,
    pub in_current_month: bool,
    pub is_today: bool,
    pub tone: DayTone,
    pub goals: Vec<Goal>,
}

/// Annotated month view
#[derive(Debug, Clone, Serialize)]
pub struct CalendarGrid {
    pub month: CalendarMonth,
    pub cells: Vec<CalendarCell>,
}

impl CalendarGrid {
    /// Build the grid with due dates interpreted in UTC
    pub fn build(month: CalendarMonth, goals: &[Goal], today: NaiveDate) -> Self {
        Self::build_with_offset(month, goals, today, Utc.fix())
    }

    /// Build the grid with due dates interpreted at a fixed UTC offset
    pub fn build_with_offset(
        month: CalendarMonth,
        goals: &[Goal],
        today: NaiveDate,
        offset: FixedOffset,
    ) -> Self {
        let cells = month_grid(month)
            .into_iter()
            .map(|date| {
                let due = goals_on(date, goals, offset);
                CalendarCell {
                    date,
                    in_current_month: month.contains(date),
                    is_today: date == today,
                    tone: DayTone::classify(&due),
                    goals: due.into_iter().cloned().collect(),
                }
            })
            .collect();

        Self { month, cells }
    }

    /// Cells as 6 rows of 7
    pub fn weeks(&self) -> impl Iterator<Item = &[CalendarCell]> {
        self.cells.chunks(7)
    }

    pub fn cell(&self, date: NaiveDate) -> Option<&CalendarCell> {
        self.cells.iter().find(|c| c.date == date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GoalPriority, Progress};
    use chrono::{Duration, TimeZone, Weekday};

    fn goal(id: &str, status: GoalStatus, due: chrono::DateTime<Utc>) -> Goal {
        Goal {
            id: id.to_string(),
            user_id: "u1".to_string(),
            title: id.to_string(),
            description: None,
            due_date: due,
            priority: GoalPriority::Medium,
            status,
            progress: Progress::default(),
            created_at: due,
            updated_at: due,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_every_month_has_42_consecutive_days() {
        for year in [1999, 2000, 2023, 2024, 2100] {
            for m in 1..=12 {
                let month = CalendarMonth::new(year, m).unwrap();
                let grid = month_grid(month);

                assert_eq!(grid.len(), GRID_CELLS);
                assert_eq!(grid[0].weekday(), Weekday::Sun);
                for pair in grid.windows(2) {
                    assert_eq!(pair[1] - pair[0], Duration::days(1));
                }

                let first = month.first_day();
                let index = grid.iter().position(|d| *d == first).unwrap();
                assert_eq!(index as u32, first.weekday().num_days_from_sunday());

                // every day of the month is present
                let in_month = grid.iter().filter(|d| month.contains(**d)).count();
                assert_eq!(in_month as u32, month.days_in_month());

                // the tail belongs to the month or the following one
                let last = grid[GRID_CELLS - 1];
                assert!(month.contains(last) || month.next().contains(last));
            }
        }
    }

    #[test]
    fn test_months_at_date_range_ends() {
        let last = CalendarMonth::containing(NaiveDate::MAX);
        let first = CalendarMonth::containing(NaiveDate::MIN);
        assert!(CalendarMonth::new(last.year, last.month).is_none());
        assert!(CalendarMonth::new(first.year, first.month).is_none());
        assert!(format!("{}", last).parse::<CalendarMonth>().is_err());

        // the grid saturates instead of running off the range
        let grid = month_grid(last);
        assert_eq!(grid[GRID_CELLS - 1], NaiveDate::MAX);
        let grid = month_grid(first);
        assert_eq!(grid[0], NaiveDate::MIN);

        let inner = last.previous().previous();
        let month = CalendarMonth::new(inner.year, inner.month).unwrap();
        assert!(month_grid(month).windows(2).all(|w| w[1] - w[0] == Duration::days(1)));
    }

    #[test]
    fn test_month_starting_on_sunday() {
        // September 2024 starts on a Sunday
        let grid = month_grid(CalendarMonth::new(2024, 9).unwrap());
        assert_eq!(grid[0], date(2024, 9, 1));
        assert_eq!(grid[41], date(2024, 10, 12));
    }

    #[test]
    fn test_month_starting_on_saturday() {
        // June 2024 starts on a Saturday
        let grid = month_grid(CalendarMonth::new(2024, 6).unwrap());
        assert_eq!(grid[0], date(2024, 5, 26));
        assert_eq!(grid[6], date(2024, 6, 1));
        assert_eq!(grid[41], date(2024, 7, 6));
    }

    #[test]
    fn test_month_navigation() {
        let jan = CalendarMonth::new(2024, 1).unwrap();
        assert_eq!(jan.previous(), CalendarMonth::new(2023, 12).unwrap());
        assert_eq!(jan.previous().next(), jan);
        assert_eq!(CalendarMonth::new(2024, 2).unwrap().days_in_month(), 29);
        assert_eq!(CalendarMonth::new(2023, 2).unwrap().days_in_month(), 28);
        assert!(CalendarMonth::new(2024, 13).is_none());
    }

    #[test]
    fn test_month_parse() {
        assert_eq!("2024-03".parse::<CalendarMonth>().unwrap(), CalendarMonth::new(2024, 3).unwrap());
        assert!("2024-00".parse::<CalendarMonth>().is_err());
        assert!("March".parse::<CalendarMonth>().is_err());
        assert_eq!(CalendarMonth::new(2024, 3).unwrap().to_string(), "2024-03");
    }

    #[test]
    fn test_goals_matched_by_day_ignoring_time() {
        let goals = vec![
            goal("morning", GoalStatus::NotStarted, Utc.with_ymd_and_hms(2024, 6, 10, 0, 5, 0).unwrap()),
            goal("night", GoalStatus::Completed, Utc.with_ymd_and_hms(2024, 6, 10, 23, 59, 0).unwrap()),
            goal("other", GoalStatus::Completed, Utc.with_ymd_and_hms(2024, 6, 11, 0, 0, 0).unwrap()),
            goal("last_year", GoalStatus::Completed, Utc.with_ymd_and_hms(2023, 6, 10, 12, 0, 0).unwrap()),
        ];

        let grid = CalendarGrid::build(
            CalendarMonth::new(2024, 6).unwrap(),
            &goals,
            date(2024, 6, 11),
        );

        let cell = grid.cell(date(2024, 6, 10)).unwrap();
        let ids: Vec<_> = cell.goals.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["morning", "night"]);
        assert_eq!(cell.tone, DayTone::SomeCompleted);
        assert!(!cell.is_today);

        let today = grid.cell(date(2024, 6, 11)).unwrap();
        assert!(today.is_today);
        assert_eq!(today.tone, DayTone::AllCompleted);

        let padding = grid.cell(date(2024, 5, 26)).unwrap();
        assert!(!padding.in_current_month);
        assert_eq!(padding.tone, DayTone::Empty);
    }

    #[test]
    fn test_offset_moves_goal_to_local_day() {
        let goals = vec![goal(
            "late",
            GoalStatus::InProgress,
            Utc.with_ymd_and_hms(2024, 6, 10, 23, 0, 0).unwrap(),
        )];
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();

        let grid = CalendarGrid::build_with_offset(
            CalendarMonth::new(2024, 6).unwrap(),
            &goals,
            date(2024, 6, 1),
            plus_two,
        );

        assert!(grid.cell(date(2024, 6, 10)).unwrap().goals.is_empty());
        assert_eq!(grid.cell(date(2024, 6, 11)).unwrap().tone, DayTone::InProgress);
    }

    #[test]
    fn test_tone_classification() {
        let due = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let open = goal("a", GoalStatus::NotStarted, due);
        let busy = goal("b", GoalStatus::InProgress, due);
        let done = goal("c", GoalStatus::Completed, due);

        assert_eq!(DayTone::classify(&[]), DayTone::Empty);
        assert_eq!(DayTone::classify(&[&open]), DayTone::Open);
        assert_eq!(DayTone::classify(&[&open, &busy]), DayTone::InProgress);
        assert_eq!(DayTone::classify(&[&busy, &done]), DayTone::SomeCompleted);
        assert_eq!(DayTone::classify(&[&done]), DayTone::AllCompleted);
    }

    #[test]
    fn test_weeks_are_rows_of_seven() {
        let grid = CalendarGrid::build(CalendarMonth::new(2024, 2).unwrap(), &[], date(2024, 2, 1));
        let weeks: Vec<_> = grid.weeks().collect();
        assert_eq!(weeks.len(), 6);
        assert!(weeks.iter().all(|w| w.len() == 7 && w[0].date.weekday() == Weekday::Sun));
    }
}
