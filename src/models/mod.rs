//! Domain model
//!
//! Row types exchanged with the backend tables:
//! - `Goal`, `NewGoal`, `GoalUpdate`, `Progress`
//! - `Profile`, `FriendRequest`, `PendingRequest`, `Friend`
//! - `CalendarNote`, `NewNote`
//!
//! All rows are JSON objects with snake_case fields. Timestamp columns accept
//! the shapes the database hands back (RFC 3339, naive `timestamp`, or a bare
//! `date`) and are always written as RFC 3339.

pub mod goal;
pub mod note;
pub mod social;

pub use goal::{
    Goal, GoalFilter, GoalPriority, GoalSort, GoalStats, GoalStatus, GoalUpdate, NewGoal,
    Progress, ProgressError,
};
pub use note::{CalendarNote, NewNote};
pub use social::{
    Friend, FriendRequest, FriendRequestStatus, FriendResponse, PendingRequest, Profile,
};

/// Lenient timestamp (de)serialization for database columns
pub mod timestamp {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", raw)))
    }

    /// Parse RFC 3339, a naive timestamp (taken as UTC) or a date (midnight UTC)
    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
                return Some(naive.and_utc());
            }
        }
        // Postgres `timestamptz` text output ("2024-05-01 10:00:00+00")
        if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", raw))),
                None => Ok(None),
            }
        }
    }

}
