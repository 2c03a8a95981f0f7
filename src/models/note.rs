//! Calendar notes

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;

/// Free-text note attached to a calendar day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarNote {
    pub id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub content: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Create payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewNote {
    pub date: NaiveDate,
    pub content: String,
}
