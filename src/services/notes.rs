//! Calendar notes

use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;

use super::{touched, ServiceError, ServiceResult};
use crate::backend::{from_row, from_rows, tables, to_row, Filter, Row, TableQuery};
use crate::models::{CalendarNote, NewNote};
use crate::session::SessionManager;

#[derive(Clone)]
pub struct NoteService {
    sessions: Arc<SessionManager>,
}

impl NoteService {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    pub async fn create(&self, note: NewNote) -> ServiceResult<CalendarNote> {
        let session = self.sessions.require().await?;
        if note.content.trim().is_empty() {
            return Err(ServiceError::validation("Note content is required"));
        }

        let mut row = to_row(&note)?;
        row.insert("user_id".into(), json!(session.user_id()));

        let stored = self
            .sessions
            .backend()
            .insert(&session.credentials(), tables::CALENDAR_NOTES, row)
            .await?;
        Ok(from_row(stored)?)
    }

    /// Notes of the current user on `date`, newest first
    pub async fn for_date(&self, date: NaiveDate) -> ServiceResult<Vec<CalendarNote>> {
        let session = self.sessions.require().await?;

        let rows = self
            .sessions
            .backend()
            .select(
                &session.credentials(),
                tables::CALENDAR_NOTES,
                TableQuery::new()
                    .filter(Filter::eq("user_id", session.user_id()))
                    .filter(Filter::eq("date", date.to_string()))
                    .order("created_at", false),
            )
            .await?;
        Ok(from_rows(rows)?)
    }

    pub async fn update(&self, id: &str, content: &str) -> ServiceResult<CalendarNote> {
        let session = self.sessions.require().await?;

        let mut patch = Row::new();
        patch.insert("content".into(), json!(content));

        let rows = self
            .sessions
            .backend()
            .update(
                &session.credentials(),
                tables::CALENDAR_NOTES,
                touched(patch),
                vec![Filter::eq("id", id)],
            )
            .await?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound("Note".into()))?;
        Ok(from_row(row)?)
    }

    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        let session = self.sessions.require().await?;

        self.sessions
            .backend()
            .delete(
                &session.credentials(),
                tables::CALENDAR_NOTES,
                vec![Filter::eq("id", id)],
            )
            .await?;
        Ok(())
    }
}
