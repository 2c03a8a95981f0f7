//! Goals

use serde_json::json;
use std::sync::Arc;

use super::{touched, ServiceError, ServiceResult};
use crate::backend::{from_row, from_rows, tables, to_row, Filter, TableQuery};
use crate::models::{Goal, GoalFilter, GoalSort, GoalStats, GoalStatus, GoalUpdate, NewGoal};
use crate::session::SessionManager;

/// CRUD for the signed-in user's goals
#[derive(Clone)]
pub struct GoalService {
    sessions: Arc<SessionManager>,
}

impl GoalService {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    /// Create a goal owned by the current user
    pub async fn create(&self, goal: NewGoal) -> ServiceResult<Goal> {
        let session = self.sessions.require().await?;
        if goal.title.trim().is_empty() {
            return Err(ServiceError::validation("Title is required"));
        }

        let mut row = to_row(&goal)?;
        row.insert("user_id".into(), json!(session.user_id()));
        row.insert("status".into(), json!(GoalStatus::NotStarted));
        row.insert("progress".into(), json!(0));

        let stored = self
            .sessions
            .backend()
            .insert(&session.credentials(), tables::GOALS, row)
            .await?;

        let goal: Goal = from_row(stored)?;
        tracing::info!(goal_id = %goal.id, title = %goal.title, "Goal created");
        Ok(goal)
    }

    /// All goals of the current user, earliest due date first
    pub async fn list(&self) -> ServiceResult<Vec<Goal>> {
        let session = self.sessions.require().await?;

        let rows = self
            .sessions
            .backend()
            .select(
                &session.credentials(),
                tables::GOALS,
                TableQuery::new()
                    .filter(Filter::eq("user_id", session.user_id()))
                    .order("due_date", true),
            )
            .await?;

        Ok(from_rows(rows)?)
    }

    /// Apply a partial update and return the stored goal
    pub async fn update(&self, id: &str, update: GoalUpdate) -> ServiceResult<Goal> {
        let session = self.sessions.require().await?;
        if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ServiceError::validation("Title is required"));
        }

        let rows = self
            .sessions
            .backend()
            .update(
                &session.credentials(),
                tables::GOALS,
                touched(to_row(&update)?),
                vec![Filter::eq("id", id)],
            )
            .await?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound("Goal".into()))?;
        let goal: Goal = from_row(row)?;
        tracing::debug!(goal_id = id, status = %goal.status, progress = %goal.progress, "Goal updated");
        Ok(goal)
    }

    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        let session = self.sessions.require().await?;

        self.sessions
            .backend()
            .delete(&session.credentials(), tables::GOALS, vec![Filter::eq("id", id)])
            .await?;

        tracing::info!(goal_id = id, "Goal deleted");
        Ok(())
    }

    /// Goals filtered by status and sorted for display
    pub async fn list_view(&self, filter: GoalFilter, sort: GoalSort) -> ServiceResult<Vec<Goal>> {
        let mut goals: Vec<Goal> = self
            .list()
            .await?
            .into_iter()
            .filter(|g| filter.matches(g))
            .collect();
        // stable sort keeps due-date order within a priority
        goals.sort_by(|a, b| sort.compare(a, b));
        Ok(goals)
    }

    pub async fn stats(&self) -> ServiceResult<GoalStats> {
        Ok(GoalStats::from_goals(&self.list().await?))
    }
}
