//! Goal Routes
//!
//! - GET /api/v1/goals - List goals (`status`, `sort` query parameters)
//! - POST /api/v1/goals - Create a goal
//! - PATCH /api/v1/goals/:id - Update fields, status or progress
//! - DELETE /api/v1/goals/:id - Delete a goal
//! - GET /api/v1/goals/stats - Completed/active counters

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{CreateGoalRequest, GoalListParams, GoalStatsResponse, UpdateGoalRequest};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::models::{Goal, GoalFilter, GoalSort, GoalUpdate, NewGoal, Progress};

/// GET /api/v1/goals
///
/// Goals of the signed-in user. Defaults to all goals by due date.
pub async fn list_goals(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GoalListParams>,
) -> ApiResult<Json<Vec<Goal>>> {
    let filter: GoalFilter = match params.status.as_deref() {
        Some(s) => s.parse().map_err(ApiError::Validation)?,
        None => GoalFilter::All,
    };
    let sort: GoalSort = match params.sort.as_deref() {
        Some(s) => s.parse().map_err(ApiError::Validation)?,
        None => GoalSort::DueDate,
    };

    Ok(Json(state.goals.list_view(filter, sort).await?))
}

/// POST /api/v1/goals
pub async fn create_goal(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateGoalRequest>,
) -> ApiResult<(StatusCode, Json<Goal>)> {
    let mut goal = NewGoal::new(req.title.trim(), req.due_date).priority(req.priority);
    if let Some(description) = req.description.filter(|d| !d.trim().is_empty()) {
        goal = goal.description(description);
    }

    let goal = state.goals.create(goal).await?;
    state.record_activity(&goal.user_id, "goal_created").await;

    Ok((StatusCode::CREATED, Json(goal)))
}

/// PATCH /api/v1/goals/:id
pub async fn update_goal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateGoalRequest>,
) -> ApiResult<Json<Goal>> {
    let progress = req
        .progress
        .map(Progress::new)
        .transpose()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let update = GoalUpdate {
        title: req.title,
        description: req.description,
        due_date: req.due_date,
        priority: req.priority,
        status: req.status,
        progress,
    };
    if update.is_empty() {
        return Err(ApiError::Validation("Nothing to update".into()));
    }

    Ok(Json(state.goals.update(&id, update).await?))
}

/// DELETE /api/v1/goals/:id
pub async fn delete_goal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.goals.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/goals/stats
pub async fn goal_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<GoalStatsResponse>> {
    let session = state.sessions.require().await?;
    let stats = state.goals.stats().await?;

    Ok(Json(GoalStatsResponse {
        stats,
        login_streak: session.login_streak,
    }))
}
