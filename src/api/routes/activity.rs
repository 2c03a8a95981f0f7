//! Activity Routes
//!
//! - GET /api/v1/activity - Visit streak and the last 7 days
//! - POST /api/v1/activity - Record a visit of some kind

use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;

use crate::activity::ActivityTracker;
use crate::api::dto::{ActivityResponse, DayVisits, TrackActivityRequest};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;

/// GET /api/v1/activity
pub async fn get_activity(State(state): State<Arc<AppState>>) -> ApiResult<Json<ActivityResponse>> {
    let tracker = open_tracker(&state).await?;
    Ok(Json(to_response(&tracker)))
}

/// POST /api/v1/activity
pub async fn track_activity(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TrackActivityRequest>,
) -> ApiResult<Json<ActivityResponse>> {
    let kind = req.kind.trim();
    if kind.is_empty() {
        return Err(ApiError::Validation("kind is required".into()));
    }

    let session = state.sessions.require().await?;
    let (tracker, _) = state
        .track_visit(session.user_id(), kind)
        .await?
        .ok_or_else(disabled)?;
    Ok(Json(to_response(&tracker)))
}

async fn open_tracker(state: &AppState) -> ApiResult<ActivityTracker> {
    let session = state.sessions.require().await?;
    let _guard = state.activity_lock.lock().await;
    state.activity(session.user_id())?.ok_or_else(disabled)
}

fn disabled() -> ApiError {
    ApiError::NotFound("Activity log is disabled".into())
}

fn to_response(tracker: &ActivityTracker) -> ActivityResponse {
    let log = tracker.log();
    ActivityResponse {
        streak: log.streak,
        total_visits: log.total_visits,
        last_active: log.last_active,
        weekly: log
            .weekly_activity(Utc::now().date_naive())
            .into_iter()
            .map(|(date, visits)| DayVisits { date, visits })
            .collect(),
    }
}
