//! Dashboard Routes
//!
//! - GET /api/v1/dashboard - Streak, goal counters and friend counts

use axum::{extract::State, Json};
use futures_util::future::try_join4;
use std::sync::Arc;

use crate::api::dto::DashboardResponse;
use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// GET /api/v1/dashboard
///
/// The four lookups run concurrently; any failure fails the whole view.
pub async fn dashboard(State(state): State<Arc<AppState>>) -> ApiResult<Json<DashboardResponse>> {
    let session = state.sessions.require().await?;

    let (stats, friends, pending, profile) = try_join4(
        state.goals.stats(),
        state.friends.friends(),
        state.friends.pending_requests(),
        state.profiles.get(),
    )
    .await?;

    Ok(Json(DashboardResponse {
        username: Some(profile.username),
        login_streak: session.login_streak,
        goals: stats,
        friends: friends.len(),
        pending_requests: pending.len(),
    }))
}
