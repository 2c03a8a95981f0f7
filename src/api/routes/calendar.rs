//! Calendar Routes
//!
//! - GET /api/v1/calendar?year=&month= - 42-day month grid with goals

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{FixedOffset, Offset, Utc};
use std::sync::Arc;

use crate::api::dto::CalendarParams;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::calendar::{CalendarGrid, CalendarMonth};

/// GET /api/v1/calendar
///
/// Month view for the signed-in user's goals. Without parameters the
/// current month is returned.
pub async fn month_view(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CalendarParams>,
) -> ApiResult<Json<CalendarGrid>> {
    let offset = match params.utc_offset_minutes {
        Some(minutes) => minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ApiError::Validation(format!("Invalid UTC offset: {}", minutes)))?,
        None => Utc.fix(),
    };
    let today = Utc::now().with_timezone(&offset).date_naive();

    let month = match (params.year, params.month) {
        (None, None) => CalendarMonth::containing(today),
        (year, month) => {
            let current = CalendarMonth::containing(today);
            let year = year.unwrap_or(current.year);
            let month = month.unwrap_or(current.month);
            CalendarMonth::new(year, month)
                .ok_or_else(|| ApiError::Validation(format!("Invalid month: {}", month)))?
        }
    };

    let goals = state.goals.list().await?;
    Ok(Json(CalendarGrid::build_with_offset(month, &goals, today, offset)))
}
