//! User Search Routes
//!
//! - GET /api/v1/users/search?q=&limit=&offset= - Debounced username search

use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{UserSearchHit, UserSearchParams, UserSearchResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;

const MAX_PAGE_SIZE: usize = 100;

/// GET /api/v1/users/search
///
/// Waits out the debounce delay. When a newer search arrives in the
/// meantime this one answers `superseded: true` with no results. Each hit
/// carries the state of a friend request sent from this server.
pub async fn search_users(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UserSearchParams>,
) -> ApiResult<Json<UserSearchResponse>> {
    let limit = params.limit.unwrap_or_else(|| state.search.page_size());
    if limit > MAX_PAGE_SIZE {
        return Err(ApiError::Validation(format!(
            "limit must be at most {}",
            MAX_PAGE_SIZE
        )));
    }

    if params.offset.checked_add(limit).is_none() {
        return Err(ApiError::Validation(format!(
            "offset out of range: {}",
            params.offset
        )));
    }

    let session = state.sessions.require().await?;
    let profiles = match state
        .search
        .search_page(params.q.trim(), limit, params.offset)
        .await?
    {
        Some(profiles) => profiles,
        None => {
            return Ok(Json(UserSearchResponse {
                superseded: true,
                results: Vec::new(),
            }))
        }
    };

    let mut results = Vec::with_capacity(profiles.len());
    for profile in profiles {
        let key = (session.user_id().to_string(), profile.id.clone());
        let request = state.friend_requests.get(&key).await;
        results.push(UserSearchHit { profile, request });
    }

    Ok(Json(UserSearchResponse {
        superseded: false,
        results,
    }))
}
