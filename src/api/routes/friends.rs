//! Friend Routes
//!
//! - GET /api/v1/friends - Accepted friends with presence
//! - POST /api/v1/friends/requests - Send a friend request
//! - GET /api/v1/friends/requests - Pending requests addressed to me
//! - POST /api/v1/friends/requests/:id/accept - Accept a request
//! - POST /api/v1/friends/requests/:id/reject - Reject a request
//! - PUT /api/v1/presence - Set the online flag

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{PresenceRequest, SendFriendRequest};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::models::{Friend, FriendRequest, FriendResponse, PendingRequest};
use crate::services::ServiceError;

/// GET /api/v1/friends
pub async fn list_friends(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Friend>>> {
    Ok(Json(state.friends.friends().await?))
}

/// POST /api/v1/friends/requests
///
/// The request is tracked per sender and receiver: while one is still in
/// flight another send to the same user answers 409. Later sends go through
/// the service's pending-pair check.
pub async fn send_request(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendFriendRequest>,
) -> ApiResult<(StatusCode, Json<FriendRequest>)> {
    let receiver_id = req.receiver_id.trim().to_string();
    if receiver_id.is_empty() {
        return Err(ApiError::Validation("receiver_id is required".into()));
    }

    let session = state.sessions.require().await?;
    let key = (session.user_id().to_string(), receiver_id.clone());

    let request = state
        .friend_requests
        .track(key, || state.friends.send_request(&receiver_id))
        .await
        .map_err(|_| ApiError::from(ServiceError::DuplicateRequest))??;

    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /api/v1/friends/requests
pub async fn pending_requests(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<PendingRequest>>> {
    Ok(Json(state.friends.pending_requests().await?))
}

/// POST /api/v1/friends/requests/:id/accept
pub async fn accept_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<FriendRequest>> {
    Ok(Json(state.friends.respond(&id, FriendResponse::Accepted).await?))
}

/// POST /api/v1/friends/requests/:id/reject
pub async fn reject_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<FriendRequest>> {
    Ok(Json(state.friends.respond(&id, FriendResponse::Rejected).await?))
}

/// PUT /api/v1/presence
pub async fn set_presence(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PresenceRequest>,
) -> ApiResult<StatusCode> {
    state.friends.set_online(req.online).await?;
    Ok(StatusCode::NO_CONTENT)
}
