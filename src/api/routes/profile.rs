//! Profile Routes
//!
//! - GET /api/v1/profile - Profile of the signed-in user
//! - PUT /api/v1/profile/avatar - Upload an avatar (raw image body)
//!
//! The avatar body is the image itself. `Content-Type` must be an image
//! type; `X-File-Name` supplies the original name (for the extension).

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use std::sync::Arc;

use crate::api::dto::AvatarResponse;
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::models::Profile;

const FILE_NAME_HEADER: &str = "x-file-name";

/// GET /api/v1/profile
pub async fn get_profile(State(state): State<Arc<AppState>>) -> ApiResult<Json<Profile>> {
    Ok(Json(state.profiles.get().await?))
}

/// PUT /api/v1/profile/avatar
pub async fn upload_avatar(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<AvatarResponse>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");
    let file_name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("avatar");

    let avatar_url = state
        .profiles
        .upload_avatar(file_name, body.to_vec(), content_type)
        .await?;

    Ok(Json(AvatarResponse { avatar_url }))
}
