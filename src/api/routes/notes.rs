//! Calendar Note Routes
//!
//! - GET /api/v1/notes?date=YYYY-MM-DD - Notes for one day, newest first
//! - POST /api/v1/notes - Add a note to a day
//! - PATCH /api/v1/notes/:id - Replace the content
//! - DELETE /api/v1/notes/:id - Delete a note

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{NoteListParams, UpdateNoteRequest};
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::models::{CalendarNote, NewNote};

/// GET /api/v1/notes
pub async fn list_notes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NoteListParams>,
) -> ApiResult<Json<Vec<CalendarNote>>> {
    Ok(Json(state.notes.for_date(params.date).await?))
}

/// POST /api/v1/notes
pub async fn create_note(
    State(state): State<Arc<AppState>>,
    Json(note): Json<NewNote>,
) -> ApiResult<(StatusCode, Json<CalendarNote>)> {
    let note = state.notes.create(note).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// PATCH /api/v1/notes/:id
pub async fn update_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateNoteRequest>,
) -> ApiResult<Json<CalendarNote>> {
    Ok(Json(state.notes.update(&id, &req.content).await?))
}

/// DELETE /api/v1/notes/:id
pub async fn delete_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.notes.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
