//! Note API endpoints
//!
//! - GET /api/files/:id/notes - List notes of a document
//! - POST /api/files/:id/notes - Pin a note on a page
//! - PUT /api/notes/:id - Edit or move a note
//! - DELETE /api/notes/:id - Remove a note

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Serialize;

use super::UserId;
use crate::annotations::{NewNote, Note, NoteChanges, NoteRepository, NoteUpdate};
use crate::error::{AppError, Result};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/files/:id/notes", get(list_notes).post(create_note))
        .route("/api/notes/:id", put(update_note).delete(delete_note))
}

#[derive(Debug, Serialize)]
pub struct NotesListResponse {
    pub notes: Vec<Note>,
    pub total: usize,
}

async fn list_notes(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(file_id): Path<String>,
) -> Result<Json<NotesListResponse>> {
    state.files().repository().require(&file_id, &user_id).await?;
    let notes = NoteRepository::new(state.db())
        .list_for_file(&file_id, &user_id)
        .await?;
    let total = notes.len();
    Ok(Json(NotesListResponse { notes, total }))
}

async fn create_note(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(file_id): Path<String>,
    Json(request): Json<NewNote>,
) -> Result<(StatusCode, Json<Note>)> {
    let file = state.files().repository().require(&file_id, &user_id).await?;
    if file.is_folder() {
        return Err(AppError::BadRequest(format!("{} is a folder", file_id)));
    }

    let note = Note::new(&file_id, request.page, request.x, request.y).with_text(&request.text);
    NoteRepository::new(state.db()).create(&note, &user_id).await?;
    tracing::debug!("Created note {} on {} page {}", note.id, file_id, note.page);
    Ok((StatusCode::CREATED, Json(note)))
}

async fn update_note(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
    Json(changes): Json<NoteChanges>,
) -> Result<Json<Note>> {
    let repo = NoteRepository::new(state.db());
    let update = NoteUpdate::from(changes);
    if !repo.update(&id, &user_id, &update).await? {
        return Err(AppError::NotFound(format!("Note not found: {}", id)));
    }

    repo.get(&id, &user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Note not found: {}", id)))
}

async fn delete_note(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if !NoteRepository::new(state.db()).delete(&id, &user_id).await? {
        return Err(AppError::NotFound(format!("Note not found: {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}
