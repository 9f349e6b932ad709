//! File tree endpoints
//!
//! Endpoints:
//! - GET /api/files?parentId= - List a folder (or the root), newest first
//! - POST /api/files/folders - Create a folder
//! - POST /api/files/upload - Upload a PDF (multipart `file`, optional `parentId`)
//! - GET /api/files/:id - Get one item
//! - GET /api/files/:id/path - Breadcrumb from the root
//! - PUT /api/files/:id/move - Move into another folder or the root
//! - DELETE /api/files/:id - Delete an item and everything below it

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::UserId;
use crate::error::{AppError, Result};
use crate::files::{CreateFolderRequest, FileItem, MoveRequest};
use crate::state::AppState;

/// Largest accepted upload
const MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_files))
        .route("/folders", post(create_folder))
        .route(
            "/upload",
            post(upload_file).layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE)),
        )
        .route("/:id", get(get_file).delete(delete_file))
        .route("/:id/path", get(get_path))
        .route("/:id/move", put(move_file))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    parent_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub items: Vec<FileItem>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: usize,
}

async fn list_files(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Query(params): Query<ListParams>,
) -> Result<Json<FileListResponse>> {
    let parent_id = params.parent_id.filter(|p| !p.is_empty());
    let items = state
        .files()
        .repository()
        .list(parent_id.as_deref(), &user_id)
        .await?;
    let total = items.len();
    Ok(Json(FileListResponse { items, total }))
}

async fn create_folder(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(request): Json<CreateFolderRequest>,
) -> Result<(StatusCode, Json<FileItem>)> {
    let folder = state
        .files()
        .create_folder(&request.name, request.parent_id.as_deref(), &user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(folder)))
}

async fn upload_file(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileItem>)> {
    let mut parent_id: Option<String> = None;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Failed to read upload: {}", e))
    })? {
        match field.name().unwrap_or("") {
            "parentId" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid parentId: {}", e)))?;
                parent_id = Some(value).filter(|v| !v.is_empty());
            }
            "file" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::BadRequest("Uploaded file has no name".to_string()))?;
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file data: {}", e)))?;
                tracing::debug!("Read {} bytes of {}", data.len(), file_name);
                upload = Some((file_name, content_type, data));
            }
            other => tracing::debug!("Ignoring multipart field '{}'", other),
        }
    }

    let Some((file_name, content_type, data)) = upload else {
        tracing::warn!("No file field found in multipart upload");
        return Err(AppError::BadRequest(
            "No file provided. Use field name 'file'".to_string(),
        ));
    };

    let item = state
        .files()
        .upload(
            &file_name,
            parent_id.as_deref(),
            &user_id,
            &data,
            content_type.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn get_file(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
) -> Result<Json<FileItem>> {
    Ok(Json(state.files().repository().require(&id, &user_id).await?))
}

async fn get_path(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
) -> Result<Json<Vec<FileItem>>> {
    Ok(Json(state.files().repository().path(&id, &user_id).await?))
}

async fn move_file(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
    Json(request): Json<MoveRequest>,
) -> Result<Json<FileItem>> {
    let item = state
        .files()
        .repository()
        .move_item(&id, request.target_folder_id.as_deref(), &user_id)
        .await?;
    Ok(Json(item))
}

async fn delete_file(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let deleted = state.files().delete(&id, &user_id).await?;
    Ok(Json(DeleteResponse { deleted }))
}
