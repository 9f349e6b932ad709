//! Saved page analysis endpoints
//!
//! - GET /api/files/:id/pages/:page/analysis - Saved analysis of a page
//! - POST /api/files/:id/pages/:page/analysis - Analyze a page and save it

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::UserId;
use crate::analysis::StoredAnalysis;
use crate::error::{AppError, Result};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/files/:id/pages/:page/analysis",
        get(get_analysis).post(create_analysis),
    )
}

#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    pub image: String,
}

async fn get_analysis(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path((file_id, page)): Path<(String, u32)>,
) -> Result<Json<StoredAnalysis>> {
    state
        .analysis()
        .saved(&user_id, &file_id, page)
        .await?
        .map(Json)
        .ok_or_else(|| {
            AppError::NotFound(format!("No analysis for {} page {}", file_id, page))
        })
}

async fn create_analysis(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path((file_id, page)): Path<(String, u32)>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<StoredAnalysis>> {
    let stored = state
        .analysis()
        .analyze_for_user(&user_id, &file_id, page, &request.image)
        .await?;
    Ok(Json(stored))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::files::{FileItem, FileRepository, StoredBlob};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_analyze_and_fetch_page() {
        let dir = tempfile::tempdir().unwrap();
        let (app, state) = test_app(&dir).await;
        let file = FileItem::file(
            "waves.pdf",
            None,
            "alice",
            StoredBlob {
                key: "files/alice/waves.pdf".to_string(),
                url: "file:///tmp/waves.pdf".to_string(),
                size: 8,
                content_type: None,
            },
        );
        FileRepository::new(state.db()).insert(&file).await.unwrap();

        let uri = format!("/api/files/{}/pages/4/analysis", file.id);
        let (status, _) = send(&app, json_request("GET", &uri, Some("alice"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let body = json!({ "image": "data:image/jpeg;base64,aGVsbG8=" });
        let (status, created) = send(&app, json_request("POST", &uri, Some("alice"), Some(body))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["pageNumber"], 4);
        assert_eq!(created["core_summary"], "Waves carry energy");

        let (status, saved) = send(&app, json_request("GET", &uri, Some("alice"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["id"], created["id"]);

        let (_, usage) = send(&app, json_request("GET", "/api/usage", Some("alice"), None)).await;
        assert_eq!(usage["remainingQuota"], 9);
    }
}
