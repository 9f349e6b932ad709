//! Stateless page analysis endpoint
//!
//! - POST /api/analyze-pdf - Explain one rendered page
//!
//! Errors use a bare `{ "error": ... }` body so existing clients keep working.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::analysis::{PageAnalysis, PageImage};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/analyze-pdf", post(analyze_pdf))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub page_number: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

async fn analyze_pdf(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<PageAnalysis>, ApiError> {
    let Json(request) = body.map_err(|rejection| {
        tracing::warn!("Rejected analysis body: {}", rejection.body_text());
        error(StatusCode::BAD_REQUEST, "Invalid request body")
    })?;
    let image = request.image.filter(|image| !image.is_empty());
    let page_number = request.page_number.filter(|page| *page > 0);
    let (Some(image), Some(page_number)) = (image, page_number) else {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "An image and a page number are required",
        ));
    };

    let result = match PageImage::from_data_url(&image) {
        Ok(image) => state.analysis().analyze(&image, page_number).await,
        Err(e) => Err(e),
    };

    result.map(Json).map_err(|e| {
        if e.status_code().is_client_error() {
            tracing::warn!("Rejected analysis request: {}", e);
            error(StatusCode::BAD_REQUEST, &e.to_string())
        } else {
            tracing::error!("Page analysis failed: {}", e);
            error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An error occurred while analyzing the PDF",
            )
        }
    })
}
