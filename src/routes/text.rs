//! Text extraction endpoint
//!
//! - POST /api/extract-text - Rebuild reading order from text-layer items

use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::text::{extract_document_text, DocumentText, TextItem, TextLayerSource};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/extract-text", post(extract_text))
}

#[derive(Debug, Deserialize)]
pub struct ExtractTextRequest {
    pub pages: Vec<PageItems>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageItems {
    pub page_number: u32,
    #[serde(default)]
    pub items: Vec<TextItem>,
}

/// Text layer supplied in the request body
///
/// Pages absent from the request (below the highest page number) are empty.
struct RequestTextLayer {
    pages: BTreeMap<u32, Vec<TextItem>>,
}

impl RequestTextLayer {
    fn new(request: ExtractTextRequest, max_pages: u32) -> Result<Self> {
        let mut pages: BTreeMap<u32, Vec<TextItem>> = BTreeMap::new();
        for page in request.pages {
            if page.page_number == 0 {
                return Err(AppError::BadRequest("Page numbers start at 1".to_string()));
            }
            if page.page_number > max_pages {
                return Err(AppError::BadRequest(format!(
                    "Page {} exceeds the limit of {} pages",
                    page.page_number, max_pages
                )));
            }
            pages.entry(page.page_number).or_default().extend(page.items);
        }
        Ok(Self { pages })
    }
}

#[async_trait]
impl TextLayerSource for RequestTextLayer {
    fn page_count(&self) -> u32 {
        self.pages.keys().next_back().copied().unwrap_or(0)
    }

    async fn page_items(&self, page: u32) -> Result<Vec<TextItem>> {
        Ok(self.pages.get(&page).cloned().unwrap_or_default())
    }
}

async fn extract_text(
    State(state): State<AppState>,
    Json(request): Json<ExtractTextRequest>,
) -> Result<Json<DocumentText>> {
    let source = RequestTextLayer::new(request, state.config().text.max_pages)?;
    let text = extract_document_text(&source, state.reading_order()).await?;
    Ok(Json(text))
}
