//! Document-level text extraction
//!
//! Drives a [`TextLayerSource`] page by page and reconstructs each page's
//! reading order.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use super::layout::{ReadingOrder, TextFragment};
use crate::error::Result;

/// Raw item as produced by a PDF text layer
///
/// `transform` is the 6-element text matrix `[a, b, c, d, e, f]`, where
/// `e`/`f` are the baseline origin in page space.
///
/// Fields of the wrong shape read as `None`, so a malformed item is skipped
/// instead of failing the whole page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextItem {
    #[serde(default, rename = "str", deserialize_with = "lenient")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub transform: Option<Vec<f64>>,
}

fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

impl TextItem {
    pub fn new(text: &str, x: f64, y: f64) -> Self {
        Self {
            text: Some(text.to_string()),
            transform: Some(vec![1.0, 0.0, 0.0, 1.0, x, y]),
        }
    }

    /// Convert to a positioned fragment, `None` for marked-content items
    pub fn fragment(&self) -> Option<TextFragment> {
        let text = self.text.as_ref()?;
        let transform = self.transform.as_ref()?;
        let (x, y) = (*transform.get(4)?, *transform.get(5)?);
        Some(TextFragment::new(text.clone(), x, y))
    }
}

/// Producer of per-page text-layer items
#[async_trait]
pub trait TextLayerSource: Send + Sync {
    /// Number of pages in the document
    fn page_count(&self) -> u32;

    /// Items for a 1-based page number
    async fn page_items(&self, page: u32) -> Result<Vec<TextItem>>;
}

/// Reconstructed text for a whole document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentText {
    pub num_pages: u32,
    /// Page text keyed by 1-based page number
    pub page_texts: BTreeMap<u32, String>,
}

/// Reconstruct every page of `source`
pub async fn extract_document_text(
    source: &dyn TextLayerSource,
    reading_order: &ReadingOrder,
) -> Result<DocumentText> {
    let num_pages = source.page_count();
    let mut page_texts = BTreeMap::new();

    for page in 1..=num_pages {
        let items = source.page_items(page).await?;
        let fragments: Vec<TextFragment> = items.iter().filter_map(TextItem::fragment).collect();
        page_texts.insert(page, reading_order.reconstruct(&fragments));
    }

    tracing::debug!("Extracted text from {} pages", num_pages);

    Ok(DocumentText {
        num_pages,
        page_texts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    struct FixtureSource {
        pages: Vec<Vec<TextItem>>,
    }

    #[async_trait]
    impl TextLayerSource for FixtureSource {
        fn page_count(&self) -> u32 {
            self.pages.len() as u32
        }

        async fn page_items(&self, page: u32) -> Result<Vec<TextItem>> {
            self.pages
                .get(page as usize - 1)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("page {}", page)))
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl TextLayerSource for BrokenSource {
        fn page_count(&self) -> u32 {
            2
        }

        async fn page_items(&self, _page: u32) -> Result<Vec<TextItem>> {
            Err(AppError::Internal("text layer unavailable".into()))
        }
    }

    #[test]
    fn test_item_to_fragment() {
        let item = TextItem::new("Hello", 12.5, 700.0);
        let fragment = item.fragment().unwrap();
        assert_eq!(fragment.baseline_x, 12.5);
        assert_eq!(fragment.baseline_y, 700.0);

        let marked = TextItem::default();
        assert!(marked.fragment().is_none());

        let short = TextItem {
            text: Some("x".into()),
            transform: Some(vec![1.0, 0.0, 0.0]),
        };
        assert!(short.fragment().is_none());
    }

    #[test]
    fn test_item_deserializes_text_layer_shape() {
        let json = r#"{"str": "Title", "transform": [12, 0, 0, 12, 72, 720], "width": 40}"#;
        let item: TextItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.fragment().unwrap().text, "Title");

        let marked: TextItem = serde_json::from_str(r#"{"type": "beginMarkedContent"}"#).unwrap();
        assert!(marked.fragment().is_none());
    }

    #[test]
    fn test_malformed_items_are_skipped() {
        let json = r#"[
            {"str": "kept", "transform": [1, 0, 0, 1, 10, 20]},
            {"str": "null entry", "transform": [1, 0, null, 1, 10, 20]},
            {"str": "words", "transform": ["a", "b"]},
            {"str": "not an array", "transform": "matrix"},
            {"str": 42, "transform": [1, 0, 0, 1, 10, 20]}
        ]"#;
        let items: Vec<TextItem> = serde_json::from_str(json).unwrap();
        assert_eq!(items.len(), 5);

        let texts: Vec<String> = items
            .iter()
            .filter_map(TextItem::fragment)
            .map(|f| f.text)
            .collect();
        assert_eq!(texts, vec!["kept"]);
    }

    #[tokio::test]
    async fn test_extract_document_text() {
        let source = FixtureSource {
            pages: vec![
                vec![
                    TextItem::new("World", 50.0, 100.0),
                    TextItem::new("Hello", 0.0, 100.0),
                ],
                vec![
                    TextItem::new("Line2", 0.0, 100.0),
                    TextItem::default(),
                    TextItem::new("Line1", 0.0, 200.0),
                ],
                vec![],
            ],
        };

        let text = extract_document_text(&source, &ReadingOrder::default())
            .await
            .unwrap();

        assert_eq!(text.num_pages, 3);
        assert_eq!(text.page_texts[&1], "Hello World");
        assert_eq!(text.page_texts[&2], "Line1\nLine2");
        assert_eq!(text.page_texts[&3], "");
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let result = extract_document_text(&BrokenSource, &ReadingOrder::default()).await;
        assert!(result.is_err());
    }
}
