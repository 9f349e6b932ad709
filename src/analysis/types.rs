//! Page analysis types

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Structured explanation of one page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageAnalysis {
    #[serde(default)]
    pub core_summary: String,
    #[serde(default)]
    pub easy_explanation: String,
    #[serde(default)]
    pub examples_or_analogies: String,
    #[serde(default)]
    pub exam_points: Vec<String>,
    /// Entries formatted as `"term: definition"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_definitions: Option<Vec<String>>,
}

impl PageAnalysis {
    /// Term definitions split into `(term, definition)` pairs
    pub fn terms(&self) -> Vec<(&str, &str)> {
        self.term_definitions
            .iter()
            .flatten()
            .filter_map(|entry| entry.split_once(':'))
            .map(|(term, definition)| (term.trim(), definition.trim()))
            .collect()
    }
}

/// A rendered page image, base64 JPEG
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    base64: String,
}

impl PageImage {
    /// Accept a data URL (`data:image/jpeg;base64,...`) or bare base64
    pub fn from_data_url(input: &str) -> Result<Self, AnalysisError> {
        let payload = match input.split_once(',') {
            Some((header, data)) if header.starts_with("data:") => data,
            _ => input,
        }
        .trim();

        if payload.is_empty() {
            return Err(AnalysisError::InvalidImage("image data is empty".to_string()));
        }

        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| AnalysisError::InvalidImage(format!("image is not valid base64: {}", e)))?;

        Ok(Self {
            base64: payload.to_string(),
        })
    }

    pub fn base64(&self) -> &str {
        &self.base64
    }

    /// JPEG data URL for the model API
    pub fn data_url(&self) -> String {
        format!("data:image/jpeg;base64,{}", self.base64)
    }
}

/// An analysis stored for a user's document page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAnalysis {
    pub id: String,
    pub file_id: String,
    pub user_id: String,
    pub page_number: u32,
    #[serde(flatten)]
    pub analysis: PageAnalysis,
    pub created_at: DateTime<Utc>,
}

/// Remaining AI analyses for a user
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiUsage {
    pub user_id: String,
    pub remaining_quota: i64,
    pub updated_at: DateTime<Utc>,
}

/// Analysis error types
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Analysis provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),
}

impl AnalysisError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::MissingInput(_) | Self::InvalidImage(_) => StatusCode::BAD_REQUEST,
            Self::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AnalysisError> for AppError {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::MissingInput(_) | AnalysisError::InvalidImage(_) => {
                AppError::BadRequest(e.to_string())
            }
            AnalysisError::NotConfigured(_) => AppError::Internal(e.to_string()),
            AnalysisError::ApiError(_) | AnalysisError::InvalidResponse(_) => {
                AppError::Upstream(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_image_from_data_url() {
        let image = PageImage::from_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(image.base64(), "aGVsbG8=");
        assert_eq!(image.data_url(), "data:image/jpeg;base64,aGVsbG8=");

        let bare = PageImage::from_data_url("aGVsbG8=").unwrap();
        assert_eq!(bare, image);
    }

    #[test]
    fn test_page_image_rejects_garbage() {
        assert!(PageImage::from_data_url("data:image/jpeg;base64,").is_err());
        assert!(PageImage::from_data_url("not base64!!").is_err());
    }

    #[test]
    fn test_terms() {
        let analysis = PageAnalysis {
            term_definitions: Some(vec![
                "Entropy: a measure of disorder".into(),
                "no separator".into(),
                "Ratio : a: b".into(),
            ]),
            ..Default::default()
        };
        assert_eq!(
            analysis.terms(),
            vec![("Entropy", "a measure of disorder"), ("Ratio", "a: b")]
        );
    }

    #[test]
    fn test_stored_analysis_flattens_fields() {
        let stored = StoredAnalysis {
            id: "a1".into(),
            file_id: "f1".into(),
            user_id: "alice".into(),
            page_number: 3,
            analysis: PageAnalysis {
                core_summary: "summary".into(),
                exam_points: vec!["point".into()],
                ..Default::default()
            },
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["pageNumber"], 3);
        assert_eq!(json["core_summary"], "summary");
        assert!(json.get("term_definitions").is_none());
    }
}
