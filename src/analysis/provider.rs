//! Analysis providers
//!
//! Defines the provider trait and the hosted chat-completions implementation.

use async_trait::async_trait;

use super::types::{AnalysisError, PageAnalysis, PageImage};
use crate::config::AnalysisConfig;

const SYSTEM_PROMPT: &str = "You are a friendly professor who explains lecture material. \
Explain the page so a student can follow it, add the background knowledge it assumes, \
and point out anything likely to appear in an exam. Respond with a JSON object with the keys \
core_summary (string), easy_explanation (string), examples_or_analogies (string), \
exam_points (array of strings) and term_definitions (array of strings formatted as \"term: definition\").";

/// Page analysis provider trait
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Provider name used in logs
    fn name(&self) -> &str;

    /// Analyze one rendered page
    async fn analyze_page(
        &self,
        image: &PageImage,
        page_number: u32,
    ) -> Result<PageAnalysis, AnalysisError>;
}

/// OpenAI-compatible chat completions provider
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
}

impl OpenAiProvider {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    fn request_body(&self, image: &PageImage, page_number: u32) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": [
                        {
                            "type": "text",
                            "text": format!(
                                "Analyze page {} of this lecture material. Explain it clearly and include the background knowledge it needs.",
                                page_number
                            )
                        },
                        { "type": "image_url", "image_url": { "url": image.data_url() } }
                    ]
                }
            ],
            "max_tokens": self.max_tokens,
            "response_format": { "type": "json_object" }
        })
    }
}

#[async_trait]
impl AnalysisProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn analyze_page(
        &self,
        image: &PageImage,
        page_number: u32,
    ) -> Result<PageAnalysis, AnalysisError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AnalysisError::NotConfigured("OPENAI_API_KEY is not set".to_string()))?;

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&self.request_body(image, page_number))
            .send()
            .await
            .map_err(|e| AnalysisError::ApiError(format!("Failed to call model API: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::ApiError(format!(
                "Model API returned {}: {}",
                status, body
            )));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AnalysisError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let content = result["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AnalysisError::InvalidResponse("Response has no message content".to_string()))?;

        parse_analysis(content)
    }
}

/// Parse the model's message content, tolerating a fenced code block
pub fn parse_analysis(content: &str) -> Result<PageAnalysis, AnalysisError> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(body.trim())
        .map_err(|e| AnalysisError::InvalidResponse(format!("Content is not an analysis: {}", e)))
}

/// Mock provider for testing
#[cfg(test)]
pub struct MockProvider {
    pub analysis: PageAnalysis,
    pub fail: bool,
    pub calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockProvider {
    pub fn new() -> Self {
        Self {
            analysis: PageAnalysis {
                core_summary: "Waves carry energy".to_string(),
                easy_explanation: "Like ripples in a pond".to_string(),
                examples_or_analogies: "Sound, light".to_string(),
                exam_points: vec!["v = f * lambda".to_string()],
                term_definitions: Some(vec!["Amplitude: height of a wave".to_string()]),
            },
            fail: false,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl AnalysisProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn analyze_page(
        &self,
        _image: &PageImage,
        _page_number: u32,
    ) -> Result<PageAnalysis, AnalysisError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.fail {
            return Err(AnalysisError::ApiError("mock failure".to_string()));
        }
        Ok(self.analysis.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: Option<&str>) -> AnalysisConfig {
        AnalysisConfig {
            api_key: api_key.map(str::to_string),
            base_url: "https://api.example.com/v1/".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1000,
            default_quota: 10,
        }
    }

    #[test]
    fn test_parse_analysis() {
        let content = r#"{"core_summary":"s","easy_explanation":"e","examples_or_analogies":"x","exam_points":["p1","p2"]}"#;
        let analysis = parse_analysis(content).unwrap();
        assert_eq!(analysis.exam_points, vec!["p1", "p2"]);
        assert!(analysis.term_definitions.is_none());

        let fenced = format!("```json\n{}\n```", content);
        assert_eq!(parse_analysis(&fenced).unwrap(), analysis);

        assert!(parse_analysis("The page is about waves.").is_err());
    }

    #[test]
    fn test_request_body() {
        let provider = OpenAiProvider::new(&config(Some("sk-test")));
        let image = PageImage::from_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        let body = provider.request_body(&image, 4);

        assert_eq!(provider.base_url, "https://api.example.com/v1");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(
            body["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,aGVsbG8="
        );
        assert!(body["messages"][1]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("page 4"));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let provider = OpenAiProvider::new(&config(None));
        let image = PageImage::from_data_url("aGVsbG8=").unwrap();
        let result = provider.analyze_page(&image, 1).await;
        assert!(matches!(result, Err(AnalysisError::NotConfigured(_))));
    }
}
