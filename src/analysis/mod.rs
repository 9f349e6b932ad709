//! AI page analysis module
//!
//! Sends rendered pages to a vision-capable language model and keeps the
//! structured explanations per user and page, metered by a usage quota.

mod provider;
mod quota;
mod service;
mod store;
mod types;

#[cfg(test)]
pub use provider::MockProvider;
pub use provider::{parse_analysis, AnalysisProvider, OpenAiProvider};
pub use quota::QuotaRepository;
pub use service::AnalysisService;
pub use store::AnalysisRepository;
pub use types::{AiUsage, AnalysisError, PageAnalysis, PageImage, StoredAnalysis};
