//! Page analysis service
//!
//! Ties the model provider to file ownership, the usage quota and the
//! per-page result cache.

use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::provider::AnalysisProvider;
use super::quota::QuotaRepository;
use super::store::AnalysisRepository;
use super::types::{AiUsage, AnalysisError, PageAnalysis, PageImage, StoredAnalysis};
use crate::error::{AppError, Result};
use crate::files::FileRepository;

/// Analysis service
#[derive(Clone)]
pub struct AnalysisService {
    pool: SqlitePool,
    provider: Arc<dyn AnalysisProvider>,
    default_quota: i64,
}

impl AnalysisService {
    pub fn new(pool: SqlitePool, provider: Arc<dyn AnalysisProvider>, default_quota: i64) -> Self {
        Self {
            pool,
            provider,
            default_quota,
        }
    }

    /// Analyze a page without quota or persistence
    pub async fn analyze(
        &self,
        image: &PageImage,
        page_number: u32,
    ) -> std::result::Result<PageAnalysis, AnalysisError> {
        if page_number == 0 {
            return Err(AnalysisError::MissingInput("pageNumber".to_string()));
        }
        tracing::debug!("Analyzing page {} with {}", page_number, self.provider.name());
        self.provider.analyze_page(image, page_number).await
    }

    /// Analyze a page of a user's file, charging one unit of quota
    pub async fn analyze_for_user(
        &self,
        user_id: &str,
        file_id: &str,
        page_number: u32,
        image_data: &str,
    ) -> Result<StoredAnalysis> {
        let file = FileRepository::new(&self.pool).require(file_id, user_id).await?;
        if file.is_folder() {
            return Err(AppError::BadRequest(format!("{} is a folder", file_id)));
        }
        if page_number == 0 {
            return Err(AppError::BadRequest("Page numbers start at 1".to_string()));
        }
        let image = PageImage::from_data_url(image_data)?;

        let quota = QuotaRepository::new(&self.pool);
        quota.get_or_initialize(user_id, self.default_quota).await?;
        let usage = quota.decrement(user_id).await?;

        let analysis = match self.analyze(&image, page_number).await {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!(
                    "Analysis of {} page {} failed, refunding quota: {}",
                    file_id,
                    page_number,
                    e
                );
                if let Err(refund) = quota.refund(user_id).await {
                    tracing::error!("Failed to refund quota for {}: {}", user_id, refund);
                }
                return Err(e.into());
            }
        };

        let stored = StoredAnalysis {
            id: Uuid::new_v4().to_string(),
            file_id: file_id.to_string(),
            user_id: user_id.to_string(),
            page_number,
            analysis,
            created_at: Utc::now(),
        };
        AnalysisRepository::new(&self.pool).save(&stored).await?;

        tracing::info!(
            "Analyzed {} page {} for {} ({} analyses left)",
            file_id,
            page_number,
            user_id,
            usage.remaining_quota
        );
        Ok(stored)
    }

    /// The saved analysis for a page, if any
    pub async fn saved(
        &self,
        user_id: &str,
        file_id: &str,
        page_number: u32,
    ) -> Result<Option<StoredAnalysis>> {
        FileRepository::new(&self.pool).require(file_id, user_id).await?;
        AnalysisRepository::new(&self.pool)
            .get(file_id, page_number, user_id)
            .await
    }

    /// Remaining quota, initializing the counter on first read
    pub async fn usage(&self, user_id: &str) -> Result<AiUsage> {
        QuotaRepository::new(&self.pool)
            .get_or_initialize(user_id, self.default_quota)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::provider::MockProvider;
    use crate::db::test_pool;
    use crate::files::FileItem;

    const IMAGE: &str = "data:image/jpeg;base64,aGVsbG8=";

    async fn setup(provider: Arc<MockProvider>, quota: i64) -> (AnalysisService, FileItem) {
        let pool = test_pool().await;
        let file = FileItem::file(
            "waves.pdf",
            None,
            "alice",
            crate::files::StoredBlob {
                key: "files/alice/waves.pdf".to_string(),
                url: "file:///tmp/waves.pdf".to_string(),
                size: 8,
                content_type: None,
            },
        );
        FileRepository::new(&pool).insert(&file).await.unwrap();
        (AnalysisService::new(pool, provider, quota), file)
    }

    #[tokio::test]
    async fn test_analyze_for_user_saves_and_charges() {
        let provider = Arc::new(MockProvider::new());
        let (service, file) = setup(provider.clone(), 2).await;

        let stored = service
            .analyze_for_user("alice", &file.id, 3, IMAGE)
            .await
            .unwrap();
        assert_eq!(stored.page_number, 3);
        assert_eq!(stored.analysis.core_summary, "Waves carry energy");

        let saved = service.saved("alice", &file.id, 3).await.unwrap().unwrap();
        assert_eq!(saved.analysis, stored.analysis);
        assert_eq!(service.usage("alice").await.unwrap().remaining_quota, 1);
    }

    #[tokio::test]
    async fn test_quota_exhausted_skips_provider() {
        let provider = Arc::new(MockProvider::new());
        let (service, file) = setup(provider.clone(), 0).await;

        let result = service.analyze_for_user("alice", &file.id, 1, IMAGE).await;
        assert!(matches!(result, Err(AppError::QuotaExhausted(_))));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_refunds() {
        let provider = Arc::new(MockProvider::failing());
        let (service, file) = setup(provider.clone(), 1).await;

        let result = service.analyze_for_user("alice", &file.id, 1, IMAGE).await;
        assert!(matches!(result, Err(AppError::Upstream(_))));
        assert_eq!(provider.call_count(), 1);
        assert_eq!(service.usage("alice").await.unwrap().remaining_quota, 1);
        assert!(service.saved("alice", &file.id, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_foreign_file_and_bad_image() {
        let provider = Arc::new(MockProvider::new());
        let (service, file) = setup(provider.clone(), 5).await;

        assert!(matches!(
            service.analyze_for_user("bob", &file.id, 1, IMAGE).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            service.analyze_for_user("alice", &file.id, 1, "data:image/jpeg;base64,").await,
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(service.usage("alice").await.unwrap().remaining_quota, 5);
        assert_eq!(provider.call_count(), 0);
    }
}
