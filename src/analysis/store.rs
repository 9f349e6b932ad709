//! SQLite storage for page analyses

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::types::StoredAnalysis;
use crate::error::Result;

/// Repository for saved analyses
pub struct AnalysisRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AnalysisRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Save an analysis, replacing any earlier one for the same page
    pub async fn save(&self, analysis: &StoredAnalysis) -> Result<()> {
        let json = serde_json::to_string(&analysis.analysis)?;

        sqlx::query(
            r#"
            INSERT INTO page_analyses (id, file_id, user_id, page_number, analysis_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(file_id, user_id, page_number) DO UPDATE SET
                analysis_json = excluded.analysis_json,
                created_at = excluded.created_at
            "#,
        )
        .bind(&analysis.id)
        .bind(&analysis.file_id)
        .bind(&analysis.user_id)
        .bind(analysis.page_number as i64)
        .bind(json)
        .bind(analysis.created_at.to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Get the saved analysis for a page
    pub async fn get(
        &self,
        file_id: &str,
        page_number: u32,
        user_id: &str,
    ) -> Result<Option<StoredAnalysis>> {
        let row = sqlx::query_as::<_, AnalysisRow>(
            r#"
            SELECT id, file_id, user_id, page_number, analysis_json, created_at
            FROM page_analyses
            WHERE file_id = ? AND page_number = ? AND user_id = ?
            "#,
        )
        .bind(file_id)
        .bind(page_number as i64)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| r.into_analysis()).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct AnalysisRow {
    id: String,
    file_id: String,
    user_id: String,
    page_number: i64,
    analysis_json: String,
    created_at: String,
}

impl AnalysisRow {
    fn into_analysis(self) -> Result<StoredAnalysis> {
        Ok(StoredAnalysis {
            id: self.id,
            file_id: self.file_id,
            user_id: self.user_id,
            page_number: self.page_number.max(1) as u32,
            analysis: serde_json::from_str(&self.analysis_json)?,
            created_at: DateTime::parse_from_rfc3339(&self.created_at)?.with_timezone(&Utc),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::PageAnalysis;
    use crate::db::test_pool;

    fn stored(id: &str, summary: &str) -> StoredAnalysis {
        StoredAnalysis {
            id: id.to_string(),
            file_id: "f1".to_string(),
            user_id: "alice".to_string(),
            page_number: 2,
            analysis: PageAnalysis {
                core_summary: summary.to_string(),
                ..Default::default()
            },
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_replaces_page() {
        let pool = test_pool().await;
        let repo = AnalysisRepository::new(&pool);

        repo.save(&stored("a1", "first")).await.unwrap();
        repo.save(&stored("a2", "second")).await.unwrap();

        let saved = repo.get("f1", 2, "alice").await.unwrap().unwrap();
        assert_eq!(saved.id, "a1");
        assert_eq!(saved.analysis.core_summary, "second");

        assert!(repo.get("f1", 3, "alice").await.unwrap().is_none());
        assert!(repo.get("f1", 2, "bob").await.unwrap().is_none());
    }
}
