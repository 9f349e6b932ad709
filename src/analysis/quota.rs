//! Per-user AI usage quota

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::types::AiUsage;
use crate::error::{AppError, Result};

/// Repository for the `ai_usage` counter
pub struct QuotaRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> QuotaRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<AiUsage>> {
        let row = sqlx::query_as::<_, UsageRow>(
            "SELECT user_id, remaining_quota, updated_at FROM ai_usage WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| r.into_usage()).transpose()
    }

    /// Create the counter if it does not exist yet
    pub async fn initialize(&self, user_id: &str, quota: i64) -> Result<AiUsage> {
        sqlx::query(
            "INSERT OR IGNORE INTO ai_usage (user_id, remaining_quota, updated_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(quota.max(0))
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool)
        .await?;

        self.get(user_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Quota for {} was not created", user_id)))
    }

    pub async fn get_or_initialize(&self, user_id: &str, default_quota: i64) -> Result<AiUsage> {
        match self.get(user_id).await? {
            Some(usage) => Ok(usage),
            None => self.initialize(user_id, default_quota).await,
        }
    }

    /// Consume one unit; fails with `QuotaExhausted` at zero
    pub async fn decrement(&self, user_id: &str) -> Result<AiUsage> {
        let result = sqlx::query(
            r#"
            UPDATE ai_usage
            SET remaining_quota = remaining_quota - 1, updated_at = ?
            WHERE user_id = ? AND remaining_quota > 0
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get(user_id).await? {
                Some(_) => Err(AppError::QuotaExhausted(user_id.to_string())),
                None => Err(AppError::NotFound(format!("No quota record for {}", user_id))),
            };
        }

        self.get(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No quota record for {}", user_id)))
    }

    /// Give back one unit after a failed analysis
    pub async fn refund(&self, user_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE ai_usage SET remaining_quota = remaining_quota + 1, updated_at = ? WHERE user_id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct UsageRow {
    user_id: String,
    remaining_quota: i64,
    updated_at: String,
}

impl UsageRow {
    fn into_usage(self) -> Result<AiUsage> {
        Ok(AiUsage {
            user_id: self.user_id,
            remaining_quota: self.remaining_quota,
            updated_at: DateTime::parse_from_rfc3339(&self.updated_at)?.with_timezone(&Utc),
        })
    }
}
