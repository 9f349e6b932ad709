//! SQLite storage for the file tree

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::types::{FileItem, FileKind};
use crate::error::{AppError, Result};

/// Repository for file and folder records
pub struct FileRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FileRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new record
    pub async fn insert(&self, item: &FileItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO files (
                id, name, kind, parent_id, user_id, storage_key,
                file_url, file_size, file_type, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(item.kind.as_str())
        .bind(&item.parent_id)
        .bind(&item.user_id)
        .bind(&item.storage_key)
        .bind(&item.file_url)
        .bind(item.file_size)
        .bind(&item.file_type)
        .bind(item.created_at.to_rfc3339())
        .bind(item.updated_at.to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Get an item by ID, checking ownership
    pub async fn get(&self, id: &str, user_id: &str) -> Result<Option<FileItem>> {
        let row = sqlx::query_as::<_, FileRow>(&format!("{} WHERE id = ?", SELECT_FILES))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        match row {
            Some(row) if row.user_id != user_id => Err(AppError::not_owner("file", id)),
            Some(row) => row.into_item().map(Some),
            None => Ok(None),
        }
    }

    /// Get an item by ID or fail with `NotFound`
    pub async fn require(&self, id: &str, user_id: &str) -> Result<FileItem> {
        self.get(id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File not found: {}", id)))
    }

    /// Get a folder by ID, rejecting plain files
    pub async fn require_folder(&self, id: &str, user_id: &str) -> Result<FileItem> {
        let folder = self.require(id, user_id).await?;
        if !folder.is_folder() {
            return Err(AppError::BadRequest(format!("{} is not a folder", id)));
        }
        Ok(folder)
    }

    /// Children of a folder (or the root), newest first
    pub async fn list(&self, parent_id: Option<&str>, user_id: &str) -> Result<Vec<FileItem>> {
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "{} WHERE user_id = ? AND parent_id IS ? ORDER BY created_at DESC",
            SELECT_FILES
        ))
        .bind(user_id)
        .bind(parent_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_item()).collect()
    }

    /// The folder containing an item, `None` at the root
    pub async fn parent_folder(&self, id: &str, user_id: &str) -> Result<Option<FileItem>> {
        let item = self.require(id, user_id).await?;
        match item.parent_id {
            Some(parent_id) => self.get(&parent_id, user_id).await,
            None => Ok(None),
        }
    }

    /// Ancestors of an item followed by the item itself, root first
    pub async fn path(&self, id: &str, user_id: &str) -> Result<Vec<FileItem>> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(id.to_string());

        while let Some(current_id) = current {
            if !seen.insert(current_id.clone()) {
                tracing::warn!("Cycle detected in file tree at {}", current_id);
                break;
            }
            let Some(item) = self.get(&current_id, user_id).await? else {
                break;
            };
            current = item.parent_id.clone();
            path.push(item);
        }

        if path.is_empty() {
            return Err(AppError::NotFound(format!("File not found: {}", id)));
        }

        path.reverse();
        Ok(path)
    }

    /// Move an item into `target_folder_id`, or to the root when `None`
    pub async fn move_item(
        &self,
        id: &str,
        target_folder_id: Option<&str>,
        user_id: &str,
    ) -> Result<FileItem> {
        let mut item = self.require(id, user_id).await?;

        if let Some(target) = target_folder_id {
            self.require_folder(target, user_id).await?;
            let ancestry = self.path(target, user_id).await?;
            if ancestry.iter().any(|a| a.id == item.id) {
                return Err(AppError::BadRequest(
                    "Cannot move a folder into itself or one of its subfolders".to_string(),
                ));
            }
        }

        item.parent_id = target_folder_id.map(str::to_string);
        item.updated_at = Utc::now();

        sqlx::query("UPDATE files SET parent_id = ?, updated_at = ? WHERE id = ?")
            .bind(&item.parent_id)
            .bind(item.updated_at.to_rfc3339())
            .bind(&item.id)
            .execute(self.pool)
            .await?;

        Ok(item)
    }

    /// Whether any stored file still points at a blob key
    pub async fn storage_key_in_use(&self, storage_key: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE storage_key = ?")
            .bind(storage_key)
            .fetch_one(self.pool)
            .await?;

        Ok(count > 0)
    }

    /// Delete an item and everything below it, with the notes and analyses
    /// of every removed file. Returns the removed records.
    pub async fn delete_tree(&self, id: &str, user_id: &str) -> Result<Vec<FileItem>> {
        let root = self.require(id, user_id).await?;
        let mut removed = Vec::new();
        let mut pending = vec![root];

        while let Some(item) = pending.pop() {
            if item.is_folder() {
                pending.extend(self.list(Some(&item.id), user_id).await?);
            }
            removed.push(item);
        }

        let mut tx = self.pool.begin().await?;
        for item in &removed {
            if item.kind == FileKind::File {
                sqlx::query("DELETE FROM notes WHERE file_id = ?")
                    .bind(&item.id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM page_analyses WHERE file_id = ?")
                    .bind(&item.id)
                    .execute(&mut *tx)
                    .await?;
            }
            sqlx::query("DELETE FROM files WHERE id = ?")
                .bind(&item.id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(removed)
    }
}

const SELECT_FILES: &str = r#"
    SELECT id, name, kind, parent_id, user_id, storage_key,
           file_url, file_size, file_type, created_at, updated_at
    FROM files
"#;

/// Internal row type for SQLite queries
#[derive(sqlx::FromRow)]
struct FileRow {
    id: String,
    name: String,
    kind: String,
    parent_id: Option<String>,
    user_id: String,
    storage_key: Option<String>,
    file_url: Option<String>,
    file_size: Option<i64>,
    file_type: Option<String>,
    created_at: String,
    updated_at: String,
}

impl FileRow {
    fn into_item(self) -> Result<FileItem> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)?.with_timezone(&Utc);
        let updated_at = DateTime::parse_from_rfc3339(&self.updated_at)?.with_timezone(&Utc);

        Ok(FileItem {
            id: self.id,
            name: self.name,
            kind: FileKind::parse(&self.kind),
            parent_id: self.parent_id,
            user_id: self.user_id,
            created_at,
            updated_at,
            file_url: self.file_url,
            file_size: self.file_size,
            file_type: self.file_type,
            storage_key: self.storage_key,
        })
    }
}
