//! File tree operations that span the database and blob storage

use std::sync::Arc;

use sqlx::SqlitePool;

use super::store::FileRepository;
use super::types::{FileItem, StoredBlob};
use crate::error::{AppError, Result};
use crate::storage::{blob_key, BlobStore, UploadProgress};

/// File tree service
#[derive(Clone)]
pub struct FileService {
    pool: SqlitePool,
    blobs: Arc<dyn BlobStore>,
}

impl FileService {
    pub fn new(pool: SqlitePool, blobs: Arc<dyn BlobStore>) -> Self {
        Self { pool, blobs }
    }

    pub fn repository(&self) -> FileRepository<'_> {
        FileRepository::new(&self.pool)
    }

    /// Create a folder below `parent_id`, or at the root
    pub async fn create_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
        user_id: &str,
    ) -> Result<FileItem> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("Folder name is required".to_string()));
        }

        let repo = self.repository();
        if let Some(parent) = parent_id {
            repo.require_folder(parent, user_id).await?;
        }

        let folder = FileItem::folder(name, parent_id, user_id);
        repo.insert(&folder).await?;
        tracing::info!("Created folder {} ({})", folder.name, folder.id);
        Ok(folder)
    }

    /// Store an uploaded PDF and record it in the tree
    pub async fn upload(
        &self,
        file_name: &str,
        parent_id: Option<&str>,
        user_id: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<FileItem> {
        if !file_name.to_ascii_lowercase().ends_with(".pdf") {
            return Err(AppError::BadRequest("Only PDF files can be uploaded".to_string()));
        }

        let repo = self.repository();
        if let Some(parent) = parent_id {
            repo.require_folder(parent, user_id).await?;
        }

        let key = blob_key(user_id, file_name)?;
        let report = |p: UploadProgress| {
            tracing::debug!(
                "Upload {}: {}/{} bytes ({:.0}%)",
                file_name,
                p.bytes_sent,
                p.total_bytes,
                p.fraction() * 100.0
            );
        };
        self.blobs.put(&key, data, content_type, &report).await?;
        let url = self.blobs.url(&key).await?;

        let item = FileItem::file(
            file_name,
            parent_id,
            user_id,
            StoredBlob {
                key,
                url,
                size: data.len() as i64,
                content_type: content_type.map(str::to_string),
            },
        );
        repo.insert(&item).await?;

        tracing::info!("Uploaded {} ({} bytes) as {}", file_name, data.len(), item.id);
        Ok(item)
    }

    /// Delete an item, its descendants and their blobs
    pub async fn delete(&self, id: &str, user_id: &str) -> Result<usize> {
        let repo = self.repository();
        let removed = repo.delete_tree(id, user_id).await?;

        for item in &removed {
            if let Some(key) = &item.storage_key {
                // Same-named uploads in different folders share a key
                if repo.storage_key_in_use(key).await? {
                    tracing::debug!("Keeping blob {}, still referenced", key);
                    continue;
                }
                if let Err(e) = self.blobs.delete(key).await {
                    tracing::warn!("Failed to delete blob {} for {}: {}", key, item.id, e);
                }
            }
        }

        tracing::info!("Deleted {} items under {}", removed.len(), id);
        Ok(removed.len())
    }
}
