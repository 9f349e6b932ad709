//! Storage types

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Result, StorageError};

/// Progress of an in-flight upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub bytes_sent: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    /// Completed share in `[0, 1]`
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            1.0
        } else {
            self.bytes_sent as f64 / self.total_bytes as f64
        }
    }
}

/// Upload progress callback
pub type ProgressFn<'a> = &'a (dyn Fn(UploadProgress) + Send + Sync);

/// Blob storage for uploaded documents
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, reporting progress as bytes are sent
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: Option<&str>,
        progress: ProgressFn<'_>,
    ) -> Result<()>;

    /// URL the stored object can be fetched from
    async fn url(&self, key: &str) -> Result<String>;

    /// Remove an object; removing a missing object succeeds
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Storage key for a user's upload: `files/{user_id}/{file_name}`
pub fn blob_key(user_id: &str, file_name: &str) -> Result<String> {
    for part in [user_id, file_name] {
        if part.is_empty() || part == "." || part == ".." || part.contains(['/', '\\']) {
            return Err(StorageError::InvalidKey(format!("{}/{}", user_id, file_name)).into());
        }
    }
    Ok(format!("files/{}/{}", user_id, file_name))
}
