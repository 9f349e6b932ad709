//! Filesystem blob store

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{Result, StorageError};

use super::types::{BlobStore, ProgressFn, UploadProgress};

const WRITE_CHUNK_SIZE: usize = 64 * 1024;

/// Stores blobs as files below a root directory
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(StorageError::InvalidKey(key.to_string()).into());
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        _content_type: Option<&str>,
        progress: ProgressFn<'_>,
    ) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let total_bytes = data.len() as u64;
        let mut file = tokio::fs::File::create(&path).await?;
        let mut bytes_sent = 0u64;
        progress(UploadProgress {
            bytes_sent,
            total_bytes,
        });

        for chunk in data.chunks(WRITE_CHUNK_SIZE) {
            file.write_all(chunk).await?;
            bytes_sent += chunk.len() as u64;
            progress(UploadProgress {
                bytes_sent,
                total_bytes,
            });
        }
        file.flush().await?;

        tracing::debug!("Stored {} bytes at {}", total_bytes, path.display());
        Ok(())
    }

    async fn url(&self, key: &str) -> Result<String> {
        let path = self.path_for(key)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(StorageError::ObjectNotFound(key.to_string()).into());
        }
        Ok(format!("file://{}", path.display()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Blob {} already absent", key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[tokio::test]
    async fn test_put_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let data = vec![7u8; WRITE_CHUNK_SIZE * 2 + 10];

        let seen = Mutex::new(Vec::new());
        store
            .put("files/alice/big.pdf", &data, Some("application/pdf"), &|p| {
                seen.lock().push(p.bytes_sent)
            })
            .await
            .unwrap();

        let seen = seen.into_inner();
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&(data.len() as u64)));
        assert_eq!(seen.len(), 4);

        let written = std::fs::read(dir.path().join("files/alice/big.pdf")).unwrap();
        assert_eq!(written, data);
    }

    #[tokio::test]
    async fn test_url_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        assert!(store.url("files/alice/missing.pdf").await.is_err());

        store
            .put("files/alice/a.pdf", b"%PDF-1.7", None, &|_| {})
            .await
            .unwrap();
        let url = store.url("files/alice/a.pdf").await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("files/alice/a.pdf"));

        store.delete("files/alice/a.pdf").await.unwrap();
        store.delete("files/alice/a.pdf").await.unwrap();
        assert!(!dir.path().join("files/alice/a.pdf").exists());
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        assert!(store.put("../outside", b"x", None, &|_| {}).await.is_err());
        assert!(store.put("/etc/passwd", b"x", None, &|_| {}).await.is_err());
        assert!(store.delete("").await.is_err());
    }
}
