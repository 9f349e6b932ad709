//! S3-compatible blob store
//!
//! Wraps the AWS SDK for S3-compatible storage access.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    presigning::PresigningConfig,
    primitives::ByteStream,
    types::{CompletedMultipartUpload, CompletedPart},
    Client,
};

use crate::config::StorageConfig;
use crate::error::{AppError, Result, StorageError};

use super::types::{BlobStore, ProgressFn, UploadProgress};

/// Bodies above this size are sent as multipart uploads
const MULTIPART_PART_SIZE: usize = 5 * 1024 * 1024;

/// Lifetime of presigned download URLs
const PRESIGNED_URL_TTL: Duration = Duration::from_secs(60 * 60);

/// S3-compatible storage client
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    /// Create a new S3 client from configuration
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "margin",
        );

        let region = config
            .region
            .clone()
            .unwrap_or_else(|| "us-east-1".to_string());

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint)
            .region(Region::new(region))
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO and other S3-compatible services
            .build();

        let client = Client::from_conf(s3_config);

        let bucket = config.bucket.clone();
        match client.head_bucket().bucket(&bucket).send().await {
            Ok(_) => {
                tracing::info!("Connected to S3 bucket: {}", bucket);
            }
            Err(e) => {
                tracing::warn!(
                    "Could not verify bucket {}: {}. Will attempt operations anyway.",
                    bucket,
                    e
                );
            }
        }

        Ok(Self { client, bucket })
    }

    async fn put_multipart(
        &self,
        key: &str,
        data: &[u8],
        content_type: Option<&str>,
        progress: ProgressFn<'_>,
    ) -> Result<()> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .map_err(|e| sdk_error(format!("Failed to start upload of {}: {}", key, e)))?;

        let upload_id = created
            .upload_id()
            .ok_or_else(|| sdk_error(format!("No upload id returned for {}", key)))?
            .to_string();

        match self.upload_parts(key, &upload_id, data, progress).await {
            Ok(parts) => {
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(
                        CompletedMultipartUpload::builder()
                            .set_parts(Some(parts))
                            .build(),
                    )
                    .send()
                    .await
                    .map_err(|e| sdk_error(format!("Failed to complete upload of {}: {}", key, e)))?;
                Ok(())
            }
            Err(e) => {
                if let Err(abort) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    tracing::warn!("Failed to abort upload {} of {}: {}", upload_id, key, abort);
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        data: &[u8],
        progress: ProgressFn<'_>,
    ) -> Result<Vec<CompletedPart>> {
        let total_bytes = data.len() as u64;
        let mut parts = Vec::new();
        let mut bytes_sent = 0u64;

        for (index, chunk) in data.chunks(MULTIPART_PART_SIZE).enumerate() {
            let part_number = index as i32 + 1;
            let uploaded = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk.to_vec()))
                .send()
                .await
                .map_err(|e| {
                    sdk_error(format!("Failed to upload part {} of {}: {}", part_number, key, e))
                })?;

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );

            bytes_sent += chunk.len() as u64;
            progress(UploadProgress {
                bytes_sent,
                total_bytes,
            });
        }

        Ok(parts)
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: Option<&str>,
        progress: ProgressFn<'_>,
    ) -> Result<()> {
        let total_bytes = data.len() as u64;
        progress(UploadProgress {
            bytes_sent: 0,
            total_bytes,
        });

        if data.len() > MULTIPART_PART_SIZE {
            return self.put_multipart(key, data, content_type, progress).await;
        }

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("AccessDenied") {
                    AppError::Storage(StorageError::AccessDenied(key.to_string()))
                } else {
                    sdk_error(format!("Failed to put object {}: {}", key, e))
                }
            })?;

        progress(UploadProgress {
            bytes_sent: total_bytes,
            total_bytes,
        });
        Ok(())
    }

    async fn url(&self, key: &str) -> Result<String> {
        let presigning = PresigningConfig::expires_in(PRESIGNED_URL_TTL)
            .map_err(|e| sdk_error(format!("Invalid presigning config: {}", e)))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| sdk_error(format!("Failed to presign {}: {}", key, e)))?;

        Ok(request.uri().to_string())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error(format!("Failed to delete object {}: {}", key, e)))?;

        Ok(())
    }
}

fn sdk_error(message: String) -> AppError {
    AppError::Storage(StorageError::SdkError(message))
}
