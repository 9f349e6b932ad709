//! Blob storage module
//!
//! Uploaded PDFs live in S3-compatible storage or on the local filesystem.

mod local;
mod s3_client;
mod types;

pub use local::LocalBlobStore;
pub use s3_client::S3BlobStore;
pub use types::{blob_key, BlobStore, ProgressFn, UploadProgress};
