//! File tree module
//!
//! Users organize uploaded PDFs in folders. Records live in SQLite, file
//! bytes in the configured [`crate::storage::BlobStore`].

mod service;
mod store;
mod types;

pub use service::FileService;
pub use store::FileRepository;
pub use types::{CreateFolderRequest, FileItem, FileKind, MoveRequest, StoredBlob};
