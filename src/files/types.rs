//! File tree types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Node kind in the file tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Folder,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::File => "file",
            FileKind::Folder => "folder",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "folder" => FileKind::Folder,
            _ => FileKind::File,
        }
    }
}

/// A file or folder owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    /// `None` for items at the root
    pub parent_id: Option<String>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(skip)]
    pub storage_key: Option<String>,
}

impl FileItem {
    pub fn folder(name: &str, parent_id: Option<&str>, user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            kind: FileKind::Folder,
            parent_id: parent_id.map(str::to_string),
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
            file_url: None,
            file_size: None,
            file_type: None,
            storage_key: None,
        }
    }

    pub fn file(name: &str, parent_id: Option<&str>, user_id: &str, blob: StoredBlob) -> Self {
        Self {
            kind: FileKind::File,
            file_url: Some(blob.url),
            file_size: Some(blob.size),
            file_type: blob.content_type,
            storage_key: Some(blob.key),
            ..Self::folder(name, parent_id, user_id)
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == FileKind::Folder
    }
}

/// Where an uploaded file's bytes were stored
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub key: String,
    pub url: String,
    pub size: i64,
    pub content_type: Option<String>,
}

/// Request body for creating a folder
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// Request body for moving an item
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    /// `None` moves the item to the root
    #[serde(default)]
    pub target_folder_id: Option<String>,
}
