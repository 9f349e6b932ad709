//! Persistence seam for the annotation session

use async_trait::async_trait;

use super::types::{Note, NoteUpdate};
use crate::error::Result;

/// Note persistence for a single user
///
/// Implementations must treat `update_note` on an absent id as a no-op so a
/// late write never recreates a deleted note.
#[async_trait]
pub trait NoteBackend: Send + Sync {
    /// Notes for a document, oldest first
    async fn list_notes(&self, file_id: &str) -> Result<Vec<Note>>;

    /// Persist a note that does not exist yet
    async fn create_note(&self, note: &Note) -> Result<()>;

    /// Apply changes to an existing note
    async fn update_note(&self, id: &str, update: &NoteUpdate) -> Result<()>;

    /// Delete a note
    async fn delete_note(&self, id: &str) -> Result<()>;
}
