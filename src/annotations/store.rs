//! SQLite storage for notes
//!
//! Provides CRUD operations for positional notes using SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::backend::NoteBackend;
use super::types::{Note, NoteUpdate};
use crate::error::{AppError, Result};

/// Repository for note persistence
pub struct NoteRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> NoteRepository<'a> {
    /// Create a new repository
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new note owned by `user_id`
    pub async fn create(&self, note: &Note, user_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notes (id, file_id, user_id, page, x, y, text, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&note.id)
        .bind(&note.file_id)
        .bind(user_id)
        .bind(note.page as i64)
        .bind(note.x)
        .bind(note.y)
        .bind(&note.text)
        .bind(note.created_at.to_rfc3339())
        .bind(note.updated_at.to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Get a note by ID, checking ownership
    pub async fn get(&self, id: &str, user_id: &str) -> Result<Option<Note>> {
        match self.fetch_row(id).await? {
            Some(row) if row.user_id != user_id => Err(AppError::not_owner("note", id)),
            Some(row) => row.into_note().map(Some),
            None => Ok(None),
        }
    }

    /// List a user's notes for a document, oldest first
    pub async fn list_for_file(&self, file_id: &str, user_id: &str) -> Result<Vec<Note>> {
        let rows = sqlx::query_as::<_, NoteRow>(
            r#"
            SELECT id, file_id, user_id, page, x, y, text, created_at, updated_at
            FROM notes
            WHERE file_id = ? AND user_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(file_id)
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_note()).collect()
    }

    /// Apply changes to a note; `false` when the note does not exist
    pub async fn update(&self, id: &str, user_id: &str, update: &NoteUpdate) -> Result<bool> {
        match self.fetch_row(id).await? {
            None => return Ok(false),
            Some(row) if row.user_id != user_id => return Err(AppError::not_owner("note", id)),
            Some(_) => {}
        }

        let result = sqlx::query(
            r#"
            UPDATE notes SET
                text = COALESCE(?, text),
                x = COALESCE(?, x),
                y = COALESCE(?, y),
                updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(&update.text)
        .bind(update.x)
        .bind(update.y)
        .bind(update.updated_at.to_rfc3339())
        .bind(id)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a note
    pub async fn delete(&self, id: &str, user_id: &str) -> Result<bool> {
        match self.fetch_row(id).await? {
            None => return Ok(false),
            Some(row) if row.user_id != user_id => return Err(AppError::not_owner("note", id)),
            Some(_) => {}
        }

        let result = sqlx::query("DELETE FROM notes WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fetch_row(&self, id: &str) -> Result<Option<NoteRow>> {
        let row = sqlx::query_as::<_, NoteRow>(
            r#"
            SELECT id, file_id, user_id, page, x, y, text, created_at, updated_at
            FROM notes
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }
}

/// [`NoteBackend`] over SQLite, scoped to one user
#[derive(Clone)]
pub struct SqliteNoteBackend {
    pool: SqlitePool,
    user_id: String,
}

impl SqliteNoteBackend {
    pub fn new(pool: SqlitePool, user_id: &str) -> Self {
        Self {
            pool,
            user_id: user_id.to_string(),
        }
    }
}

#[async_trait]
impl NoteBackend for SqliteNoteBackend {
    async fn list_notes(&self, file_id: &str) -> Result<Vec<Note>> {
        NoteRepository::new(&self.pool)
            .list_for_file(file_id, &self.user_id)
            .await
    }

    async fn create_note(&self, note: &Note) -> Result<()> {
        NoteRepository::new(&self.pool)
            .create(note, &self.user_id)
            .await
    }

    async fn update_note(&self, id: &str, update: &NoteUpdate) -> Result<()> {
        let updated = NoteRepository::new(&self.pool)
            .update(id, &self.user_id, update)
            .await?;
        if !updated {
            tracing::debug!("Skipped update for missing note {}", id);
        }
        Ok(())
    }

    async fn delete_note(&self, id: &str) -> Result<()> {
        NoteRepository::new(&self.pool)
            .delete(id, &self.user_id)
            .await?;
        Ok(())
    }
}

/// Internal row type for SQLite queries
#[derive(sqlx::FromRow)]
struct NoteRow {
    id: String,
    file_id: String,
    user_id: String,
    page: i64,
    x: f64,
    y: f64,
    text: String,
    created_at: String,
    updated_at: String,
}

impl NoteRow {
    fn into_note(self) -> Result<Note> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)?.with_timezone(&Utc);
        let updated_at = DateTime::parse_from_rfc3339(&self.updated_at)?.with_timezone(&Utc);

        Ok(Note {
            id: self.id,
            file_id: self.file_id,
            page: self.page.max(1) as u32,
            x: self.x,
            y: self.y,
            text: self.text,
            created_at,
            updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_create_and_list() {
        let pool = test_pool().await;
        let repo = NoteRepository::new(&pool);

        for page in 1..=3 {
            let note = Note::new("file-a", page, 10.0, 20.0);
            repo.create(&note, "alice").await.unwrap();
        }
        repo.create(&Note::new("file-b", 1, 0.0, 0.0), "alice")
            .await
            .unwrap();
        repo.create(&Note::new("file-a", 1, 0.0, 0.0), "bob")
            .await
            .unwrap();

        let notes = repo.list_for_file("file-a", "alice").await.unwrap();
        assert_eq!(notes.len(), 3);
        assert_eq!(notes.iter().map(|n| n.page).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_update_partial() {
        let pool = test_pool().await;
        let repo = NoteRepository::new(&pool);

        let note = Note::new("file-a", 1, 10.0, 20.0).with_text("draft");
        repo.create(&note, "alice").await.unwrap();

        let update = NoteUpdate {
            text: None,
            x: Some(55.0),
            y: None,
            updated_at: Utc::now(),
        };
        assert!(repo.update(&note.id, "alice", &update).await.unwrap());

        let loaded = repo.get(&note.id, "alice").await.unwrap().unwrap();
        assert_eq!(loaded.text, "draft");
        assert_eq!(loaded.x, 55.0);
        assert_eq!(loaded.y, 20.0);
        assert_eq!(loaded.created_at, note.created_at);
    }

    #[tokio::test]
    async fn test_update_missing_is_noop() {
        let pool = test_pool().await;
        let repo = NoteRepository::new(&pool);

        let update = Note::new("file-a", 1, 0.0, 0.0).to_update();
        assert!(!repo.update("missing", "alice", &update).await.unwrap());

        let notes = repo.list_for_file("file-a", "alice").await.unwrap();
        assert!(notes.is_empty());
    }

    #[tokio::test]
    async fn test_owner_mismatch_is_rejected() {
        let pool = test_pool().await;
        let repo = NoteRepository::new(&pool);

        let note = Note::new("file-a", 1, 10.0, 20.0);
        repo.create(&note, "alice").await.unwrap();

        let err = repo.delete(&note.id, "mallory").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = repo
            .update(&note.id, "mallory", &note.to_update())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        assert!(repo.get(&note.id, "alice").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete() {
        let pool = test_pool().await;
        let repo = NoteRepository::new(&pool);

        let note = Note::new("file-a", 1, 10.0, 20.0);
        repo.create(&note, "alice").await.unwrap();

        assert!(repo.delete(&note.id, "alice").await.unwrap());
        assert!(repo.get(&note.id, "alice").await.unwrap().is_none());
        assert!(!repo.delete(&note.id, "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_backend_is_user_scoped() {
        let pool = test_pool().await;
        let alice = SqliteNoteBackend::new(pool.clone(), "alice");
        let bob = SqliteNoteBackend::new(pool.clone(), "bob");

        let note = Note::new("file-a", 1, 1.0, 2.0);
        alice.create_note(&note).await.unwrap();

        assert_eq!(alice.list_notes("file-a").await.unwrap().len(), 1);
        assert!(bob.list_notes("file-a").await.unwrap().is_empty());
        assert!(bob.delete_note(&note.id).await.is_err());
    }
}
