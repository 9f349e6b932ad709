//! Positional note types
//!
//! Notes are anchored with percentages of the rendered page size, so a note
//! stays in place whatever resolution the page is drawn at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A note pinned to a page position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Creation-ordered identifier (UUID v7)
    pub id: String,
    /// Owning document
    pub file_id: String,
    /// 1-based page index
    pub page: u32,
    /// Horizontal position, percent of page width
    pub x: f64,
    /// Vertical position, percent of page height
    pub y: f64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Create a note at the given position, clamping coordinates to `[0, 100]`
    pub fn new(file_id: &str, page: u32, x: f64, y: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            file_id: file_id.to_string(),
            page: page.max(1),
            x: clamp_percent(x),
            y: clamp_percent(y),
            text: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    /// Move the note, stamping `updated_at`
    pub fn move_to(&mut self, x: f64, y: f64) {
        self.x = clamp_percent(x);
        self.y = clamp_percent(y);
        self.updated_at = Utc::now();
    }

    /// Replace the text, stamping `updated_at`
    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.updated_at = Utc::now();
    }

    /// Snapshot of the mutable fields for a write-back
    pub fn to_update(&self) -> NoteUpdate {
        NoteUpdate {
            text: Some(self.text.clone()),
            x: Some(self.x),
            y: Some(self.y),
            updated_at: self.updated_at,
        }
    }
}

/// Changes applied to a stored note
#[derive(Debug, Clone, PartialEq)]
pub struct NoteUpdate {
    pub text: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a note over HTTP
#[derive(Debug, Clone, Deserialize)]
pub struct NewNote {
    pub page: u32,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub text: String,
}

/// Request body for updating a note over HTTP
#[derive(Debug, Clone, Deserialize)]
pub struct NoteChanges {
    pub text: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

impl From<NoteChanges> for NoteUpdate {
    fn from(changes: NoteChanges) -> Self {
        NoteUpdate {
            text: changes.text,
            x: changes.x.map(clamp_percent),
            y: changes.y.map(clamp_percent),
            updated_at: Utc::now(),
        }
    }
}

/// Clamp a page percentage to `[0, 100]`; NaN maps to 0
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_percent() {
        assert_eq!(clamp_percent(-5.0), 0.0);
        assert_eq!(clamp_percent(150.0), 100.0);
        assert_eq!(clamp_percent(42.5), 42.5);
        assert_eq!(clamp_percent(f64::NAN), 0.0);
        assert_eq!(clamp_percent(f64::INFINITY), 100.0);
    }

    #[test]
    fn test_new_note_clamps() {
        let note = Note::new("file-1", 0, -1.0, 101.0);
        assert_eq!(note.page, 1);
        assert_eq!(note.x, 0.0);
        assert_eq!(note.y, 100.0);
        assert!(note.text.is_empty());
        assert_eq!(note.created_at, note.updated_at);
    }

    #[test]
    fn test_ids_are_creation_ordered() {
        let first = Note::new("file-1", 1, 0.0, 0.0);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = Note::new("file-1", 1, 0.0, 0.0);
        assert!(first.id < second.id);
    }

    #[test]
    fn test_mutations_keep_created_at() {
        let mut note = Note::new("file-1", 2, 10.0, 10.0);
        let created = note.created_at;
        note.move_to(20.0, 30.0);
        note.set_text("hello");
        assert_eq!(note.created_at, created);
        assert!(note.updated_at >= created);
        assert_eq!((note.x, note.y), (20.0, 30.0));
    }

    #[test]
    fn test_serialization_uses_camel_case() {
        let note = Note::new("file-1", 3, 50.0, 50.0).with_text("pin");
        let json = serde_json::to_string(&note).unwrap();
        assert!(json.contains("\"fileId\":\"file-1\""));
        assert!(json.contains("\"createdAt\""));
    }
}
