//! Annotation module
//!
//! Positional notes ("pins") anchored to page coordinates.
//!
//! # Features
//!
//! - Percentage-based anchoring, independent of render resolution
//! - Per-document [`AnnotationSession`] with optimistic local edits and
//!   batched, single-flight write-back
//! - SQLite persistence behind the [`NoteBackend`] seam

mod backend;
mod session;
mod store;
mod types;

pub use backend::NoteBackend;
pub use session::{
    AnnotationSession, FlushReport, SessionConfig, DEFAULT_FLUSH_INTERVAL,
    DEFAULT_MAX_WRITE_ATTEMPTS,
};
pub use store::{NoteRepository, SqliteNoteBackend};
pub use types::{clamp_percent, NewNote, Note, NoteChanges, NoteUpdate};
