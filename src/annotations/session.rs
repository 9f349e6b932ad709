//! Per-document annotation session
//!
//! Holds the authoritative in-memory notes of one open document. Mutations
//! apply locally at once and mark the note dirty; a periodic flush writes the
//! dirty set back to the [`NoteBackend`] in one parallel batch.
//!
//! Write-back rules:
//!
//! - a note with a write in flight is left out of the next batch and stays
//!   dirty, so at most one write per note is outstanding;
//! - a failed write re-dirties the note until `max_write_attempts`
//!   consecutive failures, then the pending change is dropped;
//! - notes placed locally are created on their first flush, updated after;
//! - deletes go straight to the backend, except while a write for the same
//!   note is in flight, in which case the delete follows that write.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::backend::NoteBackend;
use super::types::{Note, NoteUpdate};
use crate::error::Result;

/// Default period between automatic flushes
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of consecutive failed writes before a change is dropped
pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 5;

/// Session tuning
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Automatic flush period, `None` disables the timer
    pub flush_interval: Option<Duration>,
    pub max_write_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            flush_interval: Some(DEFAULT_FLUSH_INTERVAL),
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
        }
    }
}

impl SessionConfig {
    /// Manual flushing only
    pub fn manual() -> Self {
        Self {
            flush_interval: None,
            ..Default::default()
        }
    }
}

/// Outcome of one flush cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Writes that succeeded
    pub written: usize,
    /// Writes that failed
    pub failed: usize,
    /// Dirty notes skipped because a write was already in flight
    pub deferred: usize,
}

/// Annotation store for one open document
pub struct AnnotationSession {
    file_id: String,
    inner: Arc<SessionInner>,
    timer: Option<FlushTimer>,
}

/// Background flush loop. Dropping `shutdown` also stops it, after any
/// flush already running has finished.
struct FlushTimer {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

struct SessionInner {
    backend: Arc<dyn NoteBackend>,
    max_write_attempts: u32,
    state: Mutex<SessionState>,
}

#[derive(Default)]
struct SessionState {
    notes: Vec<Note>,
    dirty: HashSet<String>,
    in_flight: HashSet<String>,
    /// Placed locally, not yet created on the backend
    unsynced: HashSet<String>,
    /// Deletes waiting for an in-flight write
    pending_deletes: HashSet<String>,
    failures: HashMap<String, u32>,
    active_drag: Option<String>,
}

impl SessionState {
    fn note_mut(&mut self, id: &str) -> Option<&mut Note> {
        self.notes.iter_mut().find(|n| n.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    Create,
    Update,
}

struct PendingWrite {
    id: String,
    kind: WriteKind,
    note: Note,
}

impl AnnotationSession {
    /// Open a document: load its notes and start the flush timer
    pub async fn open(
        file_id: &str,
        backend: Arc<dyn NoteBackend>,
        config: SessionConfig,
    ) -> Result<Self> {
        let notes = backend.list_notes(file_id).await?;
        tracing::info!("Opened annotation session for {} with {} notes", file_id, notes.len());

        let inner = Arc::new(SessionInner {
            backend,
            max_write_attempts: config.max_write_attempts.max(1),
            state: Mutex::new(SessionState {
                notes,
                ..Default::default()
            }),
        });

        let timer = config
            .flush_interval
            .map(|period| spawn_flush_timer(Arc::clone(&inner), period));

        Ok(Self {
            file_id: file_id.to_string(),
            inner,
            timer,
        })
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    /// Create a note at a page position
    pub fn place(&self, page: u32, x_percent: f64, y_percent: f64) -> Note {
        let note = Note::new(&self.file_id, page, x_percent, y_percent);
        let mut state = self.inner.state.lock();
        state.dirty.insert(note.id.clone());
        state.unsynced.insert(note.id.clone());
        state.notes.push(note.clone());
        note
    }

    /// Mark a note as being dragged; `false` for an unknown id
    pub fn begin_drag(&self, note_id: &str) -> bool {
        let mut state = self.inner.state.lock();
        if state.note_mut(note_id).is_none() {
            return false;
        }
        state.active_drag = Some(note_id.to_string());
        true
    }

    /// Move a note locally; the write happens on the next flush
    pub fn update_drag(&self, note_id: &str, x_percent: f64, y_percent: f64) -> Option<Note> {
        let mut state = self.inner.state.lock();
        let note = state.note_mut(note_id)?;
        note.move_to(x_percent, y_percent);
        let moved = note.clone();
        state.dirty.insert(moved.id.clone());
        Some(moved)
    }

    /// Finish a drag. Does not write; the note is already dirty.
    pub fn end_drag(&self, note_id: &str) {
        let mut state = self.inner.state.lock();
        if state.active_drag.as_deref() == Some(note_id) {
            state.active_drag = None;
        }
    }

    /// Replace a note's text locally; `false` for an unknown id
    pub fn set_text(&self, note_id: &str, text: &str) -> bool {
        let mut state = self.inner.state.lock();
        let Some(note) = state.note_mut(note_id) else {
            return false;
        };
        note.set_text(text);
        state.dirty.insert(note_id.to_string());
        true
    }

    /// Delete a note locally and on the backend
    pub async fn remove(&self, note_id: &str) -> Result<bool> {
        {
            let mut state = self.inner.state.lock();
            let Some(index) = state.notes.iter().position(|n| n.id == note_id) else {
                return Ok(false);
            };
            state.notes.remove(index);
            state.dirty.remove(note_id);
            state.failures.remove(note_id);
            if state.active_drag.as_deref() == Some(note_id) {
                state.active_drag = None;
            }
            let never_created = state.unsynced.remove(note_id);

            if state.in_flight.contains(note_id) {
                state.pending_deletes.insert(note_id.to_string());
                tracing::debug!("Deferring delete of {} until its write resolves", note_id);
                return Ok(true);
            }
            if never_created {
                return Ok(true);
            }
        }

        self.inner.backend.delete_note(note_id).await?;
        Ok(true)
    }

    /// Write every dirty note back to the backend
    pub async fn flush(&self) -> FlushReport {
        self.inner.flush().await
    }

    /// Stop the timer and write any remaining changes
    pub async fn close(mut self) -> FlushReport {
        if let Some(timer) = self.timer.take() {
            let _ = timer.shutdown.send(true);
            if let Err(e) = timer.handle.await {
                tracing::warn!("Flush timer for {} ended abnormally: {}", self.file_id, e);
            }
        }
        let report = self.inner.flush().await;
        tracing::info!("Closed annotation session for {}", self.file_id);
        report
    }

    /// All notes, in creation order
    pub fn notes(&self) -> Vec<Note> {
        self.inner.state.lock().notes.clone()
    }

    pub fn notes_on_page(&self, page: u32) -> Vec<Note> {
        self.inner
            .state
            .lock()
            .notes
            .iter()
            .filter(|n| n.page == page)
            .cloned()
            .collect()
    }

    pub fn note(&self, note_id: &str) -> Option<Note> {
        self.inner
            .state
            .lock()
            .notes
            .iter()
            .find(|n| n.id == note_id)
            .cloned()
    }

    pub fn is_dirty(&self, note_id: &str) -> bool {
        self.inner.state.lock().dirty.contains(note_id)
    }

    pub fn dirty_count(&self) -> usize {
        self.inner.state.lock().dirty.len()
    }

    pub fn active_drag(&self) -> Option<String> {
        self.inner.state.lock().active_drag.clone()
    }
}

impl SessionInner {
    async fn flush(&self) -> FlushReport {
        let mut report = FlushReport::default();

        let batch = {
            let mut state = self.state.lock();
            let mut batch = Vec::new();
            let ids: Vec<String> = state.dirty.iter().cloned().collect();

            for id in ids {
                if state.in_flight.contains(&id) {
                    report.deferred += 1;
                    continue;
                }
                state.dirty.remove(&id);
                let Some(note) = state.notes.iter().find(|n| n.id == id).cloned() else {
                    continue;
                };
                let kind = if state.unsynced.contains(&id) {
                    WriteKind::Create
                } else {
                    WriteKind::Update
                };
                state.in_flight.insert(id.clone());
                batch.push(PendingWrite { id, kind, note });
            }
            batch
        };

        if batch.is_empty() {
            return report;
        }

        tracing::debug!("Flushing {} notes", batch.len());

        let results = join_all(batch.into_iter().map(|write| async move {
            let result = match write.kind {
                WriteKind::Create => self.backend.create_note(&write.note).await,
                WriteKind::Update => {
                    let update: NoteUpdate = write.note.to_update();
                    self.backend.update_note(&write.id, &update).await
                }
            };
            (write.id, write.kind, result)
        }))
        .await;

        let mut deletes = Vec::new();
        {
            let mut state = self.state.lock();
            for (id, kind, result) in results {
                state.in_flight.remove(&id);
                let delete_pending = state.pending_deletes.remove(&id);

                match result {
                    Ok(()) => {
                        report.written += 1;
                        state.failures.remove(&id);
                        if kind == WriteKind::Create {
                            state.unsynced.remove(&id);
                        }
                        if delete_pending {
                            deletes.push(id);
                        }
                    }
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!("Failed to write note {}: {}", id, e);

                        if delete_pending {
                            // A failed create never reached the backend
                            if kind == WriteKind::Update {
                                deletes.push(id);
                            }
                            continue;
                        }

                        let attempts = {
                            let count = state.failures.entry(id.clone()).or_insert(0);
                            *count += 1;
                            *count
                        };
                        if attempts < self.max_write_attempts {
                            state.dirty.insert(id);
                        } else {
                            tracing::error!(
                                "Dropping pending write for note {} after {} failed attempts",
                                id,
                                attempts
                            );
                            state.failures.remove(&id);
                        }
                    }
                }
            }
        }

        for id in deletes {
            if let Err(e) = self.backend.delete_note(&id).await {
                tracing::warn!("Failed deferred delete of note {}: {}", id, e);
            }
        }

        report
    }
}

fn spawn_flush_timer(inner: Arc<SessionInner>, period: Duration) -> FlushTimer {
    let (shutdown, mut stop) = watch::channel(false);
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop.changed() => break,
            }
            // Runs to completion so no claimed write is lost
            inner.flush().await;
        }
    });

    FlushTimer { handle, shutdown }
}
