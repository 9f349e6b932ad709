//! Application state management

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::analysis::{AnalysisProvider, AnalysisService};
use crate::config::Config;
use crate::files::FileService;
use crate::storage::BlobStore;
use crate::text::ReadingOrder;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    db: SqlitePool,
    files: FileService,
    analysis: AnalysisService,
    reading_order: ReadingOrder,
}

impl AppState {
    /// Create the application state from its collaborators
    pub fn new(
        config: Config,
        db: SqlitePool,
        blobs: Arc<dyn BlobStore>,
        provider: Arc<dyn AnalysisProvider>,
    ) -> Self {
        let files = FileService::new(db.clone(), blobs);
        let analysis = AnalysisService::new(db.clone(), provider, config.analysis.default_quota);
        let reading_order =
            ReadingOrder::new(config.text.grouping).with_tolerance(config.text.line_tolerance);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                files,
                analysis,
                reading_order,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the database pool
    pub fn db(&self) -> &SqlitePool {
        &self.inner.db
    }

    pub fn files(&self) -> &FileService {
        &self.inner.files
    }

    pub fn analysis(&self) -> &AnalysisService {
        &self.inner.analysis
    }

    /// Line grouping used for text extraction
    pub fn reading_order(&self) -> &ReadingOrder {
        &self.inner.reading_order
    }
}
