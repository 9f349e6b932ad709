//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL).execute(pool).await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- File tree (files and folders, linked by parent_id)
CREATE TABLE IF NOT EXISTS files (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    parent_id TEXT,
    user_id TEXT NOT NULL,
    storage_key TEXT,
    file_url TEXT,
    file_size INTEGER,
    file_type TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_files_owner_parent ON files(user_id, parent_id);

-- Positional notes
CREATE TABLE IF NOT EXISTS notes (
    id TEXT PRIMARY KEY,
    file_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    page INTEGER NOT NULL,
    x REAL NOT NULL,
    y REAL NOT NULL,
    text TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notes_file ON notes(file_id, user_id);

-- AI page analyses
CREATE TABLE IF NOT EXISTS page_analyses (
    id TEXT PRIMARY KEY,
    file_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    page_number INTEGER NOT NULL,
    analysis_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(file_id, user_id, page_number)
);

-- AI usage quota
CREATE TABLE IF NOT EXISTS ai_usage (
    user_id TEXT PRIMARY KEY,
    remaining_quota INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);
"#;
