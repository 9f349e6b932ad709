//! Margin Server Library
//!
//! PDF annotation backend: a per-user file tree of uploaded PDFs, positional
//! notes pinned to page coordinates, reading-order text reconstruction and
//! AI page explanations. The server binary is in main.rs.
//!
//! # Modules
//!
//! - `text`: Reading-order reconstruction from positioned text fragments
//! - `annotations`: Positional notes and the batched write-back session
//! - `files`: Folder tree of uploaded documents
//! - `storage`: Blob storage (S3-compatible or local filesystem)
//! - `analysis`: AI page analysis with a per-user quota

pub mod analysis;
pub mod annotations;
pub mod config;
pub mod db;
pub mod error;
pub mod files;
pub mod routes;
pub mod state;
pub mod storage;
pub mod text;
