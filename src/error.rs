//! Error taxonomy for the ingestion and retrieval pipeline.
//!
//! Each pipeline stage fails with a dedicated variant so callers can
//! distinguish "no index" from "broken index" from "bad parameters".
//! Variants carry the path, content type, or reason needed to reconstruct
//! what was attempted.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::ContentType;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, VellumError>;

#[derive(Debug, Error)]
pub enum VellumError {
    /// A path or index directory that was expected to exist does not.
    #[error("not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// The requested content type is not in the supported set.
    #[error("unsupported content type: '{requested}' (supported: csv, pdf, txt, json, text)")]
    UnsupportedType { requested: String },

    /// Content extraction failed for a file that does exist.
    #[error("failed to read {} as {content_type}: {reason}", .path.display())]
    Read {
        path: PathBuf,
        content_type: ContentType,
        reason: String,
    },

    /// The embedding provider failed or returned an inconsistent response.
    #[error("embedding failed: {reason}")]
    Embedding { reason: String },

    /// I/O failure writing or reading durable state.
    #[error("storage failure at {}: {reason}", .path.display())]
    Storage { path: PathBuf, reason: String },

    /// An index directory exists but its contents are unreadable or
    /// internally inconsistent.
    #[error("corrupt index at {}: {reason}", .directory.display())]
    CorruptIndex { directory: PathBuf, reason: String },

    /// Invalid chunking, retrieval, or provider parameters.
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },
}

impl VellumError {
    /// Shorthand for a [`VellumError::Storage`] wrapping an I/O error.
    pub fn storage(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        VellumError::Storage {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    /// Shorthand for a [`VellumError::Configuration`].
    pub fn config(reason: impl Into<String>) -> Self {
        VellumError::Configuration {
            reason: reason.into(),
        }
    }
}
