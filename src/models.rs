//! Core data models for the ingestion and retrieval pipeline.
//!
//! These types represent the items, segments, and records that flow through
//! ingestion and persist on disk. [`IngestedItem`] doubles as the metadata
//! half of the processed record, so everything here round-trips through
//! serde.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an ingested item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Ingested from a file on disk.
    File,
    /// Ingested from caller-supplied raw text.
    Text,
}

/// The closed set of supported content types.
///
/// Resolved from a declared type or a file extension; each variant maps to
/// exactly one reader in [`crate::reader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Csv,
    Pdf,
    Txt,
    Json,
    /// Raw text ingested without a backing file format.
    Text,
}

impl ContentType {
    /// Resolve a content type from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(ContentType::Csv),
            "pdf" => Some(ContentType::Pdf),
            "txt" => Some(ContentType::Txt),
            "json" => Some(ContentType::Json),
            _ => None,
        }
    }

    /// Resolve a content type from a declared name (e.g. `--content-type pdf`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "csv" => Some(ContentType::Csv),
            "pdf" => Some(ContentType::Pdf),
            "txt" => Some(ContentType::Txt),
            "json" => Some(ContentType::Json),
            "text" => Some(ContentType::Text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Csv => "csv",
            ContentType::Pdf => "pdf",
            ContentType::Txt => "txt",
            ContentType::Json => "json",
            ContentType::Text => "text",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of ingested material, reconstructable from its processed record.
///
/// Immutable after creation except for the late addition of
/// `vector_location` once embedding succeeds. The `id` is the join key
/// across the raw copy, the processed record, and the vector index
/// directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestedItem {
    pub id: String,
    pub source_kind: SourceKind,
    pub original_name: String,
    pub content_type: ContentType,
    /// Verbatim copy of the original bytes, made at ingestion time.
    pub raw_location: PathBuf,
    /// Durable record holding `{metadata, content}`.
    pub processed_location: PathBuf,
    /// Present if and only if at least one segment was embedded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_location: Option<PathBuf>,
    pub ingested_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// One chunk of text derived from an item's content.
///
/// Boundaries are deterministic given the same input and chunking
/// parameters. The hash is a SHA-256 of the text, used to detect a
/// persisted index whose segment texts no longer match their vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    /// `id` of the [`IngestedItem`] this segment belongs to.
    pub source_id: String,
    pub chunk_index: i64,
    pub hash: String,
}

/// Content extracted by a reader.
///
/// `Text` and `Pages` are embeddable; `Structured` (CSV records, arbitrary
/// JSON) is cataloged without a vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessedContent {
    Text(String),
    Pages(Vec<String>),
    Structured(serde_json::Value),
}

impl ProcessedContent {
    /// The embeddable text units of this content, if any.
    pub fn text_units(&self) -> Option<Vec<&str>> {
        match self {
            ProcessedContent::Text(t) => Some(vec![t.as_str()]),
            ProcessedContent::Pages(pages) => Some(pages.iter().map(String::as_str).collect()),
            ProcessedContent::Structured(_) => None,
        }
    }
}

/// The durable processed record, one per ingested item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub metadata: IngestedItem,
    pub content: ProcessedContent,
}
