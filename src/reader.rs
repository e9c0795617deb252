//! Content readers for the supported file formats.
//!
//! One reader per [`ContentType`] variant, dispatched exhaustively. Readers
//! normalize a source file into [`ProcessedContent`]: plain text, a
//! sequence of text units, or structured records. Every failure is a
//! [`VellumError::Read`] carrying the path, the content type, and the
//! underlying cause.

use std::path::Path;

use crate::error::{Result, VellumError};
use crate::models::{ContentType, ProcessedContent};

/// Extract normalized content from `path` according to `content_type`.
pub fn read(path: &Path, content_type: ContentType) -> Result<ProcessedContent> {
    match content_type {
        ContentType::Csv => read_csv(path),
        ContentType::Pdf => read_pdf(path),
        ContentType::Txt | ContentType::Text => read_text(path),
        ContentType::Json => read_json(path),
    }
}

fn read_error(path: &Path, content_type: ContentType, cause: impl std::fmt::Display) -> VellumError {
    VellumError::Read {
        path: path.to_path_buf(),
        content_type,
        reason: cause.to_string(),
    }
}

fn read_text(path: &Path) -> Result<ProcessedContent> {
    let text =
        std::fs::read_to_string(path).map_err(|e| read_error(path, ContentType::Txt, e))?;
    Ok(ProcessedContent::Text(text))
}

/// CSV rows become a JSON array of `{header: field}` objects. All values
/// are kept as strings; no type inference.
fn read_csv(path: &Path) -> Result<ProcessedContent> {
    let mut reader =
        csv::Reader::from_path(path).map_err(|e| read_error(path, ContentType::Csv, e))?;

    let headers = reader
        .headers()
        .map_err(|e| read_error(path, ContentType::Csv, e))?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| read_error(path, ContentType::Csv, e))?;
        let mut row = serde_json::Map::new();
        for (header, field) in headers.iter().zip(record.iter()) {
            row.insert(
                header.to_string(),
                serde_json::Value::String(field.to_string()),
            );
        }
        rows.push(serde_json::Value::Object(row));
    }

    Ok(ProcessedContent::Structured(serde_json::Value::Array(rows)))
}

/// PDF extraction yields the whole document as one text unit; the chunker
/// re-segments it downstream.
fn read_pdf(path: &Path) -> Result<ProcessedContent> {
    let bytes = std::fs::read(path).map_err(|e| read_error(path, ContentType::Pdf, e))?;
    let text = pdf_extract::extract_text_from_mem(&bytes)
        .map_err(|e| read_error(path, ContentType::Pdf, e))?;
    Ok(ProcessedContent::Text(text))
}

/// JSON files are classified by shape: a string is text, an array of
/// strings is a page sequence, anything else stays structured.
fn read_json(path: &Path) -> Result<ProcessedContent> {
    let raw = std::fs::read_to_string(path).map_err(|e| read_error(path, ContentType::Json, e))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| read_error(path, ContentType::Json, e))?;

    match value {
        serde_json::Value::String(s) => Ok(ProcessedContent::Text(s)),
        serde_json::Value::Array(items)
            if !items.is_empty() && items.iter().all(|v| v.is_string()) =>
        {
            let pages = items
                .into_iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s,
                    _ => unreachable!(),
                })
                .collect();
            Ok(ProcessedContent::Pages(pages))
        }
        other => Ok(ProcessedContent::Structured(other)),
    }
}
