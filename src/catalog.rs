//! Ingestion catalog: identity, pipeline orchestration, durable records.
//!
//! Coordinates the full ingestion flow: raw copy → content extraction →
//! chunking → embedding → index persistence → processed record. Each item
//! gets a UUID at ingestion time; the UUID keys the raw copy
//! (`raw/<id>/<name>`), the processed record (`processed/<id>.json`), and
//! the vector index directory (`vectors/<id>/`), so concurrent ingestions
//! of different items cannot collide on disk.
//!
//! Embedding failure during *file* ingestion is non-fatal: the item is
//! still cataloged, just without a vector index. During *text* ingestion it
//! is fatal — raw text is ingested solely to be retrievable.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::chunk;
use crate::config::{ChunkingConfig, Config};
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, VellumError};
use crate::index::{SearchHit, VectorIndexStore};
use crate::models::{ContentType, IngestedItem, ProcessedContent, ProcessedRecord, SourceKind};
use crate::reader;

pub struct IngestionCatalog {
    raw_dir: PathBuf,
    processed_dir: PathBuf,
    vectors_dir: PathBuf,
    chunking: ChunkingConfig,
    provider: Arc<dyn EmbeddingProvider>,
    store: VectorIndexStore,
}

impl IngestionCatalog {
    /// Create a catalog rooted at the configured data directory, creating
    /// the `raw/`, `processed/`, and `vectors/` subdirectories if absent.
    pub fn new(
        config: &Config,
        provider: Arc<dyn EmbeddingProvider>,
        store: VectorIndexStore,
    ) -> Result<Self> {
        let data_dir = &config.storage.data_dir;
        let raw_dir = data_dir.join("raw");
        let processed_dir = data_dir.join("processed");
        let vectors_dir = data_dir.join("vectors");

        for dir in [&raw_dir, &processed_dir, &vectors_dir] {
            std::fs::create_dir_all(dir).map_err(|e| VellumError::storage(dir, e))?;
        }

        Ok(Self {
            raw_dir,
            processed_dir,
            vectors_dir,
            chunking: config.chunking.clone(),
            provider,
            store,
        })
    }

    /// Ingest a file: copy, extract, record, and (for textual content)
    /// chunk + embed + persist an index.
    ///
    /// `declared_type` overrides extension-based resolution. Extraction
    /// failure aborts the ingestion (the raw copy is retained for
    /// forensics but nothing is cataloged); embedding failure downgrades
    /// the item to a catalog entry without `vector_location`.
    pub async fn ingest_file(
        &self,
        path: &Path,
        declared_type: Option<ContentType>,
    ) -> Result<IngestedItem> {
        if !path.exists() {
            return Err(VellumError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let content_type = match declared_type {
            Some(t) => t,
            None => {
                let ext = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or_default();
                ContentType::from_extension(ext).ok_or_else(|| VellumError::UnsupportedType {
                    requested: ext.to_string(),
                })?
            }
        };

        let id = Uuid::new_v4().to_string();
        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        let size_bytes = std::fs::metadata(path)
            .map_err(|e| VellumError::storage(path, e))?
            .len();

        // Immutable verbatim copy of the original bytes.
        let raw_item_dir = self.raw_dir.join(&id);
        std::fs::create_dir_all(&raw_item_dir)
            .map_err(|e| VellumError::storage(&raw_item_dir, e))?;
        let raw_location = raw_item_dir.join(safe_file_name(&original_name));
        std::fs::copy(path, &raw_location).map_err(|e| VellumError::storage(&raw_location, e))?;

        let content = reader::read(path, content_type)?;

        let mut item = IngestedItem {
            id: id.clone(),
            source_kind: SourceKind::File,
            original_name,
            content_type,
            raw_location,
            processed_location: self.processed_dir.join(format!("{}.json", id)),
            vector_location: None,
            ingested_at: Utc::now(),
            size_bytes,
        };

        self.write_record(&item, &content)?;

        if let Some(units) = content.text_units() {
            let segments =
                chunk::segment(&id, &units, self.chunking.chunk_size, self.chunking.overlap)?;
            let vector_dir = self.vectors_dir.join(&id);

            match self.store.build(segments, self.provider.as_ref()).await {
                Ok(index) => {
                    self.store.persist(&index, &vector_dir)?;
                    item.vector_location = Some(vector_dir);
                    // Rewrite the record so list() sees the index.
                    self.write_record(&item, &content)?;
                    debug!(id = %item.id, segments = index.len(), "item embedded");
                }
                Err(VellumError::Embedding { reason }) => {
                    warn!(
                        id = %item.id,
                        %reason,
                        "embedding failed; cataloging without a vector index"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Ok(item)
    }

    /// Ingest raw text under a caller-supplied label.
    ///
    /// Same pipeline as [`ingest_file`](Self::ingest_file) minus the copy
    /// and type-resolution steps. Embedding is mandatory here: on failure
    /// the call fails and nothing is cataloged (the raw text file is
    /// retained).
    pub async fn ingest_text(&self, text: &str, source_label: &str) -> Result<IngestedItem> {
        let id = Uuid::new_v4().to_string();

        let raw_item_dir = self.raw_dir.join(&id);
        std::fs::create_dir_all(&raw_item_dir)
            .map_err(|e| VellumError::storage(&raw_item_dir, e))?;
        let raw_location = raw_item_dir.join(format!("{}.txt", safe_file_name(source_label)));
        std::fs::write(&raw_location, text).map_err(|e| VellumError::storage(&raw_location, e))?;

        let segments = chunk::segment(
            &id,
            &[text],
            self.chunking.chunk_size,
            self.chunking.overlap,
        )?;
        let index = self.store.build(segments, self.provider.as_ref()).await?;

        let vector_dir = self.vectors_dir.join(&id);
        self.store.persist(&index, &vector_dir)?;

        let item = IngestedItem {
            id: id.clone(),
            source_kind: SourceKind::Text,
            original_name: source_label.to_string(),
            content_type: ContentType::Text,
            raw_location,
            processed_location: self.processed_dir.join(format!("{}.json", id)),
            vector_location: Some(vector_dir),
            ingested_at: Utc::now(),
            size_bytes: text.len() as u64,
        };

        self.write_record(&item, &ProcessedContent::Text(text.to_string()))?;

        Ok(item)
    }

    /// Reconstruct the catalog by scanning the processed-record storage.
    ///
    /// Unreadable or malformed records are skipped (and logged), never
    /// fatal. Order follows directory enumeration.
    pub fn list(&self) -> Result<Vec<IngestedItem>> {
        let mut items = Vec::new();

        for entry in WalkDir::new(&self.processed_dir).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file()
                || entry.path().extension().and_then(|e| e.to_str()) != Some("json")
            {
                continue;
            }

            match read_record(entry.path()) {
                Ok(record) => items.push(record.metadata),
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "skipping malformed processed record");
                }
            }
        }

        Ok(items)
    }

    /// Load the persisted index for `id` and run a similarity search
    /// against it.
    ///
    /// Fails with `NotFound` when no index exists for the item (as opposed
    /// to returning an empty result for a query with no matches).
    pub async fn search_item(&self, id: &str, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let index = self.store.load(&self.vectors_dir.join(id))?;
        self.store
            .search(&index, query, self.provider.as_ref(), k)
            .await
    }

    fn write_record(&self, item: &IngestedItem, content: &ProcessedContent) -> Result<()> {
        let record = ProcessedRecord {
            metadata: item.clone(),
            content: content.clone(),
        };
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| VellumError::storage(&item.processed_location, e))?;
        std::fs::write(&item.processed_location, json)
            .map_err(|e| VellumError::storage(&item.processed_location, e))
    }
}

fn read_record(path: &Path) -> Result<ProcessedRecord> {
    let raw = std::fs::read_to_string(path).map_err(|e| VellumError::storage(path, e))?;
    serde_json::from_str(&raw).map_err(|e| VellumError::storage(path, e))
}

/// Replace path separators so a caller-supplied name cannot escape the
/// per-item directory.
fn safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if std::path::is_separator(c) { '_' } else { c })
        .collect()
}
