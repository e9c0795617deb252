//! Vector index construction, persistence, and similarity search.
//!
//! A [`VectorIndex`] maps the segments of one ingested item to fixed-
//! dimension vectors and answers nearest-neighbor queries over them. The
//! scan is exact (brute-force cosine over all stored vectors), so recall is
//! perfect at any index size, and ties keep insertion order.
//!
//! Scoring convention: **descending cosine similarity** — higher is better,
//! `1.0` is an identical direction. Every caller of [`VectorIndexStore::search`]
//! gets results ordered highest-first.
//!
//! # On-disk layout
//!
//! One directory per index, self-describing:
//!
//! ```text
//! <dir>/index.json    manifest: format version, model, dims, count,
//!                     segment metadata (text, source_id, chunk_index, hash)
//! <dir>/vectors.bin   count × dims little-endian f32 values
//! ```
//!
//! `load` re-hashes every segment text against the manifest hashes and
//! checks the vector file length, so a tampered or truncated directory is
//! reported as corrupt rather than silently searched.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, EmbeddingProvider};
use crate::error::{Result, VellumError};
use crate::models::Segment;

const MANIFEST_FILE: &str = "index.json";
const VECTORS_FILE: &str = "vectors.bin";
const FORMAT_VERSION: u32 = 1;

/// In-memory similarity index over the segments of one ingested item.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    pub model: String,
    pub dims: usize,
    segments: Vec<Segment>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

/// Self-describing index manifest, serialized as `index.json`.
#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    model: String,
    dims: usize,
    count: usize,
    segments: Vec<Segment>,
}

/// One similarity search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub text: String,
    /// Cosine similarity to the query; higher is better.
    pub score: f32,
    pub source_id: String,
    pub chunk_index: i64,
}

/// Owns the mechanics of building, persisting, reloading, and querying
/// vector indexes. Stateless; constructed explicitly and injected wherever
/// indexing is needed.
#[derive(Debug, Default)]
pub struct VectorIndexStore;

impl VectorIndexStore {
    pub fn new() -> Self {
        Self
    }

    /// Embed every segment (order preserved) and assemble an index.
    ///
    /// All-or-nothing: a provider failure on the batch, a count mismatch,
    /// or inconsistent vector dimensions fail the whole build — no partial
    /// index is returned.
    pub async fn build(
        &self,
        segments: Vec<Segment>,
        provider: &dyn EmbeddingProvider,
    ) -> Result<VectorIndex> {
        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        let vectors = provider.embed_batch(&texts).await?;

        if vectors.len() != segments.len() {
            return Err(VellumError::Embedding {
                reason: format!(
                    "provider returned {} vectors for {} segments",
                    vectors.len(),
                    segments.len()
                ),
            });
        }

        let dims = vectors
            .first()
            .map(|v| v.len())
            .unwrap_or_else(|| provider.dims());
        for (i, v) in vectors.iter().enumerate() {
            if v.len() != dims {
                return Err(VellumError::Embedding {
                    reason: format!(
                        "vector {} has {} dims, expected {}",
                        i,
                        v.len(),
                        dims
                    ),
                });
            }
        }

        Ok(VectorIndex {
            model: provider.model_name().to_string(),
            dims,
            segments,
            vectors,
        })
    }

    /// Write the index to `directory`, creating it if absent.
    ///
    /// Re-persisting to an existing directory overwrites the previous
    /// index files.
    pub fn persist(&self, index: &VectorIndex, directory: &Path) -> Result<()> {
        fs::create_dir_all(directory).map_err(|e| VellumError::storage(directory, e))?;

        let mut blob = Vec::with_capacity(index.vectors.len() * index.dims * 4);
        for v in &index.vectors {
            blob.extend_from_slice(&vec_to_blob(v));
        }
        let vectors_path = directory.join(VECTORS_FILE);
        fs::write(&vectors_path, &blob).map_err(|e| VellumError::storage(&vectors_path, e))?;

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            model: index.model.clone(),
            dims: index.dims,
            count: index.segments.len(),
            segments: index.segments.clone(),
        };
        let manifest_path = directory.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| VellumError::storage(&manifest_path, e))?;
        fs::write(&manifest_path, json).map_err(|e| VellumError::storage(&manifest_path, e))?;

        Ok(())
    }

    /// Reload a persisted index from `directory`.
    ///
    /// A missing directory or manifest is `NotFound`; a directory whose
    /// contents are unreadable or internally inconsistent is
    /// `CorruptIndex`.
    pub fn load(&self, directory: &Path) -> Result<VectorIndex> {
        let manifest_path = directory.join(MANIFEST_FILE);
        if !directory.is_dir() || !manifest_path.is_file() {
            return Err(VellumError::NotFound {
                path: directory.to_path_buf(),
            });
        }

        let corrupt = |reason: String| VellumError::CorruptIndex {
            directory: directory.to_path_buf(),
            reason,
        };

        let manifest_raw = fs::read_to_string(&manifest_path)
            .map_err(|e| corrupt(format!("unreadable manifest: {}", e)))?;
        let manifest: Manifest = serde_json::from_str(&manifest_raw)
            .map_err(|e| corrupt(format!("malformed manifest: {}", e)))?;

        if manifest.format_version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported format version {}",
                manifest.format_version
            )));
        }
        if manifest.segments.len() != manifest.count {
            return Err(corrupt(format!(
                "manifest lists {} segments but declares count {}",
                manifest.segments.len(),
                manifest.count
            )));
        }
        if manifest.dims == 0 && manifest.count > 0 {
            return Err(corrupt("manifest declares zero vector dimensions".to_string()));
        }

        for seg in &manifest.segments {
            let mut hasher = Sha256::new();
            hasher.update(seg.text.as_bytes());
            if format!("{:x}", hasher.finalize()) != seg.hash {
                return Err(corrupt(format!(
                    "segment {} text does not match its recorded hash",
                    seg.chunk_index
                )));
            }
        }

        let vectors_path = directory.join(VECTORS_FILE);
        let blob = fs::read(&vectors_path)
            .map_err(|e| corrupt(format!("unreadable vector file: {}", e)))?;
        let expected_len = manifest.count * manifest.dims * 4;
        if blob.len() != expected_len {
            return Err(corrupt(format!(
                "vector file is {} bytes, expected {}",
                blob.len(),
                expected_len
            )));
        }

        let vectors: Vec<Vec<f32>> = if manifest.count == 0 {
            Vec::new()
        } else {
            blob.chunks_exact(manifest.dims * 4)
                .map(blob_to_vec)
                .collect()
        };

        Ok(VectorIndex {
            model: manifest.model,
            dims: manifest.dims,
            segments: manifest.segments,
            vectors,
        })
    }

    /// Return the `k` nearest segments to `query`, highest similarity
    /// first.
    ///
    /// `k` is clamped to the number of segments present; `k == 0` is a
    /// configuration error. Ties keep insertion order (stable sort).
    pub async fn search(
        &self,
        index: &VectorIndex,
        query: &str,
        provider: &dyn EmbeddingProvider,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(VellumError::config("search k must be >= 1"));
        }
        if provider.dims() != 0 && provider.dims() != index.dims {
            return Err(VellumError::config(format!(
                "provider produces {}-dim vectors but the index holds {}-dim vectors",
                provider.dims(),
                index.dims
            )));
        }

        let query_vec = provider.embed(query).await?;
        if query_vec.len() != index.dims {
            return Err(VellumError::Embedding {
                reason: format!(
                    "query embedding has {} dims, index has {}",
                    query_vec.len(),
                    index.dims
                ),
            });
        }

        let mut hits: Vec<SearchHit> = index
            .segments
            .iter()
            .zip(index.vectors.iter())
            .map(|(seg, vec)| SearchHit {
                text: seg.text.clone(),
                score: cosine_similarity(&query_vec, vec),
                source_id: seg.source_id.clone(),
                chunk_index: seg.chunk_index,
            })
            .collect();

        // Stable sort: equal scores keep insertion order.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k.min(index.segments.len()));

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk;
    use crate::testutil::{FailingProvider, LetterFreqProvider};
    use tempfile::TempDir;

    fn sample_segments() -> Vec<Segment> {
        // Four short units, one chunk each, contiguous indices 0..=3.
        let units = ["apple pie", "banana bread", "apple juice", "car engine"];
        chunk::segment("item-0", &units, 100, 10).unwrap()
    }

    #[tokio::test]
    async fn test_build_preserves_order() {
        let segments = sample_segments();
        let index = VectorIndexStore::new()
            .build(segments.clone(), &LetterFreqProvider)
            .await
            .unwrap();
        assert_eq!(index.len(), 4);
        assert_eq!(index.dims, crate::testutil::LETTER_DIMS);
        for (a, b) in index.segments().iter().zip(segments.iter()) {
            assert_eq!(a.text, b.text);
        }
    }

    #[tokio::test]
    async fn test_build_is_all_or_nothing() {
        let err = VectorIndexStore::new()
            .build(sample_segments(), &FailingProvider)
            .await
            .unwrap_err();
        assert!(matches!(err, VellumError::Embedding { .. }));
    }

    #[tokio::test]
    async fn test_persist_load_search_roundtrip_self_recall() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("idx");
        let store = VectorIndexStore::new();

        let segments = sample_segments();
        let index = store
            .build(segments.clone(), &LetterFreqProvider)
            .await
            .unwrap();
        store.persist(&index, &dir).unwrap();

        let loaded = store.load(&dir).unwrap();
        assert_eq!(loaded.len(), index.len());
        assert_eq!(loaded.dims, index.dims);
        assert_eq!(loaded.model, "letter-freq");

        // Each segment's own text is its own top-1 result.
        for seg in &segments {
            let hits = store
                .search(&loaded, &seg.text, &LetterFreqProvider, 1)
                .await
                .unwrap();
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].text, seg.text);
            assert!((hits[0].score - 1.0).abs() < 1e-5);
        }
    }

    #[tokio::test]
    async fn test_search_ranks_related_segments_first() {
        let store = VectorIndexStore::new();
        let index = store
            .build(sample_segments(), &LetterFreqProvider)
            .await
            .unwrap();

        let hits = store
            .search(&index, "apple", &LetterFreqProvider, 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert!(texts.contains(&"apple pie"), "got {:?}", texts);
        assert!(texts.contains(&"apple juice"), "got {:?}", texts);
        // Descending scores.
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_search_k_clamped_to_segment_count() {
        let store = VectorIndexStore::new();
        let index = store
            .build(sample_segments(), &LetterFreqProvider)
            .await
            .unwrap();

        let hits = store
            .search(&index, "apple", &LetterFreqProvider, 100)
            .await
            .unwrap();
        assert_eq!(hits.len(), 4);
    }

    #[tokio::test]
    async fn test_search_k_zero_is_configuration_error() {
        let store = VectorIndexStore::new();
        let index = store
            .build(sample_segments(), &LetterFreqProvider)
            .await
            .unwrap();
        let err = store
            .search(&index, "apple", &LetterFreqProvider, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, VellumError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_tied_scores_keep_insertion_order() {
        let store = VectorIndexStore::new();
        let segments = chunk::segment("item", &["same text", "same text"], 100, 10).unwrap();
        assert_eq!(segments[0].chunk_index, 0);
        assert_eq!(segments[1].chunk_index, 1);
        let index = store.build(segments, &LetterFreqProvider).await.unwrap();

        let hits = store
            .search(&index, "same text", &LetterFreqProvider, 2)
            .await
            .unwrap();
        assert_eq!(hits[0].chunk_index, 0);
        assert_eq!(hits[1].chunk_index, 1);
    }

    #[tokio::test]
    async fn test_load_missing_directory_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = VectorIndexStore::new()
            .load(&tmp.path().join("nope"))
            .unwrap_err();
        assert!(matches!(err, VellumError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_load_directory_without_manifest_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("empty");
        std::fs::create_dir_all(&dir).unwrap();
        let err = VectorIndexStore::new().load(&dir).unwrap_err();
        assert!(matches!(err, VellumError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_load_malformed_manifest_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("idx");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(MANIFEST_FILE), "{ not json").unwrap();
        let err = VectorIndexStore::new().load(&dir).unwrap_err();
        assert!(matches!(err, VellumError::CorruptIndex { .. }));
    }

    #[tokio::test]
    async fn test_load_truncated_vectors_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("idx");
        let store = VectorIndexStore::new();
        let index = store
            .build(sample_segments(), &LetterFreqProvider)
            .await
            .unwrap();
        store.persist(&index, &dir).unwrap();

        let blob = std::fs::read(dir.join(VECTORS_FILE)).unwrap();
        std::fs::write(dir.join(VECTORS_FILE), &blob[..blob.len() - 4]).unwrap();

        let err = store.load(&dir).unwrap_err();
        assert!(matches!(err, VellumError::CorruptIndex { .. }));
    }

    #[tokio::test]
    async fn test_load_tampered_segment_text_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("idx");
        let store = VectorIndexStore::new();
        let index = store
            .build(sample_segments(), &LetterFreqProvider)
            .await
            .unwrap();
        store.persist(&index, &dir).unwrap();

        let raw = std::fs::read_to_string(dir.join(MANIFEST_FILE)).unwrap();
        let tampered = raw.replace("apple pie", "grape pie");
        std::fs::write(dir.join(MANIFEST_FILE), tampered).unwrap();

        let err = store.load(&dir).unwrap_err();
        assert!(matches!(err, VellumError::CorruptIndex { .. }));
    }

    #[tokio::test]
    async fn test_repersist_overwrites() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("idx");
        let store = VectorIndexStore::new();

        let first = store
            .build(sample_segments(), &LetterFreqProvider)
            .await
            .unwrap();
        store.persist(&first, &dir).unwrap();

        let second = store
            .build(
                chunk::segment("item", &["only one segment"], 100, 10).unwrap(),
                &LetterFreqProvider,
            )
            .await
            .unwrap();
        store.persist(&second, &dir).unwrap();

        let loaded = store.load(&dir).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.segments()[0].text, "only one segment");
    }
}
