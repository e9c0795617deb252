//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]** — returns errors; used when embeddings are not configured.
//! - **[`OpenAIProvider`]** — calls the OpenAI embeddings API with batching, retry, and backoff.
//! - **[`OllamaProvider`]** — calls a local Ollama instance's `/api/embed` endpoint.
//! - **`LocalProvider`** — runs models locally via fastembed (behind the
//!   `local-embeddings` feature); no network calls after model download.
//!
//! Providers are explicitly constructed (see [`create_provider`]) and passed
//! by the caller into the catalog and index store — there is no process-wide
//! handler.
//!
//! Also provides vector utilities shared with index persistence:
//! - [`cosine_similarity`] — compute similarity between two embedding vectors
//! - [`vec_to_blob`] — encode a `Vec<f32>` as little-endian bytes
//! - [`blob_to_vec`] — decode the bytes back into a `Vec<f32>`
//!
//! # Retry Strategy
//!
//! The OpenAI and Ollama providers use exponential backoff for transient
//! errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::error::{Result, VellumError};

/// Trait for embedding providers.
///
/// `embed_batch` is the primitive: it must preserve input order and return
/// exactly one vector per input text, or fail as a whole.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, one vector per text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text (e.g. a search query).
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let batch = [text.to_string()];
        let mut vectors = self.embed_batch(&batch).await?;
        if vectors.len() != 1 {
            return Err(VellumError::Embedding {
                reason: format!("expected 1 vector, provider returned {}", vectors.len()),
            });
        }
        Ok(vectors.remove(0))
    }
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
///
/// Used when `embedding.provider = "disabled"` in the configuration. File
/// ingestion through this provider downgrades to a catalog entry without a
/// vector index; text ingestion fails.
#[derive(Debug)]
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(VellumError::Embedding {
            reason: "embedding provider is disabled".to_string(),
        })
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls the `POST /v1/embeddings` endpoint with the configured model.
/// Requires the `OPENAI_API_KEY` environment variable to be set.
#[derive(Debug)]
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    max_retries: u32,
    timeout_secs: u64,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider from configuration.
    ///
    /// Fails if `model` or `dims` is not set in config, or if
    /// `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| VellumError::config("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| VellumError::config("embedding.dims required for OpenAI provider"))?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            return Err(VellumError::config(
                "OPENAI_API_KEY environment variable not set",
            ));
        }

        Ok(Self {
            model,
            dims,
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| VellumError::Embedding {
            reason: "OPENAI_API_KEY not set".to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| VellumError::Embedding {
                reason: e.to_string(),
            })?;

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post("https://api.openai.com/v1/embeddings")
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value =
                            response.json().await.map_err(|e| VellumError::Embedding {
                                reason: e.to_string(),
                            })?;
                        return parse_openai_response(&json, texts.len());
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(format!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(VellumError::Embedding {
                        reason: format!("OpenAI API error {}: {}", status, body_text),
                    });
                }
                Err(e) => {
                    last_err = Some(e.to_string());
                    continue;
                }
            }
        }

        Err(VellumError::Embedding {
            reason: last_err.unwrap_or_else(|| "embedding failed after retries".to_string()),
        })
    }
}

/// Parse the OpenAI embeddings API response JSON, in input order.
fn parse_openai_response(json: &serde_json::Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| VellumError::Embedding {
            reason: "invalid OpenAI response: missing data array".to_string(),
        })?;

    let mut embeddings = Vec::with_capacity(data.len());

    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| VellumError::Embedding {
                reason: "invalid OpenAI response: missing embedding".to_string(),
            })?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        embeddings.push(vec);
    }

    if embeddings.len() != expected {
        return Err(VellumError::Embedding {
            reason: format!(
                "OpenAI returned {} embeddings for {} inputs",
                embeddings.len(),
                expected
            ),
        });
    }

    Ok(embeddings)
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default
/// `http://localhost:11434`). Requires Ollama to be running with an
/// embedding model pulled (e.g. `ollama pull nomic-embed-text`).
#[derive(Debug)]
pub struct OllamaProvider {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    timeout_secs: u64,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| VellumError::config("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| VellumError::config("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            model,
            dims,
            url,
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| VellumError::Embedding {
                reason: e.to_string(),
            })?;

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(format!("{}/api/embed", self.url))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value =
                            response.json().await.map_err(|e| VellumError::Embedding {
                                reason: e.to_string(),
                            })?;
                        return parse_ollama_response(&json, texts.len());
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(format!("Ollama API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    return Err(VellumError::Embedding {
                        reason: format!("Ollama API error {}: {}", status, body_text),
                    });
                }
                Err(e) => {
                    last_err = Some(format!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url, e
                    ));
                    continue;
                }
            }
        }

        Err(VellumError::Embedding {
            reason: last_err.unwrap_or_else(|| "Ollama embedding failed after retries".to_string()),
        })
    }
}

fn parse_ollama_response(json: &serde_json::Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| VellumError::Embedding {
            reason: "invalid Ollama response: missing embeddings array".to_string(),
        })?;

    let mut result = Vec::with_capacity(embeddings.len());

    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| VellumError::Embedding {
                reason: "invalid Ollama response: embedding is not an array".to_string(),
            })?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }

    if result.len() != expected {
        return Err(VellumError::Embedding {
            reason: format!(
                "Ollama returned {} embeddings for {} inputs",
                result.len(),
                expected
            ),
        });
    }

    Ok(result)
}

// ============ Local Provider (fastembed) ============

/// Embedding provider for local inference via fastembed.
///
/// Models are downloaded on first use from Hugging Face and cached. After
/// the initial download no network calls are needed.
#[cfg(feature = "local-embeddings")]
#[derive(Debug)]
pub struct LocalProvider {
    model_name: String,
    dims: usize,
    batch_size: usize,
}

#[cfg(feature = "local-embeddings")]
impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| "all-minilm-l6-v2".to_string());

        let dims = config.dims.unwrap_or(match model_name.as_str() {
            "all-minilm-l6-v2" => 384,
            "bge-small-en-v1.5" => 384,
            "bge-base-en-v1.5" => 768,
            "bge-large-en-v1.5" => 1024,
            "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => 768,
            "multilingual-e5-small" => 384,
            "multilingual-e5-base" => 768,
            "multilingual-e5-large" => 1024,
            _ => 384,
        });

        // Validate the model name up front so failures surface at
        // construction rather than on the first embed call.
        fastembed_model(&model_name)?;

        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size,
        })
    }
}

#[cfg(feature = "local-embeddings")]
fn fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => Err(VellumError::config(format!(
            "unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
            other
        ))),
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = fastembed_model(&self.model_name)?;
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut embedder = fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(model).with_show_download_progress(true),
            )
            .map_err(|e| VellumError::Embedding {
                reason: format!("failed to initialize local embedding model: {}", e),
            })?;

            embedder
                .embed(texts, Some(batch_size))
                .map_err(|e| VellumError::Embedding {
                    reason: format!("local embedding failed: {}", e),
                })
        })
        .await
        .map_err(|e| VellumError::Embedding {
            reason: format!("local embedding task panicked: {}", e),
        })?
    }
}

/// Create the appropriate [`EmbeddingProvider`] based on configuration.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
/// | `"local"` | `LocalProvider` (requires the `local-embeddings` feature) |
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Arc::new(LocalProvider::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => Err(VellumError::config(
            "local embedding provider requires --features local-embeddings",
        )),
        other => Err(VellumError::config(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

/// Encode a float vector as little-endian f32 bytes.
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing
/// `vec.len() × 4` bytes. This is the on-disk vector encoding used by
/// index persistence.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes back into a float vector.
///
/// Reverses [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
