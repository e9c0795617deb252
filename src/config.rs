//! TOML configuration parsing and validation.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, VellumError};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root of durable state; `raw/`, `processed/`, and `vectors/` live
    /// underneath it.
    pub data_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Result count used by the CLI when `--k` is not given.
    #[serde(default = "default_k")]
    pub default_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
        }
    }
}

fn default_k() -> usize {
    5
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            VellumError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            VellumError::storage(path, e)
        }
    })?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| VellumError::config(format!("failed to parse {}: {}", path.display(), e)))?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        return Err(VellumError::config("chunking.chunk_size must be > 0"));
    }
    if config.chunking.overlap == 0 {
        return Err(VellumError::config("chunking.overlap must be > 0"));
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        return Err(VellumError::config(
            "chunking.overlap must be < chunking.chunk_size",
        ));
    }
    if config.retrieval.default_k < 1 {
        return Err(VellumError::config("retrieval.default_k must be >= 1"));
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => {
            return Err(VellumError::config(format!(
                "unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
                other
            )))
        }
    }

    // openai and ollama need explicit model/dims; local has built-in defaults
    if matches!(config.embedding.provider.as_str(), "openai" | "ollama") {
        if config.embedding.model.is_none() {
            return Err(VellumError::config(format!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            )));
        }
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            return Err(VellumError::config(format!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)
            .map_err(|e| VellumError::config(e.to_string()))?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = parse("[storage]\ndata_dir = \"./data\"\n").unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.embedding.provider, "disabled");
        assert!(!config.embedding.is_enabled());
        assert_eq!(config.retrieval.default_k, 5);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let err = parse(
            "[storage]\ndata_dir = \"./data\"\n[chunking]\nchunk_size = 100\noverlap = 100\n",
        )
        .unwrap_err();
        assert!(matches!(err, VellumError::Configuration { .. }));
    }

    #[test]
    fn test_openai_requires_model_and_dims() {
        let err = parse(
            "[storage]\ndata_dir = \"./data\"\n[embedding]\nprovider = \"openai\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, VellumError::Configuration { .. }));

        let ok = parse(
            "[storage]\ndata_dir = \"./data\"\n[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\ndims = 1536\n",
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = parse(
            "[storage]\ndata_dir = \"./data\"\n[embedding]\nprovider = \"cohere\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, VellumError::Configuration { .. }));
    }
}
