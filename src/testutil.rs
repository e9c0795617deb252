//! Deterministic embedding doubles used by unit tests.

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::{Result, VellumError};

/// Embeds text as a letter-frequency vector over `a..=z`.
///
/// Crude but deterministic, and similar texts land close in cosine space,
/// which is all the pipeline tests need.
#[derive(Debug)]
pub struct LetterFreqProvider;

pub const LETTER_DIMS: usize = 26;

fn embed_one(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; LETTER_DIMS];
    for c in text.chars().flat_map(|c| c.to_lowercase()) {
        if c.is_ascii_lowercase() {
            v[(c as u8 - b'a') as usize] += 1.0;
        }
    }
    v
}

#[async_trait]
impl EmbeddingProvider for LetterFreqProvider {
    fn model_name(&self) -> &str {
        "letter-freq"
    }

    fn dims(&self) -> usize {
        LETTER_DIMS
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| embed_one(t)).collect())
    }
}

/// A provider that fails every call, for exercising the downgrade and
/// abort paths.
#[derive(Debug)]
pub struct FailingProvider;

#[async_trait]
impl EmbeddingProvider for FailingProvider {
    fn model_name(&self) -> &str {
        "failing"
    }

    fn dims(&self) -> usize {
        LETTER_DIMS
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(VellumError::Embedding {
            reason: "synthetic failure".to_string(),
        })
    }
}
