//! Offline embedding provider based on feature hashing.
//!
//! Each lowercase word token and each character trigram of the token is
//! hashed with blake3 into one of `dimensions` buckets. The sign of the
//! contribution comes from a second hash bit so collisions tend to cancel.
//! Vectors are not normalized; callers compute cosine similarity themselves.
//!
//! Texts with no word tokens (punctuation, emoji) fall back to hashing the
//! trimmed text itself, so no input ever maps to the zero vector.

use crate::{EmbedResponse, EmbeddingProvider, ProviderError};

pub const DEFAULT_DIMENSIONS: usize = 256;

#[derive(Debug, Clone)]
pub struct HashingProvider {
    dimensions: usize,
}

impl Default for HashingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl HashingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokens(text) {
            self.accumulate(&mut vector, &token, 1.0);
            let chars: Vec<char> = token.chars().collect();
            if chars.len() > 3 {
                for window in chars.windows(3) {
                    let gram: String = window.iter().collect();
                    self.accumulate(&mut vector, &gram, 0.5);
                }
            }
        }
        if vector.iter().all(|v| *v == 0.0) {
            self.accumulate(&mut vector, &fallback_feature(text), 1.0);
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = blake3::hash(feature.as_bytes());
        let bytes = hash.as_bytes();
        let mut head = [0u8; 8];
        head.copy_from_slice(&bytes[..8]);
        let bucket = (u64::from_le_bytes(head) % self.dimensions as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn fallback_feature(text: &str) -> String {
    ["\u{0}", text.trim()].concat()
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashingProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        Ok(EmbedResponse {
            vectors: texts.iter().map(|t| self.embed_one(t)).collect(),
        })
    }
}
