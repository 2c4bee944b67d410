//! Nearest-category classification by cosine similarity.
//!
//! Leaves are ranked by descending similarity to the query embedding.
//! Exactly equal similarities are ordered by leaf name, ascending, so a
//! ranking is reproducible regardless of map iteration order.

use crate::error::ClassifyError;
use crate::models::EmbeddingMap;
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub similarity: f64,
}

/// Cosine similarity of two vectors, `None` if their lengths differ or
/// either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

pub fn cosine_distance(a: &[f32], b: &[f32]) -> Option<f64> {
    cosine_similarity(a, b).map(|s| 1.0 - s)
}

/// Ranks `leaf_embeddings` against `query` and keeps the best `top_n`.
pub fn classify(
    query: &[f32],
    leaf_embeddings: &EmbeddingMap,
    top_n: usize,
) -> Result<Vec<Prediction>, ClassifyError> {
    rank("query", query, leaf_embeddings, top_n)
}

/// Like [`classify`], resolving the query through precomputed text embeddings.
pub fn classify_text(
    text: &str,
    leaf_embeddings: &EmbeddingMap,
    text_embeddings: &EmbeddingMap,
    top_n: usize,
) -> Result<Vec<Prediction>, ClassifyError> {
    let query = text_embeddings
        .get(text)
        .ok_or_else(|| ClassifyError::EmbeddingNotFound(text.to_string()))?;
    rank(text, query, leaf_embeddings, top_n)
}

fn rank(
    key: &str,
    query: &[f32],
    leaf_embeddings: &EmbeddingMap,
    top_n: usize,
) -> Result<Vec<Prediction>, ClassifyError> {
    if top_n == 0 {
        return Err(ClassifyError::InvalidTopN);
    }
    if leaf_embeddings.is_empty() {
        return Err(ClassifyError::NoCandidates);
    }
    if query.iter().all(|v| *v == 0.0) {
        return Err(ClassifyError::ZeroVector(key.to_string()));
    }

    let mut ranked = Vec::with_capacity(leaf_embeddings.len());
    for (label, embedding) in leaf_embeddings {
        if embedding.len() != query.len() {
            return Err(ClassifyError::DimensionMismatch {
                key: label.clone(),
                expected: query.len(),
                found: embedding.len(),
            });
        }
        let similarity = cosine_similarity(query, embedding)
            .ok_or_else(|| ClassifyError::ZeroVector(label.clone()))?;
        ranked.push(Prediction {
            label: label.clone(),
            similarity,
        });
    }

    ranked.sort_by(|a, b| match b.similarity.total_cmp(&a.similarity) {
        Ordering::Equal => a.label.cmp(&b.label),
        other => other,
    });
    ranked.truncate(top_n);
    Ok(ranked)
}
