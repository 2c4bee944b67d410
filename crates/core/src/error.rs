//! Error types for each stage: tree construction, classification,
//! scoring, embedding acquisition and table loading.

use crate::models::{ClassCode, ExampleId};
use providers::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("taxonomy row {row} is empty")]
    EmptyPath { row: usize },
    #[error("taxonomy row {row} has a category after an empty cell at column {column}")]
    GapInPath { row: usize, column: usize },
    #[error("leaf {name:?} appears under more than one parent")]
    DuplicateLeaf { name: String },
    #[error("example {row} is labelled {label:?}, which is not a taxonomy leaf")]
    UnknownLabel { row: ExampleId, label: String },
    #[error("example {row} is inconsistent with node {node:?} for class {class}: {reason}")]
    Consistency {
        node: String,
        row: ExampleId,
        class: ClassCode,
        reason: String,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum ClassifyError {
    #[error("no embedding found for {0:?}")]
    EmbeddingNotFound(String),
    #[error("no embedding for taxonomy leaf {0:?}")]
    MissingLeafEmbedding(String),
    #[error("{0:?} is not a taxonomy leaf")]
    UnknownLeaf(String),
    #[error("top_n must be at least 1")]
    InvalidTopN,
    #[error("no candidate leaves to rank")]
    NoCandidates,
    #[error("embedding for {key:?} has {found} dimensions, expected {expected}")]
    DimensionMismatch {
        key: String,
        expected: usize,
        found: usize,
    },
    #[error("embedding for {0:?} has zero norm")]
    ZeroVector(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum MetricsError {
    #[error("no examples match the {metric} filter")]
    NoExamples { metric: &'static str },
    #[error("classification of example {row} failed: {source}")]
    Classify {
        row: ExampleId,
        #[source]
        source: ClassifyError,
    },
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("got {texts} texts but {keys} keys")]
    InputLengthMismatch { texts: usize, keys: usize },
    #[error("cached keys differ from requested keys ({missing} missing, {unexpected} unexpected)")]
    CacheKeyMismatch { missing: usize, unexpected: usize },
    #[error("provider returned {found} vectors for {expected} texts")]
    ResponseLengthMismatch { expected: usize, found: usize },
    #[error("embedding provider failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("embedding cache io: {0}")]
    Io(#[from] std::io::Error),
    #[error("embedding cache is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("reading table: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing table json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported table format: {0}")]
    UnsupportedFormat(String),
    #[error("workbook: {0}")]
    Workbook(String),
    #[error("sheet {0:?} not found")]
    MissingSheet(String),
    #[error("row {row}, column {column}: {reason}")]
    BadCell {
        row: usize,
        column: usize,
        reason: String,
    },
}
