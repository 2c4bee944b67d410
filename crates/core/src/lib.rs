//! Core library: taxonomy indexing, nearest-category classification,
//! accuracy metrics and the embedding cache boundary.

pub mod classifier;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod tables;
pub mod taxonomy;

pub use error::{ClassifyError, EmbeddingError, MetricsError, TableError, TaxonomyError};
pub use models::{ClassCode, EmbeddingMap, ExampleId, ExampleTable, LabeledExample};
pub use taxonomy::{NodeId, Taxonomy};
