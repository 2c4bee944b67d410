use crate::metrics::ScoringClasses;
use crate::models::ClassCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_taxonomy_path")]
    pub taxonomy_path: String,
    #[serde(default = "default_examples_path")]
    pub examples_path: String,
    /// Workbook sheet holding the category paths; first sheet if unset.
    #[serde(default)]
    pub taxonomy_sheet: Option<String>,
    #[serde(default)]
    pub examples_sheet: Option<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            taxonomy_path: default_taxonomy_path(),
            examples_path: default_examples_path(),
            taxonomy_sheet: None,
            examples_sheet: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafText {
    /// Embed the leaf's own name.
    #[default]
    Name,
    /// Embed the leaf's full category path.
    Path,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    #[serde(default)]
    pub force_recompute: bool,
    #[serde(default)]
    pub leaf_text: LeafText,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: String::new(),
            dimensions: default_dimensions(),
            batch_size: default_batch_size(),
            cache_dir: default_cache_dir(),
            force_recompute: false,
            leaf_text: LeafText::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "default_top_n")]
    pub top_n: Vec<usize>,
    #[serde(default = "default_exact_class")]
    pub exact_class: i64,
    #[serde(default)]
    pub unrelated_class: i64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            exact_class: default_exact_class(),
            unrelated_class: ClassCode::UNRELATED.0,
        }
    }
}

impl EvaluationConfig {
    pub fn scoring_classes(&self) -> ScoringClasses {
        ScoringClasses {
            exact: ClassCode(self.exact_class),
            unrelated: ClassCode(self.unrelated_class),
        }
    }
}

fn default_taxonomy_path() -> String {
    "data/taxonomy.json".to_string()
}

fn default_examples_path() -> String {
    "data/examples.json".to_string()
}

fn default_provider() -> String {
    "hashing".to_string()
}

fn default_dimensions() -> usize {
    providers::hashing::DEFAULT_DIMENSIONS
}

fn default_batch_size() -> usize {
    64
}

fn default_cache_dir() -> String {
    "data/embeddings".to_string()
}

fn default_top_n() -> Vec<usize> {
    vec![1]
}

fn default_exact_class() -> i64 {
    ClassCode::EXACT.0
}

/// Loads configuration from `path` (or `config/default` if present), then
/// `TAXOCLASS_*` environment variables, e.g. `TAXOCLASS_EMBEDDINGS__PROVIDER`.
pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix("TAXOCLASS")
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("evaluation.top_n")
            .try_parsing(true),
    );
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}
