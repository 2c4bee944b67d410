use crate::classifier::{self, Prediction};
use crate::config::{AppConfig, LeafText};
use crate::embeddings;
use crate::metrics::{AccuracyReport, Evaluator};
use crate::models::{EmbeddingMap, ExampleTable};
use crate::tables;
use crate::taxonomy::Taxonomy;
use anyhow::Context;
use providers::hashing::HashingProvider;
use providers::noop::NoopProvider;
use providers::openai::{OpenAiConfig, OpenAiProvider};
use providers::ProviderRegistry;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

const LEAF_CACHE: &str = "leaves.json";
const TEXT_CACHE: &str = "texts.json";

#[derive(Debug, Clone, Serialize)]
pub struct MetricOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<AccuracyReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MetricOutcome {
    fn from_result<E: std::fmt::Display>(
        top_n: Option<usize>,
        result: Result<AccuracyReport, E>,
    ) -> Self {
        match result {
            Ok(report) => Self {
                top_n,
                report: Some(report),
                error: None,
            },
            Err(e) => Self {
                top_n,
                report: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationSummary {
    pub leaves: usize,
    pub examples: usize,
    pub top_n: Vec<MetricOutcome>,
    pub partial: MetricOutcome,
}

/// Reads both input tables and builds the indexed taxonomy.
pub fn load_taxonomy(config: &AppConfig) -> anyhow::Result<(Taxonomy, ExampleTable)> {
    let data = &config.data;
    let paths = tables::load_taxonomy(Path::new(&data.taxonomy_path), data.taxonomy_sheet.as_deref())
        .with_context(|| format!("loading taxonomy from {}", data.taxonomy_path))?;
    let examples = tables::load_examples(Path::new(&data.examples_path), data.examples_sheet.as_deref())
        .with_context(|| format!("loading examples from {}", data.examples_path))?;
    let taxonomy = Taxonomy::build(&paths, &examples).context("building taxonomy")?;
    info!(
        "Built taxonomy: {} nodes, {} leaves, {} examples",
        taxonomy.len(),
        taxonomy.leaves(taxonomy.root()).len(),
        examples.len()
    );
    if taxonomy.is_empty() {
        warn!("Taxonomy from {} has no categories", data.taxonomy_path);
    }
    Ok((taxonomy, examples))
}

/// Texts to embed for each leaf, and the leaf names they are keyed by.
pub fn leaf_texts(taxonomy: &Taxonomy, mode: LeafText) -> (Vec<String>, Vec<String>) {
    taxonomy
        .leaves(taxonomy.root())
        .into_iter()
        .map(|leaf| {
            let text = match mode {
                LeafText::Name => taxonomy.name(leaf).to_string(),
                LeafText::Path => taxonomy.path(leaf).join(" / "),
            };
            (text, taxonomy.name(leaf).to_string())
        })
        .unzip()
}

/// Leaf embeddings keyed by leaf name, from `cache_dir/leaves.json` when possible.
pub async fn load_leaf_embeddings(
    config: &AppConfig,
    registry: &ProviderRegistry,
    taxonomy: &Taxonomy,
) -> anyhow::Result<EmbeddingMap> {
    let cfg = &config.embeddings;
    let provider = registry.embedding(Some(cfg.provider.as_str()))?;
    let (texts, keys) = leaf_texts(taxonomy, cfg.leaf_text);
    embeddings::compute_or_load(
        &*provider,
        &texts,
        &keys,
        &Path::new(&cfg.cache_dir).join(LEAF_CACHE),
        cfg.force_recompute,
        cfg.batch_size,
    )
    .await
    .context("leaf embeddings")
}

/// Leaf and example embeddings, from the cache directory when possible.
pub async fn load_embeddings(
    config: &AppConfig,
    registry: &ProviderRegistry,
    taxonomy: &Taxonomy,
    examples: &ExampleTable,
) -> anyhow::Result<(EmbeddingMap, EmbeddingMap)> {
    let leaves = load_leaf_embeddings(config, registry, taxonomy).await?;

    let cfg = &config.embeddings;
    let provider = registry.embedding(Some(cfg.provider.as_str()))?;
    let texts = examples.texts();
    let example_embeddings = embeddings::compute_or_load(
        &*provider,
        &texts,
        &texts,
        &Path::new(&cfg.cache_dir).join(TEXT_CACHE),
        cfg.force_recompute,
        cfg.batch_size,
    )
    .await
    .context("example embeddings")?;

    Ok((leaves, example_embeddings))
}

/// Builds the taxonomy, acquires embeddings and runs every configured metric.
/// A failing metric is recorded in the summary and does not stop the others.
/// The example table is handed back for reporting on misclassified rows.
pub async fn run_evaluation(
    config: &AppConfig,
) -> anyhow::Result<(EvaluationSummary, ExampleTable)> {
    let (taxonomy, examples) = load_taxonomy(config)?;
    let registry = build_registry(config);
    let (leaves, texts) = load_embeddings(config, &registry, &taxonomy, &examples).await?;

    let evaluator = Evaluator::new(
        &taxonomy,
        &examples,
        &leaves,
        &texts,
        config.evaluation.scoring_classes(),
    )?;

    let mut top_n = Vec::new();
    for &n in &config.evaluation.top_n {
        let result = evaluator.top_n_accuracy(n);
        match &result {
            Ok(r) => info!(
                "Top-{} accuracy: {:.4} ({}/{})",
                n, r.accuracy, r.correct, r.considered
            ),
            Err(e) => warn!("Top-{} accuracy failed: {}", n, e),
        }
        top_n.push(MetricOutcome::from_result(Some(n), result));
    }

    let result = evaluator.partial_accuracy();
    match &result {
        Ok(r) => info!(
            "Partial accuracy: {:.4} ({}/{})",
            r.accuracy, r.correct, r.considered
        ),
        Err(e) => warn!("Partial accuracy failed: {}", e),
    }

    let summary = EvaluationSummary {
        leaves: leaves.len(),
        examples: examples.len(),
        top_n,
        partial: MetricOutcome::from_result(None, result),
    };
    Ok((summary, examples))
}

/// Embeds a single free-form text and ranks the taxonomy leaves against it.
/// Only the leaf cache is consulted; example embeddings are never touched.
pub async fn classify_query(
    config: &AppConfig,
    text: &str,
    top_n: usize,
) -> anyhow::Result<Vec<Prediction>> {
    let (taxonomy, _) = load_taxonomy(config)?;
    let registry = build_registry(config);
    let leaves = load_leaf_embeddings(config, &registry, &taxonomy).await?;
    let resp = embeddings::embed(
        embeddings::EmbeddingRequest {
            texts: vec![text.to_string()],
            provider: Some(config.embeddings.provider.clone()),
        },
        &registry,
    )
    .await?;
    let query = resp
        .vectors
        .into_iter()
        .next()
        .context("provider returned no vector")?;
    Ok(classifier::classify(&query, &leaves, top_n)?)
}

pub fn build_registry(config: &AppConfig) -> ProviderRegistry {
    let mut reg = ProviderRegistry::new()
        .with_embedding("noop", Arc::new(NoopProvider))
        .with_embedding(
            "hashing",
            Arc::new(HashingProvider::new(config.embeddings.dimensions)),
        );

    if let (Some(key), Some(base)) = (
        std::env::var_os("OPENAI_API_KEY"),
        std::env::var_os("OPENAI_BASE_URL"),
    ) {
        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key: key.to_string_lossy().into_owned(),
            base_url: base.to_string_lossy().into_owned(),
            embedding_model: config.embeddings.model.clone(),
        });
        reg = reg.with_embedding("openai", Arc::new(provider));
    }

    reg.set_preferred_embedding(&config.embeddings.provider)
}
