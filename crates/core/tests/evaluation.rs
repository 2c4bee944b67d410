use std::fs;
use std::path::Path;
use taxoclass_core::config::{AppConfig, DataConfig, EmbeddingConfig, EvaluationConfig};
use taxoclass_core::pipeline;

fn write_tables(dir: &Path, examples: &str) -> AppConfig {
    let taxonomy = dir.join("taxonomy.json");
    let examples_path = dir.join("examples.json");
    fs::write(
        &taxonomy,
        r#"[
            ["Travel", "Flights", "Book flight"],
            ["Travel", "Flights", "Cancel flight"],
            ["Food", "Order pizza", null]
        ]"#,
    )
    .unwrap();
    fs::write(&examples_path, examples).unwrap();

    AppConfig {
        data: DataConfig {
            taxonomy_path: taxonomy.to_string_lossy().into_owned(),
            examples_path: examples_path.to_string_lossy().into_owned(),
            taxonomy_sheet: None,
            examples_sheet: None,
        },
        embeddings: EmbeddingConfig {
            cache_dir: dir.join("cache").to_string_lossy().into_owned(),
            batch_size: 2,
            ..EmbeddingConfig::default()
        },
        evaluation: EvaluationConfig {
            top_n: vec![1, 2],
            ..EvaluationConfig::default()
        },
    }
}

const EXAMPLES: &str = r#"[
    {"text": "book flight", "label": "Book flight", "cls": 1},
    {"text": "cancel\nflight", "label": "Cancel flight", "cls": 2},
    {"text": "order pizza", "label": "Order pizza", "cls": 1},
    {"text": "weather", "label": "Order pizza", "cls": 0}
]"#;

#[tokio::test]
async fn evaluation_scores_and_caches() {
    let temp = tempfile::tempdir().unwrap();
    let cfg = write_tables(temp.path(), EXAMPLES);

    let (summary, _) = pipeline::run_evaluation(&cfg).await.unwrap();
    assert_eq!(summary.leaves, 3);
    assert_eq!(summary.examples, 4);
    assert_eq!(summary.top_n.len(), 2);

    let top1 = summary.top_n[0].report.as_ref().unwrap();
    assert_eq!(summary.top_n[0].top_n, Some(1));
    assert_eq!(top1.considered, 2);
    assert_eq!(top1.correct, 2);
    assert!(top1.incorrect.is_empty());

    let partial = summary.partial.report.as_ref().unwrap();
    assert_eq!(partial.considered, 3);
    assert_eq!(partial.correct, 3);

    let cache = temp.path().join("cache");
    assert!(cache.join("leaves.json").exists());
    assert!(cache.join("texts.json").exists());

    // Second run is served from the cache and agrees with the first.
    let (again, examples) = pipeline::run_evaluation(&cfg).await.unwrap();
    assert_eq!(examples.len(), 4);
    assert_eq!(again.partial.report, summary.partial.report);
}

#[tokio::test]
async fn one_failing_metric_does_not_hide_the_other() {
    let temp = tempfile::tempdir().unwrap();
    let cfg = write_tables(
        temp.path(),
        r#"[{"text": "order pizza", "label": "Order pizza", "cls": 2}]"#,
    );

    let (summary, _) = pipeline::run_evaluation(&cfg).await.unwrap();
    assert!(summary.top_n.iter().all(|m| m.report.is_none()));
    assert!(summary.top_n[0]
        .error
        .as_deref()
        .unwrap()
        .contains("no examples"));
    assert_eq!(summary.partial.report.as_ref().unwrap().correct, 1);
}

#[tokio::test]
async fn punctuation_only_text_still_scores() {
    let temp = tempfile::tempdir().unwrap();
    let cfg = write_tables(
        temp.path(),
        r#"[
            {"text": "book flight", "label": "Book flight", "cls": 1},
            {"text": "???", "label": "Order pizza", "cls": 1},
            {"text": "!!", "label": "Cancel flight", "cls": 2}
        ]"#,
    );

    let (summary, _) = pipeline::run_evaluation(&cfg).await.unwrap();
    for outcome in &summary.top_n {
        assert!(outcome.error.is_none(), "{:?}", outcome.error);
        assert_eq!(outcome.report.as_ref().unwrap().considered, 2);
    }
    assert!(summary.partial.error.is_none(), "{:?}", summary.partial.error);
    assert_eq!(summary.partial.report.as_ref().unwrap().considered, 3);
}

#[tokio::test]
async fn unknown_label_fails_the_run() {
    let temp = tempfile::tempdir().unwrap();
    let cfg = write_tables(
        temp.path(),
        r#"[{"text": "x", "label": "Flights", "cls": 1}]"#,
    );
    let err = pipeline::run_evaluation(&cfg).await.unwrap_err();
    assert!(format!("{:#}", err).contains("not a taxonomy leaf"));
}

#[tokio::test]
async fn classify_query_ranks_leaves() {
    let temp = tempfile::tempdir().unwrap();
    let cfg = write_tables(temp.path(), EXAMPLES);
    let ranked = pipeline::classify_query(&cfg, "Order pizza", 2).await.unwrap();
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].label, "Order pizza");
    assert!((ranked[0].similarity - 1.0).abs() < 1e-9);
    assert!(!temp.path().join("cache").join("texts.json").exists());
}

#[tokio::test]
async fn classify_query_ignores_stale_text_cache() {
    let temp = tempfile::tempdir().unwrap();
    let cfg = write_tables(temp.path(), EXAMPLES);
    let cache = temp.path().join("cache");
    fs::create_dir_all(&cache).unwrap();
    fs::write(cache.join("texts.json"), r#"{"stale": [1.0]}"#).unwrap();

    let ranked = pipeline::classify_query(&cfg, "book flight", 1).await.unwrap();
    assert_eq!(ranked[0].label, "Book flight");
}

#[test]
fn taxonomy_loads_from_config() {
    let temp = tempfile::tempdir().unwrap();
    let cfg = write_tables(temp.path(), EXAMPLES);
    let (taxonomy, examples) = pipeline::load_taxonomy(&cfg).unwrap();
    assert_eq!(examples.len(), 4);
    let drawing = taxonomy.render();
    assert!(drawing.starts_with("Taxonomy [2 | 1 | 1]"));
    assert!(drawing.contains("Order pizza [1 | 0 | 1]"));
}
