//! Text and JSON renderings of evaluation results.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use taxoclass_core::classifier::Prediction;
use taxoclass_core::pipeline::{EvaluationSummary, MetricOutcome};
use taxoclass_core::ExampleTable;

#[derive(Debug, Serialize)]
pub struct EvaluationReport<'a> {
    pub status: &'static str,
    pub generated_at: String,
    #[serde(flatten)]
    pub summary: &'a EvaluationSummary,
}

pub fn evaluation_json(
    summary: &EvaluationSummary,
    now: DateTime<Utc>,
) -> serde_json::Result<String> {
    let report = EvaluationReport {
        status: "ok",
        generated_at: now.to_rfc3339(),
        summary,
    };
    serde_json::to_string_pretty(&report)
}

/// Human-readable summary. With `examples`, misclassified rows are listed
/// with their text and label.
pub fn evaluation_text(summary: &EvaluationSummary, examples: Option<&ExampleTable>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "leaves: {}, examples: {}",
        summary.leaves, summary.examples
    );
    for outcome in &summary.top_n {
        let name = format!("top-{}", outcome.top_n.unwrap_or(1));
        write_outcome(&mut out, &name, outcome, examples);
    }
    write_outcome(&mut out, "partial", &summary.partial, examples);
    out
}

fn write_outcome(
    out: &mut String,
    name: &str,
    outcome: &MetricOutcome,
    examples: Option<&ExampleTable>,
) {
    match (&outcome.report, &outcome.error) {
        (Some(r), _) => {
            let _ = writeln!(
                out,
                "{name}: {:.4} ({}/{})",
                r.accuracy, r.correct, r.considered
            );
            if let Some(table) = examples {
                for row in &r.incorrect {
                    if let Some(e) = table.get(*row) {
                        let _ = writeln!(out, "  #{row} [{}] {:?}", e.label, e.text);
                    }
                }
            }
        }
        (None, Some(err)) => {
            let _ = writeln!(out, "{name}: error: {err}");
        }
        (None, None) => {
            let _ = writeln!(out, "{name}: no result");
        }
    }
}

pub fn predictions_text(predictions: &[Prediction]) -> String {
    let mut out = String::new();
    for (rank, p) in predictions.iter().enumerate() {
        let _ = writeln!(out, "{:>2}. {:.4}  {}", rank + 1, p.similarity, p.label);
    }
    out
}
