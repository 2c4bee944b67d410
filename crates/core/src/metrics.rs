//! Accuracy of the nearest-category classifier against labeled examples.
//!
//! Two passes share the same shape: filter the example table by class code,
//! classify every remaining row, and count the rows whose prediction
//! matches under the pass's rule.
//!
//! | Pass | Rows considered | Correct when |
//! |------|-----------------|--------------|
//! | [`top_n_accuracy`] | `class == exact` | label is among the top-N leaves |
//! | [`partial_accuracy`] | `class != unrelated` | label shares a parent with the top-1 leaf |
//!
//! A filter that selects no rows is an error, never a `NaN` rate.

use crate::classifier;
use crate::error::{ClassifyError, MetricsError};
use crate::models::{ClassCode, EmbeddingMap, ExampleId, ExampleTable, LabeledExample};
use crate::taxonomy::Taxonomy;
use serde::{Deserialize, Serialize};

/// Class codes that select rows for each pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringClasses {
    pub exact: ClassCode,
    pub unrelated: ClassCode,
}

impl Default for ScoringClasses {
    fn default() -> Self {
        Self {
            exact: ClassCode::EXACT,
            unrelated: ClassCode::UNRELATED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyReport {
    pub correct: usize,
    pub considered: usize,
    pub accuracy: f64,
    /// Rows scored as wrong, in table order.
    pub incorrect: Vec<ExampleId>,
}

/// Share of exact-class rows whose label is among the `top_n` predictions.
pub fn top_n_accuracy(
    examples: &ExampleTable,
    leaf_embeddings: &EmbeddingMap,
    text_embeddings: &EmbeddingMap,
    top_n: usize,
    exact_class: ClassCode,
) -> Result<AccuracyReport, MetricsError> {
    score(
        "top_n_accuracy",
        examples.iter().filter(|(_, e)| e.class_code == exact_class),
        |row, example| {
            let predictions =
                classifier::classify_text(&example.text, leaf_embeddings, text_embeddings, top_n)
                    .map_err(|source| MetricsError::Classify { row, source })?;
            Ok(predictions.iter().any(|p| p.label == example.label))
        },
    )
}

/// Share of related or exact rows whose label is in the sibling group of the
/// top-1 prediction. Only the first prediction is ever checked.
pub fn partial_accuracy(
    taxonomy: &Taxonomy,
    examples: &ExampleTable,
    leaf_embeddings: &EmbeddingMap,
    text_embeddings: &EmbeddingMap,
    unrelated_class: ClassCode,
) -> Result<AccuracyReport, MetricsError> {
    score(
        "partial_accuracy",
        examples.iter().filter(|(_, e)| e.class_code != unrelated_class),
        |row, example| {
            let predicted = top_label(example, leaf_embeddings, text_embeddings)
                .map_err(|source| MetricsError::Classify { row, source })?;
            let leaf = taxonomy.leaf(&predicted).ok_or(MetricsError::Classify {
                row,
                source: ClassifyError::UnknownLeaf(predicted),
            })?;
            Ok(taxonomy
                .sibling_group(leaf)
                .contains(&example.label.as_str()))
        },
    )
}

/// Number of related or exact rows whose top-1 prediction is their label.
/// Never exceeds the `correct` count of [`partial_accuracy`].
pub fn exact_match_count(
    examples: &ExampleTable,
    leaf_embeddings: &EmbeddingMap,
    text_embeddings: &EmbeddingMap,
    unrelated_class: ClassCode,
) -> Result<usize, MetricsError> {
    let mut count = 0;
    for (row, example) in examples.iter().filter(|(_, e)| e.class_code != unrelated_class) {
        let predicted = top_label(example, leaf_embeddings, text_embeddings)
            .map_err(|source| MetricsError::Classify { row, source })?;
        if predicted == example.label {
            count += 1;
        }
    }
    Ok(count)
}

fn top_label(
    example: &LabeledExample,
    leaf_embeddings: &EmbeddingMap,
    text_embeddings: &EmbeddingMap,
) -> Result<String, ClassifyError> {
    classifier::classify_text(&example.text, leaf_embeddings, text_embeddings, 1)?
        .into_iter()
        .next()
        .map(|p| p.label)
        .ok_or(ClassifyError::NoCandidates)
}

fn score<'a, I, F>(metric: &'static str, rows: I, mut is_correct: F) -> Result<AccuracyReport, MetricsError>
where
    I: Iterator<Item = (ExampleId, &'a LabeledExample)>,
    F: FnMut(ExampleId, &LabeledExample) -> Result<bool, MetricsError>,
{
    let mut considered = 0;
    let mut correct = 0;
    let mut incorrect = Vec::new();
    for (row, example) in rows {
        considered += 1;
        if is_correct(row, example)? {
            correct += 1;
        } else {
            incorrect.push(row);
        }
    }
    if considered == 0 {
        return Err(MetricsError::NoExamples { metric });
    }
    Ok(AccuracyReport {
        correct,
        considered,
        accuracy: correct as f64 / considered as f64,
        incorrect,
    })
}

/// Bundles one evaluation run's inputs and checks that they agree.
pub struct Evaluator<'a> {
    taxonomy: &'a Taxonomy,
    examples: &'a ExampleTable,
    leaf_embeddings: &'a EmbeddingMap,
    text_embeddings: &'a EmbeddingMap,
    classes: ScoringClasses,
}

impl<'a> Evaluator<'a> {
    /// Fails if a taxonomy leaf has no embedding, or an embedding is keyed by
    /// something that is not a leaf.
    pub fn new(
        taxonomy: &'a Taxonomy,
        examples: &'a ExampleTable,
        leaf_embeddings: &'a EmbeddingMap,
        text_embeddings: &'a EmbeddingMap,
        classes: ScoringClasses,
    ) -> Result<Self, ClassifyError> {
        for name in taxonomy.leaf_names(taxonomy.root()) {
            if !leaf_embeddings.contains_key(name) {
                return Err(ClassifyError::MissingLeafEmbedding(name.to_string()));
            }
        }
        if let Some(stray) = leaf_embeddings.keys().find(|k| taxonomy.leaf(k).is_none()) {
            return Err(ClassifyError::UnknownLeaf(stray.clone()));
        }
        Ok(Self {
            taxonomy,
            examples,
            leaf_embeddings,
            text_embeddings,
            classes,
        })
    }

    pub fn top_n_accuracy(&self, top_n: usize) -> Result<AccuracyReport, MetricsError> {
        top_n_accuracy(
            self.examples,
            self.leaf_embeddings,
            self.text_embeddings,
            top_n,
            self.classes.exact,
        )
    }

    pub fn partial_accuracy(&self) -> Result<AccuracyReport, MetricsError> {
        partial_accuracy(
            self.taxonomy,
            self.examples,
            self.leaf_embeddings,
            self.text_embeddings,
            self.classes.unrelated,
        )
    }

    pub fn exact_match_count(&self) -> Result<usize, MetricsError> {
        exact_match_count(
            self.examples,
            self.leaf_embeddings,
            self.text_embeddings,
            self.classes.unrelated,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryPath, LabeledExample};

    fn paths(rows: &[&[&str]]) -> Vec<CategoryPath> {
        rows.iter()
            .map(|r| r.iter().map(|n| Some(n.to_string())).collect())
            .collect()
    }

    fn map(entries: &[(&str, &[f32])]) -> EmbeddingMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_vec()))
            .collect()
    }

    struct Fixture {
        taxonomy: Taxonomy,
        examples: ExampleTable,
        leaves: EmbeddingMap,
        texts: EmbeddingMap,
    }

    fn fixture() -> Fixture {
        let examples: ExampleTable = vec![
            // nearest leaf A2, labelled A1
            LabeledExample::new("foo", "A1", 1),
            // nearest leaf A1, labelled B1
            LabeledExample::new("bar", "B1", 1),
            // nearest leaf B1, labelled B1
            LabeledExample::new("baz", "B1", 2),
            // unrelated rows never count
            LabeledExample::new("qux", "A2", 0),
        ]
        .into_iter()
        .collect();
        let taxonomy = Taxonomy::build(&paths(&[&["A", "A1"], &["A", "A2"], &["B", "B1"]]), &examples)
            .unwrap();
        let leaves = map(&[
            ("A1", &[1.0, 0.0, 0.0]),
            ("A2", &[0.0, 1.0, 0.0]),
            ("B1", &[0.0, 0.0, 1.0]),
        ]);
        let texts = map(&[
            ("foo", &[0.1, 1.0, 0.0]),
            ("bar", &[1.0, 0.0, 0.2]),
            ("baz", &[0.0, 0.1, 1.0]),
            ("qux", &[1.0, 0.0, 0.0]),
        ]);
        Fixture {
            taxonomy,
            examples,
            leaves,
            texts,
        }
    }

    #[test]
    fn sibling_credit_only_for_same_parent() {
        let f = fixture();
        let exact = top_n_accuracy(&f.examples, &f.leaves, &f.texts, 1, ClassCode::EXACT).unwrap();
        assert_eq!(exact.considered, 2);
        assert_eq!(exact.correct, 0);
        assert_eq!(exact.incorrect, vec![0, 1]);
        assert_eq!(exact.accuracy, 0.0);

        let partial = partial_accuracy(
            &f.taxonomy,
            &f.examples,
            &f.leaves,
            &f.texts,
            ClassCode::UNRELATED,
        )
        .unwrap();
        assert_eq!(partial.considered, 3);
        assert_eq!(partial.correct, 2);
        assert_eq!(partial.incorrect, vec![1]);
        assert!((partial.accuracy - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn wider_top_n_can_recover_the_label() {
        let f = fixture();
        let top2 = top_n_accuracy(&f.examples, &f.leaves, &f.texts, 2, ClassCode::EXACT).unwrap();
        // "foo" ranks A2 then A1; "bar" ranks A1 then B1.
        assert_eq!(top2.correct, 2);
        assert!(top2.incorrect.is_empty());
        assert_eq!(top2.accuracy, 1.0);
    }

    #[test]
    fn empty_filter_is_an_error() {
        let f = fixture();
        let related_only: ExampleTable = vec![LabeledExample::new("baz", "B1", 2)]
            .into_iter()
            .collect();
        assert_eq!(
            top_n_accuracy(&related_only, &f.leaves, &f.texts, 1, ClassCode::EXACT),
            Err(MetricsError::NoExamples {
                metric: "top_n_accuracy"
            })
        );

        let unrelated_only: ExampleTable = vec![LabeledExample::new("qux", "A2", 0)]
            .into_iter()
            .collect();
        assert_eq!(
            partial_accuracy(
                &f.taxonomy,
                &unrelated_only,
                &f.leaves,
                &f.texts,
                ClassCode::UNRELATED
            ),
            Err(MetricsError::NoExamples {
                metric: "partial_accuracy"
            })
        );
    }

    #[test]
    fn missing_text_embedding_names_the_row() {
        let f = fixture();
        let mut texts = f.texts.clone();
        texts.remove("bar");
        let err = top_n_accuracy(&f.examples, &f.leaves, &texts, 1, ClassCode::EXACT).unwrap_err();
        assert_eq!(
            err,
            MetricsError::Classify {
                row: 1,
                source: ClassifyError::EmbeddingNotFound("bar".into())
            }
        );
    }

    #[test]
    fn partial_correct_bounds_exact_matches() {
        let f = fixture();
        let evaluator = Evaluator::new(
            &f.taxonomy,
            &f.examples,
            &f.leaves,
            &f.texts,
            ScoringClasses::default(),
        )
        .unwrap();
        let exact = evaluator.exact_match_count().unwrap();
        let partial = evaluator.partial_accuracy().unwrap();
        assert_eq!(exact, 1);
        assert!(partial.correct >= exact);
    }

    #[test]
    fn evaluator_checks_leaf_coverage() {
        let f = fixture();
        let mut leaves = f.leaves.clone();
        leaves.remove("A2");
        assert_eq!(
            Evaluator::new(&f.taxonomy, &f.examples, &leaves, &f.texts, ScoringClasses::default())
                .err(),
            Some(ClassifyError::MissingLeafEmbedding("A2".into()))
        );

        let mut leaves = f.leaves.clone();
        leaves.insert("A".into(), vec![1.0, 1.0, 0.0]);
        assert_eq!(
            Evaluator::new(&f.taxonomy, &f.examples, &leaves, &f.texts, ScoringClasses::default())
                .err(),
            Some(ClassifyError::UnknownLeaf("A".into()))
        );
    }

    #[test]
    fn prediction_outside_taxonomy_is_reported() {
        let f = fixture();
        let mut leaves = f.leaves.clone();
        leaves.insert("Elsewhere".into(), vec![0.0, 0.1, 1.0]);
        let err = partial_accuracy(&f.taxonomy, &f.examples, &leaves, &f.texts, ClassCode::UNRELATED)
            .unwrap_err();
        assert_eq!(
            err,
            MetricsError::Classify {
                row: 2,
                source: ClassifyError::UnknownLeaf("Elsewhere".into())
            }
        );
    }
}
