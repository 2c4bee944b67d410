use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Row identifier of an example: its position in the [`ExampleTable`].
pub type ExampleId = usize;

/// Embedding vectors keyed by item (leaf name or example text).
pub type EmbeddingMap = BTreeMap<String, Vec<f32>>;

/// Truth-label class of an example relative to its assigned leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassCode(pub i64);

impl ClassCode {
    pub const UNRELATED: ClassCode = ClassCode(0);
    pub const EXACT: ClassCode = ClassCode(1);
    pub const RELATED: ClassCode = ClassCode(2);
}

impl fmt::Display for ClassCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledExample {
    pub text: String,
    pub label: String,
    #[serde(rename = "cls", alias = "class_code")]
    pub class_code: ClassCode,
}

impl LabeledExample {
    pub fn new(text: impl Into<String>, label: impl Into<String>, class_code: i64) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
            class_code: ClassCode(class_code),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExampleTable {
    rows: Vec<LabeledExample>,
}

impl ExampleTable {
    pub fn new(rows: Vec<LabeledExample>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: ExampleId) -> Option<&LabeledExample> {
        self.rows.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ExampleId, &LabeledExample)> {
        self.rows.iter().enumerate()
    }

    /// Distinct class codes present in the table, ascending.
    pub fn class_codes(&self) -> Vec<ClassCode> {
        let mut codes: Vec<ClassCode> = self.rows.iter().map(|r| r.class_code).collect();
        codes.sort();
        codes.dedup();
        codes
    }

    /// Texts in row order, e.g. for computing example embeddings.
    pub fn texts(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.text.clone()).collect()
    }
}

impl FromIterator<LabeledExample> for ExampleTable {
    fn from_iter<I: IntoIterator<Item = LabeledExample>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// One taxonomy row: category names from the top level down, with trailing
/// `None`s for paths shorter than the table width.
pub type CategoryPath = Vec<Option<String>>;
