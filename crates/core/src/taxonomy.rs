//! Category tree with per-class example indexing.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. Ownership
//! flows from the root down through `children`; `parent` is only used for
//! upward lookups (ancestors, sibling groups).
//!
//! A tree is built once from a table of category paths and, optionally, a
//! table of labeled examples. Example indexing runs exactly once inside
//! [`Taxonomy::build`]; the finished tree exposes no mutation.

use crate::error::TaxonomyError;
use crate::models::{CategoryPath, ClassCode, ExampleId, ExampleTable, LabeledExample};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

pub const ROOT_NAME: &str = "Taxonomy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeKind {
    Leaf,
    Internal { children: Vec<NodeId> },
}

#[derive(Debug, Clone)]
pub struct TaxonomyNode {
    name: String,
    parent: Option<NodeId>,
    kind: NodeKind,
    examples: BTreeMap<ClassCode, Vec<ExampleId>>,
}

impl TaxonomyNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf)
    }

    /// Children in insertion order; empty for leaves.
    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Leaf => &[],
            NodeKind::Internal { children } => children,
        }
    }

    /// Example rows of class `class` in this node's subtree.
    pub fn examples(&self, class: ClassCode) -> &[ExampleId] {
        self.examples.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn example_index(&self) -> &BTreeMap<ClassCode, Vec<ExampleId>> {
        &self.examples
    }
}

#[derive(Debug, Clone)]
pub struct Taxonomy {
    nodes: Vec<TaxonomyNode>,
    leaves: HashMap<String, NodeId>,
    classes: Vec<ClassCode>,
}

impl Taxonomy {
    /// Builds the tree structure only; every node gets an empty example index.
    ///
    /// Category names need only be unique among siblings, but leaf names must
    /// be unique across the whole tree: example labels and leaf embeddings
    /// are keyed by leaf name. A repeated leaf name fails with
    /// [`TaxonomyError::DuplicateLeaf`].
    pub fn from_paths(paths: &[CategoryPath]) -> Result<Self, TaxonomyError> {
        let mut taxonomy = Self::with_root();
        for (row, path) in paths.iter().enumerate() {
            let names = path_names(row, path)?;
            let mut current = taxonomy.root();
            for name in names {
                current = match taxonomy.child(current, name) {
                    Some(existing) => existing,
                    None => taxonomy.attach(current, name),
                };
            }
        }
        taxonomy.register_leaves()?;
        Ok(taxonomy)
    }

    /// Builds the tree and indexes `examples` into it.
    ///
    /// The class schema is the set of class codes present in `examples`.
    /// Any example whose label does not name a leaf aborts construction.
    pub fn build(paths: &[CategoryPath], examples: &ExampleTable) -> Result<Self, TaxonomyError> {
        let mut taxonomy = Self::from_paths(paths)?;
        taxonomy.index_examples(examples)?;
        Ok(taxonomy)
    }

    fn with_root() -> Self {
        Self {
            nodes: vec![TaxonomyNode {
                name: ROOT_NAME.to_string(),
                parent: None,
                kind: NodeKind::Internal {
                    children: Vec::new(),
                },
                examples: BTreeMap::new(),
            }],
            leaves: HashMap::new(),
            classes: Vec::new(),
        }
    }

    fn attach(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(TaxonomyNode {
            name: name.to_string(),
            parent: Some(parent),
            kind: NodeKind::Leaf,
            examples: BTreeMap::new(),
        });
        let parent = &mut self.nodes[parent.0];
        parent.kind = match std::mem::replace(&mut parent.kind, NodeKind::Leaf) {
            NodeKind::Internal { mut children } => {
                children.push(id);
                NodeKind::Internal { children }
            }
            NodeKind::Leaf => NodeKind::Internal { children: vec![id] },
        };
        id
    }

    fn register_leaves(&mut self) -> Result<(), TaxonomyError> {
        let mut leaves = HashMap::new();
        for id in self.leaves(self.root()) {
            let name = self.nodes[id.0].name.clone();
            if leaves.insert(name.clone(), id).is_some() {
                return Err(TaxonomyError::DuplicateLeaf { name });
            }
        }
        self.leaves = leaves;
        Ok(())
    }

    fn index_examples(&mut self, table: &ExampleTable) -> Result<(), TaxonomyError> {
        self.classes = table.class_codes();

        let mut by_leaf: HashMap<NodeId, Vec<(ExampleId, &LabeledExample)>> = HashMap::new();
        for (row, example) in table.iter() {
            let leaf = self
                .leaf(&example.label)
                .ok_or_else(|| TaxonomyError::UnknownLabel {
                    row,
                    label: example.label.clone(),
                })?;
            by_leaf.entry(leaf).or_default().push((row, example));
        }

        // Reverse pre-order visits every child before its parent.
        let order = self.preorder(self.root());
        for &id in order.iter().rev() {
            let mut index = BTreeMap::new();
            for &class in &self.classes {
                let rows: Vec<ExampleId> = match &self.nodes[id.0].kind {
                    NodeKind::Leaf => by_leaf
                        .get(&id)
                        .map(|rows| {
                            rows.iter()
                                .filter(|(_, e)| e.class_code == class)
                                .map(|(row, _)| *row)
                                .collect()
                        })
                        .unwrap_or_default(),
                    NodeKind::Internal { children } => children
                        .iter()
                        .flat_map(|child| self.nodes[child.0].examples(class).iter().copied())
                        .collect(),
                };
                self.validate_rows(id, class, &rows, table)?;
                index.insert(class, rows);
            }
            self.nodes[id.0].examples = index;
        }
        Ok(())
    }

    /// Checks that every row assigned to `id` under `class` belongs there.
    fn validate_rows(
        &self,
        id: NodeId,
        class: ClassCode,
        rows: &[ExampleId],
        table: &ExampleTable,
    ) -> Result<(), TaxonomyError> {
        let node = &self.nodes[id.0];
        let fail = |row: ExampleId, reason: String| TaxonomyError::Consistency {
            node: node.name.clone(),
            row,
            class,
            reason,
        };
        for &row in rows {
            let example = table
                .get(row)
                .ok_or_else(|| fail(row, "row is not in the example table".into()))?;
            if example.class_code != class {
                return Err(fail(row, format!("row has class {}", example.class_code)));
            }
            if node.is_leaf() {
                if example.label != node.name {
                    return Err(fail(row, format!("label {:?} names another leaf", example.label)));
                }
            } else {
                let inside = self
                    .leaf(&example.label)
                    .map(|leaf| self.is_within(leaf, id))
                    .unwrap_or(false);
                if !inside {
                    return Err(fail(
                        row,
                        format!("label {:?} is outside this subtree", example.label),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the root has no categories under it.
    pub fn is_empty(&self) -> bool {
        self.nodes[0].children().is_empty()
    }

    pub fn node(&self, id: NodeId) -> &TaxonomyNode {
        &self.nodes[id.0]
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0].name
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.nodes[id.0]
            .children()
            .iter()
            .copied()
            .find(|c| self.nodes[c.0].name == name)
    }

    /// Class codes indexed on every node, fixed when the tree was built.
    pub fn class_codes(&self) -> &[ClassCode] {
        &self.classes
    }

    /// Leaf lookup by name across the whole tree.
    pub fn leaf(&self, name: &str) -> Option<NodeId> {
        self.leaves.get(name).copied()
    }

    /// Leaves of the subtree rooted at `id`, depth-first in insertion order.
    /// A leaf's subtree is the leaf itself.
    pub fn leaves(&self, id: NodeId) -> Vec<NodeId> {
        self.preorder(id)
            .into_iter()
            .filter(|n| self.nodes[n.0].is_leaf())
            .collect()
    }

    pub fn leaf_names(&self, id: NodeId) -> Vec<&str> {
        self.leaves(id).into_iter().map(|n| self.name(n)).collect()
    }

    /// Names of the children of `id`'s parent, `id` included.
    /// The root has no parent and forms a group of its own.
    pub fn sibling_group(&self, id: NodeId) -> Vec<&str> {
        match self.parent(id) {
            Some(parent) => self.nodes[parent.0]
                .children()
                .iter()
                .map(|c| self.name(*c))
                .collect(),
            None => vec![self.name(id)],
        }
    }

    /// Parents of `id` up to and including the root, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |n| self.parent(*n))
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    /// Category names from the top level down to `id`; the root is omitted.
    pub fn path(&self, id: NodeId) -> Vec<&str> {
        let mut names: Vec<&str> = std::iter::once(id)
            .chain(self.ancestors(id))
            .filter(|n| *n != self.root())
            .map(|n| self.name(n))
            .collect();
        names.reverse();
        names
    }

    /// Every root-to-leaf path, in depth-first order.
    pub fn paths(&self) -> Vec<Vec<&str>> {
        self.leaves(self.root())
            .into_iter()
            .map(|leaf| self.path(leaf))
            .collect()
    }

    /// Examples of class `class` indexed under `id`, resolved against `table`.
    pub fn examples<'t>(
        &self,
        id: NodeId,
        class: ClassCode,
        table: &'t ExampleTable,
    ) -> impl Iterator<Item = (ExampleId, &'t LabeledExample)> + 't {
        let rows = self.nodes[id.0].examples(class).to_vec();
        rows.into_iter()
            .filter_map(move |row| table.get(row).map(|e| (row, e)))
    }

    /// Indented drawing of the tree. Every node shows its example counts for
    /// exact, related and unrelated classes, in that order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_node(self.root(), "", None, &mut out);
        out
    }

    fn render_node(&self, id: NodeId, prefix: &str, last: Option<bool>, out: &mut String) {
        let node = &self.nodes[id.0];
        let counts = [ClassCode::EXACT, ClassCode::RELATED, ClassCode::UNRELATED]
            .iter()
            .map(|c| node.examples(*c).len().to_string())
            .collect::<Vec<_>>()
            .join(" | ");
        let branch = match last {
            None => "",
            Some(true) => "└── ",
            Some(false) => "├── ",
        };
        let _ = writeln!(out, "{prefix}{branch}{} [{counts}]", node.name);

        let child_prefix = match last {
            None => String::new(),
            Some(true) => format!("{prefix}    "),
            Some(false) => format!("{prefix}│   "),
        };
        let children = node.children();
        for (i, child) in children.iter().enumerate() {
            self.render_node(*child, &child_prefix, Some(i + 1 == children.len()), out);
        }
    }

    fn preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            order.push(n);
            stack.extend(self.nodes[n.0].children().iter().rev());
        }
        order
    }

    fn is_within(&self, id: NodeId, ancestor: NodeId) -> bool {
        id == ancestor || self.ancestors(id).any(|a| a == ancestor)
    }
}

/// Leading non-empty cells of a row. Trailing empties are allowed; a
/// category after an empty cell is not.
fn path_names(row: usize, path: &CategoryPath) -> Result<Vec<&str>, TaxonomyError> {
    let cells: Vec<Option<&str>> = path
        .iter()
        .map(|c| c.as_deref().map(str::trim).filter(|s| !s.is_empty()))
        .collect();
    let len = cells.iter().take_while(|c| c.is_some()).count();
    if let Some(column) = cells[len..].iter().position(Option::is_some) {
        return Err(TaxonomyError::GapInPath {
            row,
            column: len + column,
        });
    }
    if len == 0 {
        return Err(TaxonomyError::EmptyPath { row });
    }
    Ok(cells[..len].iter().flatten().copied().collect())
}
