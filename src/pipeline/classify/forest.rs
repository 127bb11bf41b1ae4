//! Tree-ensemble evaluator for models exported as JSON.
//!
//! The export format is a flat node table per tree, as produced by
//! walking a fitted random forest's `tree_` arrays:
//!
//! ```json
//! {
//!   "feature_names_in": ["Value", "Age", "GenderEncoded", "Parameter_WBC"],
//!   "n_classes": 3,
//!   "trees": [
//!     { "nodes": [
//!         { "feature": 0, "threshold": 4000.0, "left": 1, "right": 2, "value": [] },
//!         { "feature": -1, "threshold": 0.0, "left": -1, "right": -1, "value": [0, 5, 0] },
//!         { "feature": -1, "threshold": 0.0, "left": -1, "right": -1, "value": [0, 0, 7] }
//!     ] }
//!   ]
//! }
//! ```
//!
//! Internal nodes send `x <= threshold` left, with `x` rounded to `f32`
//! first since the exported thresholds are midpoints between `f32` values.
//! The predicted class is the argmax of the mean of each tree's normalized
//! leaf distribution.

use std::path::Path;

use serde::Deserialize;

use super::types::{ClassifierModel, EncodedLabel, FeatureVector};
use super::{read_json, ClassifierError};

const LEAF: i64 = -1;

#[derive(Debug, Clone, Deserialize)]
struct NodeDef {
    feature: i64,
    #[serde(default)]
    threshold: f64,
    #[serde(default = "leaf_child")]
    left: i64,
    #[serde(default = "leaf_child")]
    right: i64,
    #[serde(default)]
    value: Vec<f64>,
}

fn leaf_child() -> i64 {
    LEAF
}

#[derive(Debug, Clone, Deserialize)]
struct TreeDef {
    nodes: Vec<NodeDef>,
}

#[derive(Debug, Clone, Deserialize)]
struct ForestDef {
    feature_names_in: Vec<String>,
    n_classes: usize,
    trees: Vec<TreeDef>,
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Class distribution, already normalized to sum to 1.
    Leaf(Vec<f64>),
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn leaf_for(&self, x: &[f64]) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = f64::from(x[*feature] as f32);
                    index = if value <= *threshold { *left } else { *right };
                }
                Node::Leaf(distribution) => return distribution,
            }
        }
    }
}

/// A validated random-forest classifier.
#[derive(Debug, Clone)]
pub struct ForestModel {
    layout: Vec<String>,
    n_classes: usize,
    trees: Vec<Tree>,
}

impl ForestModel {
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let def: ForestDef = read_json(path)?;
        let model = Self::from_def(def)?;
        tracing::info!(
            path = %path.display(),
            trees = model.trees.len(),
            classes = model.n_classes,
            slots = model.layout.len(),
            "Loaded tree-ensemble classifier"
        );
        Ok(model)
    }

    pub fn from_json(json: &str) -> Result<Self, ClassifierError> {
        let def: ForestDef = serde_json::from_str(json).map_err(|e| {
            ClassifierError::InvalidModel(format!("tree ensemble JSON: {e}"))
        })?;
        Self::from_def(def)
    }

    fn from_def(def: ForestDef) -> Result<Self, ClassifierError> {
        if def.feature_names_in.is_empty() {
            return Err(ClassifierError::InvalidModel(
                "model declares no features".into(),
            ));
        }
        if def.n_classes == 0 {
            return Err(ClassifierError::InvalidModel("model declares no classes".into()));
        }
        if def.trees.is_empty() {
            return Err(ClassifierError::InvalidModel("model has no trees".into()));
        }

        let n_features = def.feature_names_in.len();
        let trees = def
            .trees
            .into_iter()
            .enumerate()
            .map(|(t, tree)| build_tree(t, tree, n_features, def.n_classes))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            layout: def.feature_names_in,
            n_classes: def.n_classes,
            trees,
        })
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

fn build_tree(
    t: usize,
    tree: TreeDef,
    n_features: usize,
    n_classes: usize,
) -> Result<Tree, ClassifierError> {
    let invalid = |i: usize, msg: &str| {
        ClassifierError::InvalidModel(format!("tree {t} node {i}: {msg}"))
    };

    if tree.nodes.is_empty() {
        return Err(ClassifierError::InvalidModel(format!("tree {t} has no nodes")));
    }

    let count = tree.nodes.len();
    let mut nodes = Vec::with_capacity(count);
    for (i, node) in tree.nodes.into_iter().enumerate() {
        if node.feature == LEAF {
            if node.value.len() != n_classes {
                return Err(invalid(i, "leaf distribution length differs from n_classes"));
            }
            if node.value.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(invalid(i, "leaf distribution has a negative or non-finite weight"));
            }
            let total: f64 = node.value.iter().sum();
            if total <= 0.0 {
                return Err(invalid(i, "leaf distribution is empty"));
            }
            nodes.push(Node::Leaf(node.value.iter().map(|v| v / total).collect()));
            continue;
        }

        let feature = usize::try_from(node.feature)
            .ok()
            .filter(|f| *f < n_features)
            .ok_or_else(|| invalid(i, "feature index out of range"))?;
        if !node.threshold.is_finite() {
            return Err(invalid(i, "threshold is not finite"));
        }
        // Children must point forward so traversal always terminates.
        let child = |c: i64| {
            usize::try_from(c)
                .ok()
                .filter(|c| *c > i && *c < count)
                .ok_or_else(|| invalid(i, "child index out of range"))
        };
        nodes.push(Node::Split {
            feature,
            threshold: node.threshold,
            left: child(node.left)?,
            right: child(node.right)?,
        });
    }

    Ok(Tree { nodes })
}

impl ClassifierModel for ForestModel {
    fn expected_feature_layout(&self) -> &[String] {
        &self.layout
    }

    fn class_count(&self) -> Option<usize> {
        Some(self.n_classes)
    }

    fn predict(&self, features: &FeatureVector<'_>) -> Result<EncodedLabel, ClassifierError> {
        let x = features.values();
        if x.len() != self.layout.len() {
            return Err(ClassifierError::SchemaMismatch(format!(
                "vector has {} slots, model expects {}",
                x.len(),
                self.layout.len()
            )));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(ClassifierError::Prediction(
                "feature vector contains a non-finite value".into(),
            ));
        }

        let mut votes = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (acc, p) in votes.iter_mut().zip(tree.leaf_for(x)) {
                *acc += p;
            }
        }

        // First maximum wins on ties.
        let mut best = 0;
        for (class, score) in votes.iter().enumerate().skip(1) {
            if *score > votes[best] {
                best = class;
            }
        }
        Ok(EncodedLabel(best))
    }
}
