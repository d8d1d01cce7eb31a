//! Collision classifier port.
//!
//! The ASPR engine only depends on the [`Classifier`] trait.  Two
//! implementations exist:
//!
//! - [`AbsentClassifier`] – used when no artifact is configured or it failed
//!   to load; always predicts "no collision" with zero confidence.
//! - [`DecisionTreeClassifier`] – a CART-style binary tree loaded from the
//!   JSON artifact produced by the offline training pipeline.
//!
//! # Artifact format
//!
//! ```json
//! {
//!   "feature_order": ["distance_cm", "approach_speed", "az_g", "gz_dps"],
//!   "nodes": [
//!     { "split": { "feature": 0, "threshold": 20.0, "left": 1, "right": 2 } },
//!     { "leaf": { "value": [2.0, 18.0] } },
//!     { "leaf": { "value": [40.0, 1.0] } }
//!   ]
//! }
//! ```
//!
//! Node 0 is the root.  A split sends the sample left when
//! `x[feature] <= threshold`.  Leaf values are per-class weights
//! `[safe, collision]` and are normalised into probabilities.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// Fixed feature order shared with the training pipeline.
pub const FEATURE_ORDER: [&str; 4] = ["distance_cm", "approach_speed", "az_g", "gz_dps"];

/// `[distance_cm, approach_speed, az_g, gz_dps]`
pub type FeatureVector = [f64; 4];

/// Errors raised while loading or querying a classifier artifact.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("failed to read classifier artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse classifier artifact: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid classifier artifact: {0}")]
    Invalid(String),
    #[error("tree traversal did not reach a leaf")]
    Traversal,
}

/// Output of a single inference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// The classifier judges a collision more probable than not.
    pub collision: bool,
    /// Probability of the predicted class, in `[0, 1]`.
    pub confidence: f64,
}

/// Collision-risk model consulted by the safety engine.
pub trait Classifier: Send + Sync {
    /// `true` when backed by a real artifact.
    fn is_loaded(&self) -> bool;

    fn predict(&self, features: &FeatureVector) -> Result<Prediction, ClassifierError>;
}

/// Stand-in used when no artifact is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct AbsentClassifier;

impl Classifier for AbsentClassifier {
    fn is_loaded(&self) -> bool {
        false
    }

    fn predict(&self, _features: &FeatureVector) -> Result<Prediction, ClassifierError> {
        Ok(Prediction {
            collision: false,
            confidence: 0.0,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Decision tree
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

#[derive(Debug, Deserialize)]
struct TreeArtifact {
    #[serde(default)]
    feature_order: Option<Vec<String>>,
    nodes: Vec<TreeNode>,
}

/// Binary decision tree over [`FeatureVector`]s.
#[derive(Debug, Clone)]
pub struct DecisionTreeClassifier {
    nodes: Vec<TreeNode>,
}

impl DecisionTreeClassifier {
    /// Validate `nodes` and build a classifier.
    pub fn from_nodes(nodes: Vec<TreeNode>) -> Result<Self, ClassifierError> {
        if nodes.is_empty() {
            return Err(ClassifierError::Invalid("tree has no nodes".into()));
        }
        for (idx, node) in nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= FEATURE_ORDER.len() {
                        return Err(ClassifierError::Invalid(format!(
                            "node {idx} splits on unknown feature {feature}"
                        )));
                    }
                    if *left >= nodes.len() || *right >= nodes.len() {
                        return Err(ClassifierError::Invalid(format!(
                            "node {idx} has a child index out of range"
                        )));
                    }
                }
                TreeNode::Leaf { value } => {
                    if value.len() != 2 || value.iter().any(|w| !(*w >= 0.0)) {
                        return Err(ClassifierError::Invalid(format!(
                            "leaf {idx} must hold two non-negative class weights"
                        )));
                    }
                    if value.iter().sum::<f64>() <= 0.0 {
                        return Err(ClassifierError::Invalid(format!(
                            "leaf {idx} has zero total weight"
                        )));
                    }
                }
            }
        }
        Ok(Self { nodes })
    }

    /// Parse a JSON artifact.
    pub fn from_json(raw: &str) -> Result<Self, ClassifierError> {
        let artifact: TreeArtifact = serde_json::from_str(raw)?;
        if let Some(order) = &artifact.feature_order
            && order.iter().map(String::as_str).ne(FEATURE_ORDER)
        {
            return Err(ClassifierError::Invalid(format!(
                "feature order {order:?} does not match {FEATURE_ORDER:?}"
            )));
        }
        Self::from_nodes(artifact.nodes)
    }

    /// Read and parse the artifact at `path`.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Class probabilities `[p_safe, p_collision]` for `features`.
    pub fn predict_proba(&self, features: &FeatureVector) -> Result<[f64; 2], ClassifierError> {
        let mut idx = 0;
        // A well-formed tree reaches a leaf in fewer steps than it has nodes.
        for _ in 0..=self.nodes.len() {
            match &self.nodes[idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                TreeNode::Leaf { value } => {
                    let total = value[0] + value[1];
                    return Ok([value[0] / total, value[1] / total]);
                }
            }
        }
        Err(ClassifierError::Traversal)
    }
}

impl Classifier for DecisionTreeClassifier {
    fn is_loaded(&self) -> bool {
        true
    }

    fn predict(&self, features: &FeatureVector) -> Result<Prediction, ClassifierError> {
        let [p_safe, p_collision] = self.predict_proba(features)?;
        Ok(if p_collision > p_safe {
            Prediction {
                collision: true,
                confidence: p_collision,
            }
        } else {
            Prediction {
                collision: false,
                confidence: p_safe,
            }
        })
    }
}

/// Load the artifact at `path`, falling back to [`AbsentClassifier`] when
/// no path is configured or loading fails.  Never fails startup.
pub fn load_classifier(path: Option<&Path>) -> Arc<dyn Classifier> {
    let Some(path) = path else {
        info!("no classifier artifact configured; ASPR runs rule-only");
        return Arc::new(AbsentClassifier);
    };
    match DecisionTreeClassifier::load(path) {
        Ok(tree) => {
            info!(path = %path.display(), nodes = tree.nodes.len(), "classifier artifact loaded");
            Arc::new(tree)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "classifier artifact failed to load; ASPR runs rule-only");
            Arc::new(AbsentClassifier)
        }
    }
}
