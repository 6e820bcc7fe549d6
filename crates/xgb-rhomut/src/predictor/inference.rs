//! Regressor backends
//!
//! Two on-disk formats are supported for the trained gradient-boosted model:
//! - XGBoost JSON (`Booster.save_model("*.json")`), evaluated natively
//! - ONNX, evaluated with tract
//!
//! Both return the raw margin, which for these models is the strength ratio
//! in `log1p` space.

use super::Regressor;
use crate::error::{Result, RhomutError};
use anyhow::Context;
use serde::{Deserialize, Deserializer};
use tract_onnx::prelude::*;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX regressor using tract for lightweight inference
pub struct OnnxRegressor {
    model: TractModel,
    feature_count: usize,
}

impl OnnxRegressor {
    /// Load and optimize an ONNX model taking `[1, feature_count]` f32 input
    pub fn from_bytes(model_bytes: &[u8], feature_count: usize) -> anyhow::Result<Self> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, feature_count]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(Self {
            model,
            feature_count,
        })
    }

    fn features_to_tensor(&self, features: &[f64]) -> Result<Tensor> {
        let data: Vec<f32> = features.iter().map(|v| *v as f32).collect();
        let array = tract_ndarray::Array2::from_shape_vec((1, self.feature_count), data)
            .map_err(|e| RhomutError::Inference(format!("invalid input shape: {e}")))?;
        Ok(array.into())
    }
}

impl Regressor for OnnxRegressor {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.feature_count {
            return Err(RhomutError::Inference(format!(
                "ONNX model expects {} features, got {}",
                self.feature_count,
                features.len()
            )));
        }

        let input = self.features_to_tensor(features)?;
        let result = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| RhomutError::Inference(format!("ONNX run failed: {e}")))?;
        let output = result
            .first()
            .ok_or_else(|| RhomutError::Inference("No output from model".to_string()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| RhomutError::Inference(format!("unexpected output type: {e}")))?;

        view.iter()
            .next()
            .map(|v| *v as f64)
            .ok_or_else(|| RhomutError::Inference("Model output is empty".to_string()))
    }
}

// --- XGBoost JSON -------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct XgbModel {
    learner: XgbLearner,
}

#[derive(Debug, Deserialize)]
struct XgbLearner {
    learner_model_param: LearnerModelParam,
    gradient_booster: GradientBooster,
    objective: Objective,
}

#[derive(Debug, Deserialize)]
struct LearnerModelParam {
    #[serde(deserialize_with = "deserialize_base_score")]
    base_score: f32,
    #[serde(default)]
    num_feature: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Objective {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
enum GradientBooster {
    Gbtree { model: ModelTrees },
    Dart { gbtree: GbtreeDefinition, weight_drop: Vec<f32> },
}

#[derive(Debug, Deserialize)]
struct GbtreeDefinition {
    model: ModelTrees,
}

#[derive(Debug, Deserialize)]
struct ModelTrees {
    trees: Vec<XgbTree>,
}

#[derive(Debug, Deserialize)]
struct XgbTree {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<i32>,
    split_conditions: Vec<f32>,
    #[serde(deserialize_with = "deserialize_flags")]
    default_left: Vec<bool>,
    base_weights: Vec<f32>,
}

/// base_score appears as a number, a string ("5E-1") or a bracketed string ("[5E-1]")
fn deserialize_base_score<'de, D>(deserializer: D) -> std::result::Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as SerdeError;
    use serde_json::Value;

    let mut value = Value::deserialize(deserializer)?;
    loop {
        match value {
            Value::Number(n) => {
                return n
                    .as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| SerdeError::custom("invalid base_score number"));
            }
            Value::String(s) => {
                let trimmed = s.trim().trim_start_matches('[').trim_end_matches(']');
                return trimmed
                    .parse::<f32>()
                    .map_err(|_| SerdeError::custom(format!("cannot parse base_score from '{s}'")));
            }
            Value::Array(arr) => match arr.into_iter().next() {
                Some(first) => value = first,
                None => return Err(SerdeError::custom("empty base_score array")),
            },
            _ => return Err(SerdeError::custom("base_score must be number, string or array")),
        }
    }
}

/// default_left appears as 0/1 integers or booleans depending on the XGBoost version
fn deserialize_flags<'de, D>(deserializer: D) -> std::result::Result<Vec<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as SerdeError;
    use serde_json::Value;

    Vec::<Value>::deserialize(deserializer)?
        .into_iter()
        .map(|v| match v {
            Value::Bool(b) => Ok(b),
            Value::Number(n) => Ok(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
            other => Err(SerdeError::custom(format!("invalid default_left flag: {other}"))),
        })
        .collect()
}

/// Objectives whose prediction is the raw margin
const IDENTITY_OBJECTIVES: &[&str] = &[
    "reg:squarederror",
    "reg:linear",
    "reg:absoluteerror",
    "reg:pseudohubererror",
    "reg:squaredlogerror",
];

#[derive(Debug, Clone, Copy)]
struct TreeNode {
    left: i32,
    right: i32,
    feature: usize,
    threshold: f32,
    default_left: bool,
    leaf_value: f32,
}

impl TreeNode {
    fn is_leaf(&self) -> bool {
        self.left == -1
    }
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<TreeNode>,
    weight: f32,
}

impl Tree {
    fn leaf_value(&self, features: &[f32]) -> f32 {
        let mut idx = 0usize;
        // Child indices are validated at load; the bound guards malformed cycles
        for _ in 0..self.nodes.len() {
            let node = &self.nodes[idx];
            if node.is_leaf() {
                return node.leaf_value;
            }
            let value = features[node.feature];
            let go_left = if value.is_nan() {
                node.default_left
            } else {
                value < node.threshold
            };
            let next = if go_left { node.left } else { node.right };
            idx = next as usize;
        }
        self.nodes[idx].leaf_value
    }
}

/// Gradient-boosted tree ensemble loaded from XGBoost's JSON model format
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    trees: Vec<Tree>,
    base_score: f32,
    feature_count: Option<usize>,
    max_feature_index: usize,
}

impl TreeEnsemble {
    pub fn from_json(bytes: &[u8]) -> anyhow::Result<Self> {
        let model: XgbModel =
            serde_json::from_slice(bytes).context("Failed to parse XGBoost JSON model")?;
        let learner = model.learner;

        if !IDENTITY_OBJECTIVES.contains(&learner.objective.name.as_str()) {
            anyhow::bail!("unsupported objective '{}'", learner.objective.name);
        }

        let (model_trees, weights) = match learner.gradient_booster {
            GradientBooster::Gbtree { model } => (model, None),
            GradientBooster::Dart {
                gbtree,
                weight_drop,
            } => (gbtree.model, Some(weight_drop)),
        };

        let mut max_feature_index = 0;
        let mut trees = Vec::with_capacity(model_trees.trees.len());
        for (tree_idx, xgb_tree) in model_trees.trees.into_iter().enumerate() {
            let weight = match &weights {
                Some(w) => *w
                    .get(tree_idx)
                    .with_context(|| format!("missing dart weight for tree {tree_idx}"))?,
                None => 1.0,
            };
            let tree = convert_tree(xgb_tree, tree_idx, weight)?;
            for node in tree.nodes.iter().filter(|n| !n.is_leaf()) {
                max_feature_index = max_feature_index.max(node.feature);
            }
            trees.push(tree);
        }

        let feature_count = learner
            .learner_model_param
            .num_feature
            .as_deref()
            .map(str::parse::<usize>)
            .transpose()
            .context("invalid num_feature")?;

        Ok(Self {
            trees,
            base_score: learner.learner_model_param.base_score,
            feature_count,
            max_feature_index,
        })
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

fn convert_tree(xgb_tree: XgbTree, tree_idx: usize, weight: f32) -> anyhow::Result<Tree> {
    let num_nodes = xgb_tree.left_children.len();
    if num_nodes == 0 {
        anyhow::bail!("tree {tree_idx} has no nodes");
    }
    if [
        xgb_tree.right_children.len(),
        xgb_tree.split_indices.len(),
        xgb_tree.split_conditions.len(),
        xgb_tree.default_left.len(),
        xgb_tree.base_weights.len(),
    ]
    .iter()
    .any(|len| *len != num_nodes)
    {
        anyhow::bail!("tree {tree_idx} has inconsistent node arrays");
    }

    let mut nodes = Vec::with_capacity(num_nodes);
    for idx in 0..num_nodes {
        let left = xgb_tree.left_children[idx];
        let right = xgb_tree.right_children[idx];
        if left != -1 {
            for child in [left, right] {
                if child < 0 || child as usize >= num_nodes {
                    anyhow::bail!(
                        "tree {tree_idx}: node {idx} references child {child} but tree has {num_nodes} nodes"
                    );
                }
            }
        }
        nodes.push(TreeNode {
            left,
            right,
            feature: xgb_tree.split_indices[idx].max(0) as usize,
            threshold: xgb_tree.split_conditions[idx],
            default_left: xgb_tree.default_left[idx],
            leaf_value: xgb_tree.base_weights[idx],
        });
    }

    Ok(Tree { nodes, weight })
}

impl Regressor for TreeEnsemble {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        if let Some(expected) = self.feature_count {
            if features.len() != expected {
                return Err(RhomutError::Inference(format!(
                    "XGBoost model expects {} features, got {}",
                    expected,
                    features.len()
                )));
            }
        }
        if !self.trees.is_empty() && self.max_feature_index >= features.len() {
            return Err(RhomutError::Inference(format!(
                "XGBoost model splits on feature {} but only {} were supplied",
                self.max_feature_index,
                features.len()
            )));
        }

        let row: Vec<f32> = features.iter().map(|v| *v as f32).collect();
        let margin = self
            .trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + tree.weight * tree.leaf_value(&row));
        Ok(margin as f64)
    }
}
