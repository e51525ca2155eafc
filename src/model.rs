use crate::recommend::{PredictionError, PredictionService, CANONICAL_FEATURE_ORDER, FEATURE_DIFFICULTY};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

const ARTIFACT_SCHEMA: &str = include_str!("../contracts/model_artifact.schema.json");

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("cannot read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model artifact is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("artifact schema failed to compile: {0}")]
    Schema(String),
    #[error("model artifact does not match schema: {}", .0.join("; "))]
    Contract(Vec<String>),
    #[error("model artifact is inconsistent: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Result<Self, ModelError> {
        if classes.is_empty() {
            return Err(ModelError::Invalid("label space is empty".into()));
        }
        for (pos, class) in classes.iter().enumerate() {
            if classes[..pos].contains(class) {
                return Err(ModelError::Invalid(format!("duplicate class {class:?}")));
            }
        }
        Ok(Self { classes })
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn encode(&self, label: &str) -> Result<i64, PredictionError> {
        self.classes
            .iter()
            .position(|c| c == label)
            .map(|pos| pos as i64)
            .ok_or_else(|| PredictionError::UnknownLabel {
                label: label.to_string(),
            })
    }

    pub fn decode(&self, code: i64) -> Result<&str, PredictionError> {
        usize::try_from(code)
            .ok()
            .and_then(|pos| self.classes.get(pos))
            .map(String::as_str)
            .ok_or(PredictionError::UnknownCode { code })
    }
}

// The schema's "integer" also admits `1.0`.
fn whole_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if value.is_finite() && value.fract() == 0.0 && value >= 0.0 {
        Ok(value)
    } else {
        Err(serde::de::Error::custom(format!("expected a non-negative whole number, got {value}")))
    }
}

fn whole_usize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    let value = whole_number(deserializer)?;
    if value > u32::MAX as f64 {
        return Err(serde::de::Error::custom(format!("{value} is too large for a node index")));
    }
    Ok(value as usize)
}

fn whole_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = whole_number(deserializer)?;
    if value > u32::MAX as f64 {
        return Err(serde::de::Error::custom(format!("{value} is too large for a class code")));
    }
    Ok(value as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
enum TreeNode {
    Split {
        #[serde(deserialize_with = "whole_usize")]
        feature: usize,
        threshold: f64,
        #[serde(deserialize_with = "whole_usize")]
        left: usize,
        #[serde(deserialize_with = "whole_usize")]
        right: usize,
    },
    Leaf {
        #[serde(deserialize_with = "whole_i64")]
        class: i64,
    },
}

#[derive(Debug, Deserialize)]
struct ModelArtifact {
    feature_names: Vec<String>,
    difficulty_classes: Vec<String>,
    topic_classes: Vec<String>,
    nodes: Vec<TreeNode>,
}

/// Binary decision tree; `row[feature] <= threshold` descends left.
#[derive(Debug, Clone)]
pub struct TreeModel {
    feature_names: Vec<String>,
    difficulty: LabelEncoder,
    topics: LabelEncoder,
    nodes: Vec<TreeNode>,
}

impl TreeModel {
    pub fn from_path(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let model = Self::from_json_str(&raw)?;
        info!(
            path = %path.display(),
            nodes = model.nodes.len(),
            topics = model.topics.len(),
            "model artifact loaded"
        );
        Ok(model)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ModelError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        check_contract(&value)?;
        let artifact: ModelArtifact = serde_json::from_value(value)?;
        Self::from_artifact(artifact)
    }

    fn from_artifact(artifact: ModelArtifact) -> Result<Self, ModelError> {
        let model = Self {
            difficulty: LabelEncoder::new(artifact.difficulty_classes)?,
            topics: LabelEncoder::new(artifact.topic_classes)?,
            feature_names: artifact.feature_names,
            nodes: artifact.nodes,
        };
        model.check_tree()?;
        Ok(model)
    }

    fn check_tree(&self) -> Result<(), ModelError> {
        let node_count = self.nodes.len();
        for (i, node) in self.nodes.iter().enumerate() {
            match *node {
                TreeNode::Split {
                    feature, left, right, ..
                } => {
                    if feature >= self.feature_names.len() {
                        return Err(ModelError::Invalid(format!(
                            "node {i} splits on feature {feature}, only {} declared",
                            self.feature_names.len()
                        )));
                    }
                    if left >= node_count || right >= node_count {
                        return Err(ModelError::Invalid(format!("node {i} points past the last node")));
                    }
                }
                TreeNode::Leaf { class } => {
                    self.topics
                        .decode(class)
                        .map_err(|_| ModelError::Invalid(format!("node {i} predicts unknown class {class}")))?;
                }
            }
        }

        let mut visited = vec![false; node_count];
        let mut stack = vec![0usize];
        while let Some(i) = stack.pop() {
            if visited[i] {
                return Err(ModelError::Invalid(format!("node {i} is reachable more than once")));
            }
            visited[i] = true;
            if let TreeNode::Split { left, right, .. } = self.nodes[i] {
                stack.push(left);
                stack.push(right);
            }
        }
        Ok(())
    }
}

fn check_contract(value: &serde_json::Value) -> Result<(), ModelError> {
    let schema: serde_json::Value = serde_json::from_str(ARTIFACT_SCHEMA)?;
    let compiled = jsonschema::draft202012::new(&schema).map_err(|e| ModelError::Schema(e.to_string()))?;
    let issues: Vec<String> = compiled
        .iter_errors(value)
        .map(|e| format!("{}: {}", e.instance_path, e))
        .collect();
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ModelError::Contract(issues))
    }
}

impl PredictionService for TreeModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn encode_difficulty(&self, label: &str) -> Result<i64, PredictionError> {
        self.difficulty.encode(label)
    }

    fn predict(&self, row: &[f64]) -> Result<i64, PredictionError> {
        if row.len() != self.feature_names.len() {
            return Err(PredictionError::FeatureMismatch(format!(
                "model expects {} features, got {}",
                self.feature_names.len(),
                row.len()
            )));
        }
        let mut current = 0usize;
        for _ in 0..self.nodes.len() {
            match self.nodes[current] {
                TreeNode::Leaf { class } => return Ok(class),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    current = if row[feature] <= threshold { left } else { right };
                }
            }
        }
        Err(PredictionError::Unavailable("tree walk did not reach a leaf".into()))
    }

    fn decode_topic(&self, code: i64) -> Result<String, PredictionError> {
        self.topics.decode(code).map(str::to_string)
    }
}

#[derive(Debug, Clone)]
pub struct StubPredictionService {
    feature_names: Vec<String>,
    difficulty: LabelEncoder,
    topics: LabelEncoder,
}

const STUB_DIFFICULTIES: [&str; 3] = ["Easy", "Hard", "Medium"];
const STUB_TOPICS: [&str; 4] = [
    "Kinematics",
    "Laws of Motion",
    "Work, Energy and Power",
    "Mixed Practice",
];

impl Default for StubPredictionService {
    fn default() -> Self {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            feature_names: owned(&CANONICAL_FEATURE_ORDER),
            difficulty: LabelEncoder {
                classes: owned(&STUB_DIFFICULTIES),
            },
            topics: LabelEncoder {
                classes: owned(&STUB_TOPICS),
            },
        }
    }
}

impl StubPredictionService {
    pub fn topics(&self) -> &LabelEncoder {
        &self.topics
    }
}

impl PredictionService for StubPredictionService {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn encode_difficulty(&self, label: &str) -> Result<i64, PredictionError> {
        self.difficulty.encode(label)
    }

    fn predict(&self, row: &[f64]) -> Result<i64, PredictionError> {
        let pos = self
            .feature_names
            .iter()
            .position(|n| n == FEATURE_DIFFICULTY)
            .ok_or_else(|| PredictionError::FeatureMismatch(format!("missing {FEATURE_DIFFICULTY}")))?;
        let code = row
            .get(pos)
            .ok_or_else(|| PredictionError::FeatureMismatch("row is shorter than the feature list".into()))?;
        Ok((*code as i64).rem_euclid(self.topics.len() as i64))
    }

    fn decode_topic(&self, code: i64) -> Result<String, PredictionError> {
        self.topics.decode(code).map(str::to_string)
    }
}
