//! Domain types for training runs and versioned artifacts.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::error::{StoreError, TrainingError};
use crate::evaluation::domain::EvalReport;
use crate::features::schema::{BoolSpellings, Declarations, Schema};

use super::forest::{ForestLearner, ForestModel};
use super::logistic::{LogisticLearner, LogisticModel};

/// Learning algorithms available to the trainer.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Logistic,
    #[default]
    BaggedTrees,
}

/// Training hyperparameters. Every field has a default so `{}` is a valid config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainConfig {
    pub model_kind: ModelKind,
    pub seed: u64,
    /// Scores at or above this are `Positive`.
    pub threshold: f64,
    pub holdout_fraction: f64,
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            model_kind: ModelKind::default(),
            seed: 42,
            threshold: 0.5,
            holdout_fraction: 0.2,
            epochs: 200,
            learning_rate: 0.1,
            l2: 0.0,
            n_estimators: 50,
            max_depth: 6,
            min_samples_split: 2,
        }
    }
}

impl TrainConfig {
    pub fn parse(raw: &str) -> Result<Self, TrainingError> {
        let cfg: Self =
            serde_json::from_str(raw).map_err(|e| TrainingError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), TrainingError> {
        let fail = |msg: &str| Err(TrainingError::InvalidConfig(msg.to_string()));
        if !(0.0..=1.0).contains(&self.threshold) {
            return fail("threshold must be within [0, 1]");
        }
        if !(0.0..1.0).contains(&self.holdout_fraction) {
            return fail("holdout_fraction must be within [0, 1)");
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return fail("learning_rate must be positive");
        }
        if self.l2 < 0.0 {
            return fail("l2 must be >= 0");
        }
        if self.epochs == 0 || self.n_estimators == 0 || self.max_depth == 0 {
            return fail("epochs, n_estimators and max_depth must be >= 1");
        }
        if self.min_samples_split < 2 {
            return fail("min_samples_split must be >= 2");
        }
        Ok(())
    }

    /// Learner selected by `model_kind`.
    pub fn learner(&self) -> Box<dyn Learner> {
        match self.model_kind {
            ModelKind::Logistic => Box::new(LogisticLearner::from_config(self)),
            ModelKind::BaggedTrees => Box::new(ForestLearner::from_config(self)),
        }
    }
}

/// A fitted classifier. Scores are the probability of the positive class.
pub trait Classifier: Send + Sync {
    fn score(&self, features: &[f64]) -> f64;
}

/// Fits a [`Model`] from an encoded matrix and binary labels.
pub trait Learner {
    fn fit(&self, matrix: &[Vec<f64>], labels: &[bool]) -> Result<Model, TrainingError>;
}

/// Persistable trained model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Model {
    Logistic(LogisticModel),
    BaggedTrees(ForestModel),
}

impl Classifier for Model {
    fn score(&self, features: &[f64]) -> f64 {
        match self {
            Model::Logistic(m) => m.score(features),
            Model::BaggedTrees(m) => m.score(features),
        }
    }
}

impl Model {
    /// Structural checks on the fitted parameters.
    pub fn validate(&self) -> Result<(), StoreError> {
        match self {
            Model::Logistic(m) => m.validate(),
            Model::BaggedTrees(m) => m.validate(),
        }
    }

    /// Number of inputs the model was fitted on.
    pub fn width(&self) -> usize {
        match self {
            Model::Logistic(m) => m.width(),
            Model::BaggedTrees(m) => m.width(),
        }
    }
}

/// Unit of deployment: a schema and the model trained against it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub version: u64,
    pub created_ms: u64,
    pub schema: Schema,
    pub model: Model,
    pub threshold: f64,
    pub config: TrainConfig,
    pub evaluation: Option<EvalReport>,
}

impl Artifact {
    pub fn id(&self) -> ArtifactId {
        ArtifactId(self.version)
    }

    /// Structural checks run after decoding a persisted artifact.
    pub fn validate(&self) -> Result<(), StoreError> {
        self.schema
            .validate()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.model.validate()?;
        if self.model.width() != self.schema.columns().len() {
            return Err(StoreError::Corrupt(format!(
                "model expects {} inputs but schema declares {} columns",
                self.model.width(),
                self.schema.columns().len()
            )));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(StoreError::Corrupt("threshold outside [0, 1]".into()));
        }
        Ok(())
    }
}

/// Artifact identifier; equal to the artifact version.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ArtifactId(pub u64);

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ArtifactSelector {
    Id(ArtifactId),
    Latest,
}

/// Repository contract for versioned artifacts.
pub trait ArtifactRepo: Send + Sync {
    fn save(&self, artifact: &Artifact) -> Result<ArtifactId, StoreError>;
    fn load(&self, selector: ArtifactSelector) -> Result<Artifact, StoreError>;
    fn latest_version(&self) -> Result<Option<u64>, StoreError>;
}

/// Everything needed for one training run, as supplied by an external caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainingPlan {
    pub label_column: String,
    /// Explicit ordered feature list; all non-label columns when absent.
    #[serde(default)]
    pub features: Option<Vec<String>>,
    #[serde(default)]
    pub declarations: Declarations,
    #[serde(default)]
    pub label: BoolSpellings,
    #[serde(default)]
    pub config: TrainConfig,
}

impl TrainingPlan {
    pub fn parse(raw: &str) -> Result<Self, TrainingError> {
        let plan: Self =
            serde_json::from_str(raw).map_err(|e| TrainingError::InvalidConfig(e.to_string()))?;
        plan.config.validate()?;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = TrainConfig::parse("{}").unwrap();
        assert_eq!(cfg, TrainConfig::default());
        assert_eq!(cfg.model_kind, ModelKind::BaggedTrees);
        assert_eq!(cfg.seed, 42);
    }

    #[test]
    fn config_rejects_unknown_and_out_of_range_fields() {
        assert!(matches!(
            TrainConfig::parse(r#"{"n_trees": 3}"#),
            Err(TrainingError::InvalidConfig(_))
        ));
        assert!(matches!(
            TrainConfig::parse(r#"{"threshold": 1.5}"#),
            Err(TrainingError::InvalidConfig(_))
        ));
        assert!(matches!(
            TrainConfig::parse(r#"{"holdout_fraction": 1.0}"#),
            Err(TrainingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn plan_parses_declarations() {
        let plan = TrainingPlan::parse(
            r#"{
                "label_column": "Class/ASD",
                "features": ["age", "gender"],
                "declarations": {
                    "gender": {"kind": "categorical", "vocabulary": ["m", "f"]},
                    "age": {"kind": "numeric", "min": 0}
                },
                "config": {"model_kind": "logistic", "seed": 7}
            }"#,
        )
        .unwrap();
        assert_eq!(plan.label_column, "Class/ASD");
        assert_eq!(plan.declarations.len(), 2);
        assert_eq!(plan.config.model_kind, ModelKind::Logistic);
        assert_eq!(plan.label, BoolSpellings::default());
    }

    #[test]
    fn artifact_id_display() {
        assert_eq!(ArtifactId(3).to_string(), "v3");
    }
}
