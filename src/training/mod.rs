//! Training domain: learners, training runs and the artifact store.

pub mod domain;
pub mod forest;
pub mod logistic;
pub mod repo_fs;
pub mod repo_mem;
pub mod service;

pub use domain::{
    Artifact, ArtifactId, ArtifactRepo, ArtifactSelector, Classifier, Learner, Model, ModelKind,
    TrainConfig, TrainingPlan,
};
