//! Prediction results and service lifecycle states.

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Positive,
    Negative,
}

impl Label {
    /// Apply the artifact's decision threshold: scores at or above it are positive.
    pub fn from_score(score: f64, threshold: f64) -> Self {
        if score >= threshold {
            Label::Positive
        } else {
            Label::Negative
        }
    }
}

/// Outcome of one prediction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: Label,
    pub raw_score: Option<f64>,
    /// Artifact version that produced this result.
    pub version: u64,
}

/// Lifecycle of an [`InferenceService`](super::service::InferenceService).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ServiceState {
    Unloaded,
    Loading,
    Ready { version: u64 },
    Failed,
}
