//! Inference domain: a loaded artifact serving predictions.

pub mod domain;
pub mod service;

pub use domain::{Label, PredictionResult, ServiceState};
pub use service::InferenceService;
