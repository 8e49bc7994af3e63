// lib.rs - screening pipeline: schema, encoding, training, inference
pub mod api;
pub mod common;
pub mod data;
pub mod evaluation;
pub mod features;
pub mod inference;
pub mod training;

#[cfg(test)]
mod test_support;

pub use common::{EncodingError, ErrorCode, SchemaError, ServiceError, StoreError, TrainingError};
pub use data::{Dataset, RawRecord, RawValue};
pub use features::{encode, ColumnDecl, Declarations, EncodedVector, Schema};
pub use inference::{InferenceService, Label, PredictionResult, ServiceState};
pub use training::service::{train, train_and_store};
pub use training::{Artifact, ArtifactRepo, ArtifactSelector, TrainConfig, TrainingPlan};
