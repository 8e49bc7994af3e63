//! Inference service holding exactly one artifact at a time.
//!
//! The loaded artifact sits behind an `Arc` inside a lock that is held only
//! long enough to clone or replace that `Arc`. A prediction works on the
//! snapshot it cloned, so a concurrent reload can never pair one version's
//! schema with another version's model.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::common::error::ServiceError;
use crate::data::domain::RawRecord;
use crate::features::encoder::encode;
use crate::training::domain::{Artifact, ArtifactRepo, ArtifactSelector, Classifier};

use super::domain::{Label, PredictionResult, ServiceState};

enum Slot {
    Unloaded,
    Loading,
    Ready(Arc<Artifact>),
    Failed(String),
}

pub struct InferenceService {
    slot: RwLock<Slot>,
}

impl Default for InferenceService {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceService {
    /// A service with nothing loaded; every prediction is refused.
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(Slot::Unloaded),
        }
    }

    /// Load `selector` from `repo`. Never fails: on error the service is
    /// returned in the `Failed` state and the cause is logged.
    pub fn load(repo: &dyn ArtifactRepo, selector: ArtifactSelector) -> Self {
        let service = Self::new();
        let _ = service.reload(repo, selector);
        service
    }

    /// A ready service serving `artifact`.
    pub fn from_artifact(artifact: Artifact) -> Result<Self, ServiceError> {
        let service = Self::new();
        service.install(artifact)?;
        Ok(service)
    }

    /// Replace the served artifact with the one `selector` names.
    ///
    /// A failed reload while `Ready` keeps serving the current artifact.
    pub fn reload(
        &self,
        repo: &dyn ArtifactRepo,
        selector: ArtifactSelector,
    ) -> Result<u64, ServiceError> {
        {
            let mut slot = self.slot.write();
            if !matches!(*slot, Slot::Ready(_)) {
                *slot = Slot::Loading;
            }
        }

        let loaded = repo.load(selector).and_then(|artifact| {
            artifact.validate()?;
            Ok(artifact)
        });

        match loaded {
            Ok(artifact) => self.install(artifact),
            Err(err) => {
                let mut slot = self.slot.write();
                let kept = match &*slot {
                    Slot::Ready(current) => Some(current.version),
                    _ => None,
                };
                match kept {
                    Some(kept) => {
                        warn!(kept, error = %err, "reload failed, keeping current artifact")
                    }
                    None => {
                        warn!(?selector, error = %err, "artifact load failed");
                        *slot = Slot::Failed(err.to_string());
                    }
                }
                Err(ServiceError::ArtifactUnavailable(err))
            }
        }
    }

    /// Atomically swap in `artifact` and return its version.
    pub fn install(&self, artifact: Artifact) -> Result<u64, ServiceError> {
        artifact.validate().map_err(ServiceError::ArtifactUnavailable)?;
        let version = artifact.version;
        let previous = {
            let mut slot = self.slot.write();
            std::mem::replace(&mut *slot, Slot::Ready(Arc::new(artifact)))
        };
        match previous {
            Slot::Ready(old) => info!(from = old.version, to = version, "artifact swapped"),
            _ => info!(version, "artifact ready"),
        }
        Ok(version)
    }

    pub fn state(&self) -> ServiceState {
        match &*self.slot.read() {
            Slot::Unloaded => ServiceState::Unloaded,
            Slot::Loading => ServiceState::Loading,
            Slot::Ready(a) => ServiceState::Ready { version: a.version },
            Slot::Failed(_) => ServiceState::Failed,
        }
    }

    pub fn active_version(&self) -> Option<u64> {
        self.snapshot().map(|a| a.version)
    }

    /// Reason the last load failed, while in the `Failed` state.
    pub fn failure(&self) -> Option<String> {
        match &*self.slot.read() {
            Slot::Failed(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// Column names the active schema expects, in model order.
    pub fn expected_columns(&self) -> Option<Vec<String>> {
        self.snapshot().map(|a| {
            a.schema
                .column_names()
                .into_iter()
                .map(String::from)
                .collect()
        })
    }

    /// Classify one record against the active artifact.
    pub fn predict(&self, record: &RawRecord) -> Result<PredictionResult, ServiceError> {
        let artifact = self.snapshot().ok_or(ServiceError::ServiceUnavailable)?;
        predict_with(&artifact, record)
    }

    /// Classify several records against a single artifact snapshot.
    pub fn predict_batch(
        &self,
        records: &[RawRecord],
    ) -> Result<Vec<Result<PredictionResult, ServiceError>>, ServiceError> {
        let artifact = self.snapshot().ok_or(ServiceError::ServiceUnavailable)?;
        Ok(records.iter().map(|r| predict_with(&artifact, r)).collect())
    }

    fn snapshot(&self) -> Option<Arc<Artifact>> {
        match &*self.slot.read() {
            Slot::Ready(artifact) => Some(Arc::clone(artifact)),
            _ => None,
        }
    }
}

fn predict_with(artifact: &Artifact, record: &RawRecord) -> Result<PredictionResult, ServiceError> {
    let vector = encode(record, &artifact.schema).map_err(|cause| {
        debug!(version = artifact.version, column = cause.column(), error = %cause, "prediction rejected");
        ServiceError::InvalidInput(cause)
    })?;
    let score = artifact.model.score(vector.as_slice());
    Ok(PredictionResult {
        label: Label::from_score(score, artifact.threshold),
        raw_score: Some(score),
        version: artifact.version,
    })
}
