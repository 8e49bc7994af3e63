//! In-process artifact store, used when no filesystem is wanted.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::common::error::StoreError;

use super::domain::{Artifact, ArtifactId, ArtifactRepo, ArtifactSelector};

#[derive(Default)]
pub struct MemoryArtifactRepo {
    artifacts: RwLock<BTreeMap<u64, Artifact>>,
}

impl MemoryArtifactRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactRepo for MemoryArtifactRepo {
    fn save(&self, artifact: &Artifact) -> Result<ArtifactId, StoreError> {
        match self.artifacts.write().entry(artifact.version) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(artifact.version)),
            Entry::Vacant(slot) => {
                slot.insert(artifact.clone());
                Ok(artifact.id())
            }
        }
    }

    fn load(&self, selector: ArtifactSelector) -> Result<Artifact, StoreError> {
        let artifacts = self.artifacts.read();
        let found = match selector {
            ArtifactSelector::Id(id) => artifacts.get(&id.0),
            ArtifactSelector::Latest => artifacts.values().next_back(),
        };
        found.cloned().ok_or_else(|| {
            StoreError::NotFound(match selector {
                ArtifactSelector::Id(id) => id.to_string(),
                ArtifactSelector::Latest => "latest".into(),
            })
        })
    }

    fn latest_version(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.artifacts.read().keys().next_back().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_artifact;

    #[test]
    fn latest_is_the_highest_version() {
        let repo = MemoryArtifactRepo::new();
        repo.save(&sample_artifact(2)).unwrap();
        repo.save(&sample_artifact(1)).unwrap();
        assert_eq!(repo.latest_version().unwrap(), Some(2));
        assert_eq!(repo.load(ArtifactSelector::Latest).unwrap().version, 2);
        assert!(matches!(
            repo.load(ArtifactSelector::Id(ArtifactId(7))),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn saving_a_taken_version_fails() {
        let repo = MemoryArtifactRepo::new();
        let first = sample_artifact(1);
        let mut rival = sample_artifact(1);
        rival.threshold = 0.9;
        repo.save(&first).unwrap();
        assert!(matches!(repo.save(&rival), Err(StoreError::AlreadyExists(1))));
        assert_eq!(repo.load(ArtifactSelector::Latest).unwrap(), first);
    }
}
