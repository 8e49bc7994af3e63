//! Filesystem store for versioned artifacts.
//!
//! One file per version, `artifact-{version:010}.bin`:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     Magic ("SCRA")
//! 4       1     Format version
//! 5       3     Reserved
//! 8       4     Payload size (u32 LE)
//! 12      4     CRC32 of payload (u32 LE)
//! 16      ..    JSON payload
//! ```
//!
//! Files are written to a `.tmp` sibling, synced and hard-linked into place,
//! so a reader never sees a partial artifact under its final name and a
//! published version is never replaced.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use crate::common::config::AppCfg;
use crate::common::error::StoreError;

use super::domain::{Artifact, ArtifactId, ArtifactRepo, ArtifactSelector};

pub const MAGIC: &[u8; 4] = b"SCRA";
pub const FORMAT_VERSION: u8 = 1;
pub const HEADER_SIZE: usize = 16;

const PREFIX: &str = "artifact-";
const SUFFIX: &str = ".bin";

/// Artifact store rooted at `cfg.artifact_root()`.
pub struct FsArtifactRepo {
    root: PathBuf,
}

impl FsArtifactRepo {
    pub fn new(cfg: &AppCfg) -> Self {
        Self::at(cfg.artifact_root())
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, id: ArtifactId) -> PathBuf {
        self.root.join(format!("{PREFIX}{:010}{SUFFIX}", id.0))
    }

    /// Per-writer scratch file; never matches the published name pattern.
    fn tmp_path_for(&self, id: ArtifactId) -> PathBuf {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        let n = NEXT.fetch_add(1, Ordering::Relaxed);
        self.root
            .join(format!("{PREFIX}{:010}.{}-{n}.tmp", id.0, std::process::id()))
    }

    fn versions(&self) -> Result<Vec<u64>, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut versions = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(v) = name
                .strip_prefix(PREFIX)
                .and_then(|rest| rest.strip_suffix(SUFFIX))
                .and_then(|digits| digits.parse().ok())
            {
                versions.push(v);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }
}

impl ArtifactRepo for FsArtifactRepo {
    fn save(&self, artifact: &Artifact) -> Result<ArtifactId, StoreError> {
        fs::create_dir_all(&self.root)?;
        let id = artifact.id();
        let path = self.path_for(id);
        if path.exists() {
            return Err(StoreError::AlreadyExists(id.0));
        }
        let tmp = self.tmp_path_for(id);

        let bytes = encode_artifact(artifact)?;
        let written = File::create(&tmp).and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        });
        // hard_link refuses an existing target.
        let published = written.and_then(|()| fs::hard_link(&tmp, &path));
        let _ = fs::remove_file(&tmp);
        match published {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                warn!(version = id.0, "artifact version already published");
                return Err(StoreError::AlreadyExists(id.0));
            }
            Err(e) => return Err(e.into()),
        }

        info!(version = id.0, path = %path.display(), bytes = bytes.len(), "artifact saved");
        Ok(id)
    }

    fn load(&self, selector: ArtifactSelector) -> Result<Artifact, StoreError> {
        let id = match selector {
            ArtifactSelector::Id(id) => id,
            ArtifactSelector::Latest => self
                .latest_version()?
                .map(ArtifactId)
                .ok_or_else(|| StoreError::NotFound("latest".into()))?,
        };
        let path = self.path_for(id);
        let bytes = read_existing(&path, id)?;
        let artifact = decode_artifact(&bytes)?;
        if artifact.version != id.0 {
            return Err(StoreError::Corrupt(format!(
                "file for {id} holds version {}",
                artifact.version
            )));
        }
        debug!(version = id.0, path = %path.display(), "artifact loaded");
        Ok(artifact)
    }

    fn latest_version(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.versions()?.last().copied())
    }
}

fn read_existing(path: &Path, id: ArtifactId) -> Result<Vec<u8>, StoreError> {
    fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => StoreError::NotFound(id.to_string()),
        _ => StoreError::Io(e),
    })
}

/// Serialise an artifact into header + payload bytes.
pub fn encode_artifact(artifact: &Artifact) -> Result<Vec<u8>, StoreError> {
    let payload = serde_json::to_vec(artifact)?;
    let size = u32::try_from(payload.len())
        .map_err(|_| StoreError::Corrupt("payload exceeds 4 GiB".into()))?;

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(MAGIC);
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&[0; 3]);
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Verify header and checksum, then decode and validate the artifact.
pub fn decode_artifact(bytes: &[u8]) -> Result<Artifact, StoreError> {
    if bytes.len() < HEADER_SIZE {
        return Err(StoreError::Corrupt("truncated header".into()));
    }
    if &bytes[0..4] != MAGIC {
        return Err(StoreError::Corrupt("bad magic".into()));
    }
    if bytes[4] != FORMAT_VERSION {
        return Err(StoreError::Corrupt(format!(
            "unsupported format version {}",
            bytes[4]
        )));
    }
    let size = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    let checksum = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
    let payload = &bytes[HEADER_SIZE..];
    if payload.len() != size {
        return Err(StoreError::Corrupt(format!(
            "payload is {} bytes, header says {size}",
            payload.len()
        )));
    }
    if crc32fast::hash(payload) != checksum {
        return Err(StoreError::Corrupt("checksum mismatch".into()));
    }

    let artifact: Artifact =
        serde_json::from_slice(payload).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    artifact.validate()?;
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::ServiceError;
    use crate::data::domain::RawRecord;
    use crate::inference::domain::ServiceState;
    use crate::inference::service::InferenceService;
    use crate::test_support::sample_artifact;
    use crate::training::domain::Model;
    use crate::training::forest::{ForestModel, Node, Tree};

    #[test]
    fn save_then_load_by_id_and_latest() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsArtifactRepo::at(dir.path());
        assert_eq!(repo.latest_version().unwrap(), None);

        let first = sample_artifact(1);
        let second = sample_artifact(2);
        assert_eq!(repo.save(&first).unwrap(), ArtifactId(1));
        assert_eq!(repo.save(&second).unwrap(), ArtifactId(2));

        assert_eq!(repo.latest_version().unwrap(), Some(2));
        assert_eq!(repo.load(ArtifactSelector::Id(ArtifactId(1))).unwrap(), first);
        assert_eq!(repo.load(ArtifactSelector::Latest).unwrap(), second);
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsArtifactRepo::at(dir.path().join("nowhere"));
        assert!(matches!(
            repo.load(ArtifactSelector::Latest),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            repo.load(ArtifactSelector::Id(ArtifactId(9))),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn leftover_tmp_files_are_not_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsArtifactRepo::at(dir.path());
        repo.save(&sample_artifact(1)).unwrap();
        fs::write(dir.path().join("artifact-0000000002.tmp"), b"half").unwrap();
        assert_eq!(repo.latest_version().unwrap(), Some(1));
    }

    #[test]
    fn truncated_or_flipped_payload_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsArtifactRepo::at(dir.path());
        repo.save(&sample_artifact(1)).unwrap();
        let path = repo.path_for(ArtifactId(1));
        let bytes = fs::read(&path).unwrap();

        fs::write(&path, &bytes[..bytes.len() - 10]).unwrap();
        assert!(matches!(
            repo.load(ArtifactSelector::Latest),
            Err(StoreError::Corrupt(_))
        ));

        let mut flipped = bytes.clone();
        let last = flipped.len() - 2;
        flipped[last] ^= 0x01;
        fs::write(&path, &flipped).unwrap();
        assert!(matches!(
            repo.load(ArtifactSelector::Latest),
            Err(StoreError::Corrupt(_))
        ));

        fs::write(&path, b"garbage").unwrap();
        assert!(matches!(
            repo.load(ArtifactSelector::Latest),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn renamed_file_with_wrong_version_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsArtifactRepo::at(dir.path());
        repo.save(&sample_artifact(1)).unwrap();
        fs::rename(repo.path_for(ArtifactId(1)), repo.path_for(ArtifactId(5))).unwrap();
        assert!(matches!(
            repo.load(ArtifactSelector::Latest),
            Err(StoreError::Corrupt(_))
        ));
    }

    fn dangling_forest_artifact() -> Artifact {
        let mut artifact = sample_artifact(1);
        artifact.model = Model::BaggedTrees(ForestModel {
            width: 3,
            trees: vec![Tree {
                nodes: vec![Node::Split {
                    feature: 0,
                    threshold: 0.5,
                    left: 7,
                    right: 8,
                }],
            }],
        });
        artifact
    }

    #[test]
    fn checksum_valid_but_malformed_model_is_corrupt() {
        let bytes = encode_artifact(&dangling_forest_artifact()).unwrap();
        assert!(matches!(decode_artifact(&bytes), Err(StoreError::Corrupt(_))));

        let dir = tempfile::tempdir().unwrap();
        let repo = FsArtifactRepo::at(dir.path());
        fs::write(repo.path_for(ArtifactId(1)), &bytes).unwrap();
        let service = InferenceService::load(&repo, ArtifactSelector::Latest);
        assert_eq!(service.state(), ServiceState::Failed);
        let record = RawRecord::new()
            .with("gender", "f")
            .with("jaundice", "no")
            .with("age", 30);
        assert!(matches!(
            service.predict(&record),
            Err(ServiceError::ServiceUnavailable)
        ));
    }

    #[test]
    fn existing_version_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsArtifactRepo::at(dir.path());
        let first = sample_artifact(1);
        let mut rival = sample_artifact(1);
        rival.threshold = 0.9;

        assert_eq!(repo.save(&first).unwrap(), ArtifactId(1));
        assert!(matches!(repo.save(&rival), Err(StoreError::AlreadyExists(1))));
        assert_eq!(repo.load(ArtifactSelector::Id(ArtifactId(1))).unwrap(), first);

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|name| name.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn header_layout() {
        let bytes = encode_artifact(&sample_artifact(3)).unwrap();
        assert_eq!(&bytes[0..4], b"SCRA");
        assert_eq!(bytes[4], FORMAT_VERSION);
        let size = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
        assert_eq!(size, bytes.len() - HEADER_SIZE);
    }
}
