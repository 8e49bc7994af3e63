//! Runtime configuration loaded from the process environment.

use std::env;
use std::path::PathBuf;

use tracing::Level;

/// Snapshot of configuration values consumed by the core.
#[derive(Clone, Debug)]
pub struct AppCfg {
    pub data_root: PathBuf,
    pub log_level: Level,
}

impl AppCfg {
    /// Create a configuration snapshot from the process environment.
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a snapshot from an arbitrary key lookup. Unset or unparseable
    /// values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_root = lookup("SCREENING_DATA_ROOT").unwrap_or_else(|| "./data".to_string());
        let log_level = lookup("SCREENING_LOG_LEVEL")
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(Level::INFO);

        Self {
            data_root: PathBuf::from(data_root),
            log_level,
        }
    }

    /// Directory holding versioned artifacts.
    pub fn artifact_root(&self) -> PathBuf {
        self.data_root.join("artifacts")
    }
}
