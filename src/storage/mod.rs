pub mod artifact;
pub mod processed;
pub mod raw;

use std::path::PathBuf;

use crate::run::RunId;

// Re-export common types
pub use artifact::ArtifactStore;
pub use processed::ExtractionStore;
pub use raw::{SnapshotMeta, SnapshotStore};

/// Directory layout shared by all stages
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Raw HTML snapshots of a run
    pub fn scraped(&self, run_id: &RunId) -> PathBuf {
        self.root.join("scraped").join(run_id.as_str())
    }

    /// Model outputs of a run
    pub fn extracted(&self, run_id: &RunId) -> PathBuf {
        self.root.join("extracted").join(run_id.as_str())
    }

    /// Parent of every run's artifact directory
    pub fn artifacts_root(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    pub fn artifacts(&self, run_id: &RunId) -> PathBuf {
        self.artifacts_root().join(run_id.as_str())
    }
}
