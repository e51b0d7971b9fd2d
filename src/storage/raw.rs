use anyhow::{Result, Context};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::run::RunId;
use super::DataLayout;

const HTML_EXTENSION: &str = "txt";
const META_SUFFIX: &str = ".meta.json";

/// Metadata stored next to every raw HTML snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub run_id: RunId,
    pub site_id: String,
    pub company: String,
    /// URL the browser was pointed at
    pub source_url: String,
    /// Capture order within the site, starting at 0
    pub sequence: u32,
    pub captured_at: DateTime<Utc>,
}

impl SnapshotMeta {
    /// File stem shared by the snapshot and everything derived from it
    pub fn stem(&self) -> String {
        format!("{}_{:04}_{}", self.site_id, self.sequence, self.run_id)
    }
}

/// Filesystem store for the raw snapshots of one run
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(layout: &DataLayout, run_id: &RunId) -> Self {
        Self {
            dir: layout.scraped(run_id),
        }
    }

    #[cfg(test)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn html_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", stem, HTML_EXTENSION))
    }

    fn meta_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{}{}", stem, META_SUFFIX))
    }

    /// Persist a snapshot. Existing snapshots are never overwritten.
    pub fn save(&self, meta: &SnapshotMeta, html: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .context(format!("Failed to create snapshot directory: {}", self.dir.display()))?;

        let stem = meta.stem();
        let html_path = self.html_path(&stem);
        write_new(&html_path, html.as_bytes())?;

        let meta_json = serde_json::to_vec_pretty(meta)
            .context("Failed to serialize snapshot metadata")?;
        write_new(&self.meta_path(&stem), &meta_json)?;

        debug!("Stored snapshot {} ({} bytes)", html_path.display(), html.len());

        Ok(html_path)
    }

    /// All snapshots of the run, ordered by file name.
    ///
    /// Metadata files that cannot be read are logged and left out.
    pub fn list(&self) -> Result<Vec<SnapshotMeta>> {
        if !self.dir.exists() {
            return Ok(vec![]);
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .context(format!("Failed to list snapshot directory: {}", self.dir.display()))?
        {
            let path = entry?.path();
            let is_meta = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.ends_with(META_SUFFIX));
            if path.is_file() && is_meta {
                paths.push(path);
            }
        }
        paths.sort();

        let mut snapshots = Vec::with_capacity(paths.len());
        for path in paths {
            let parsed = fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|s| serde_json::from_str::<SnapshotMeta>(&s).map_err(anyhow::Error::from));
            match parsed {
                Ok(meta) => snapshots.push(meta),
                Err(e) => warn!("Skipping unreadable snapshot metadata {}: {}", path.display(), e),
            }
        }

        Ok(snapshots)
    }

    /// Read the HTML of a snapshot
    pub fn read_html(&self, meta: &SnapshotMeta) -> Result<String> {
        let path = self.html_path(&meta.stem());
        fs::read_to_string(&path)
            .context(format!("Failed to read snapshot: {}", path.display()))
    }
}

/// Write a file that must not exist yet
pub(crate) fn write_new(path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            anyhow::bail!("Refusing to overwrite existing file: {}", path.display())
        }
        Err(e) => {
            return Err(e).context(format!("Failed to create file: {}", path.display()));
        }
    };

    file.write_all(contents)
        .context(format!("Failed to write file: {}", path.display()))?;

    Ok(())
}
