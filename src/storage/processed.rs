use anyhow::{Result, Context};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::extractor::outcome::ExtractionOutput;
use crate::run::RunId;
use super::DataLayout;
use super::raw::write_new;

/// Filesystem store for the extraction outputs of one run.
///
/// Each output is named after the snapshot it came from, so
/// `scraped/<run>/<stem>.txt` pairs with `extracted/<run>/<stem>.json`.
pub struct ExtractionStore {
    dir: PathBuf,
}

impl ExtractionStore {
    pub fn new(layout: &DataLayout, run_id: &RunId) -> Self {
        Self {
            dir: layout.extracted(run_id),
        }
    }

    #[cfg(test)]
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    pub fn path_for(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{}.json", stem))
    }

    pub fn exists(&self, stem: &str) -> bool {
        self.path_for(stem).exists()
    }

    /// Persist an output. Existing outputs are never overwritten.
    pub fn save(&self, output: &ExtractionOutput) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .context(format!("Failed to create extraction directory: {}", self.dir.display()))?;

        let path = self.path_for(&output.snapshot.stem());
        let contents = serde_json::to_vec_pretty(output)
            .context("Failed to serialize extraction output")?;
        write_new(&path, &contents)?;

        debug!("Stored extraction output: {}", path.display());

        Ok(path)
    }

    /// Paths of all outputs in file-name order
    pub fn list_files(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(vec![]);
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .context(format!("Failed to list extraction directory: {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && path.extension().map_or(false, |ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        Ok(files)
    }
}
