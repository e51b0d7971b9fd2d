pub mod dedup;
pub mod filters;
pub mod normalize;

use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::cli::config::PipelineConfig;
use crate::extractor::outcome::{ExtractionOutcome, ExtractionOutput};
use crate::run::RunId;
use crate::storage::{ArtifactStore, DataLayout, ExtractionStore};
use crate::utils::PostStats;

pub use dedup::Deduplicator;
pub use filters::Filters;
use normalize::{normalize_record, RecordSource};

/// A validated, normalized job listing: one row of the output table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobListing {
    pub company_name: String,
    pub job_id: Option<String>,
    pub job_title: String,
    pub location: String,
    /// Absolute http(s) URL
    pub job_link: String,
    pub site_id: String,
    /// Stem of the snapshot the listing was extracted from
    pub source_snapshot: String,
    pub run_id: RunId,
}

/// Turns a run's extraction outputs into its published job table
pub struct PostProcessor<'a> {
    config: &'a PipelineConfig,
    layout: DataLayout,
}

impl<'a> PostProcessor<'a> {
    pub fn new(config: &'a PipelineConfig, layout: DataLayout) -> Self {
        Self { config, layout }
    }

    /// Load, validate, dedupe and filter every output of the run.
    ///
    /// Bad files and records are counted, never fatal.
    pub fn collect(&self, run_id: &RunId, stats: &mut PostStats) -> Result<Vec<JobListing>> {
        let store = ExtractionStore::new(&self.layout, run_id);
        let files = store.list_files()?;

        let seen_links = if self.config.post.exclude_previously_seen {
            ArtifactStore::new(self.layout.clone()).previous_links(run_id)?
        } else {
            HashSet::new()
        };
        let filters = Filters::new(&self.config.post, seen_links);
        let mut dedup = Deduplicator::new();
        let mut listings = Vec::new();

        for path in files {
            stats.files_read += 1;
            let output = match read_output(&path) {
                Ok(output) => output,
                Err(e) => {
                    warn!("Excluding unreadable extraction output {}: {:#}", path.display(), e);
                    stats.parse_failures += 1;
                    continue;
                }
            };

            let stem = output.snapshot.stem();
            let source = RecordSource {
                company: &output.snapshot.company,
                site_id: &output.snapshot.site_id,
                snapshot: &stem,
                link_base: &output.link_base,
                run_id,
            };

            for chunk in &output.chunks {
                let records = match &chunk.outcome {
                    ExtractionOutcome::Parsed { records } => records,
                    ExtractionOutcome::Unparsed { reason, .. } => {
                        debug!("Chunk {} of {} was not parsed: {}", chunk.index, stem, reason);
                        stats.parse_failures += 1;
                        continue;
                    }
                };

                for record in records {
                    stats.records_loaded += 1;

                    let mut listing = match normalize_record(record, &source) {
                        Ok(listing) => listing,
                        Err(reason) => {
                            debug!("Dropping invalid record from {}: {}", stem, reason);
                            stats.invalid_records += 1;
                            continue;
                        }
                    };

                    if !dedup.accept(&listing) {
                        stats.duplicates_removed += 1;
                        continue;
                    }

                    if let Some(reason) = filters.apply(&mut listing) {
                        debug!("Filtering {}: {}", listing.job_link, reason);
                        stats.filtered_records += 1;
                        continue;
                    }

                    listings.push(listing);
                }
            }
        }

        Ok(listings)
    }

    /// Build and publish the job table of a run
    pub fn run(&self, run_id: &RunId) -> Result<(PostStats, PathBuf)> {
        let mut stats = PostStats::default();
        let listings = self.collect(run_id, &mut stats)?;

        let artifacts = ArtifactStore::new(self.layout.clone());
        let path = artifacts.write_jobs(run_id, &listings)
            .context(format!("Failed to publish job table for run {}", run_id))?;
        stats.rows_written = listings.len();

        info!(
            "Published {} listings to {} ({} parse failures, {} invalid, {} duplicates, {} filtered)",
            stats.rows_written,
            path.display(),
            stats.parse_failures,
            stats.invalid_records,
            stats.duplicates_removed,
            stats.filtered_records
        );

        Ok((stats, path))
    }
}

fn read_output(path: &std::path::Path) -> Result<ExtractionOutput> {
    let contents = fs::read_to_string(path)
        .context(format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .context(format!("Failed to parse {}", path.display()))
}
