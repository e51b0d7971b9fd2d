pub mod chunk;
pub mod model;
pub mod outcome;

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cli::config::PipelineConfig;
use crate::run::RunId;
use crate::storage::{DataLayout, ExtractionStore, SnapshotMeta, SnapshotStore};
use crate::utils::{ExtractStats, RequestTimer};

pub use model::{CompletionClient, LanguageModel, ModelError};
pub use outcome::{ChunkResult, ExtractionOutcome, ExtractionOutput};

/// Instruction template the extraction model was tuned on
const PROMPT_TEMPLATE: &str = "### Instruction:
I am providing you with an HTML. I want you to extract Job Title, Job Location, Job ID and Job Link in a JSON format. I want you to respond only with a JSON, no descriptive text.

Again, only respond with a JSON and no descriptive text. If you do not spot job links in the HTML provided then just return an empty JSON.
Here is the HTML I want to extract Job Title, Job Location, Job ID and Job Link from,

{html}

### Response:
";

pub fn build_prompt(html: &str) -> String {
    PROMPT_TEMPLATE.replace("{html}", html)
}

/// Sends every snapshot of a run through the model
pub struct Extractor<'a> {
    config: &'a PipelineConfig,
    layout: DataLayout,
    model: Arc<dyn LanguageModel>,
}

impl<'a> Extractor<'a> {
    pub fn new(config: &'a PipelineConfig, layout: DataLayout, model: Arc<dyn LanguageModel>) -> Self {
        Self { config, layout, model }
    }

    /// Extract every snapshot of the run that has no output yet
    pub async fn run(&self, run_id: &RunId) -> Result<ExtractStats> {
        let snapshots = SnapshotStore::new(&self.layout, run_id);
        let outputs = ExtractionStore::new(&self.layout, run_id);
        let mut stats = ExtractStats::default();

        let metas = snapshots.list()?;
        info!("Extracting {} snapshots of run {}", metas.len(), run_id);

        for meta in metas {
            let stem = meta.stem();
            if outputs.exists(&stem) {
                debug!("Output for {} already exists, skipping", stem);
                stats.snapshots_skipped += 1;
                continue;
            }

            let html = match snapshots.read_html(&meta) {
                Ok(html) => html,
                Err(e) => {
                    warn!("Skipping snapshot {}: {:#}", stem, e);
                    stats.snapshots_failed += 1;
                    continue;
                }
            };

            let output = self.extract_snapshot(meta, &html, &mut stats).await;
            match outputs.save(&output) {
                Ok(_) => stats.snapshots_extracted += 1,
                Err(e) => {
                    warn!("Failed to store extraction output for {}: {:#}", stem, e);
                    stats.snapshots_failed += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Run the model over the chunks of one snapshot. Never fails: model and
    /// parse errors end up as `Unparsed` chunks.
    pub async fn extract_snapshot(&self, meta: SnapshotMeta, html: &str, stats: &mut ExtractStats) -> ExtractionOutput {
        let settings = &self.config.extractor;
        let site = self.config.site(&meta.site_id);
        if site.is_none() {
            warn!("Site '{}' is no longer configured, extracting {} with defaults", meta.site_id, meta.stem());
        }

        let listing_selector = site.and_then(|s| s.selectors.listing.as_deref());
        let anchor = site.and_then(|s| s.anchor.as_deref());
        let link_base = site
            .map(|s| s.link_base().to_string())
            .unwrap_or_else(|| meta.source_url.clone());

        let prepared = chunk::prepare_html(html, listing_selector);
        let pieces = chunk::chunk_html(&prepared, anchor, settings.max_html_chars, settings.anchor_window);
        if pieces.is_empty() {
            debug!("No content to extract in {}", meta.stem());
        }

        let mut chunks = Vec::with_capacity(pieces.len());
        for (index, piece) in pieces.iter().enumerate() {
            stats.chunks_sent += 1;
            let timer = RequestTimer::start();

            let outcome = match self.model.complete(&build_prompt(piece)).await {
                Ok(text) => outcome::parse_model_output(&text),
                Err(e) => {
                    warn!("Model call failed for chunk {} of {}: {}", index, meta.stem(), e);
                    stats.model_failures += 1;
                    ExtractionOutcome::Unparsed {
                        raw_text: String::new(),
                        reason: format!("model invocation failed: {}", e),
                    }
                }
            };

            match &outcome {
                ExtractionOutcome::Parsed { records } => {
                    debug!("Chunk {} of {}: {} records in {} ms", index, meta.stem(), records.len(), timer.end());
                    stats.records_extracted += records.len();
                }
                ExtractionOutcome::Unparsed { reason, .. } => {
                    debug!("Chunk {} of {} unparsed: {}", index, meta.stem(), reason);
                    stats.chunks_unparsed += 1;
                }
            }

            chunks.push(ChunkResult { index, outcome });
        }

        ExtractionOutput {
            snapshot: meta,
            link_base,
            extracted_at: Utc::now(),
            chunks,
        }
    }
}
