use anyhow::{Result, Context};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::browser::WebDriverLauncher;
use crate::cli::config::PipelineConfig;
use crate::crawler::Crawler;
use crate::extractor::{CompletionClient, Extractor, LanguageModel};
use crate::post::PostProcessor;
use crate::run::RunId;
use crate::storage::{ArtifactStore, DataLayout};
use crate::utils::{ExtractStats, PostStats, RunSummary, ScrapeStats};

/// Load the configuration and make sure the data directory is usable
fn prepare(config_path: &Path) -> Result<(PipelineConfig, DataLayout)> {
    let config = PipelineConfig::load(config_path)?;
    let data_dir = config.data_dir();
    fs::create_dir_all(&data_dir)
        .context(format!("Failed to create data directory: {}", data_dir.display()))?;
    info!("Using data directory {}", data_dir.display());
    Ok((config, DataLayout::new(data_dir)))
}

async fn scrape_stage(config: &PipelineConfig, layout: &DataLayout, run_id: &RunId) -> Result<ScrapeStats> {
    let launcher = Arc::new(WebDriverLauncher::new(config.browser.clone()));
    Crawler::new(config, layout.clone(), launcher).run(run_id).await
}

fn model_client(config: &PipelineConfig) -> Result<Arc<dyn LanguageModel>> {
    let client = CompletionClient::new(&config.extractor)
        .context("Failed to set up the model client")?;
    Ok(Arc::new(client))
}

async fn extract_stage(
    config: &PipelineConfig,
    layout: &DataLayout,
    model: Arc<dyn LanguageModel>,
    run_id: &RunId,
) -> Result<ExtractStats> {
    Extractor::new(config, layout.clone(), model).run(run_id).await
}

fn post_stage(config: &PipelineConfig, layout: &DataLayout, run_id: &RunId) -> Result<PostStats> {
    let (stats, _) = PostProcessor::new(config, layout.clone()).run(run_id)?;
    Ok(stats)
}

/// Close the summary, log it and store it next to the table, keeping the
/// counters of stages run by earlier invocations
fn finish(layout: &DataLayout, mut summary: RunSummary) -> Result<()> {
    summary.finish();
    summary.log();

    let store = ArtifactStore::new(layout.clone());
    match store.read_summary(&summary.run_id) {
        Ok(Some(earlier)) => summary.merge_earlier(earlier),
        Ok(None) => {}
        Err(e) => warn!("Replacing unreadable run summary: {:#}", e),
    }

    let path = store.write_summary(&summary)?;
    info!("Run summary saved to {}", path.display());
    Ok(())
}

/// Scrape, extract and post-process in one go
pub async fn run_all(config_path: &Path, run_id: RunId) -> Result<()> {
    let (config, layout) = prepare(config_path)?;
    let model = model_client(&config)?;
    let mut summary = RunSummary::new(run_id.clone());

    summary.scrape = Some(scrape_stage(&config, &layout, &run_id).await?);
    summary.extract = Some(extract_stage(&config, &layout, model, &run_id).await?);
    summary.post = Some(post_stage(&config, &layout, &run_id)?);

    finish(&layout, summary)
}

pub async fn scrape(config_path: &Path, run_id: RunId) -> Result<()> {
    let (config, layout) = prepare(config_path)?;
    let mut summary = RunSummary::new(run_id.clone());
    summary.scrape = Some(scrape_stage(&config, &layout, &run_id).await?);
    info!("Continue with `careerscrape extract --run-id {}`", run_id);
    finish(&layout, summary)
}

pub async fn extract(config_path: &Path, run_id: RunId) -> Result<()> {
    let (config, layout) = prepare(config_path)?;
    let model = model_client(&config)?;
    let mut summary = RunSummary::new(run_id.clone());
    summary.extract = Some(extract_stage(&config, &layout, model, &run_id).await?);
    finish(&layout, summary)
}

pub async fn post(config_path: &Path, run_id: RunId) -> Result<()> {
    let (config, layout) = prepare(config_path)?;
    let mut summary = RunSummary::new(run_id.clone());
    summary.post = Some(post_stage(&config, &layout, &run_id)?);
    finish(&layout, summary)
}

/// Check a configuration file and describe what it would scrape
pub fn validate(config_path: &Path) -> Result<()> {
    let config = PipelineConfig::load(config_path)?;

    println!("Configuration OK: {}", config_path.display());
    println!("Data directory: {}", config.data_dir().display());
    println!("Model: {} at {}", config.extractor.model, config.extractor.endpoint);
    println!("Sites:");
    for site in &config.sites {
        let pages = site.strategy.page_urls(&site.url).len();
        println!("  - {} ({}): {:?}, {} page(s)", site.id, site.company, site.strategy, pages);
    }

    Ok(())
}
