pub mod strategy;

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::browser::{DriverLauncher, Pacer, PageDriver};
use crate::cli::config::{PipelineConfig, SiteConfig};
use crate::run::RunId;
use crate::storage::{DataLayout, SnapshotMeta, SnapshotStore};
use crate::utils::{RequestTimer, ScrapeStats};

pub use strategy::PageStrategy;

/// Captures career page snapshots for every configured site
pub struct Crawler<'a> {
    config: &'a PipelineConfig,
    layout: DataLayout,
    launcher: Arc<dyn DriverLauncher>,
    pacer: Pacer,
}

impl<'a> Crawler<'a> {
    pub fn new(config: &'a PipelineConfig, layout: DataLayout, launcher: Arc<dyn DriverLauncher>) -> Self {
        let pacer = Pacer::new(&config.browser);
        Self { config, layout, launcher, pacer }
    }

    /// Scrape all sites in configuration order. Page and site failures are
    /// counted, never propagated.
    pub async fn run(&self, run_id: &RunId) -> Result<ScrapeStats> {
        let store = SnapshotStore::new(&self.layout, run_id);
        let mut stats = ScrapeStats::default();

        for site in &self.config.sites {
            stats.sites_attempted += 1;
            info!("Scraping {} ({})", site.id, site.url);

            let mut driver = match self.launcher.launch().await {
                Ok(driver) => driver,
                Err(e) => {
                    error!("Could not start a browser session for {}: {:#}", site.id, e);
                    stats.sites_failed += 1;
                    continue;
                }
            };

            let captured = self.scrape_site(driver.as_ref(), site, &store, run_id, &mut stats).await;
            debug!("Captured {} pages for {}", captured, site.id);

            if let Err(e) = driver.close().await {
                warn!("Failed to close browser session for {}: {:#}", site.id, e);
            }
        }

        Ok(stats)
    }

    /// Returns the number of snapshots captured for the site
    async fn scrape_site(
        &self,
        driver: &dyn PageDriver,
        site: &SiteConfig,
        store: &SnapshotStore,
        run_id: &RunId,
        stats: &mut ScrapeStats,
    ) -> u32 {
        let mut sequence = 0;

        match &site.strategy {
            PageStrategy::InfiniteScroll { max_iterations } => {
                if let Err(e) = self.load(driver, site, &site.url).await {
                    warn!("Failed to load {}: {:#}", site.url, e);
                    stats.pages_failed += 1;
                    return sequence;
                }

                // A page that stops scrolling early still holds listings
                match self.pacer.scroll_to_end(driver, *max_iterations).await {
                    Ok(steps) => debug!("Scrolled {} times on {}", steps, site.id),
                    Err(e) => warn!("Did not finish scrolling {}, capturing what loaded: {:#}", site.url, e),
                }

                match driver.source().await {
                    Ok(html) => self.capture(store, run_id, site, &site.url, &mut sequence, &html, stats),
                    Err(e) => {
                        warn!("Failed to scrape {}: {:#}", site.url, e);
                        stats.pages_failed += 1;
                    }
                }
            }
            strategy => {
                for (index, url) in strategy.page_urls(&site.url).iter().enumerate() {
                    if index > 0 {
                        self.pacer.between_pages().await;
                    }

                    let result = async {
                        self.load(driver, site, url).await?;
                        driver.source().await
                    }
                    .await;

                    match result {
                        Ok(html) => self.capture(store, run_id, site, url, &mut sequence, &html, stats),
                        Err(e) => {
                            warn!("Skipping page {}: {:#}", url, e);
                            stats.pages_failed += 1;
                        }
                    }
                }
            }
        }

        sequence
    }

    /// Navigate, wait for the site's marker element, let rendering settle
    async fn load(&self, driver: &dyn PageDriver, site: &SiteConfig, url: &str) -> Result<()> {
        let timer = RequestTimer::start();
        driver.goto(url).await?;

        if let Some(selector) = &site.selectors.wait_for {
            let timeout = Duration::from_secs(self.config.browser.wait_for_timeout_secs);
            if let Err(e) = driver.wait_for(selector, timeout).await {
                // Capture anyway, the listing may use other markup
                warn!("'{}' did not appear on {}: {:#}", selector, url, e);
            }
        }

        self.pacer.settle().await;
        debug!("Loaded {} in {} ms", url, timer.end());
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn capture(
        &self,
        store: &SnapshotStore,
        run_id: &RunId,
        site: &SiteConfig,
        url: &str,
        sequence: &mut u32,
        html: &str,
        stats: &mut ScrapeStats,
    ) {
        let meta = SnapshotMeta {
            run_id: run_id.clone(),
            site_id: site.id.clone(),
            company: site.company.clone(),
            source_url: url.to_string(),
            sequence: *sequence,
            captured_at: Utc::now(),
        };

        match store.save(&meta, html) {
            Ok(path) => {
                debug!("Saved snapshot {}", path.display());
                *sequence += 1;
                stats.pages_scraped += 1;
            }
            Err(e) => {
                warn!("Failed to store snapshot of {}: {:#}", url, e);
                stats.pages_failed += 1;
            }
        }
    }
}
