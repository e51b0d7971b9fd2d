use anyhow::Result;
use rand::{thread_rng, Rng};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::cli::config::BrowserSettings;
use super::PageDriver;

/// Timing of page interactions: politeness pauses, settle waits, scrolling
#[derive(Debug, Clone)]
pub struct Pacer {
    politeness_ms: (u64, u64),
    settle: Duration,
    scroll_pause: Duration,
}

impl Pacer {
    pub fn new(config: &BrowserSettings) -> Self {
        let (min, max) = config.politeness_delay_ms;
        Self {
            politeness_ms: (min.min(max), min.max(max)),
            settle: Duration::from_millis(config.settle_delay_ms),
            scroll_pause: Duration::from_millis(config.scroll_pause_ms),
        }
    }

    /// Random delay within the configured politeness range
    pub fn politeness_delay(&self) -> Duration {
        let (min, max) = self.politeness_ms;
        if min == max {
            return Duration::from_millis(min);
        }
        Duration::from_millis(thread_rng().gen_range(min..=max))
    }

    /// Pause between two page loads
    pub async fn between_pages(&self) {
        let pause = self.politeness_delay();
        debug!("Pausing {} ms before the next page", pause.as_millis());
        sleep(pause).await;
    }

    /// Give client-side rendering time to finish before capture
    pub async fn settle(&self) {
        sleep(self.settle).await;
    }

    /// Scroll until the document height stops growing or the cap is hit.
    /// Returns the number of scroll steps taken.
    pub async fn scroll_to_end(&self, driver: &dyn PageDriver, max_iterations: u32) -> Result<u32> {
        let mut steps = 0;

        while steps < max_iterations {
            let before = driver.scroll_to_bottom().await?;
            steps += 1;
            sleep(self.scroll_pause).await;

            let after = driver.scroll_height().await?;
            debug!("Scroll step {}: height {} -> {}", steps, before, after);
            if after <= before {
                break;
            }
        }

        Ok(steps)
    }
}
