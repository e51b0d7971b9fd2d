use anyhow::{Result, Context};
use async_trait::async_trait;
use thirtyfour::prelude::*;
use std::time::Duration;
use tracing::{debug, error};

use crate::cli::config::BrowserSettings;
use super::{DriverLauncher, PageDriver};

const SCROLL_HEIGHT_SCRIPT: &str = "return document.body.scrollHeight;";
const SCROLL_TO_BOTTOM_SCRIPT: &str =
    "const h = document.body.scrollHeight; window.scrollTo(0, h); return h;";

/// WebDriver-backed browser session
pub struct BrowserSession {
    /// WebDriver instance
    driver: Option<WebDriver>,
}

impl BrowserSession {
    /// Connect to the WebDriver server and open a new browser
    pub async fn connect(config: &BrowserSettings) -> Result<Self> {
        let mut caps = DesiredCapabilities::chrome();

        if let Some(user_agent) = &config.user_agent {
            caps.add_chrome_arg(&format!("--user-agent={}", user_agent))?;
        }

        caps.add_chrome_arg(&format!("--window-size={},{}", config.viewport.width, config.viewport.height))?;

        if config.headless {
            caps.set_headless()?;
        }

        caps.add_chrome_arg("--disable-blink-features=AutomationControlled")?;
        caps.add_chrome_arg("--disable-dev-shm-usage")?;

        let driver = WebDriver::new(&config.webdriver_url, caps).await
            .context(format!("Failed to connect to WebDriver at {}", config.webdriver_url))?;

        driver.set_page_load_timeout(Duration::from_secs(config.page_load_timeout_secs)).await
            .context("Failed to set page load timeout")?;

        debug!("Browser session opened on {}", config.webdriver_url);

        Ok(Self { driver: Some(driver) })
    }

    fn driver(&self) -> Result<&WebDriver> {
        self.driver.as_ref().context("Browser session already closed")
    }

    async fn run_height_script(&self, script: &str) -> Result<u64> {
        let result = self.driver()?.execute(script, Vec::new()).await
            .context("Failed to execute JavaScript")?;

        let height = result.json().as_f64()
            .context("Script did not return a number")?;

        Ok(height.max(0.0) as u64)
    }
}

#[async_trait]
impl PageDriver for BrowserSession {
    async fn goto(&self, url: &str) -> Result<()> {
        debug!("Navigating to: {}", url);
        self.driver()?.goto(url).await
            .context(format!("Failed to navigate to URL: {}", url))?;
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.driver()?
            .query(By::Css(selector))
            .wait(timeout, Duration::from_millis(500))
            .first()
            .await
            .context(format!("Element not found: {}", selector))?;
        Ok(())
    }

    async fn source(&self) -> Result<String> {
        let source = self.driver()?.source().await
            .context("Failed to get page source")?;
        Ok(source)
    }

    async fn scroll_to_bottom(&self) -> Result<u64> {
        self.run_height_script(SCROLL_TO_BOTTOM_SCRIPT).await
    }

    async fn scroll_height(&self) -> Result<u64> {
        self.run_height_script(SCROLL_HEIGHT_SCRIPT).await
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.quit().await {
                error!("Error closing browser session: {}", e);
            }
            debug!("Browser session closed");
        }
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            // Spawn a task to quit the driver
            tokio::spawn(async move {
                if let Err(e) = driver.quit().await {
                    error!("Error closing browser session during drop: {}", e);
                }
            });
        }
    }
}

/// Launches WebDriver sessions from the configured browser settings
pub struct WebDriverLauncher {
    config: BrowserSettings,
}

impl WebDriverLauncher {
    pub fn new(config: BrowserSettings) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DriverLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn PageDriver>> {
        let session = BrowserSession::connect(&self.config).await?;
        Ok(Box::new(session))
    }
}
