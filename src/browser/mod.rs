pub mod behavior;
pub mod session;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

// Re-export common types
pub use behavior::Pacer;
pub use session::WebDriverLauncher;

/// The browser operations the crawler needs from one open page
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for the page load to finish
    async fn goto(&self, url: &str) -> Result<()>;

    /// Wait until an element matching the CSS selector is present
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Current document HTML
    async fn source(&self) -> Result<String>;

    /// Scroll to the bottom and return the document height before scrolling
    async fn scroll_to_bottom(&self) -> Result<u64>;

    /// Current document height
    async fn scroll_height(&self) -> Result<u64>;

    async fn close(&mut self) -> Result<()>;
}

/// Opens a fresh browser session, one per site
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DriverLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PageDriver>>;
}
