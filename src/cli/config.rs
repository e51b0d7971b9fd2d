use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::fs;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::crawler::strategy::PageStrategy;

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Root of the scraped/extracted/artifacts tree
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub extractor: ExtractorSettings,
    #[serde(default)]
    pub post: PostSettings,
    pub sites: Vec<SiteConfig>,
}

/// Browser automation settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    pub headless: bool,
    pub viewport: Viewport,
    pub user_agent: Option<String>,
    pub page_load_timeout_secs: u64,
    /// Upper bound on waiting for a site's `wait_for` selector
    pub wait_for_timeout_secs: u64,
    /// Delay after navigation before the page source is captured
    pub settle_delay_ms: u64,
    /// Min and max pause between two page loads in milliseconds
    pub politeness_delay_ms: (u64, u64),
    /// Pause after each scroll step of an infinite-scroll page
    pub scroll_pause_ms: u64,
}

/// Browser viewport settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Language model settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ExtractorSettings {
    /// Base URL of an OpenAI-compatible completions API
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the bearer token, if the endpoint needs one
    pub api_key_env: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    /// Largest HTML payload sent in a single prompt
    pub max_html_chars: usize,
    /// Characters kept on each side of an anchor occurrence
    pub anchor_window: usize,
}

/// Post-processing filters. All are off by default.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PostSettings {
    pub exclude_title_keywords: Vec<String>,
    pub us_only: bool,
    pub exclude_previously_seen: bool,
}

/// One target career page
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SiteConfig {
    /// File-safe identifier, used in snapshot names
    pub id: String,
    pub company: String,
    pub url: String,
    #[serde(default)]
    pub strategy: PageStrategy,
    /// Base for resolving relative job links (defaults to `url`)
    #[serde(default)]
    pub link_base: Option<String>,
    #[serde(default)]
    pub selectors: Selectors,
    /// Substring that marks a job link in the page source
    #[serde(default)]
    pub anchor: Option<String>,
}

/// Optional CSS selectors for a site
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Selectors {
    /// Element awaited after navigation before capture
    #[serde(default)]
    pub wait_for: Option<String>,
    /// Elements holding the listings; narrows what the model sees
    #[serde(default)]
    pub listing: Option<String>,
}

/// Fatal configuration problems
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("No sites configured")]
    NoSites,

    #[error("Site id '{0}' must be non-empty and contain only lowercase letters, digits, '-' or '_'")]
    InvalidSiteId(String),

    #[error("Site id '{0}' is configured more than once")]
    DuplicateSiteId(String),

    #[error("Site '{site}' has an invalid {field}: {reason}")]
    InvalidUrl { site: String, field: &'static str, reason: String },

    #[error("Site '{0}' has an empty company name")]
    EmptyCompany(String),

    #[error("Site '{site}': {reason}")]
    InvalidStrategy { site: String, reason: String },

    #[error("Invalid browser settings: {0}")]
    InvalidBrowser(String),

    #[error("Invalid extractor settings: {0}")]
    InvalidExtractor(String),
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:4444".to_string(),
            headless: true,
            viewport: Viewport {
                width: 1920,
                height: 1080,
            },
            user_agent: None,
            page_load_timeout_secs: 30,
            wait_for_timeout_secs: 10,
            settle_delay_ms: 5000,
            politeness_delay_ms: (4000, 8000),
            scroll_pause_ms: 2000,
        }
    }
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/v1".to_string(),
            model: "crispjobs-com-HTJ-1B".to_string(),
            api_key_env: None,
            max_tokens: 2500,
            temperature: 0.5,
            request_timeout_secs: 300,
            max_html_chars: 100_000,
            anchor_window: 1000,
        }
    }
}

impl SiteConfig {
    /// Base URL used to resolve relative job links
    pub fn link_base(&self) -> &str {
        self.link_base.as_deref().unwrap_or(&self.url)
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        let id_ok = !self.id.is_empty()
            && self.id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if !id_ok {
            return Err(ConfigError::InvalidSiteId(self.id.clone()));
        }

        if self.company.trim().is_empty() {
            return Err(ConfigError::EmptyCompany(self.id.clone()));
        }

        check_http_url(&self.id, "url", &self.url)?;
        if let Some(base) = &self.link_base {
            check_http_url(&self.id, "link_base", base)?;
        }

        self.strategy.validate(&self.url).map_err(|reason| ConfigError::InvalidStrategy {
            site: self.id.clone(),
            reason,
        })
    }
}

fn check_http_url(site: &str, field: &'static str, value: &str) -> std::result::Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        site: site.to_string(),
        field,
        reason,
    };
    let url = Url::parse(value).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}

impl PipelineConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let config = Self::load_from_file(path)?;
        config.validate()
            .context(format!("Invalid configuration file: {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read configuration file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .context(format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Check everything that would otherwise fail halfway through a run
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.sites.is_empty() {
            return Err(ConfigError::NoSites);
        }

        let mut seen = HashSet::new();
        for site in &self.sites {
            site.validate()?;
            if !seen.insert(site.id.as_str()) {
                return Err(ConfigError::DuplicateSiteId(site.id.clone()));
            }
        }

        let (min, max) = self.browser.politeness_delay_ms;
        if min > max {
            return Err(ConfigError::InvalidBrowser(format!(
                "politeness_delay_ms minimum {} exceeds maximum {}", min, max
            )));
        }
        if self.browser.page_load_timeout_secs == 0 {
            return Err(ConfigError::InvalidBrowser("page_load_timeout_secs must be positive".to_string()));
        }

        if Url::parse(&self.extractor.endpoint).is_err() {
            return Err(ConfigError::InvalidExtractor(format!(
                "endpoint '{}' is not a URL", self.extractor.endpoint
            )));
        }
        if self.extractor.max_html_chars == 0 {
            return Err(ConfigError::InvalidExtractor("max_html_chars must be positive".to_string()));
        }
        if let Some(var) = &self.extractor.api_key_env {
            if std::env::var_os(var).is_none() {
                return Err(ConfigError::InvalidExtractor(format!(
                    "api_key_env names '{}' but it is not set", var
                )));
            }
        }

        Ok(())
    }

    /// Find a site by id
    pub fn site(&self, id: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.id == id)
    }

    /// Resolve the data directory
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }

        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "careerscrape", "careerscrape") {
            proj_dirs.data_dir().to_path_buf()
        } else {
            PathBuf::from("./data")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
data_dir: /tmp/careers
browser:
  headless: false
  politeness_delay_ms: [100, 200]
extractor:
  endpoint: http://127.0.0.1:9000/v1
  model: tuned
post:
  exclude_title_keywords: [technician]
sites:
  - id: acme
    company: Acme Corp
    url: https://careers.acme.com/jobs?page=1
    strategy:
      type: paginated
      max_pages: 3
      page_param: "page="
    anchor: /jobs/R
  - id: globex
    company: Globex
    url: https://globex.example/careers
    strategy:
      type: infinite_scroll
      max_iterations: 20
    selectors:
      wait_for: ".job-card"
  - id: initech
    company: Initech
    url: https://initech.example/jobs
"#;

    fn sample() -> PipelineConfig {
        serde_yaml::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_parse_sample() {
        let config = sample();
        assert!(config.validate().is_ok());
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/careers"));
        assert!(!config.browser.headless);
        assert_eq!(config.browser.politeness_delay_ms, (100, 200));
        // Unspecified fields keep their defaults
        assert_eq!(config.browser.page_load_timeout_secs, 30);
        assert_eq!(config.extractor.max_tokens, 2500);
        assert_eq!(config.post.exclude_title_keywords, vec!["technician".to_string()]);

        let acme = config.site("acme").unwrap();
        assert!(matches!(acme.strategy, PageStrategy::Paginated { max_pages: 3, multiplier: 1, .. }));
        assert_eq!(acme.link_base(), "https://careers.acme.com/jobs?page=1");
        assert!(matches!(config.site("globex").unwrap().strategy, PageStrategy::InfiniteScroll { max_iterations: 20 }));
        assert!(matches!(config.site("initech").unwrap().strategy, PageStrategy::Static));
    }

    #[test]
    fn test_rejects_empty_sites() {
        let mut config = sample();
        config.sites.clear();
        assert_eq!(config.validate(), Err(ConfigError::NoSites));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let mut config = sample();
        let dup = config.sites[0].clone();
        config.sites.push(dup);
        assert_eq!(config.validate(), Err(ConfigError::DuplicateSiteId("acme".to_string())));
    }

    #[test]
    fn test_rejects_bad_site_fields() {
        let mut config = sample();
        config.sites[0].id = "Acme Corp".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSiteId(_))));

        let mut config = sample();
        config.sites[1].url = "ftp://globex.example".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl { field: "url", .. })));

        let mut config = sample();
        config.sites[2].link_base = Some("not a url".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl { field: "link_base", .. })));

        let mut config = sample();
        config.sites[2].company = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyCompany(_))));
    }

    #[test]
    fn test_rejects_bad_strategy() {
        let mut config = sample();
        config.sites[0].strategy = PageStrategy::Paginated {
            max_pages: 0,
            page_param: "page=".to_string(),
            multiplier: 1,
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidStrategy { .. })));
    }

    #[test]
    fn test_rejects_inverted_politeness_range() {
        let mut config = sample();
        config.browser.politeness_delay_ms = (500, 100);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBrowser(_))));
    }

    #[test]
    fn test_rejects_unset_api_key_variable() {
        let mut config = sample();
        config.extractor.api_key_env = Some("CAREERSCRAPE_CONFIG_TEST_UNSET_KEY".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidExtractor(_))));

        std::env::set_var("CAREERSCRAPE_CONFIG_TEST_KEY", "secret");
        config.extractor.api_key_env = Some("CAREERSCRAPE_CONFIG_TEST_KEY".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_reports_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PipelineConfig::load(&dir.path().join("missing.yaml")).is_err());

        let path = dir.path().join("broken.yaml");
        fs::write(&path, "sites: [ {id: acme").unwrap();
        assert!(PipelineConfig::load(&path).is_err());

        let path = dir.path().join("ok.yaml");
        fs::write(&path, SAMPLE).unwrap();
        assert_eq!(PipelineConfig::load(&path).unwrap().sites.len(), 3);
    }
}
