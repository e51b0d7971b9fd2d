use regex::Regex;
use serde::{Deserialize, Serialize};

/// How a career page exposes its listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageStrategy {
    /// Everything is on one page
    #[default]
    Static,

    /// Discrete pages addressed through a URL parameter
    Paginated {
        max_pages: u32,
        /// Text in the URL that is followed by the page number, e.g. `page=`
        page_param: String,
        /// Step between page numbers for offset-style pagination
        #[serde(default = "default_multiplier")]
        multiplier: u32,
    },

    /// Listings load as the page is scrolled
    InfiniteScroll {
        max_iterations: u32,
    },
}

fn default_multiplier() -> u32 {
    1
}

impl PageStrategy {
    pub fn validate(&self, url: &str) -> Result<(), String> {
        match self {
            PageStrategy::Static => Ok(()),
            PageStrategy::Paginated { max_pages, page_param, multiplier } => {
                if *max_pages == 0 {
                    return Err("max_pages must be at least 1".to_string());
                }
                if *multiplier == 0 {
                    return Err("multiplier must be at least 1".to_string());
                }
                if page_param.is_empty() {
                    return Err("page_param must not be empty".to_string());
                }
                if !url.contains(page_param.as_str()) {
                    return Err(format!("page_param '{}' does not occur in url", page_param));
                }
                Ok(())
            }
            PageStrategy::InfiniteScroll { max_iterations } => {
                if *max_iterations == 0 {
                    return Err("max_iterations must be at least 1".to_string());
                }
                Ok(())
            }
        }
    }

    /// URLs to navigate to, in capture order.
    ///
    /// Static and infinite-scroll pages are loaded once. For paginated sites
    /// the first `page_param` occurrence (and any page number already after
    /// it) is rewritten for each page: `n * multiplier` for offset-style
    /// pagination, `n + 1` otherwise.
    pub fn page_urls(&self, url: &str) -> Vec<String> {
        match self {
            PageStrategy::Static | PageStrategy::InfiniteScroll { .. } => vec![url.to_string()],
            PageStrategy::Paginated { max_pages, page_param, multiplier } => {
                let pattern = match Regex::new(&format!("{}\\d*", regex::escape(page_param))) {
                    Ok(pattern) => pattern,
                    Err(_) => return vec![url.to_string()],
                };

                (0..*max_pages)
                    .map(|n| {
                        let page = if *multiplier > 1 { n * multiplier } else { n + 1 };
                        pattern
                            .replacen(url, 1, regex::NoExpand(&format!("{}{}", page_param, page)))
                            .into_owned()
                    })
                    .collect()
            }
        }
    }
}
