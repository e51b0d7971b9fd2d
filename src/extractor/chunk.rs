use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Reduce a snapshot to the markup worth sending to the model.
///
/// With a listing selector that matches, only the matched elements are kept.
/// Scripts, styles and comments are always removed.
pub fn prepare_html(html: &str, listing_selector: Option<&str>) -> String {
    let narrowed = listing_selector
        .and_then(|selector| select_listing(html, selector))
        .unwrap_or_else(|| html.to_string());

    strip_noise(&narrowed)
}

fn select_listing(html: &str, selector: &str) -> Option<String> {
    let parsed = match Selector::parse(selector) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Ignoring invalid listing selector '{}': {:?}", selector, e);
            return None;
        }
    };

    let document = Html::parse_document(html);
    let parts: Vec<String> = document.select(&parsed).map(|element| element.html()).collect();

    if parts.is_empty() {
        debug!("Listing selector '{}' matched nothing, using the whole page", selector);
        None
    } else {
        Some(parts.join("\n"))
    }
}

fn noise_pattern() -> Option<&'static Regex> {
    static NOISE: OnceLock<Option<Regex>> = OnceLock::new();
    NOISE
        .get_or_init(|| Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->").ok())
        .as_ref()
}

fn strip_noise(html: &str) -> String {
    match noise_pattern() {
        Some(pattern) => pattern.replace_all(html, "").into_owned(),
        None => html.to_string(),
    }
}

/// Split prepared HTML into the payloads sent to the model.
///
/// With an anchor, every occurrence yields a window of `window` characters
/// on each side; no occurrence means no chunks. Without an anchor the
/// largest prefix of at most `max_chars` characters is used, since listing
/// markup sits near the top of a page.
pub fn chunk_html(html: &str, anchor: Option<&str>, max_chars: usize, window: usize) -> Vec<String> {
    if html.trim().is_empty() {
        return vec![];
    }

    match anchor.filter(|a| !a.is_empty()) {
        Some(anchor) => html
            .match_indices(anchor)
            .map(|(pos, _)| {
                let start = back_chars(html, pos, window);
                let end = forward_chars(html, pos, window);
                prefix_chars(&html[start..end], max_chars).to_string()
            })
            .collect(),
        None => vec![prefix_chars(html, max_chars).to_string()],
    }
}

/// Longest prefix of at most `max` characters
pub fn prefix_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Byte offset `n` characters before `pos`
fn back_chars(s: &str, pos: usize, n: usize) -> usize {
    if n == 0 {
        return pos;
    }
    s[..pos].char_indices().rev().take(n).last().map_or(pos, |(idx, _)| idx)
}

/// Byte offset `n` characters after `pos`
fn forward_chars(s: &str, pos: usize, n: usize) -> usize {
    s[pos..].char_indices().nth(n).map_or(s.len(), |(idx, _)| pos + idx)
}
