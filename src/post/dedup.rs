use std::collections::HashSet;
use tracing::debug;
use url::Url;

use super::JobListing;

/// Identity of a listing within a batch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    JobId { company: String, job_id: String },
    Link { company: String, link: String },
}

impl DedupKey {
    /// `(company, job_id)` when the id is present, `(company, normalized link)` otherwise
    pub fn for_listing(listing: &JobListing) -> Self {
        let company = listing.company_name.to_lowercase();
        match listing.job_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            Some(job_id) => DedupKey::JobId {
                company,
                job_id: job_id.to_string(),
            },
            None => DedupKey::Link {
                company,
                link: normalize_link(&listing.job_link),
            },
        }
    }
}

/// First-seen-wins filter over a stream of listings
#[derive(Default)]
pub struct Deduplicator {
    seen: HashSet<DedupKey>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when an equivalent listing was already accepted
    pub fn accept(&mut self, listing: &JobListing) -> bool {
        let key = DedupKey::for_listing(listing);
        if self.seen.contains(&key) {
            debug!("Dropping duplicate listing {:?} from {}", key, listing.source_snapshot);
            return false;
        }
        self.seen.insert(key);
        true
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

/// Normalize a URL so trivially different spellings compare equal
pub fn normalize_link(link: &str) -> String {
    let mut normalized = match Url::parse(link) {
        Ok(url) => url,
        Err(_) => return link.trim().to_string(),
    };

    // Remove trailing slash
    let path = normalized.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        normalized.set_path(path.trim_end_matches('/'));
    }

    // Sort query parameters if present
    if let Some(query) = normalized.query().map(str::to_string) {
        if query.is_empty() {
            normalized.set_query(None);
        } else {
            let mut params: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
            params.sort_unstable();
            let sorted_query = params.join("&");
            normalized.set_query(Some(&sorted_query));
        }
    }

    normalized.set_fragment(None);

    normalized.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(company: &str, job_id: Option<&str>, title: &str, link: &str) -> JobListing {
        JobListing {
            company_name: company.to_string(),
            job_id: job_id.map(str::to_string),
            job_title: title.to_string(),
            location: String::new(),
            job_link: link.to_string(),
            site_id: "acme".to_string(),
            source_snapshot: "acme_0000_run-1".to_string(),
            run_id: "run-1".parse().unwrap(),
        }
    }

    #[test]
    fn test_same_company_and_id_is_duplicate() {
        let mut dedup = Deduplicator::new();
        assert!(dedup.accept(&listing("Acme Corp", Some("R157984"), "Senior Data Scientist", "https://a.example/1")));
        assert!(!dedup.accept(&listing("Acme Corp", Some("R157984"), "SENIOR DATA SCIENTIST", "https://a.example/2")));
        assert!(!dedup.accept(&listing("acme corp", Some(" R157984 "), "x", "https://a.example/3")));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_same_id_different_company_is_kept() {
        let mut dedup = Deduplicator::new();
        assert!(dedup.accept(&listing("Acme Corp", Some("1"), "A", "https://a.example/1")));
        assert!(dedup.accept(&listing("Globex", Some("1"), "A", "https://a.example/1")));
    }

    #[test]
    fn test_link_fallback_without_id() {
        let mut dedup = Deduplicator::new();
        assert!(dedup.accept(&listing("Acme Corp", None, "A", "https://a.example/jobs/1/?b=2&a=1")));
        assert!(!dedup.accept(&listing("Acme Corp", Some(""), "B", "https://A.example/jobs/1?a=1&b=2#top")));
        assert!(dedup.accept(&listing("Acme Corp", None, "C", "https://a.example/jobs/2")));
    }

    #[test]
    fn test_normalize_link() {
        assert_eq!(normalize_link("https://Example.com:443/a/?z=1&y=2#f"), "https://example.com/a?y=2&z=1");
        assert_eq!(normalize_link("https://example.com/"), "https://example.com/");
        assert_eq!(normalize_link("https://example.com/a?"), "https://example.com/a");
        assert_eq!(normalize_link(" not a url "), "not a url");
    }
}
