use std::time::Instant;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tracing::info;

use crate::run::RunId;

/// Scraper counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapeStats {
    pub sites_attempted: usize,
    /// Sites whose browser session could not be started
    pub sites_failed: usize,
    pub pages_scraped: usize,
    pub pages_failed: usize,
}

/// Extractor counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractStats {
    pub snapshots_extracted: usize,
    /// Snapshots that already had an output from an earlier attempt
    pub snapshots_skipped: usize,
    pub snapshots_failed: usize,
    pub chunks_sent: usize,
    pub chunks_unparsed: usize,
    pub model_failures: usize,
    pub records_extracted: usize,
}

/// Post-processor counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostStats {
    pub files_read: usize,
    pub records_loaded: usize,
    /// Unreadable output files plus unparsed chunks
    pub parse_failures: usize,
    pub invalid_records: usize,
    pub filtered_records: usize,
    pub duplicates_removed: usize,
    pub rows_written: usize,
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Stages that did not run in this invocation stay empty
    pub scrape: Option<ScrapeStats>,
    pub extract: Option<ExtractStats>,
    pub post: Option<PostStats>,
}

impl RunSummary {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            scrape: None,
            extract: None,
            post: None,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Keep stages recorded by an earlier invocation for the same run
    pub fn merge_earlier(&mut self, earlier: RunSummary) {
        if earlier.run_id != self.run_id {
            return;
        }
        self.started_at = self.started_at.min(earlier.started_at);
        self.scrape = self.scrape.take().or(earlier.scrape);
        self.extract = self.extract.take().or(earlier.extract);
        self.post = self.post.take().or(earlier.post);
    }

    /// Log every stage that ran
    pub fn log(&self) {
        if let Some(s) = &self.scrape {
            info!(
                run_id = %self.run_id,
                sites = s.sites_attempted,
                sites_failed = s.sites_failed,
                pages_scraped = s.pages_scraped,
                pages_failed = s.pages_failed,
                "Scrape summary"
            );
        }
        if let Some(s) = &self.extract {
            info!(
                run_id = %self.run_id,
                snapshots = s.snapshots_extracted,
                skipped = s.snapshots_skipped,
                failed = s.snapshots_failed,
                chunks = s.chunks_sent,
                unparsed = s.chunks_unparsed,
                model_failures = s.model_failures,
                records = s.records_extracted,
                "Extract summary"
            );
        }
        if let Some(s) = &self.post {
            info!(
                run_id = %self.run_id,
                files = s.files_read,
                records = s.records_loaded,
                parse_failures = s.parse_failures,
                invalid = s.invalid_records,
                filtered = s.filtered_records,
                duplicates = s.duplicates_removed,
                rows = s.rows_written,
                "Post-process summary"
            );
        }
    }
}

/// Timer for measuring page loads and model calls
pub struct RequestTimer {
    /// Start time of the request
    start: Instant,
}

impl RequestTimer {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    /// End timing and get the duration in milliseconds
    pub fn end(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_serializes_missing_stages_as_null() {
        let mut summary = RunSummary::new("run-1".parse().unwrap());
        summary.post = Some(PostStats {
            rows_written: 3,
            ..Default::default()
        });
        summary.finish();

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["run_id"], "run-1");
        assert!(value["scrape"].is_null());
        assert_eq!(value["post"]["rows_written"], 3);
        assert!(value["finished_at"].is_string());
    }

    #[test]
    fn test_merge_keeps_stages_from_earlier_invocations() {
        let mut earlier = RunSummary::new("run-1".parse().unwrap());
        earlier.scrape = Some(ScrapeStats {
            pages_scraped: 4,
            ..Default::default()
        });
        earlier.post = Some(PostStats {
            rows_written: 1,
            ..Default::default()
        });

        let mut current = RunSummary::new("run-1".parse().unwrap());
        current.post = Some(PostStats {
            rows_written: 2,
            ..Default::default()
        });
        current.merge_earlier(earlier.clone());

        assert_eq!(current.scrape.as_ref().map(|s| s.pages_scraped), Some(4));
        assert_eq!(current.post.as_ref().map(|p| p.rows_written), Some(2));
        assert!(current.extract.is_none());
        assert_eq!(current.started_at, earlier.started_at);

        let mut other = RunSummary::new("run-2".parse().unwrap());
        other.merge_earlier(earlier);
        assert!(other.scrape.is_none());
    }
}
