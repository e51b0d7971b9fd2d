use anyhow::{Result, Context};
use arrow_array::{Array, ArrayRef, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::post::JobListing;
use crate::run::RunId;
use crate::utils::RunSummary;
use super::DataLayout;

pub const JOBS_FILE_NAME: &str = "jobs.parquet";
pub const SUMMARY_FILE_NAME: &str = "summary.json";

/// Versioned per-run output: the job table and the run summary
pub struct ArtifactStore {
    layout: DataLayout,
}

fn jobs_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("company_name", DataType::Utf8, false),
        Field::new("job_id", DataType::Utf8, true),
        Field::new("job_title", DataType::Utf8, false),
        Field::new("location", DataType::Utf8, false),
        Field::new("job_link", DataType::Utf8, false),
        Field::new("site_id", DataType::Utf8, false),
        Field::new("source_snapshot", DataType::Utf8, false),
        Field::new("run_id", DataType::Utf8, false),
    ]))
}

fn string_column<'a>(jobs: &'a [JobListing], f: impl Fn(&'a JobListing) -> Option<&'a str>) -> ArrayRef {
    Arc::new(StringArray::from(jobs.iter().map(f).collect::<Vec<_>>()))
}

impl ArtifactStore {
    pub fn new(layout: DataLayout) -> Self {
        Self { layout }
    }

    pub fn jobs_path(&self, run_id: &RunId) -> PathBuf {
        self.layout.artifacts(run_id).join(JOBS_FILE_NAME)
    }

    pub fn summary_path(&self, run_id: &RunId) -> PathBuf {
        self.layout.artifacts(run_id).join(SUMMARY_FILE_NAME)
    }

    /// Write the job table of a run.
    ///
    /// The file is written under a temporary name and renamed into place, so
    /// readers never see a half-written table.
    pub fn write_jobs(&self, run_id: &RunId, jobs: &[JobListing]) -> Result<PathBuf> {
        let dir = self.layout.artifacts(run_id);
        fs::create_dir_all(&dir)
            .context(format!("Failed to create artifact directory: {}", dir.display()))?;

        let batch = RecordBatch::try_new(
            jobs_schema(),
            vec![
                string_column(jobs, |j| Some(j.company_name.as_str())),
                string_column(jobs, |j| j.job_id.as_deref()),
                string_column(jobs, |j| Some(j.job_title.as_str())),
                string_column(jobs, |j| Some(j.location.as_str())),
                string_column(jobs, |j| Some(j.job_link.as_str())),
                string_column(jobs, |j| Some(j.site_id.as_str())),
                string_column(jobs, |j| Some(j.source_snapshot.as_str())),
                string_column(jobs, |j| Some(j.run_id.as_str())),
            ],
        )
        .context("Failed to build job record batch")?;

        let path = self.jobs_path(run_id);
        let tmp_path = dir.join(format!("{}.tmp", JOBS_FILE_NAME));
        write_parquet(&tmp_path, batch)?;
        fs::rename(&tmp_path, &path)
            .context(format!("Failed to move artifact into place: {}", path.display()))?;

        debug!("Wrote {} rows to {}", jobs.len(), path.display());

        Ok(path)
    }

    pub fn write_summary(&self, summary: &RunSummary) -> Result<PathBuf> {
        let dir = self.layout.artifacts(&summary.run_id);
        fs::create_dir_all(&dir)
            .context(format!("Failed to create artifact directory: {}", dir.display()))?;

        let path = self.summary_path(&summary.run_id);
        let contents = serde_json::to_vec_pretty(summary)
            .context("Failed to serialize run summary")?;
        fs::write(&path, contents)
            .context(format!("Failed to write run summary: {}", path.display()))?;

        Ok(path)
    }

    /// Stored summary of a run, if any stage has written one
    pub fn read_summary(&self, run_id: &RunId) -> Result<Option<RunSummary>> {
        let path = self.summary_path(run_id);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .context(format!("Failed to read run summary: {}", path.display()))?;
        let summary = serde_json::from_str(&contents)
            .context(format!("Failed to parse run summary: {}", path.display()))?;
        Ok(Some(summary))
    }

    /// Job links published by runs that precede `current`.
    ///
    /// Run ids are timestamps, so name order is run order. Later runs are
    /// ignored, which keeps reprocessing an old run stable.
    pub fn previous_links(&self, current: &RunId) -> Result<HashSet<String>> {
        let root = self.layout.artifacts_root();
        let mut links = HashSet::new();
        if !root.exists() {
            return Ok(links);
        }

        let mut run_dirs = Vec::new();
        for entry in fs::read_dir(&root)
            .context(format!("Failed to list artifact directory: {}", root.display()))?
        {
            let path = entry?.path();
            let is_earlier = path
                .file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| name < current.as_str());
            if path.is_dir() && is_earlier {
                run_dirs.push(path);
            }
        }
        run_dirs.sort();

        for dir in run_dirs {
            let jobs_path = dir.join(JOBS_FILE_NAME);
            if !jobs_path.exists() {
                continue;
            }
            match read_jobs(&jobs_path) {
                Ok(jobs) => links.extend(jobs.into_iter().map(|j| j.job_link)),
                Err(e) => warn!("Skipping unreadable artifact {}: {:#}", jobs_path.display(), e),
            }
        }

        Ok(links)
    }
}

fn write_parquet(path: &Path, batch: RecordBatch) -> Result<()> {
    let file = File::create(path).context(format!("Failed to create {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)
        .context(format!("Failed to open parquet writer {}", path.display()))?;
    writer
        .write(&batch)
        .context(format!("Failed to write record batch {}", path.display()))?;
    writer
        .close()
        .context(format!("Failed to close parquet writer {}", path.display()))?;
    Ok(())
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .context(format!("Missing string column '{}'", name))
}

/// Read a job table back
pub fn read_jobs(path: &Path) -> Result<Vec<JobListing>> {
    let file = File::open(path).context(format!("Failed to open {}", path.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .context(format!("Failed to read parquet metadata {}", path.display()))?
        .build()
        .context(format!("Failed to build parquet reader {}", path.display()))?;

    let mut jobs = Vec::new();
    for batch in reader {
        let batch = batch.context(format!("Failed to read record batch {}", path.display()))?;
        let company = column(&batch, "company_name")?;
        let job_id = column(&batch, "job_id")?;
        let title = column(&batch, "job_title")?;
        let location = column(&batch, "location")?;
        let link = column(&batch, "job_link")?;
        let site = column(&batch, "site_id")?;
        let snapshot = column(&batch, "source_snapshot")?;
        let run = column(&batch, "run_id")?;

        for i in 0..batch.num_rows() {
            jobs.push(JobListing {
                company_name: company.value(i).to_string(),
                job_id: job_id.is_valid(i).then(|| job_id.value(i).to_string()),
                job_title: title.value(i).to_string(),
                location: location.value(i).to_string(),
                job_link: link.value(i).to_string(),
                site_id: site.value(i).to_string(),
                source_snapshot: snapshot.value(i).to_string(),
                run_id: run.value(i).parse()?,
            });
        }
    }

    Ok(jobs)
}
