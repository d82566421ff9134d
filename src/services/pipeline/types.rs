//! Harvest events, errors and the run report.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::output::OutputError;
use crate::scrapers::{DiscoveryError, ExtractError, PageError};

/// Events emitted while harvesting.
#[derive(Debug, Clone)]
pub enum HarvestEvent {
    /// Jobs left after the resume filter.
    Planned { pending: usize, skipped: usize },
    JobStarted { job_id: String },
    /// Page count known
    JobDiscovered { job_id: String, pages: u32 },
    PageStarted {
        worker_id: usize,
        job_id: String,
        page: u32,
    },
    PageCompleted {
        worker_id: usize,
        job_id: String,
        page: u32,
        records: usize,
    },
    PageFailed {
        worker_id: usize,
        job_id: String,
        page: u32,
        error: String,
    },
    JobCompleted {
        job_id: String,
        records: usize,
        degraded: usize,
        path: PathBuf,
    },
    JobFailed { job_id: String, error: String },
}

/// Why a job produced no output.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error("{job_id}: could not write output: {source}")]
    Output {
        job_id: String,
        #[source]
        source: OutputError,
    },

    #[error("{job_id}: saved markup no longer parses: {source}")]
    Reparse {
        job_id: String,
        #[source]
        source: ExtractError,
    },

    #[error("{job_id}: harvest task aborted: {message}")]
    Aborted { job_id: String, message: String },
}

impl JobError {
    pub fn job_id(&self) -> &str {
        match self {
            Self::Discovery(e) => e.job_id(),
            Self::Page(e) => e.job_id(),
            Self::Output { job_id, .. }
            | Self::Reparse { job_id, .. }
            | Self::Aborted { job_id, .. } => job_id,
        }
    }

    /// Pipeline stage the job failed in.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Discovery(_) => "discovery",
            Self::Page(_) => "page",
            Self::Output { .. } => "output",
            Self::Reparse { .. } => "reparse",
            Self::Aborted { .. } => "aborted",
        }
    }

    pub fn page(&self) -> Option<u32> {
        match self {
            Self::Page(e) => Some(e.page()),
            _ => None,
        }
    }
}

/// Harvest pool sizes.
#[derive(Debug, Clone, Copy)]
pub struct HarvestConfig {
    pub page_workers: usize,
    pub job_workers: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            page_workers: crate::config::DEFAULT_PAGE_WORKERS,
            job_workers: crate::config::DEFAULT_JOB_WORKERS,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CompletedJob {
    pub job_id: String,
    pub pages: u32,
    pub records: usize,
    pub degraded: usize,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FailedJob {
    pub job_id: String,
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub error: String,
}

impl From<&JobError> for FailedJob {
    fn from(e: &JobError) -> Self {
        Self {
            job_id: e.job_id().to_string(),
            stage: e.stage().to_string(),
            page: e.page(),
            error: e.to_string(),
        }
    }
}

/// What a harvest run did, for triage.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub completed: Vec<CompletedJob>,
    pub skipped: Vec<String>,
    pub failed: Vec<FailedJob>,
}

impl HarvestReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            completed: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn total_records(&self) -> usize {
        self.completed.iter().map(|j| j.records).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Write the report as pretty JSON.
    pub async fn write_json(&self, path: &Path) -> Result<(), OutputError> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| OutputError::Encode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| OutputError::io(parent, e))?;
        }
        tokio::fs::write(path, json)
            .await
            .map_err(|e| OutputError::io(path, e))
    }
}

impl Default for HarvestReport {
    fn default() -> Self {
        Self::new()
    }
}
