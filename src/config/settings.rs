//! Resolved runtime settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default page-level worker count.
pub const DEFAULT_PAGE_WORKERS: usize = 4;

/// Default number of jobs harvested at once.
pub const DEFAULT_JOB_WORKERS: usize = 1;

/// Column holding job ids in CSV job lists.
pub const DEFAULT_ID_COLUMN: &str = "Competitor Labs ID";

/// How result pages are obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Drive the rendered results view in a browser.
    #[default]
    Browser,
    /// Read the paged JSON API.
    Api,
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Browser => write!(f, "browser"),
            Self::Api => write!(f, "api"),
        }
    }
}

/// Where harvested records are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// One `<job_id>.csv` per job.
    Directory(PathBuf),
    /// All jobs appended to a single CSV.
    Append(PathBuf),
}

/// Settings after config file and CLI flags are merged.
#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: SourceMode,
    pub page_workers: usize,
    pub job_workers: usize,
    pub output: OutputTarget,
    pub jobs_file: Option<PathBuf>,
    pub id_column: String,
    pub report: Option<PathBuf>,
    /// Where raw row markup is saved, when capture is on.
    pub html_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: SourceMode::default(),
            page_workers: DEFAULT_PAGE_WORKERS,
            job_workers: DEFAULT_JOB_WORKERS,
            output: OutputTarget::Directory(PathBuf::from("results")),
            jobs_file: None,
            id_column: DEFAULT_ID_COLUMN.to_string(),
            report: None,
            html_dir: None,
        }
    }
}

impl Settings {
    /// Upper bound on sessions or requests open against the provider at once.
    pub fn max_concurrency(&self) -> usize {
        self.job_workers.max(1) * self.page_workers.max(1)
    }
}
