//! Persistence of harvested records.
//!
//! Output files double as completion markers: a job whose output exists is
//! skipped on the next run (see [`resume`]).

mod csv_sink;
mod html_capture;
pub mod jobs;
pub mod resume;

pub use csv_sink::{CsvAppendSink, CsvDirectorySink};
pub use html_capture::HtmlCapture;
pub use jobs::load_job_ids;
pub use resume::{filter_pending, ResumePlan};

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::OutputTarget;
use crate::models::JobResult;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {message}")]
    Csv { path: PathBuf, message: String },

    #[error("{path} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Could not encode {path}: {message}")]
    Encode { path: PathBuf, message: String },

    #[error("Invalid job id '{0}'")]
    InvalidJobId(String),
}

impl OutputError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OutputError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, e: impl std::fmt::Display) -> Self {
        OutputError::Csv {
            path: path.into(),
            message: e.to_string(),
        }
    }
}

/// Where completed jobs go.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Ids of jobs whose output already exists.
    async fn completed_jobs(&self) -> Result<HashSet<String>, OutputError>;

    /// Persist every record of a job. Returns the file written to.
    async fn write_job(&self, result: &JobResult) -> Result<PathBuf, OutputError>;
}

/// Build the sink for an output target.
pub fn sink_for(target: &OutputTarget) -> Arc<dyn RecordSink> {
    match target {
        OutputTarget::Directory(dir) => Arc::new(CsvDirectorySink::new(dir.clone())),
        OutputTarget::Append(path) => Arc::new(CsvAppendSink::new(path.clone())),
    }
}

/// Job ids name output files, so they must be plain path components.
pub fn validate_job_id(job_id: &str) -> Result<(), OutputError> {
    let ok = !job_id.is_empty()
        && job_id != "."
        && job_id != ".."
        && !job_id.starts_with('.')
        && !job_id.contains(['/', '\\'])
        && !job_id.chars().any(char::is_control);
    if ok {
        Ok(())
    } else {
        Err(OutputError::InvalidJobId(job_id.to_string()))
    }
}
