//! Raw row markup, kept per job so tables can be rebuilt offline.
//!
//! Each `<job_id>.html` holds the wrapped row-plus-panel fragments of one
//! job in page then row order, one fragment per line.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::OutputError;
use crate::models::JobResult;

const CAPTURE_EXTENSION: &str = "html";

pub struct HtmlCapture {
    dir: PathBuf,
}

impl HtmlCapture {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", job_id, CAPTURE_EXTENSION))
    }

    fn temp_path_for(&self, job_id: &str) -> PathBuf {
        self.dir
            .join(format!(".{}.{}.partial", job_id, CAPTURE_EXTENSION))
    }

    /// Save the markup of every record in `result`.
    ///
    /// Returns `None` without writing when the records carry no markup, as
    /// with API results.
    pub async fn write_job(&self, result: &JobResult) -> Result<Option<PathBuf>, OutputError> {
        super::validate_job_id(&result.job_id)?;

        let fragments: Vec<&str> = result
            .records
            .iter()
            .filter_map(|r| r.raw_html.as_deref())
            .collect();
        if fragments.len() < result.records.len() {
            debug!(
                "{}: {} of {} record(s) have no markup, not capturing",
                result.job_id,
                result.records.len() - fragments.len(),
                result.records.len()
            );
            return Ok(None);
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| OutputError::io(&self.dir, e))?;

        let path = self.path_for(&result.job_id);
        let temp = self.temp_path_for(&result.job_id);
        tokio::fs::write(&temp, fragments.join("\n"))
            .await
            .map_err(|e| OutputError::io(&temp, e))?;
        tokio::fs::rename(&temp, &path)
            .await
            .map_err(|e| OutputError::io(&path, e))?;

        info!(
            "Captured {} row(s) of {} to {}",
            fragments.len(),
            result.job_id,
            path.display()
        );
        Ok(Some(path))
    }

    /// Ids of every captured job, sorted.
    pub async fn captured_jobs(&self) -> Result<Vec<String>, OutputError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(OutputError::io(&self.dir, e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| OutputError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CAPTURE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if super::validate_job_id(stem).is_ok() {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub async fn read_job(&self, job_id: &str) -> Result<String, OutputError> {
        super::validate_job_id(job_id)?;
        let path = self.path_for(job_id);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| OutputError::io(&path, e))
    }
}
