//! Rebuild tables from saved row markup, without touching the provider.
//!
//! Runs the same row projection as a live harvest over each captured job.
//! Jobs whose output already exists are skipped, as in a harvest; point the
//! sink at a fresh location to rebuild everything.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::pipeline::{CompletedJob, FailedJob, HarvestEvent, HarvestReport, JobError};
use crate::models::JobResult;
use crate::output::{filter_pending, HtmlCapture, OutputError, RecordSink};
use crate::scrapers::extract::parse_capture;

pub struct ReparseService {
    capture: HtmlCapture,
    sink: Arc<dyn RecordSink>,
}

impl ReparseService {
    pub fn new(capture: HtmlCapture, sink: Arc<dyn RecordSink>) -> Self {
        Self { capture, sink }
    }

    /// Reparse `job_ids`, or every captured job when the list is empty.
    pub async fn reparse(
        &self,
        job_ids: Vec<String>,
        event_tx: mpsc::Sender<HarvestEvent>,
    ) -> Result<HarvestReport, OutputError> {
        let mut report = HarvestReport::new();

        let job_ids = if job_ids.is_empty() {
            self.capture.captured_jobs().await?
        } else {
            job_ids
        };
        let completed = self.sink.completed_jobs().await?;
        let plan = filter_pending(job_ids, &completed);
        let _ = event_tx
            .send(HarvestEvent::Planned {
                pending: plan.pending.len(),
                skipped: plan.skipped.len(),
            })
            .await;
        report.skipped = plan.skipped;

        for job_id in plan.pending {
            let _ = event_tx
                .send(HarvestEvent::JobStarted {
                    job_id: job_id.clone(),
                })
                .await;
            match self.reparse_job(&job_id).await {
                Ok(done) => {
                    let _ = event_tx
                        .send(HarvestEvent::JobCompleted {
                            job_id: job_id.clone(),
                            records: done.records,
                            degraded: done.degraded,
                            path: done.output.clone(),
                        })
                        .await;
                    report.completed.push(done);
                }
                Err(e) => {
                    error!("Reparse failed: {}", e);
                    let _ = event_tx
                        .send(HarvestEvent::JobFailed {
                            job_id: job_id.clone(),
                            error: e.to_string(),
                        })
                        .await;
                    report.failed.push(FailedJob::from(&e));
                }
            }
        }

        report.finish();
        info!(
            "Reparse finished: {} completed, {} skipped, {} failed",
            report.completed.len(),
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn reparse_job(&self, job_id: &str) -> Result<CompletedJob, JobError> {
        let output_error = |source| JobError::Output {
            job_id: job_id.to_string(),
            source,
        };

        let html = self.capture.read_job(job_id).await.map_err(output_error)?;
        let records = parse_capture(job_id, &html).map_err(|source| JobError::Reparse {
            job_id: job_id.to_string(),
            source,
        })?;
        let result = JobResult {
            job_id: job_id.to_string(),
            records,
        };

        let degraded = result.degraded_count();
        if degraded > 0 {
            warn!("{}: {} saved row(s) were degraded", job_id, degraded);
        }
        let output = self.sink.write_job(&result).await.map_err(output_error)?;

        Ok(CompletedJob {
            job_id: job_id.to_string(),
            // Captures are not paged.
            pages: 0,
            records: result.len(),
            degraded,
            output,
        })
    }
}
