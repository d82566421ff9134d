//! Job-level harvesting.
//!
//! Jobs left over after the resume filter run on a pool bounded by a
//! semaphore of `job_workers` permits; each job fans its pages out over a
//! [`PageScheduler`] of `page_workers`. A job is written only when every one
//! of its pages succeeded. Separated from UI concerns: progress is reported
//! as [`HarvestEvent`]s.

mod aggregate;
mod scheduler;
mod types;

pub use aggregate::{aggregate, collect_pages};
pub use scheduler::{PageOutcome, PageScheduler};
pub use types::{CompletedJob, FailedJob, HarvestConfig, HarvestEvent, HarvestReport, JobError};

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};

use crate::output::{filter_pending, HtmlCapture, OutputError, RecordSink};
use crate::scrapers::ResultSource;

/// Harvests jobs from a result source into a record sink.
#[derive(Clone)]
pub struct HarvestService {
    source: Arc<dyn ResultSource>,
    sink: Arc<dyn RecordSink>,
    capture: Option<Arc<HtmlCapture>>,
    config: HarvestConfig,
}

impl HarvestService {
    pub fn new(
        source: Arc<dyn ResultSource>,
        sink: Arc<dyn RecordSink>,
        config: HarvestConfig,
    ) -> Self {
        Self {
            source,
            sink,
            capture: None,
            config,
        }
    }

    /// Also save each job's raw row markup before its table is written.
    pub fn with_html_capture(mut self, capture: HtmlCapture) -> Self {
        self.capture = Some(Arc::new(capture));
        self
    }

    /// Harvest every job in `job_ids` that has no output yet.
    ///
    /// Failed jobs are recorded in the report and the run carries on. Only a
    /// sink that cannot report its completed jobs aborts the run.
    pub async fn harvest(
        &self,
        job_ids: Vec<String>,
        event_tx: mpsc::Sender<HarvestEvent>,
    ) -> Result<HarvestReport, OutputError> {
        let mut report = HarvestReport::new();

        let completed = self.sink.completed_jobs().await?;
        let plan = filter_pending(job_ids, &completed);
        for job_id in &plan.skipped {
            info!("Skipping {}: output already exists", job_id);
        }
        let _ = event_tx
            .send(HarvestEvent::Planned {
                pending: plan.pending.len(),
                skipped: plan.skipped.len(),
            })
            .await;
        report.skipped = plan.skipped;

        let permits = Arc::new(Semaphore::new(self.config.job_workers.max(1)));
        let mut handles = Vec::with_capacity(plan.pending.len());

        for job_id in plan.pending {
            // Acquired before spawning so jobs start in request order.
            let permit = match permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("Job pool closed: {}", e);
                    break;
                }
            };
            let service = self.clone();
            let event_tx = event_tx.clone();
            let id = job_id.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let outcome = service.harvest_job(&id, &event_tx).await;
                if let Err(ref e) = outcome {
                    error!("Job failed: {}", e);
                    let _ = event_tx
                        .send(HarvestEvent::JobFailed {
                            job_id: id.clone(),
                            error: e.to_string(),
                        })
                        .await;
                }
                outcome
            });
            handles.push((job_id, handle));
        }

        for (job_id, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Harvest task for {} aborted: {}", job_id, e);
                    Err(JobError::Aborted {
                        job_id,
                        message: e.to_string(),
                    })
                }
            };
            match outcome {
                Ok(done) => report.completed.push(done),
                Err(e) => report.failed.push(FailedJob::from(&e)),
            }
        }

        report.finish();
        info!(
            "Harvest finished: {} completed, {} skipped, {} failed",
            report.completed.len(),
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Discover, extract, aggregate and persist one job.
    pub async fn harvest_job(
        &self,
        job_id: &str,
        event_tx: &mpsc::Sender<HarvestEvent>,
    ) -> Result<CompletedJob, JobError> {
        let started = Instant::now();
        info!("Starting job {}", job_id);
        let _ = event_tx
            .send(HarvestEvent::JobStarted {
                job_id: job_id.to_string(),
            })
            .await;

        let job = self.source.discover(job_id).await?;
        info!("{}: {} page(s)", job_id, job.page_count);
        let _ = event_tx
            .send(HarvestEvent::JobDiscovered {
                job_id: job_id.to_string(),
                pages: job.page_count,
            })
            .await;

        let tasks = self.source.tasks(&job);
        let outcomes = PageScheduler::new(self.config.page_workers)
            .run(self.source.clone(), tasks, event_tx.clone())
            .await;
        let pages = collect_pages(outcomes)?;
        let result = aggregate(&job, pages);

        let degraded = result.degraded_count();
        if degraded > 0 {
            warn!(
                "{}: {} of {} record(s) are degraded",
                job_id,
                degraded,
                result.len()
            );
        }

        let output_error = |source| JobError::Output {
            job_id: job_id.to_string(),
            source,
        };
        // Markup first, so a job with a table always has its capture too.
        if let Some(ref capture) = self.capture {
            capture.write_job(&result).await.map_err(output_error)?;
        }

        let output = self
            .sink
            .write_job(&result)
            .await
            .map_err(output_error)?;

        info!(
            "Finished {}: {} record(s) from {} page(s) in {:.1}s",
            job_id,
            result.len(),
            job.page_count,
            started.elapsed().as_secs_f64()
        );
        let _ = event_tx
            .send(HarvestEvent::JobCompleted {
                job_id: job_id.to_string(),
                records: result.len(),
                degraded,
                path: output.clone(),
            })
            .await;

        Ok(CompletedJob {
            job_id: job_id.to_string(),
            pages: job.page_count,
            records: result.len(),
            degraded,
            output,
        })
    }
}
