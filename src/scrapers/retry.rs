//! Whole-page retry with refresh-and-restart recovery.
//!
//! Transient DOM failures (stale handles, missing elements, intercepted
//! clicks, panels that never collapse) reload the page and restart it from
//! the first row, discarding partial progress. After `retry_count` restarts
//! the next transient failure is fatal for the page.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::error::PageError;
use super::extract::layout::TABLE_READY_SELECTOR;
use super::extract::{extract_rows, ExtractError};
use super::session::{PageSession, SessionError, SessionProvider};
use crate::config::TimingConfig;
use crate::models::{PageResult, PageTask, Record};

/// Timeouts and retry budget for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Restarts allowed before a transient failure becomes fatal.
    pub retry_count: u32,
    /// Wait for the results table to render.
    pub page_wait: Duration,
    /// Wait for the pagination control during discovery.
    pub pagination_wait: Duration,
    /// Wait for a row's detail panel to render or collapse.
    pub field_wait: Duration,
    /// Pause after a reload before restarting.
    pub restart_pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

impl From<&TimingConfig> for RetryPolicy {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            retry_count: timing.retry_count,
            page_wait: Duration::from_secs(timing.page_wait_secs),
            pagination_wait: Duration::from_secs(timing.pagination_wait_secs),
            field_wait: Duration::from_secs(timing.field_wait_secs),
            restart_pause: Duration::from_secs(timing.restart_pause_secs),
        }
    }
}

impl RetryPolicy {
    /// Total attempts a page may consume, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.retry_count + 1
    }
}

/// One pass over the loaded page. `None` when the table never rendered.
async fn attempt(
    session: &mut dyn PageSession,
    task: &PageTask,
    policy: &RetryPolicy,
) -> Result<Option<Vec<Record>>, ExtractError> {
    if !session
        .wait_for(TABLE_READY_SELECTOR, policy.page_wait)
        .await?
    {
        return Ok(None);
    }
    extract_rows(session, task, policy.field_wait)
        .await
        .map(Some)
}

/// Extract a loaded page, restarting on transient failures.
pub async fn extract_with_retry(
    session: &mut dyn PageSession,
    task: &PageTask,
    policy: &RetryPolicy,
) -> Result<PageResult, PageError> {
    let mut restarts: u32 = 0;

    loop {
        let outcome = match attempt(&mut *session, task, policy).await {
            Ok(Some(records)) => return Ok(PageResult::new(task.page_number, records)),
            Ok(None) if restarts == 0 => {
                warn!(
                    "{} page {}: no results table after {:?}, treating page as empty",
                    task.job_id, task.page_number, policy.page_wait
                );
                return Ok(PageResult::empty(task.page_number));
            }
            // A table that rendered before but not after a reload is flakiness, not an empty page.
            Ok(None) => ExtractError::Session(SessionError::NoSuchElement(
                TABLE_READY_SELECTOR.to_string(),
            )),
            Err(e) => e,
        };

        if !outcome.is_transient() {
            error!(
                "{} page {}: fatal extraction error: {}",
                task.job_id, task.page_number, outcome
            );
            return Err(match outcome {
                ExtractError::Session(cause) => PageError::Session {
                    job_id: task.job_id.clone(),
                    page: task.page_number,
                    cause,
                },
                cause => PageError::Extraction {
                    job_id: task.job_id.clone(),
                    page: task.page_number,
                    cause,
                },
            });
        }

        if restarts >= policy.retry_count {
            error!(
                "{} page {}: retries exhausted after {} attempts: {}",
                task.job_id,
                task.page_number,
                restarts + 1,
                outcome
            );
            return Err(PageError::RetriesExhausted {
                job_id: task.job_id.clone(),
                page: task.page_number,
                attempts: restarts + 1,
                cause: outcome,
            });
        }

        restarts += 1;
        error!(
            "{} page {}: {} (restart {}/{})",
            task.job_id, task.page_number, outcome, restarts, policy.retry_count
        );

        session.reload().await.map_err(|cause| PageError::Session {
            job_id: task.job_id.clone(),
            page: task.page_number,
            cause,
        })?;
        tokio::time::sleep(policy.restart_pause).await;
    }
}

/// Open a session for `task`, extract it, and close the session on every path.
pub async fn run_page_task(
    provider: &dyn SessionProvider,
    task: &PageTask,
    policy: &RetryPolicy,
) -> Result<PageResult, PageError> {
    let started = std::time::Instant::now();
    info!("{} page {}: starting", task.job_id, task.page_number);

    let mut session = provider
        .open(&task.url)
        .await
        .map_err(|cause| PageError::Session {
            job_id: task.job_id.clone(),
            page: task.page_number,
            cause,
        })?;

    let result = extract_with_retry(session.as_mut(), task, policy).await;

    if let Err(e) = session.close().await {
        debug!(
            "{} page {}: failed to close session: {}",
            task.job_id, task.page_number, e
        );
    }

    if let Ok(page) = &result {
        info!(
            "{} page {}: {} records in {:.2}s",
            task.job_id,
            task.page_number,
            page.len(),
            started.elapsed().as_secs_f64()
        );
    }
    result
}
