//! Page-level worker pool.
//!
//! A fixed number of workers drain a shared queue of page tasks. Each worker
//! hands back its own outcomes through its join handle, so there is no
//! shared accumulator; ordering is restored here by page number.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error};

use super::types::HarvestEvent;
use crate::models::{PageResult, PageTask};
use crate::scrapers::{PageError, ResultSource};

pub type PageOutcome = Result<PageResult, PageError>;

pub struct PageScheduler {
    workers: usize,
}

impl PageScheduler {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Run every task and return one outcome per task, in page order.
    ///
    /// All tasks run to completion; a failing page never cancels its siblings.
    pub async fn run(
        &self,
        source: Arc<dyn ResultSource>,
        tasks: Vec<PageTask>,
        event_tx: mpsc::Sender<HarvestEvent>,
    ) -> Vec<PageOutcome> {
        let expected: Vec<(String, u32)> = tasks
            .iter()
            .map(|t| (t.job_id.clone(), t.page_number))
            .collect();
        let workers = self.workers.min(tasks.len()).max(1);
        let queue = Arc::new(Mutex::new(VecDeque::from(tasks)));

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let queue = queue.clone();
            let source = source.clone();
            let event_tx = event_tx.clone();

            handles.push(tokio::spawn(async move {
                let mut outcomes = Vec::new();
                loop {
                    let task = queue.lock().await.pop_front();
                    let Some(task) = task else { break };

                    let _ = event_tx
                        .send(HarvestEvent::PageStarted {
                            worker_id,
                            job_id: task.job_id.clone(),
                            page: task.page_number,
                        })
                        .await;

                    let outcome = source.extract(&task).await;
                    let event = match &outcome {
                        Ok(page) => HarvestEvent::PageCompleted {
                            worker_id,
                            job_id: task.job_id.clone(),
                            page: task.page_number,
                            records: page.len(),
                        },
                        Err(e) => HarvestEvent::PageFailed {
                            worker_id,
                            job_id: task.job_id.clone(),
                            page: task.page_number,
                            error: e.to_string(),
                        },
                    };
                    let _ = event_tx.send(event).await;
                    outcomes.push((task.page_number, outcome));
                }
                debug!("Page worker {} finished", worker_id);
                outcomes
            }));
        }

        let mut by_page: BTreeMap<u32, PageOutcome> = BTreeMap::new();
        for handle in handles {
            match handle.await {
                Ok(outcomes) => by_page.extend(outcomes),
                Err(e) => error!("Page worker panicked: {}", e),
            }
        }

        // A panicked worker takes its pages with it.
        expected
            .into_iter()
            .map(|(job_id, page)| {
                by_page.remove(&page).unwrap_or_else(|| {
                    Err(PageError::Lost {
                        job_id,
                        page,
                        message: "no outcome reported".to_string(),
                    })
                })
            })
            .collect()
    }
}
