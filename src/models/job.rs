//! Jobs, page tasks and their results.

use serde::{Deserialize, Serialize};

use super::Record;

/// One results-bearing unit of work (a provider "subevent").
///
/// Created once the page count is known; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    /// Always at least 1. A job without pagination is a single-page job.
    pub page_count: u32,
}

impl Job {
    pub fn new(job_id: impl Into<String>, page_count: u32) -> Self {
        Self {
            job_id: job_id.into(),
            page_count: page_count.max(1),
        }
    }

    /// Build one task per page, in page order.
    pub fn tasks<F>(&self, url_for: F) -> Vec<PageTask>
    where
        F: Fn(&str, u32) -> String,
    {
        (1..=self.page_count)
            .map(|page_number| PageTask {
                job_id: self.job_id.clone(),
                page_number,
                url: url_for(&self.job_id, page_number),
            })
            .collect()
    }
}

/// The unit of concurrent work: one page of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTask {
    pub job_id: String,
    /// 1-based, within `[1, page_count]`.
    pub page_number: u32,
    pub url: String,
}

/// Records of a single page, in on-page order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResult {
    pub page_number: u32,
    pub records: Vec<Record>,
}

impl PageResult {
    pub fn new(page_number: u32, records: Vec<Record>) -> Self {
        Self {
            page_number,
            records,
        }
    }

    /// A page that yielded no data (e.g. its table never rendered).
    pub fn empty(page_number: u32) -> Self {
        Self::new(page_number, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// All records of a job, ordered by page number then on-page order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobResult {
    pub job_id: String,
    pub records: Vec<Record>,
}

impl JobResult {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of rows whose detail panel did not render in time.
    pub fn degraded_count(&self) -> usize {
        self.records.iter().filter(|r| r.degraded).count()
    }
}
