//! Per-row interaction state machine.
//!
//! Every participant row is driven through
//! `Collapsed → Expanding → FieldsPending → FieldsReady → Collapsing → Collapsed`:
//! click to expand, wait for the detail panel, read the markup, click again and
//! wait until the panel is gone. A row is only considered done once it is back
//! in `Collapsed`, so the next row's click never toggles a stale panel.

pub mod layout;
mod parse;

#[cfg(test)]
pub(crate) use parse::fixtures;
pub use parse::{parse_capture, parse_row, wrap_row};

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::models::{PageTask, Record};
use crate::scrapers::session::{ElementRef, PageSession, SessionError};
use layout::{
    detail_ready_selectors, COLLAPSE_MARKER_SELECTOR, EXPANDED_PANEL_SELECTOR, ROW_SELECTOR,
};

/// Errors raised while extracting the rows of one page.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Row {row} did not collapse within {timeout:?}")]
    CollapseTimeout { row: usize, timeout: Duration },

    #[error("Layout mismatch in '{container}': expected at least {expected} cells, found {found}")]
    LayoutMismatch {
        container: String,
        expected: usize,
        found: usize,
    },

    #[error("Invalid selector {0}")]
    Selector(String),
}

impl ExtractError {
    /// Failures that a reload and restart of the page may clear.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Session(e) => e.is_transient(),
            Self::CollapseTimeout { .. } => true,
            Self::LayoutMismatch { .. } | Self::Selector(_) => false,
        }
    }
}

/// Interaction state of a single row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    Collapsed,
    Expanding,
    FieldsPending,
    FieldsReady { degraded: bool },
    Collapsing,
}

/// Drives one row through a full expand/read/collapse cycle.
pub struct RowMachine<'a> {
    session: &'a mut dyn PageSession,
    task: &'a PageTask,
    index: usize,
    field_wait: Duration,
    state: RowState,
    history: Vec<RowState>,
    degraded: bool,
    record: Option<Record>,
}

impl<'a> RowMachine<'a> {
    pub fn new(
        session: &'a mut dyn PageSession,
        task: &'a PageTask,
        index: usize,
        field_wait: Duration,
    ) -> Self {
        Self {
            session,
            task,
            index,
            field_wait,
            state: RowState::Collapsed,
            history: vec![RowState::Collapsed],
            degraded: false,
            record: None,
        }
    }

    /// Every state visited so far, starting with `Collapsed`.
    pub fn history(&self) -> &[RowState] {
        &self.history
    }

    fn row(&self) -> ElementRef {
        ElementRef::nth(ROW_SELECTOR, self.index)
    }

    fn enter(&mut self, next: RowState) {
        debug!(
            "{} p{} row {}: {:?} -> {:?}",
            self.task.job_id, self.task.page_number, self.index, self.state, next
        );
        self.state = next;
        self.history.push(next);
    }

    /// Perform the transition out of the current state.
    pub async fn step(&mut self) -> Result<RowState, ExtractError> {
        let next = match self.state {
            RowState::Collapsed => {
                let row = self.row();
                self.session.click(&row).await?;
                RowState::Expanding
            }
            RowState::Expanding => {
                let ready = wait_for_all(
                    &mut *self.session,
                    &detail_ready_selectors(),
                    self.field_wait,
                )
                .await?;
                if !ready {
                    warn!(
                        "{} page {} row {}: detail panel incomplete after {:?}, reading what rendered",
                        self.task.job_id, self.task.page_number, self.index, self.field_wait
                    );
                }
                self.degraded = !ready;
                RowState::FieldsPending
            }
            RowState::FieldsPending => {
                let row = self.row();
                let row_html = self.session.read_html(&row).await?;
                let panel_html = if self.session.count(EXPANDED_PANEL_SELECTOR).await? > 0 {
                    self.session
                        .read_html(&ElementRef::first(EXPANDED_PANEL_SELECTOR))
                        .await?
                } else {
                    String::new()
                };

                let mut record = parse_row(&self.task.job_id, &row_html, &panel_html)?;
                record.degraded = self.degraded;
                record.raw_html = Some(wrap_row(&row_html, &panel_html, self.degraded));
                self.record = Some(record);
                RowState::FieldsReady {
                    degraded: self.degraded,
                }
            }
            RowState::FieldsReady { .. } => {
                let row = self.row();
                self.session.click(&row).await?;
                RowState::Collapsing
            }
            RowState::Collapsing => {
                let gone = self
                    .session
                    .wait_for_absence(COLLAPSE_MARKER_SELECTOR, self.field_wait)
                    .await?;
                if !gone {
                    return Err(ExtractError::CollapseTimeout {
                        row: self.index,
                        timeout: self.field_wait,
                    });
                }
                RowState::Collapsed
            }
        };
        self.enter(next);
        Ok(next)
    }

    /// Run the full cycle and return the row's record.
    pub async fn run(mut self) -> Result<Record, ExtractError> {
        loop {
            let state = self.step().await?;
            if state == RowState::Collapsed {
                if let Some(record) = self.record.take() {
                    return Ok(record);
                }
            }
        }
    }
}

/// Wait for every selector under one shared deadline.
async fn wait_for_all(
    session: &mut dyn PageSession,
    selectors: &[&str],
    timeout: Duration,
) -> Result<bool, SessionError> {
    let deadline = Instant::now() + timeout;
    for selector in selectors {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if !session.wait_for(selector, remaining).await? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Extract every row of the loaded page, in on-page order.
pub async fn extract_rows(
    session: &mut dyn PageSession,
    task: &PageTask,
    field_wait: Duration,
) -> Result<Vec<Record>, ExtractError> {
    let rows = session.count(ROW_SELECTOR).await?;
    debug!("{} page {}: {} rows", task.job_id, task.page_number, rows);

    let mut records = Vec::with_capacity(rows);
    for index in 0..rows {
        let record = RowMachine::new(&mut *session, task, index, field_wait)
            .run()
            .await?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::scripted::{Fault, ScriptedPage, ScriptedSession, ScriptedSite};

    fn task() -> PageTask {
        PageTask {
            job_id: "abc123".to_string(),
            page_number: 1,
            url: "https://results.test/abc123?page=1".to_string(),
        }
    }

    fn session_for(page: ScriptedPage) -> ScriptedSession {
        let site = ScriptedSite::new().with_page("https://results.test/abc123?page=1", page);
        ScriptedSession::new(site, "https://results.test/abc123?page=1")
    }

    #[tokio::test(start_paused = true)]
    async fn row_cycles_back_to_collapsed() {
        let mut session = session_for(ScriptedPage::with_rows(&["Ann", "Bob"], &[]));
        let task = task();

        let mut machine = RowMachine::new(&mut session, &task, 0, Duration::from_secs(5));
        while machine.step().await.unwrap() != RowState::Collapsed {}

        assert_eq!(
            machine.history(),
            &[
                RowState::Collapsed,
                RowState::Expanding,
                RowState::FieldsPending,
                RowState::FieldsReady { degraded: false },
                RowState::Collapsing,
                RowState::Collapsed,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rows_come_back_in_page_order() {
        let mut session = session_for(ScriptedPage::with_rows(&["Ann", "Bob", "Cy"], &[]));

        let records = extract_rows(&mut session, &task(), Duration::from_secs(5))
            .await
            .unwrap();

        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Ann", "Bob", "Cy"]);
        assert!(records.iter().all(|r| r.data_source_id == "abc123"));
        assert_eq!(session.stats().clicks, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_panel_marks_row_degraded() {
        let page = ScriptedPage::with_rows(&["Ann", "Bob"], &[]).slow_details(1);
        let mut session = session_for(page);

        let records = extract_rows(&mut session, &task(), Duration::from_secs(5))
            .await
            .unwrap();

        assert!(!records[0].degraded);
        assert!(records[1].degraded);
        assert_eq!(records[1].name, "Bob");
        assert_eq!(records[1].country, "");
        assert_eq!(records[1].overall_rank, "");
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_collapse_is_transient() {
        let page = ScriptedPage::with_rows(&["Ann"], &[]).with_fault(Fault::StuckPanel { row: 0 });
        let mut session = session_for(page);

        let err = extract_rows(&mut session, &task(), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::CollapseTimeout { row: 0, .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn layout_mismatch_is_not_transient() {
        let err = ExtractError::LayoutMismatch {
            container: "footer".into(),
            expected: 4,
            found: 1,
        };
        assert!(!err.is_transient());
        assert!(ExtractError::Session(SessionError::StaleElement("tr".into())).is_transient());
        assert!(!ExtractError::Session(SessionError::Browser("gone".into())).is_transient());
    }
}
