//! Terminal rendering of harvest events.

use std::collections::HashMap;
use std::time::Duration;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::services::HarvestEvent;

/// Counts collected while rendering, for the closing summary.
#[derive(Debug, Default, Clone, Copy)]
pub struct HarvestTally {
    pub pages: usize,
    pub records: usize,
    pub degraded: usize,
    pub failed_pages: usize,
}

/// One bar for the run, one per job while it is in flight.
pub struct HarvestProgress {
    multi: MultiProgress,
    jobs: ProgressBar,
    pages: HashMap<String, ProgressBar>,
    tally: HarvestTally,
}

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
}

impl HarvestProgress {
    pub fn new() -> Self {
        let multi = MultiProgress::new();
        let jobs = multi.add(ProgressBar::new(0));
        jobs.set_style(bar_style(
            "{spinner:.green} jobs [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}",
        ));
        jobs.enable_steady_tick(Duration::from_millis(120));
        Self {
            multi,
            jobs,
            pages: HashMap::new(),
            tally: HarvestTally::default(),
        }
    }

    pub fn tally(&self) -> HarvestTally {
        self.tally
    }

    fn println(&self, line: String) {
        let _ = self.multi.println(line);
    }

    fn finish_job(&mut self, job_id: &str) {
        if let Some(bar) = self.pages.remove(job_id) {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
        self.jobs.inc(1);
    }

    pub fn handle(&mut self, event: HarvestEvent) {
        match event {
            HarvestEvent::Planned { pending, skipped } => {
                self.jobs.set_length(pending as u64);
                if skipped > 0 {
                    self.println(format!(
                        "{} Skipping {} job(s) with existing output",
                        style("→").dim(),
                        skipped
                    ));
                }
            }
            HarvestEvent::JobStarted { job_id } => {
                self.jobs.set_message(format!("discovering {}", job_id));
            }
            HarvestEvent::JobDiscovered { job_id, pages } => {
                let bar = self.multi.add(ProgressBar::new(u64::from(pages)));
                bar.set_style(bar_style("  {prefix} [{bar:20.green/dim}] {pos}/{len} pages"));
                bar.set_prefix(job_id.clone());
                self.pages.insert(job_id, bar);
            }
            HarvestEvent::PageStarted { .. } => {}
            HarvestEvent::PageCompleted {
                job_id, records, ..
            } => {
                self.tally.pages += 1;
                self.tally.records += records;
                if let Some(bar) = self.pages.get(&job_id) {
                    bar.inc(1);
                }
            }
            HarvestEvent::PageFailed {
                job_id, page, error, ..
            } => {
                self.tally.failed_pages += 1;
                if let Some(bar) = self.pages.get(&job_id) {
                    bar.inc(1);
                }
                self.println(format!(
                    "  {} {} page {}: {}",
                    style("✗").red(),
                    job_id,
                    page,
                    error
                ));
            }
            HarvestEvent::JobCompleted {
                job_id,
                records,
                degraded,
                path,
            } => {
                self.tally.degraded += degraded;
                self.finish_job(&job_id);
                let note = if degraded > 0 {
                    format!(" ({} degraded)", style(degraded).yellow())
                } else {
                    String::new()
                };
                self.println(format!(
                    "  {} {} {} records{} → {}",
                    style("✓").green(),
                    job_id,
                    records,
                    note,
                    path.display()
                ));
            }
            HarvestEvent::JobFailed { job_id, error } => {
                self.finish_job(&job_id);
                self.println(format!("  {} {}", style("✗").red(), error));
            }
        }
    }

    pub fn finish(&self) {
        self.jobs.finish_and_clear();
    }
}

impl Default for HarvestProgress {
    fn default() -> Self {
        Self::new()
    }
}
