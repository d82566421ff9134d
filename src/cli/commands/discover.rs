//! Discover command: print a job's page count.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use super::source::SourceHandle;
use crate::config::{Config, SourceMode};

pub async fn cmd_discover(config: &Config, mode: SourceMode, job_id: &str) -> anyhow::Result<()> {
    let handle = SourceHandle::build(config, mode)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(format!("Discovering pages of {}...", job_id));

    let outcome = handle.source.discover(job_id).await;
    pb.finish_and_clear();
    handle.shutdown().await;

    let job = outcome?;
    println!(
        "{} {}: {} page(s)",
        style("✓").green(),
        job.job_id,
        job.page_count
    );
    Ok(())
}
