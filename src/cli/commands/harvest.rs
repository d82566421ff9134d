//! Harvest command.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use console::style;
use tokio::sync::mpsc;
use tracing::warn;

use super::source::SourceHandle;
use crate::cli::progress::{HarvestProgress, HarvestTally};
use crate::config::{Config, OutputTarget, Settings, SourceMode};
use crate::output::{load_job_ids, sink_for, validate_job_id, HtmlCapture};
use crate::services::{HarvestConfig, HarvestEvent, HarvestReport, HarvestService};

#[derive(Debug, Args)]
pub struct HarvestArgs {
    /// Job (subevent) id to harvest; repeatable
    #[arg(long = "job", value_name = "ID")]
    pub jobs: Vec<String>,

    /// File of job ids: a CSV with an id column, or one id per line
    #[arg(long, value_name = "PATH")]
    pub jobs_file: Option<PathBuf>,

    /// CSV column holding job ids
    #[arg(long)]
    pub id_column: Option<String>,

    /// Write one <job_id>.csv per job into this directory
    #[arg(long, value_name = "DIR", conflicts_with = "append")]
    pub output_dir: Option<PathBuf>,

    /// Append every job to this single CSV
    #[arg(long, value_name = "FILE")]
    pub append: Option<PathBuf>,

    /// Pages of one job extracted at once
    #[arg(long)]
    pub page_workers: Option<usize>,

    /// Jobs harvested at once
    #[arg(long)]
    pub job_workers: Option<usize>,

    /// Write a JSON run report here
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Also save each job's raw row markup as <job_id>.html in this directory
    #[arg(long, value_name = "DIR")]
    pub html_dir: Option<PathBuf>,
}

impl HarvestArgs {
    /// Command-line flags take precedence over the config file.
    fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref dir) = self.output_dir {
            settings.output = OutputTarget::Directory(dir.clone());
        }
        if let Some(ref file) = self.append {
            settings.output = OutputTarget::Append(file.clone());
        }
        if let Some(workers) = self.page_workers {
            settings.page_workers = workers.max(1);
        }
        if let Some(workers) = self.job_workers {
            settings.job_workers = workers.max(1);
        }
        if let Some(ref file) = self.jobs_file {
            settings.jobs_file = Some(file.clone());
        }
        if let Some(ref column) = self.id_column {
            settings.id_column = column.clone();
        }
        if let Some(ref report) = self.report {
            settings.report = Some(report.clone());
        }
        if let Some(ref dir) = self.html_dir {
            settings.html_dir = Some(dir.clone());
        }
    }
}

/// Job ids from flags, then from the jobs file. Invalid ids are dropped.
async fn collect_job_ids(args: &HarvestArgs, settings: &Settings) -> anyhow::Result<Vec<String>> {
    let mut ids = args.jobs.clone();
    if let Some(ref path) = settings.jobs_file {
        let from_file = load_job_ids(path, &settings.id_column)
            .await
            .with_context(|| format!("reading jobs from {}", path.display()))?;
        ids.extend(from_file);
    }

    Ok(ids
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| match validate_job_id(id) {
            Ok(()) => true,
            Err(e) => {
                warn!("{}", e);
                false
            }
        })
        .collect())
}

pub(super) fn describe_output(output: &OutputTarget) -> String {
    match output {
        OutputTarget::Directory(dir) => format!("{}/", dir.display()),
        OutputTarget::Append(file) => format!("{} (append)", file.display()),
    }
}

/// Harvest every requested job that has no output yet.
pub async fn cmd_harvest(
    mut settings: Settings,
    config: &Config,
    mode: Option<SourceMode>,
    args: HarvestArgs,
) -> anyhow::Result<()> {
    if let Some(mode) = mode {
        settings.mode = mode;
    }
    args.apply_to_settings(&mut settings);

    let job_ids = collect_job_ids(&args, &settings).await?;
    if job_ids.is_empty() {
        println!(
            "{} No jobs to harvest. Pass --job ID or --jobs-file PATH",
            style("!").yellow()
        );
        return Ok(());
    }

    println!(
        "{} Harvesting {} job(s) via {} into {} (up to {} concurrent sessions)",
        style("→").cyan(),
        job_ids.len(),
        settings.mode,
        describe_output(&settings.output),
        settings.max_concurrency()
    );

    let handle = SourceHandle::build(config, settings.mode)?;
    let mut service = HarvestService::new(
        handle.source.clone(),
        sink_for(&settings.output),
        HarvestConfig {
            page_workers: settings.page_workers,
            job_workers: settings.job_workers,
        },
    );
    if let Some(ref dir) = settings.html_dir {
        if settings.mode == SourceMode::Api {
            warn!("API results carry no row markup; nothing will be saved to {}", dir.display());
        }
        service = service.with_html_capture(HtmlCapture::new(dir.clone()));
    }

    let (event_tx, event_rx) = mpsc::channel::<HarvestEvent>(100);
    let event_handler = spawn_progress(event_rx);

    let outcome = service.harvest(job_ids, event_tx).await;
    handle.shutdown().await;
    let tally = event_handler.await.unwrap_or_default();
    let report = outcome?;

    finish_report(&report, &tally, settings.report.as_deref()).await
}

/// Render events on a progress display until the sender side closes.
pub(super) fn spawn_progress(
    mut event_rx: mpsc::Receiver<HarvestEvent>,
) -> tokio::task::JoinHandle<HarvestTally> {
    tokio::spawn(async move {
        let mut progress = HarvestProgress::new();
        while let Some(event) = event_rx.recv().await {
            progress.handle(event);
        }
        progress.finish();
        progress.tally()
    })
}

/// Print the closing summary, write the JSON report, and fail on failed jobs.
pub(super) async fn finish_report(
    report: &HarvestReport,
    tally: &HarvestTally,
    report_path: Option<&Path>,
) -> anyhow::Result<()> {
    println!(
        "{} {} job(s) done, {} skipped, {} failed: {} records from {} pages",
        style("✓").green(),
        report.completed.len(),
        report.skipped.len(),
        report.failed.len(),
        report.total_records(),
        tally.pages
    );
    if tally.degraded > 0 {
        println!(
            "  {} {} record(s) flagged as degraded",
            style("!").yellow(),
            tally.degraded
        );
    }

    if let Some(path) = report_path {
        report
            .write_json(path)
            .await
            .with_context(|| format!("writing report to {}", path.display()))?;
        println!("  {} Report written to {}", style("→").dim(), path.display());
    }

    if !report.is_clean() {
        anyhow::bail!("{} job(s) failed", report.failed.len());
    }
    Ok(())
}
