//! Reparse command.

use std::path::PathBuf;

use clap::Args;
use console::style;
use tokio::sync::mpsc;
use tracing::warn;

use super::harvest::{describe_output, finish_report, spawn_progress};
use crate::config::{OutputTarget, Settings};
use crate::output::{sink_for, validate_job_id, HtmlCapture};
use crate::services::{HarvestEvent, ReparseService};

#[derive(Debug, Args)]
pub struct ReparseArgs {
    /// Directory of saved <job_id>.html captures
    #[arg(long, value_name = "DIR")]
    pub html_dir: Option<PathBuf>,

    /// Job id to rebuild; repeatable. Defaults to every captured job
    #[arg(long = "job", value_name = "ID")]
    pub jobs: Vec<String>,

    /// Write one <job_id>.csv per job into this directory
    #[arg(long, value_name = "DIR", conflicts_with = "append")]
    pub output_dir: Option<PathBuf>,

    /// Append every job to this single CSV
    #[arg(long, value_name = "FILE")]
    pub append: Option<PathBuf>,

    /// Write a JSON run report here
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

impl ReparseArgs {
    fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref dir) = self.output_dir {
            settings.output = OutputTarget::Directory(dir.clone());
        }
        if let Some(ref file) = self.append {
            settings.output = OutputTarget::Append(file.clone());
        }
        if let Some(ref report) = self.report {
            settings.report = Some(report.clone());
        }
        if let Some(ref dir) = self.html_dir {
            settings.html_dir = Some(dir.clone());
        }
    }
}

/// Rebuild CSV output from saved captures, without opening the provider.
pub async fn cmd_reparse(mut settings: Settings, args: ReparseArgs) -> anyhow::Result<()> {
    args.apply_to_settings(&mut settings);
    let Some(html_dir) = settings.html_dir.clone() else {
        anyhow::bail!("No capture directory. Pass --html-dir DIR or set html_dir in the config");
    };

    let job_ids: Vec<String> = args
        .jobs
        .iter()
        .map(|id| id.trim().to_string())
        .filter(|id| match validate_job_id(id) {
            Ok(()) => true,
            Err(e) => {
                warn!("{}", e);
                false
            }
        })
        .collect();

    println!(
        "{} Reparsing {} from {} into {}",
        style("→").cyan(),
        if job_ids.is_empty() {
            "every captured job".to_string()
        } else {
            format!("{} job(s)", job_ids.len())
        },
        html_dir.display(),
        describe_output(&settings.output)
    );

    let service = ReparseService::new(HtmlCapture::new(html_dir), sink_for(&settings.output));
    let (event_tx, event_rx) = mpsc::channel::<HarvestEvent>(100);
    let event_handler = spawn_progress(event_rx);

    let outcome = service.reparse(job_ids, event_tx).await;
    let tally = event_handler.await.unwrap_or_default();
    let report = outcome?;

    finish_report(&report, &tally, settings.report.as_deref()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_capture_directory_is_an_error() {
        let args = ReparseArgs {
            html_dir: None,
            jobs: Vec::new(),
            output_dir: None,
            append: None,
            report: None,
        };

        let err = cmd_reparse(Settings::default(), args).await.unwrap_err();

        assert!(err.to_string().contains("--html-dir"));
    }

    #[tokio::test]
    async fn rebuilds_output_from_captures() {
        let dir = tempfile::tempdir().unwrap();
        let html = dir.path().join("html");
        std::fs::create_dir_all(&html).unwrap();
        std::fs::write(html.join("abc123.html"), "").unwrap();
        let out = dir.path().join("csv");
        let args = ReparseArgs {
            html_dir: Some(html),
            jobs: Vec::new(),
            output_dir: Some(out.clone()),
            append: None,
            report: None,
        };

        cmd_reparse(Settings::default(), args).await.unwrap();

        let contents = std::fs::read_to_string(out.join("abc123.csv")).unwrap();
        assert!(contents.starts_with("data_source_id,"));
    }
}
