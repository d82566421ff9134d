//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod discover;
mod harvest;
mod reparse;
mod source;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions, SourceMode};

pub use harvest::HarvestArgs;
pub use reparse::ReparseArgs;

#[derive(Parser)]
#[command(name = "labharvest")]
#[command(about = "Harvest paginated race results into CSV")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true, env = "LABHARVEST_CONFIG")]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// How results are read (overrides the config file)
    #[arg(long, value_enum, global = true)]
    mode: Option<SourceMode>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest result records for one or more jobs
    Harvest(HarvestArgs),

    /// Rebuild CSV output from markup saved with --html-dir
    Reparse(ReparseArgs),

    /// Print the number of result pages of a job
    Discover {
        /// Job (subevent) id
        job_id: String,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (settings, config) = load_settings_with_options(LoadOptions {
        config_path: cli.config.clone(),
        use_cwd: cli.cwd,
    })
    .await?;

    match cli.command {
        Commands::Harvest(args) => harvest::cmd_harvest(settings, &config, cli.mode, args).await,
        Commands::Reparse(args) => reparse::cmd_reparse(settings, args).await,
        Commands::Discover { job_id } => {
            let mode = cli.mode.unwrap_or(settings.mode);
            discover::cmd_discover(&config, mode, &job_id).await
        }
    }
}
