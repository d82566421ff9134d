//! Configuration management for labharvest using the prefer crate.

mod api;
mod browser;
mod settings;
mod site;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use api::{ApiConfig, API_KEY_ENV, DEFAULT_SUBSCRIPTION_KEY_HEADER, PARTICIPANTS_PER_PAGE};
pub use browser::BrowserEngineConfig;
pub use settings::{
    OutputTarget, Settings, SourceMode, DEFAULT_ID_COLUMN, DEFAULT_JOB_WORKERS,
    DEFAULT_PAGE_WORKERS,
};
pub use site::{SiteConfig, TimingConfig, DEFAULT_PAGE_URL_TEMPLATE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {format} config {path}: {message}")]
    Parse {
        format: &'static str,
        path: PathBuf,
        message: String,
    },
    #[error("Invalid config {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<SourceMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_workers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_workers: Option<usize>,
    /// Directory for per-job CSV files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    /// Single cumulative CSV; takes precedence over `output_dir`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_column: Option<String>,
    /// Directory for raw row markup; capture is off when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_dir: Option<String>,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub browser: BrowserEngineConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers labharvest config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("labharvest").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            warn!("Ignoring config file: {}", e);
                            Self::default_with_env()
                        }
                    }
                } else {
                    Self::default_with_env()
                }
            }
            Err(_) => {
                debug!("No config file found, using defaults");
                Self::default_with_env()
            }
        }
    }

    /// Defaults with environment overrides applied.
    pub fn default_with_env() -> Self {
        Self::default().with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        self.browser = self.browser.with_env_overrides();
        self.api = self.api.with_env_overrides();
        self
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let mut config = Self::parse(path, &contents)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config.with_env_overrides())
    }

    fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_error = |format: &'static str, message: String| ConfigError::Parse {
            format,
            path: path.to_path_buf(),
            message,
        };

        let config: Self = match ext {
            "toml" => toml::from_str(contents).map_err(|e| parse_error("TOML", e.to_string()))?,
            "yaml" | "yml" => {
                serde_yaml::from_str(contents).map_err(|e| parse_error("YAML", e.to_string()))?
            }
            _ => serde_json::from_str(contents).map_err(|e| parse_error("JSON", e.to_string()))?,
        };

        config.api.validate().map_err(|message| ConfigError::Invalid {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(config)
    }

    /// Directory relative paths are resolved against: the config file's
    /// directory, or the working directory.
    pub fn base_dir(&self) -> PathBuf {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(mode) = self.mode {
            settings.mode = mode;
        }
        if let Some(workers) = self.page_workers {
            settings.page_workers = workers.max(1);
        }
        if let Some(workers) = self.job_workers {
            settings.job_workers = workers.max(1);
        }
        if let Some(ref dir) = self.output_dir {
            settings.output = OutputTarget::Directory(self.resolve_path(dir, base_dir));
        }
        if let Some(ref file) = self.append_file {
            settings.output = OutputTarget::Append(self.resolve_path(file, base_dir));
        }
        if let Some(ref jobs) = self.jobs_file {
            settings.jobs_file = Some(self.resolve_path(jobs, base_dir));
        }
        if let Some(ref column) = self.id_column {
            settings.id_column = column.clone();
        }
        if let Some(ref dir) = self.html_dir {
            settings.html_dir = Some(self.resolve_path(dir, base_dir));
        }
    }
}

/// How to locate the config file and resolve relative paths.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file; skips discovery.
    pub config_path: Option<PathBuf>,
    /// Resolve relative paths from the working directory instead of the
    /// config file's directory.
    pub use_cwd: bool,
}

/// Load the config and fold it into default settings.
pub async fn load_settings_with_options(
    options: LoadOptions,
) -> Result<(Settings, Config), ConfigError> {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };

    let base_dir = if options.use_cwd {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    } else {
        config.base_dir()
    };

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);
    Ok((settings, config))
}
