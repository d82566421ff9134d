//! JSON results API configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Participants requested per API window.
pub const PARTICIPANTS_PER_PAGE: u32 = 200;

/// Most windows a single job may span.
pub const MAX_WINDOWS: u32 = 500;

pub const DEFAULT_SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Environment variable holding the API subscription key.
pub const API_KEY_ENV: &str = "LABHARVEST_API_KEY";

/// Immutable request configuration for the results API.
///
/// Built once at startup and handed to the client; nothing mutates it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiConfig {
    /// Participants endpoint with a `{job_id}` placeholder.
    #[serde(default)]
    pub url_template: Option<String>,

    #[serde(default = "default_key_header")]
    pub subscription_key_header: String,

    /// Also read from `LABHARVEST_API_KEY`.
    #[serde(default, skip_serializing)]
    pub subscription_key: Option<String>,

    /// Extra headers sent with every request.
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Participants per window; must be at least 1.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Jobs whose total needs more windows than this are rejected.
    #[serde(default = "default_max_windows")]
    pub max_windows: u32,

    #[serde(default = "default_offset_param")]
    pub offset_param: String,

    #[serde(default = "default_limit_param")]
    pub limit_param: String,

    /// Response field holding the participant count.
    #[serde(default = "default_total_field")]
    pub total_field: String,

    /// Response field holding the participant array.
    #[serde(default = "default_data_field")]
    pub data_field: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url_template: None,
            subscription_key_header: default_key_header(),
            subscription_key: None,
            headers: default_headers(),
            timeout: default_timeout(),
            page_size: default_page_size(),
            max_windows: default_max_windows(),
            offset_param: default_offset_param(),
            limit_param: default_limit_param(),
            total_field: default_total_field(),
            data_field: default_data_field(),
        }
    }
}

impl ApiConfig {
    /// Apply environment variable overrides.
    ///
    /// - `LABHARVEST_API_KEY` - subscription key
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                self.subscription_key = Some(key);
            }
        }
        self
    }

    /// Endpoint for `job_id`, if an endpoint is configured.
    pub fn participants_url(&self, job_id: &str) -> Option<String> {
        self.url_template
            .as_ref()
            .map(|template| template.replace("{job_id}", job_id))
    }

    /// Reject settings that would make window arithmetic meaningless.
    pub fn validate(&self) -> Result<(), String> {
        if self.page_size == 0 {
            return Err("api.page_size must be at least 1".to_string());
        }
        if self.max_windows == 0 {
            return Err("api.max_windows must be at least 1".to_string());
        }
        Ok(())
    }

    /// Number of windows needed to cover `total` participants, or `None`
    /// when that exceeds `max_windows`.
    pub fn window_count(&self, total: u64) -> Option<u32> {
        let size = u64::from(self.page_size.max(1));
        let windows = total.div_ceil(size).max(1);
        u32::try_from(windows)
            .ok()
            .filter(|w| *w <= self.max_windows)
    }

    /// Offset of the first participant in `page` (1-based).
    pub fn window_offset(&self, page: u32) -> u64 {
        u64::from(page.saturating_sub(1)) * u64::from(self.page_size.max(1))
    }
}

fn default_key_header() -> String {
    DEFAULT_SUBSCRIPTION_KEY_HEADER.to_string()
}

fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("accept".to_string(), "application/json".to_string()),
        ("accept-language".to_string(), "en-US,en;q=0.9".to_string()),
    ])
}

fn default_timeout() -> u64 {
    30
}

fn default_page_size() -> u32 {
    PARTICIPANTS_PER_PAGE
}

fn default_max_windows() -> u32 {
    MAX_WINDOWS
}

fn default_offset_param() -> String {
    "offset".to_string()
}

fn default_limit_param() -> String {
    "limit".to_string()
}

fn default_total_field() -> String {
    "total".to_string()
}

fn default_data_field() -> String {
    "data".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_count_rounds_up_and_never_hits_zero() {
        let config = ApiConfig::default();
        assert_eq!(config.window_count(0), Some(1));
        assert_eq!(config.window_count(1), Some(1));
        assert_eq!(config.window_count(200), Some(1));
        assert_eq!(config.window_count(201), Some(2));
        assert_eq!(config.window_count(1000), Some(5));
    }

    #[test]
    fn oversized_totals_have_no_window_count() {
        let config = ApiConfig::default();
        assert_eq!(config.window_count(100_000), Some(500));
        assert_eq!(config.window_count(100_001), None);
        assert_eq!(config.window_count(1_000_000_000_000), None);
        assert_eq!(config.window_count(u64::MAX), None);
    }

    #[test]
    fn zero_page_size_is_invalid() {
        let config = ApiConfig {
            page_size: 0,
            ..ApiConfig::default()
        };
        assert!(config.validate().unwrap_err().contains("page_size"));
        assert!(ApiConfig::default().validate().is_ok());
        assert_eq!(config.window_offset(3), 2);
    }

    #[test]
    fn window_offsets() {
        let config = ApiConfig::default();
        assert_eq!(config.window_offset(1), 0);
        assert_eq!(config.window_offset(3), 400);
    }

    #[test]
    fn participants_url_requires_template() {
        let mut config = ApiConfig::default();
        assert_eq!(config.participants_url("abc123"), None);

        config.url_template = Some("https://api.test/subevents/{job_id}/participants".into());
        assert_eq!(
            config.participants_url("abc123").as_deref(),
            Some("https://api.test/subevents/abc123/participants")
        );
    }

    #[test]
    fn key_is_never_serialized() {
        let config = ApiConfig {
            subscription_key: Some("secret".into()),
            ..ApiConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
