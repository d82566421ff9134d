//! Results site addressing and interaction timings.

use serde::{Deserialize, Serialize};

/// Paginated results view of one subevent.
pub const DEFAULT_PAGE_URL_TEMPLATE: &str = "https://labs.competitor.com/result/subevent/{job_id}?filter=%7B%7D&order=ASC&perPage=50&sort=FinishRankOverall&page={page}";

/// Where result pages live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteConfig {
    /// Page URL with `{job_id}` and `{page}` placeholders.
    #[serde(default = "default_page_url_template")]
    pub page_url_template: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            page_url_template: default_page_url_template(),
        }
    }
}

impl SiteConfig {
    pub fn page_url(&self, job_id: &str, page: u32) -> String {
        self.page_url_template
            .replace("{job_id}", job_id)
            .replace("{page}", &page.to_string())
    }
}

fn default_page_url_template() -> String {
    DEFAULT_PAGE_URL_TEMPLATE.to_string()
}

/// Waits and retry budget for interactive extraction. All values in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimingConfig {
    /// Wait for a row's detail panel to render, and to collapse again.
    #[serde(default = "default_field_wait")]
    pub field_wait_secs: u64,
    /// Wait for the results table to render.
    #[serde(default = "default_page_wait")]
    pub page_wait_secs: u64,
    /// Wait for the pagination control once the table is up. Single-page
    /// jobs render none, so this bounds their discovery.
    #[serde(default = "default_pagination_wait")]
    pub pagination_wait_secs: u64,
    /// Pause after a reload before restarting a page.
    #[serde(default = "default_restart_pause")]
    pub restart_pause_secs: u64,
    /// Page restarts allowed before giving up.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            field_wait_secs: default_field_wait(),
            page_wait_secs: default_page_wait(),
            pagination_wait_secs: default_pagination_wait(),
            restart_pause_secs: default_restart_pause(),
            retry_count: default_retry_count(),
        }
    }
}

fn default_field_wait() -> u64 {
    5
}

fn default_page_wait() -> u64 {
    10
}

fn default_pagination_wait() -> u64 {
    2
}

fn default_restart_pause() -> u64 {
    5
}

fn default_retry_count() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_url_fills_placeholders() {
        let site = SiteConfig::default();
        let url = site.page_url("abc123", 2);

        assert!(url.starts_with("https://labs.competitor.com/result/subevent/abc123?"));
        assert!(url.ends_with("&page=2"));
        assert!(url.contains("perPage=50"));
    }

    #[test]
    fn partial_timing_keeps_defaults() {
        let timing: TimingConfig = toml::from_str("retry_count = 1").unwrap();

        assert_eq!(timing.retry_count, 1);
        assert_eq!(timing.field_wait_secs, 5);
        assert_eq!(timing.page_wait_secs, 10);
        assert_eq!(timing.pagination_wait_secs, 2);
    }
}
