//! Result sources for the race results provider.
//!
//! A [`ResultSource`] turns a job id into a page count, page tasks and page
//! results. Two implementations exist: [`InteractiveSource`] drives the
//! rendered results view through a [`SessionProvider`], and [`ApiSource`]
//! reads the paged JSON API.

pub mod api;
pub mod browser;
mod error;
pub mod extract;
pub mod http_client;
pub mod pagination;
pub mod retry;
#[cfg(test)]
pub(crate) mod scripted;
pub mod session;

pub use api::ApiSource;
pub use browser::ChromiumProvider;
pub use error::{DiscoveryError, PageError};
pub use extract::ExtractError;
pub use http_client::HttpClient;
pub use retry::RetryPolicy;
pub use session::{ElementRef, PageSession, SessionError, SessionProvider};

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::SiteConfig;
use crate::models::{Job, PageResult, PageTask};

/// Everything the harvester needs from a provider.
#[async_trait]
pub trait ResultSource: Send + Sync {
    /// Resolve a job id to its page count.
    async fn discover(&self, job_id: &str) -> Result<Job, DiscoveryError>;

    /// One task per page, in page order.
    fn tasks(&self, job: &Job) -> Vec<PageTask>;

    /// Produce the records of one page.
    async fn extract(&self, task: &PageTask) -> Result<PageResult, PageError>;
}

/// Results read by interacting with the rendered results view.
pub struct InteractiveSource {
    provider: Arc<dyn SessionProvider>,
    site: SiteConfig,
    policy: RetryPolicy,
}

impl InteractiveSource {
    pub fn new(provider: Arc<dyn SessionProvider>, site: SiteConfig, policy: RetryPolicy) -> Self {
        Self {
            provider,
            site,
            policy,
        }
    }
}

#[async_trait]
impl ResultSource for InteractiveSource {
    async fn discover(&self, job_id: &str) -> Result<Job, DiscoveryError> {
        let url = self.site.page_url(job_id, 1);
        let pages = pagination::discover_page_count(
            self.provider.as_ref(),
            job_id,
            &url,
            &self.policy,
        )
        .await?;
        Ok(Job::new(job_id, pages))
    }

    fn tasks(&self, job: &Job) -> Vec<PageTask> {
        job.tasks(|job_id, page| self.site.page_url(job_id, page))
    }

    async fn extract(&self, task: &PageTask) -> Result<PageResult, PageError> {
        retry::run_page_task(self.provider.as_ref(), task, &self.policy).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scripted::{ScriptedPage, ScriptedSite};

    fn site_config() -> SiteConfig {
        SiteConfig {
            page_url_template: "https://results.test/{job_id}?page={page}".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn interactive_source_discovers_and_extracts() {
        let site = ScriptedSite::new()
            .with_page(
                "https://results.test/abc123?page=1",
                ScriptedPage::with_rows(&["Ann", "Bob"], &[])
                    .with_pagination(&["1", "2", "next"]),
            )
            .with_page(
                "https://results.test/abc123?page=2",
                ScriptedPage::with_rows(&["Cy"], &[0]),
            );
        let source = InteractiveSource::new(
            Arc::new(site.clone()),
            site_config(),
            RetryPolicy::default(),
        );

        let job = source.discover("abc123").await.unwrap();
        assert_eq!(job.page_count, 2);

        let tasks = source.tasks(&job);
        assert_eq!(tasks[1].url, "https://results.test/abc123?page=2");

        let second = source.extract(&tasks[1]).await.unwrap();
        assert_eq!(second.records[0].name, "Cy");
        assert!(second.records[0].ranks_are_empty());

        let stats = site.stats();
        assert_eq!(stats.opens, stats.closes);
    }
}
