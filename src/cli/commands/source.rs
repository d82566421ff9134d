//! Building the result source selected by the mode.

use std::sync::Arc;

use crate::config::{Config, SourceMode};
use crate::scrapers::{
    ApiSource, ChromiumProvider, HttpClient, InteractiveSource, ResultSource, RetryPolicy,
};

/// A result source plus the browser behind it, if any.
pub struct SourceHandle {
    pub source: Arc<dyn ResultSource>,
    browser: Option<Arc<ChromiumProvider>>,
}

impl SourceHandle {
    pub fn build(config: &Config, mode: SourceMode) -> anyhow::Result<Self> {
        match mode {
            SourceMode::Browser => {
                let provider = Arc::new(ChromiumProvider::new(config.browser.clone()));
                let source = InteractiveSource::new(
                    provider.clone(),
                    config.site.clone(),
                    RetryPolicy::from(&config.timing),
                );
                Ok(Self {
                    source: Arc::new(source),
                    browser: Some(provider),
                })
            }
            SourceMode::Api => {
                if config.api.url_template.is_none() {
                    anyhow::bail!(
                        "api mode needs api.url_template in the config file \
                         (e.g. https://host/subevents/{{job_id}}/participants)"
                    );
                }
                let client = HttpClient::new(config.api.clone())?;
                Ok(Self {
                    source: Arc::new(ApiSource::new(client)),
                    browser: None,
                })
            }
        }
    }

    /// Close the browser, if one was started.
    pub async fn shutdown(self) {
        #[cfg(feature = "browser")]
        if let Some(browser) = self.browser {
            browser.shutdown().await;
        }
        #[cfg(not(feature = "browser"))]
        drop(self.browser);
    }
}
