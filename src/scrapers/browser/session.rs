//! A single Chromium tab driven through CDP.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::debug;

use super::script;
use crate::scrapers::session::{ElementRef, PageSession, SessionError};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Map a CDP failure onto the session taxonomy.
///
/// A destroyed execution context means the document re-rendered under us,
/// which a reload recovers from.
pub(crate) fn cdp_error(e: CdpError) -> SessionError {
    let message = e.to_string();
    if message.contains("context was destroyed") || message.contains("Cannot find context") {
        SessionError::StaleElement(message)
    } else if matches!(e, CdpError::Timeout) {
        SessionError::Timeout(message)
    } else {
        SessionError::Browser(message)
    }
}

pub struct ChromiumSession {
    page: Page,
    url: String,
    nav_timeout: Duration,
}

impl ChromiumSession {
    pub(crate) fn new(page: Page, url: &str, nav_timeout: Duration) -> Self {
        Self {
            page,
            url: url.to_string(),
            nav_timeout,
        }
    }

    pub(crate) async fn navigate(&self) -> Result<(), SessionError> {
        debug!("Navigating to {}", self.url);
        match tokio::time::timeout(self.nav_timeout, self.page.goto(self.url.as_str())).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(SessionError::Navigation(format!("{}: {}", self.url, e))),
            Err(_) => Err(SessionError::Timeout(format!(
                "navigation to {} after {:?}",
                self.url, self.nav_timeout
            ))),
        }
    }

    pub(crate) async fn set_user_agent(&self, user_agent: &str) -> Result<(), SessionError> {
        self.page
            .execute(SetUserAgentOverrideParams::new(user_agent.to_string()))
            .await
            .map_err(cdp_error)?;
        Ok(())
    }

    /// Close the tab without reporting errors.
    pub(crate) async fn discard(self) {
        let _ = self.page.close().await;
    }

    async fn eval<T: DeserializeOwned>(&self, js: String) -> Result<T, SessionError> {
        let result = self.page.evaluate(js).await.map_err(cdp_error)?;
        result
            .into_value()
            .map_err(|e| SessionError::Browser(format!("Unexpected script result: {:?}", e)))
    }

    async fn poll_count<F>(&self, selector: &str, timeout: Duration, done: F) -> Result<bool, SessionError>
    where
        F: Fn(usize) -> bool + Send,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let n: usize = self.eval(script::count(selector)).await?;
            if done(n) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl PageSession for ChromiumSession {
    async fn reload(&mut self) -> Result<(), SessionError> {
        match tokio::time::timeout(self.nav_timeout, self.page.reload()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(SessionError::Navigation(format!("reload {}: {}", self.url, e))),
            Err(_) => Err(SessionError::Timeout(format!("reload of {}", self.url))),
        }
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, SessionError> {
        self.poll_count(selector, timeout, |n| n > 0).await
    }

    async fn wait_for_absence(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, SessionError> {
        self.poll_count(selector, timeout, |n| n == 0).await
    }

    async fn count(&mut self, selector: &str) -> Result<usize, SessionError> {
        self.eval(script::count(selector)).await
    }

    async fn click(&mut self, element: &ElementRef) -> Result<(), SessionError> {
        let outcome: String = self
            .eval(script::click(&element.selector, element.index))
            .await?;
        match outcome.as_str() {
            script::CLICK_OK => Ok(()),
            script::CLICK_INTERCEPTED => Err(SessionError::ClickIntercepted(element.to_string())),
            _ => Err(SessionError::NoSuchElement(element.to_string())),
        }
    }

    async fn read_text(&mut self, selector: &str) -> Result<Option<String>, SessionError> {
        self.eval(script::text(selector)).await
    }

    async fn read_texts(&mut self, selector: &str) -> Result<Vec<String>, SessionError> {
        self.eval(script::texts(selector)).await
    }

    async fn read_html(&mut self, element: &ElementRef) -> Result<String, SessionError> {
        let html: Option<String> = self
            .eval(script::outer_html(&element.selector, element.index))
            .await?;
        html.ok_or_else(|| SessionError::NoSuchElement(element.to_string()))
    }

    async fn close(self: Box<Self>) -> Result<(), SessionError> {
        self.page.close().await.map_err(cdp_error)
    }
}
