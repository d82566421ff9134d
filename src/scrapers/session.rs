//! Document/session provider interface.
//!
//! The extraction core drives pages exclusively through these traits, so the
//! row state machine and retry controller run the same against a real browser
//! and against in-memory scripted sessions.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Failures raised by a session provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Stale element: {0}")]
    StaleElement(String),
    #[error("Element not found: {0}")]
    NoSuchElement(String),
    #[error("Click intercepted: {0}")]
    ClickIntercepted(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Navigation failed: {0}")]
    Navigation(String),
    #[error("Browser error: {0}")]
    Browser(String),
}

impl SessionError {
    /// DOM inconsistencies that a page reload is expected to clear.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StaleElement(_) | Self::NoSuchElement(_) | Self::ClickIntercepted(_)
        )
    }
}

/// Address of one element: the `index`-th match of a CSS selector.
///
/// Elements are re-resolved on every use, so a handle whose target vanished
/// surfaces as [`SessionError::StaleElement`] instead of acting on the wrong node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    pub selector: String,
    pub index: usize,
}

impl ElementRef {
    pub fn nth(selector: &str, index: usize) -> Self {
        Self {
            selector: selector.to_string(),
            index,
        }
    }

    pub fn first(selector: &str) -> Self {
        Self::nth(selector, 0)
    }
}

impl std::fmt::Display for ElementRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.selector, self.index)
    }
}

/// Opens interactive sessions.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Open a fresh session navigated to `url`.
    async fn open(&self, url: &str) -> Result<Box<dyn PageSession>, SessionError>;
}

/// One interactive document. Owned by exactly one worker.
#[async_trait]
pub trait PageSession: Send {
    /// Reload the current document, discarding interaction state.
    async fn reload(&mut self) -> Result<(), SessionError>;

    /// Wait until `selector` matches at least one element. `Ok(false)` on timeout.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, SessionError>;

    /// Wait until `selector` matches nothing. `Ok(false)` on timeout.
    async fn wait_for_absence(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, SessionError>;

    /// Number of elements currently matching `selector`.
    async fn count(&mut self, selector: &str) -> Result<usize, SessionError>;

    async fn click(&mut self, element: &ElementRef) -> Result<(), SessionError>;

    /// Text of the first match, `None` if nothing matches.
    async fn read_text(&mut self, selector: &str) -> Result<Option<String>, SessionError>;

    /// Text of every match, in document order.
    async fn read_texts(&mut self, selector: &str) -> Result<Vec<String>, SessionError>;

    /// Outer HTML of an element.
    async fn read_html(&mut self, element: &ElementRef) -> Result<String, SessionError>;

    /// Release the session. Must be called on every path.
    async fn close(self: Box<Self>) -> Result<(), SessionError>;
}
