//! Chromium-backed session provider.
//!
//! One browser process (launched locally or reached over DevTools) serves
//! every worker; each opened session is its own tab.

#[cfg(feature = "browser")]
mod session;
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
mod script;

#[cfg(feature = "browser")]
pub use session::ChromiumSession;

use std::path::PathBuf;

use async_trait::async_trait;
#[cfg(feature = "browser")]
use tokio::sync::Mutex;
use tracing::info;
#[cfg(feature = "browser")]
use tracing::{debug, warn};

#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;

use super::http_client::{resolve_user_agent, IMPERSONATE_USER_AGENTS};
use super::session::{PageSession, SessionError, SessionProvider};
use crate::config::BrowserEngineConfig;

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/google/chrome/google-chrome",
];

const CHROME_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// Find a Chrome executable in well-known locations or on `PATH`.
pub fn find_chrome() -> Result<PathBuf, SessionError> {
    for path in CHROME_PATHS {
        let p = std::path::Path::new(path);
        if p.exists() {
            info!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }

    for cmd in CHROME_COMMANDS {
        if let Ok(path) = which::which(cmd) {
            info!("Found Chrome in PATH: {}", path.display());
            return Ok(path);
        }
    }

    Err(SessionError::Browser(
        "Chrome/Chromium not found. Install it, or set BROWSER_URL to a running \
         DevTools endpoint"
            .to_string(),
    ))
}

/// DevTools `/json/version` URL for a ws:// or http:// endpoint.
pub fn version_url(remote_url: &str) -> String {
    let http_url = remote_url
        .replace("ws://", "http://")
        .replace("wss://", "https://");
    format!("{}/json/version", http_url.trim_end_matches('/'))
}

/// Opens browser tabs as [`PageSession`]s.
pub struct ChromiumProvider {
    config: BrowserEngineConfig,
    user_agent: String,
    #[cfg(feature = "browser")]
    browser: Mutex<Option<Browser>>,
}

impl ChromiumProvider {
    pub fn new(config: BrowserEngineConfig) -> Self {
        let user_agent = resolve_user_agent(config.user_agent.as_deref(), IMPERSONATE_USER_AGENTS[0]);
        Self {
            config,
            user_agent,
            #[cfg(feature = "browser")]
            browser: Mutex::new(None),
        }
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

#[cfg(feature = "browser")]
impl ChromiumProvider {
    async fn launch(&self) -> Result<Browser, SessionError> {
        info!("Launching browser (headless={})", self.config.headless);

        let chrome_path = find_chrome()?;
        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);

        // with_head means NOT headless
        if !self.config.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = self.config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu");

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| SessionError::Browser(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SessionError::Browser(format!("Failed to launch browser: {}", e)))?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(browser)
    }

    async fn connect_remote(&self, url: &str) -> Result<Browser, SessionError> {
        info!("Connecting to remote browser at {}", url);

        let remote_error = |e: String| SessionError::Browser(format!("Remote browser {}: {}", url, e));
        let resp: serde_json::Value = reqwest::Client::new()
            .get(version_url(url))
            .send()
            .await
            .map_err(|e| remote_error(e.to_string()))?
            .json()
            .await
            .map_err(|e| remote_error(e.to_string()))?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| remote_error("no webSocketDebuggerUrl in response".to_string()))?;

        debug!("Connecting to WebSocket: {}", ws_url);
        let (browser, mut handler) = Browser::connect(ws_url)
            .await
            .map_err(|e| remote_error(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(browser)
    }

    async fn start(&self) -> Result<Browser, SessionError> {
        match self.config.remote_url.clone() {
            Some(remote) => self.connect_remote(&remote).await,
            None => self.launch().await,
        }
    }

    /// Open a blank tab on the shared browser, starting it on first use.
    ///
    /// A browser that no longer answers is dropped and started again once.
    async fn new_tab(&self) -> Result<Page, SessionError> {
        let mut guard = self.browser.lock().await;
        for attempt in 0..2 {
            if guard.is_none() {
                *guard = Some(self.start().await?);
            }
            let Some(browser) = guard.as_ref() else {
                break;
            };
            match browser.new_page("about:blank").await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    if attempt == 0 && browser.version().await.is_err() {
                        warn!("Browser connection lost ({}), starting a new one", e);
                        *guard = None;
                        continue;
                    }
                    return Err(session::cdp_error(e));
                }
            }
        }
        Err(SessionError::Browser("browser unavailable".to_string()))
    }

    /// Close the browser if this provider launched or connected one.
    pub async fn shutdown(&self) {
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
        }
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl SessionProvider for ChromiumProvider {
    async fn open(&self, url: &str) -> Result<Box<dyn PageSession>, SessionError> {
        let page = self.new_tab().await?;
        let session = ChromiumSession::new(
            page,
            url,
            std::time::Duration::from_secs(self.config.timeout),
        );

        // The tab is ours until the session is handed out.
        let prepared = match session.set_user_agent(&self.user_agent).await {
            Ok(()) => session.navigate().await,
            Err(e) => Err(e),
        };
        if let Err(e) = prepared {
            session.discard().await;
            return Err(e);
        }
        Ok(Box::new(session))
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl SessionProvider for ChromiumProvider {
    async fn open(&self, url: &str) -> Result<Box<dyn PageSession>, SessionError> {
        info!("Cannot open {}: no browser support", url);
        Err(SessionError::Browser(
            "labharvest was built without the `browser` feature".to_string(),
        ))
    }
}
