//! In-memory results site for exercising the extraction pipeline.
//!
//! Pages are described declaratively (rows, pagination labels, faults) and
//! sessions simulate the expand/collapse behaviour of the real provider.
//! Waits that cannot succeed sleep for their full timeout, so tests run with
//! paused tokio time.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::extract::fixtures::{panel_html, row_html, RowSpec};
use super::extract::layout::{
    COUNTRY_FLAG_SELECTOR, DISCIPLINES, EXPANDED_PANEL_SELECTOR, PAGINATION_BUTTON_SELECTOR,
    ROW_SELECTOR, TABLE_READY_SELECTOR,
};
use super::session::{ElementRef, PageSession, SessionError, SessionProvider};

/// Injected misbehaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Clicking `row` raises a stale-element error during the first `loads` page loads.
    Stale { row: usize, loads: usize },
    /// The panel of `row` never collapses.
    StuckPanel { row: usize },
    /// The footer container renders with too few cells.
    BrokenFooter,
    /// Any click reports a crashed target.
    Crash,
}

#[derive(Debug, Clone)]
struct ScriptedRow {
    name: String,
    designation: String,
    country: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScriptedPage {
    rows: Vec<ScriptedRow>,
    pagination: Vec<String>,
    table_renders: bool,
    slow_rows: HashSet<usize>,
    faults: Vec<Fault>,
}

impl ScriptedPage {
    /// Rows named `names`; indices in `dnf` get a DNF designation.
    pub fn with_rows(names: &[&str], dnf: &[usize]) -> Self {
        let rows = names
            .iter()
            .enumerate()
            .map(|(i, name)| ScriptedRow {
                name: name.to_string(),
                designation: if dnf.contains(&i) { "DNF" } else { "Finisher" }.to_string(),
                country: Some("USA".to_string()),
            })
            .collect();
        Self {
            rows,
            pagination: Vec::new(),
            table_renders: true,
            slow_rows: HashSet::new(),
            faults: Vec::new(),
        }
    }

    /// A page whose table never renders.
    pub fn blank() -> Self {
        Self {
            table_renders: false,
            ..Self::with_rows(&[], &[])
        }
    }

    pub fn with_pagination(mut self, labels: &[&str]) -> Self {
        self.pagination = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    /// The detail panel of `row` never renders.
    pub fn slow_details(mut self, row: usize) -> Self {
        self.slow_rows.insert(row);
        self
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.faults.push(fault);
        self
    }

    fn spec(&self, index: usize) -> Option<RowSpec<'_>> {
        self.rows.get(index).map(|row| RowSpec {
            name: &row.name,
            designation: &row.designation,
            country: row.country.as_deref(),
            rank_seed: index as u32 + 1,
        })
    }

    fn has_fault(&self, fault: &Fault) -> bool {
        self.faults.contains(fault)
    }

    fn stale_on(&self, row: usize, load: usize) -> bool {
        self.faults
            .iter()
            .any(|f| matches!(f, Fault::Stale { row: r, loads } if *r == row && load < *loads))
    }
}

/// Counters shared by every session of a site.
#[derive(Debug, Clone, Default)]
pub struct SiteStats {
    pub opens: usize,
    pub closes: usize,
    pub reloads: usize,
    pub clicks: usize,
    pub loads: HashMap<String, usize>,
}

#[derive(Clone, Default)]
pub struct ScriptedSite {
    pages: Arc<HashMap<String, ScriptedPage>>,
    failing_opens: Arc<HashSet<String>>,
    stats: Arc<Mutex<SiteStats>>,
}

impl ScriptedSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, page: ScriptedPage) -> Self {
        let mut pages = (*self.pages).clone();
        pages.insert(url.to_string(), page);
        self.pages = Arc::new(pages);
        self
    }

    pub fn failing_open(mut self, url: &str) -> Self {
        let mut failing = (*self.failing_opens).clone();
        failing.insert(url.to_string());
        self.failing_opens = Arc::new(failing);
        self
    }

    pub fn stats(&self) -> SiteStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn record<F: FnOnce(&mut SiteStats)>(&self, f: F) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }

    /// Register a new load of `url` and return its 0-based load number.
    fn load(&self, url: &str) -> usize {
        let mut load = 0;
        self.record(|stats| {
            let count = stats.loads.entry(url.to_string()).or_default();
            load = *count;
            *count += 1;
        });
        load
    }
}

#[async_trait]
impl SessionProvider for ScriptedSite {
    async fn open(&self, url: &str) -> Result<Box<dyn PageSession>, SessionError> {
        if self.failing_opens.contains(url) {
            return Err(SessionError::Navigation(format!("{} unreachable", url)));
        }
        if !self.pages.contains_key(url) {
            return Err(SessionError::Navigation(format!("no page at {}", url)));
        }
        Ok(Box::new(ScriptedSession::new(self.clone(), url)))
    }
}

pub struct ScriptedSession {
    site: ScriptedSite,
    url: String,
    page: ScriptedPage,
    load: usize,
    expanded: Option<usize>,
}

impl ScriptedSession {
    pub fn new(site: ScriptedSite, url: &str) -> Self {
        let page = site
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(ScriptedPage::blank);
        site.record(|stats| stats.opens += 1);
        let load = site.load(url);
        Self {
            site,
            url: url.to_string(),
            page,
            load,
            expanded: None,
        }
    }

    pub fn stats(&self) -> SiteStats {
        self.site.stats()
    }

    fn details_visible(&self) -> bool {
        self.expanded
            .map(|row| !self.page.slow_rows.contains(&row))
            .unwrap_or(false)
    }

    fn matches(&self, selector: &str) -> usize {
        let detail_selector = DISCIPLINES.iter().any(|d| d.ready_selector == selector);
        match selector {
            s if s == TABLE_READY_SELECTOR => usize::from(self.page.table_renders),
            s if s == ROW_SELECTOR => {
                if self.page.table_renders {
                    self.page.rows.len()
                } else {
                    0
                }
            }
            s if s == PAGINATION_BUTTON_SELECTOR => self.page.pagination.len(),
            s if s == EXPANDED_PANEL_SELECTOR || detail_selector => {
                usize::from(self.details_visible())
            }
            s if s == COUNTRY_FLAG_SELECTOR => {
                let has_flag = self
                    .expanded
                    .and_then(|row| self.page.rows.get(row))
                    .map(|row| row.country.is_some())
                    .unwrap_or(false);
                usize::from(self.details_visible() && has_flag)
            }
            _ => 0,
        }
    }
}

#[async_trait]
impl PageSession for ScriptedSession {
    async fn reload(&mut self) -> Result<(), SessionError> {
        self.site.record(|stats| stats.reloads += 1);
        self.load = self.site.load(&self.url);
        self.expanded = None;
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, SessionError> {
        if self.matches(selector) > 0 {
            return Ok(true);
        }
        tokio::time::sleep(timeout).await;
        Ok(false)
    }

    async fn wait_for_absence(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, SessionError> {
        if self.matches(selector) == 0 {
            return Ok(true);
        }
        tokio::time::sleep(timeout).await;
        Ok(false)
    }

    async fn count(&mut self, selector: &str) -> Result<usize, SessionError> {
        Ok(self.matches(selector))
    }

    async fn click(&mut self, element: &ElementRef) -> Result<(), SessionError> {
        self.site.record(|stats| stats.clicks += 1);
        if self.page.has_fault(&Fault::Crash) {
            return Err(SessionError::Browser("target crashed".to_string()));
        }
        if element.selector != ROW_SELECTOR || element.index >= self.matches(ROW_SELECTOR) {
            return Err(SessionError::NoSuchElement(element.to_string()));
        }
        if self.page.stale_on(element.index, self.load) {
            return Err(SessionError::StaleElement(element.to_string()));
        }

        let row = element.index;
        if self.expanded == Some(row) {
            if !self.page.has_fault(&Fault::StuckPanel { row }) {
                self.expanded = None;
            }
        } else {
            self.expanded = Some(row);
        }
        Ok(())
    }

    async fn read_text(&mut self, selector: &str) -> Result<Option<String>, SessionError> {
        Ok(self.read_texts(selector).await?.into_iter().next())
    }

    async fn read_texts(&mut self, selector: &str) -> Result<Vec<String>, SessionError> {
        if selector == PAGINATION_BUTTON_SELECTOR {
            return Ok(self.page.pagination.clone());
        }
        Ok(Vec::new())
    }

    async fn read_html(&mut self, element: &ElementRef) -> Result<String, SessionError> {
        if element.selector == ROW_SELECTOR {
            return self
                .page
                .spec(element.index)
                .map(|spec| row_html(&spec))
                .ok_or_else(|| SessionError::NoSuchElement(element.to_string()));
        }
        if element.selector == EXPANDED_PANEL_SELECTOR && self.details_visible() {
            if let Some(spec) = self.expanded.and_then(|row| self.page.spec(row)) {
                let html = panel_html(&spec);
                if self.page.has_fault(&Fault::BrokenFooter) {
                    return Ok(html.replace("<div>M30-34</div><div>x</div>", ""));
                }
                return Ok(html);
            }
        }
        Err(SessionError::NoSuchElement(element.to_string()))
    }

    async fn close(self: Box<Self>) -> Result<(), SessionError> {
        self.site.record(|stats| stats.closes += 1);
        Ok(())
    }
}
