//! The in-memory daily paper and the shared cache that keeps it current.
//!
//! A paper is refreshed at most once per calendar day. Refreshing walks the
//! publisher's numbered files starting at page 1 until a preview is missing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::body::Bytes;
use chrono::{Datelike, Local, NaiveDate, Weekday};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::{Config, UpstreamConfig};
use crate::fetcher::{FetchError, Fetcher};

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("refresh did not finish within {0:?}")]
    TimedOut(Duration),
}

/// The local calendar date of the running process.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// The edition date used to build upstream URLs. There is no Sunday edition,
/// so Sunday reads Saturday's paper.
pub fn effective_date(today: NaiveDate) -> NaiveDate {
    if today.weekday() == Weekday::Sun {
        today.pred_opt().unwrap_or(today)
    } else {
        today
    }
}

/// One day's worth of pages. `pages[i]` and `previews[i]` always describe the
/// same page.
#[derive(Debug, Default, Clone)]
pub struct DailyPaper {
    page_count: usize,
    refreshed_on: Option<NaiveDate>,
    pages: Vec<Bytes>,
    previews: Vec<Bytes>,
}

impl DailyPaper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn refreshed_on(&self) -> Option<NaiveDate> {
        self.refreshed_on
    }

    pub fn page(&self, index: usize) -> Option<&Bytes> {
        self.pages.get(index)
    }

    pub fn preview(&self, index: usize) -> Option<&Bytes> {
        self.previews.get(index)
    }

    /// True when nothing is cached or the cache was filled on another day.
    pub fn needs_refresh(&self, today: NaiveDate) -> bool {
        self.pages.is_empty() || self.refreshed_on != Some(today)
    }

    pub fn clear(&mut self) {
        self.pages.clear();
        self.previews.clear();
        self.page_count = 0;
    }

    pub fn add_page(&mut self, page: Bytes) {
        self.pages.push(page);
    }

    pub fn add_preview(&mut self, preview: Bytes) {
        self.previews.push(preview);
    }

    /// Clear the paper and rediscover `today`'s edition.
    ///
    /// Probes preview 1, 2, 3, ... until one is missing or `max_pages` is
    /// reached. On error the paper is left partially filled; callers that
    /// need the previous contents should refresh a fresh instance and swap.
    pub async fn refresh(
        &mut self,
        fetcher: &Fetcher,
        upstream: &UpstreamConfig,
        today: NaiveDate,
        max_pages: usize,
    ) -> Result<usize, FetchError> {
        self.clear();
        self.refreshed_on = Some(today);

        let date = effective_date(today);
        info!("Discovering pages for edition {}", date);

        for page in 1..=max_pages {
            let preview_url = upstream.preview_url(date, page);
            if !fetcher.probe_exists(&preview_url).await? {
                break;
            }

            let preview = fetcher.fetch_bytes(&preview_url).await?;
            self.add_preview(preview);

            let pdf = fetcher.fetch_bytes(&upstream.pdf_url(date, page)).await?;
            self.add_page(pdf);

            debug!("Found page {}", page);
            if page == max_pages {
                warn!("Stopped discovery at the {} page cap", max_pages);
            }
        }

        self.page_count = self.pages.len();
        info!("Edition {} has {} pages", date, self.page_count);
        Ok(self.page_count)
    }
}

/// What the index view needs to know about the cached paper.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperSummary {
    pub page_count: usize,
    pub refreshed_on: Option<NaiveDate>,
}

/// Shared owner of the current [`DailyPaper`].
///
/// Refreshes are single-flight: while one request rediscovers the edition,
/// other stale requests wait for it and then reuse its result. The new paper
/// is swapped in only after discovery succeeds, so readers never observe a
/// half-filled paper and a failed refresh keeps the previous one.
pub struct PaperCache {
    paper: RwLock<DailyPaper>,
    refresh_guard: Mutex<()>,
    generation: AtomicU64,
    fetcher: Fetcher,
    upstream: UpstreamConfig,
    max_pages: usize,
    refresh_timeout: Duration,
}

impl PaperCache {
    pub fn new(
        fetcher: Fetcher,
        upstream: UpstreamConfig,
        max_pages: usize,
        refresh_timeout: Duration,
    ) -> Self {
        Self {
            paper: RwLock::new(DailyPaper::new()),
            refresh_guard: Mutex::new(()),
            generation: AtomicU64::new(0),
            fetcher,
            upstream,
            max_pages,
            refresh_timeout,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let fetcher = Fetcher::new(config.fetch_timeout())?;
        Ok(Self::new(
            fetcher,
            config.upstream.clone(),
            config.max_pages,
            config.refresh_timeout(),
        ))
    }

    pub async fn needs_refresh(&self) -> bool {
        self.paper.read().await.needs_refresh(today())
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh_guard.try_lock().is_err()
    }

    pub async fn ensure_fresh(&self) -> Result<PaperSummary, RefreshError> {
        self.ensure_fresh_on(today()).await
    }

    /// Refresh the paper if it is stale for `today`, then summarize it.
    pub async fn ensure_fresh_on(&self, today: NaiveDate) -> Result<PaperSummary, RefreshError> {
        let seen = self.generation.load(Ordering::SeqCst);
        if !self.paper.read().await.needs_refresh(today) {
            return Ok(self.summary().await);
        }

        let _guard = self.refresh_guard.lock().await;
        if self.generation.load(Ordering::SeqCst) != seen {
            debug!("Reusing refresh completed while waiting");
            return Ok(self.summary().await);
        }

        if self.paper.read().await.needs_refresh(today) {
            self.refresh_staged(today).await?;
        }
        Ok(self.summary().await)
    }

    async fn refresh_staged(&self, today: NaiveDate) -> Result<usize, RefreshError> {
        let mut staged = DailyPaper::new();
        let discovery = staged.refresh(&self.fetcher, &self.upstream, today, self.max_pages);

        let count = match tokio::time::timeout(self.refresh_timeout, discovery).await {
            Ok(Ok(count)) => count,
            Ok(Err(e)) => {
                error!("Paper refresh failed: {}", e);
                return Err(e.into());
            }
            Err(_) => {
                error!("Paper refresh timed out after {:?}", self.refresh_timeout);
                return Err(RefreshError::TimedOut(self.refresh_timeout));
            }
        };

        *self.paper.write().await = staged;
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(count)
    }

    pub async fn summary(&self) -> PaperSummary {
        let paper = self.paper.read().await;
        PaperSummary {
            page_count: paper.page_count(),
            refreshed_on: paper.refreshed_on(),
        }
    }

    pub async fn page_count(&self) -> usize {
        self.paper.read().await.page_count()
    }

    pub async fn pdf(&self, index: usize) -> Option<Bytes> {
        self.paper.read().await.page(index).cloned()
    }

    pub async fn preview(&self, index: usize) -> Option<Bytes> {
        self.paper.read().await.preview(index).cloned()
    }
}
