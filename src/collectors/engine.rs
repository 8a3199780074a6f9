//! Incremental collection over a listing view.
//!
//! Two drive modes share one [`CollectionRun`] and one stop policy:
//!
//! - **Scroll**: a single URL whose grid grows as the last card is scrolled
//!   into view. Each cycle scans the current cards, scrolls, then polls the
//!   card count for growth.
//! - **Paginate**: `page=1..max_pages` appended to the base URL. A page with
//!   no cards ends the listing.
//!
//! Stop conditions, evaluated after every scan in this order: cancellation,
//! a posting dated before the target date, stagnation, the page cap. Any
//! other failure ends the run early; whatever was collected is still returned.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::watch;
use tracing::Instrument;
use uuid::Uuid;

use crate::browser::PageDriver;
use crate::collectors::{CardExtractor, CardSnapshot, Navigator};
use crate::error::ScrapeError;
use crate::models::listing::ListingSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DriveMode {
    /// Single page, infinite scroll
    Scroll,
    /// Numbered pages through a `page` query parameter
    Paginate,
}

#[derive(Debug, Clone)]
pub struct CollectConfig {
    pub base_url: String,
    pub mode: DriveMode,
    /// Earliest posting date to keep. `None` collects until another stop fires.
    pub target_date: Option<NaiveDate>,
    pub max_pages: u32,
    pub max_stagnant_attempts: u32,
    pub growth_poll_ticks: u32,
    pub growth_poll_interval: Duration,
    /// Pause after scrolling before growth polling starts.
    pub settle_delay: Duration,
}

impl CollectConfig {
    pub fn new(base_url: impl Into<String>, mode: DriveMode) -> Self {
        Self {
            base_url: base_url.into(),
            mode,
            target_date: None,
            max_pages: 500,
            max_stagnant_attempts: 10,
            growth_poll_ticks: 10,
            growth_poll_interval: Duration::from_secs(1),
            settle_delay: Duration::from_secs(2),
        }
    }
}

/// Why a run ended. Only `Failed` reflects an unexpected error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    TargetDateReached,
    Stagnation,
    PageCap,
    EndOfResults,
    NoResults,
    Cancelled,
    Failed(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::TargetDateReached => write!(f, "target date reached"),
            StopReason::Stagnation => write!(f, "no new cards after repeated attempts"),
            StopReason::PageCap => write!(f, "page cap reached"),
            StopReason::EndOfResults => write!(f, "end of results"),
            StopReason::NoResults => write!(f, "no results found"),
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

#[derive(Debug)]
pub struct CollectionOutcome {
    /// Summaries in discovery order, unique by URL.
    pub summaries: Vec<ListingSummary>,
    pub stop: StopReason,
    pub pages_visited: u32,
}

impl CollectionOutcome {
    pub fn reached_target_date(&self) -> bool {
        self.stop == StopReason::TargetDateReached
    }
}

/// Mutable state of one collection call. Discarded when the call returns.
struct CollectionRun {
    target_date: Option<NaiveDate>,
    max_stagnant_attempts: u32,
    page_cursor: u32,
    visited: HashSet<String>,
    stagnation: u32,
    results: Vec<ListingSummary>,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Scan {
    added: usize,
    reached_target: bool,
}

impl CollectionRun {
    fn new(config: &CollectConfig) -> Self {
        Self {
            target_date: config.target_date,
            max_stagnant_attempts: config.max_stagnant_attempts,
            page_cursor: 0,
            visited: HashSet::new(),
            stagnation: 0,
            results: Vec::new(),
        }
    }

    /// Append every not-yet-visited card until one predates the target date.
    fn absorb(&mut self, cards: &[CardSnapshot], extractor: &CardExtractor) -> Scan {
        let mut scan = Scan::default();

        for card in cards {
            let Some(summary) = extractor.extract(card) else {
                continue;
            };
            if self.visited.contains(&summary.url) {
                continue;
            }
            if let Some(target) = self.target_date
                && summary.is_older_than(target)
            {
                tracing::info!("Reached target date {target} at {}", summary.url);
                scan.reached_target = true;
                break;
            }

            tracing::debug!("Collected listing {}: {}", self.results.len() + 1, summary.url);
            self.visited.insert(summary.url.clone());
            self.results.push(summary);
            scan.added += 1;
        }

        scan
    }

    /// Record the end of a cycle. Returns true once stagnation hits the cap.
    fn record_cycle(&mut self, progressed: bool) -> bool {
        if progressed {
            self.stagnation = 0;
            return false;
        }
        self.stagnation += 1;
        tracing::warn!(
            "No new cards, attempt {}/{}",
            self.stagnation,
            self.max_stagnant_attempts
        );
        self.stagnation >= self.max_stagnant_attempts
    }
}

/// Append the page parameter using `&` when the URL already has a query.
pub fn page_url(base_url: &str, page: u32) -> String {
    let sep = if base_url.contains('?') { '&' } else { '?' };
    format!("{base_url}{sep}page={page}")
}

pub struct IncrementalCollector<'a, P> {
    navigator: &'a Navigator<P>,
    extractor: &'a CardExtractor,
    config: CollectConfig,
    cancel: Option<watch::Receiver<bool>>,
}

impl<'a, P: PageDriver> IncrementalCollector<'a, P> {
    pub fn new(navigator: &'a Navigator<P>, extractor: &'a CardExtractor, config: CollectConfig) -> Self {
        Self {
            navigator,
            extractor,
            config,
            cancel: None,
        }
    }

    /// Stop at the next cycle boundary once the channel carries `true`.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Run to completion. Never fails: errors end the run with
    /// [`StopReason::Failed`] and the summaries gathered so far.
    pub async fn collect(&self) -> CollectionOutcome {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("collect", %run_id, mode = ?self.config.mode);
        self.collect_inner().instrument(span).await
    }

    async fn collect_inner(&self) -> CollectionOutcome {
        match self.config.target_date {
            Some(target) => tracing::info!(
                "Collecting from {} until {}",
                self.config.base_url,
                target.format("%d/%m/%Y")
            ),
            None => tracing::info!("Collecting from {}", self.config.base_url),
        }

        let mut run = CollectionRun::new(&self.config);
        let result = match self.config.mode {
            DriveMode::Scroll => self.drive_scroll(&mut run).await,
            DriveMode::Paginate => self.drive_pages(&mut run).await,
        };

        let stop = result.unwrap_or_else(|e| {
            tracing::error!("Collection aborted: {e}");
            StopReason::Failed(e.to_string())
        });

        let total = run.results.len();
        match &stop {
            StopReason::TargetDateReached | StopReason::EndOfResults | StopReason::PageCap => {
                tracing::info!("Collection finished ({stop}): {total} listings")
            }
            StopReason::Failed(_) => {
                tracing::error!("Collection ended early: {total} listings kept")
            }
            _ => tracing::warn!("Collection stopped ({stop}): {total} listings"),
        }

        CollectionOutcome {
            summaries: run.results,
            stop,
            pages_visited: run.page_cursor,
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    async fn drive_scroll(&self, run: &mut CollectionRun) -> Result<StopReason, ScrapeError> {
        run.page_cursor = 1;
        if !self.navigator.goto(&self.config.base_url).await? {
            tracing::warn!("Initial load timed out, scanning whatever rendered");
        }

        match self.navigator.wait_for_cards().await {
            Ok(()) => {}
            Err(ScrapeError::NoResultsFound { selector }) => {
                tracing::warn!("No cards matched '{selector}'");
                return Ok(StopReason::NoResults);
            }
            Err(e) => return Err(e),
        }

        loop {
            if self.cancelled() {
                return Ok(StopReason::Cancelled);
            }

            let cards = self.navigator.list_cards().await?;
            tracing::info!("Found {} cards on page", cards.len());

            let scan = run.absorb(&cards, self.extractor);
            if scan.reached_target {
                return Ok(StopReason::TargetDateReached);
            }

            let before = self.navigator.card_count().await?;
            self.navigator.scroll_to_last_card().await?;
            tokio::time::sleep(self.config.settle_delay).await;

            let grew = self.poll_growth(before).await?;
            if run.record_cycle(grew) {
                return Ok(StopReason::Stagnation);
            }
        }
    }

    /// Poll the card count until it exceeds `before` or the ticks run out.
    async fn poll_growth(&self, before: usize) -> Result<bool, ScrapeError> {
        for tick in 1..=self.config.growth_poll_ticks {
            tokio::time::sleep(self.config.growth_poll_interval).await;
            let after = self.navigator.card_count().await?;
            tracing::debug!("Cards after tick {tick}: {after} (was {before})");
            if after > before {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn drive_pages(&self, run: &mut CollectionRun) -> Result<StopReason, ScrapeError> {
        for page in 1..=self.config.max_pages {
            if self.cancelled() {
                return Ok(StopReason::Cancelled);
            }

            run.page_cursor = page;
            let url = page_url(&self.config.base_url, page);
            if !self.navigator.goto(&url).await? {
                if run.record_cycle(false) {
                    return Ok(StopReason::Stagnation);
                }
                continue;
            }

            let cards = match self.navigator.wait_for_cards().await {
                Ok(()) => self.navigator.list_cards().await?,
                Err(ScrapeError::NoResultsFound { .. }) => Vec::new(),
                Err(e) => return Err(e),
            };
            if cards.is_empty() {
                tracing::info!("Page {page} has no cards");
                if run.results.is_empty() {
                    return Ok(StopReason::NoResults);
                }
                return Ok(StopReason::EndOfResults);
            }

            let scan = run.absorb(&cards, self.extractor);
            tracing::info!(
                "Page {page}: {} cards, {} new, {} total",
                cards.len(),
                scan.added,
                run.results.len()
            );
            if scan.reached_target {
                return Ok(StopReason::TargetDateReached);
            }
            if run.record_cycle(scan.added > 0) {
                return Ok(StopReason::Stagnation);
            }
        }

        tracing::warn!("Stopped at the page cap of {}", self.config.max_pages);
        Ok(StopReason::PageCap)
    }
}
