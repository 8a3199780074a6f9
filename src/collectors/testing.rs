//! In-memory page fakes for exercising the navigator, the engine and the
//! detail fetcher without a browser.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use scraper::Html;

use crate::browser::PageDriver;
use crate::collectors::engine::{CollectConfig, DriveMode};
use crate::collectors::navigator::NavigatorSettings;
use crate::collectors::parse_selector;
use crate::error::ScrapeError;

pub fn card_html(href: &str, location: &str, date: &str) -> String {
    format!(
        r#"<div class="js_rowCard"><div class="js_vacancyLoad" data-href="{href}"><h2>Vaga</h2></div><div class="small text-medium">{location}</div><div class="js_date" data-value="{date}">há 2 dias</div></div>"#
    )
}

/// One card per day, newest first, from `newest` back `days` days.
pub fn dated_cards(prefix: &str, newest: NaiveDate, days: u32) -> Vec<String> {
    (0..days)
        .map(|offset| {
            let day = newest - chrono::Days::new(u64::from(offset));
            card_html(
                &format!("/{prefix}-{day}.aspx"),
                "São Paulo, 5 km de você",
                &format!("{} 09:00:00", day.format("%Y/%m/%d")),
            )
        })
        .collect()
}

pub fn fast_navigator_settings() -> NavigatorSettings {
    NavigatorSettings {
        wait_timeout: Duration::ZERO,
        poll_interval: Duration::ZERO,
    }
}

pub fn fast_collect_config(base_url: &str, mode: DriveMode) -> CollectConfig {
    CollectConfig {
        growth_poll_interval: Duration::ZERO,
        settle_delay: Duration::ZERO,
        ..CollectConfig::new(base_url, mode)
    }
}

fn query(document: &str, selector: &str) -> Result<Vec<String>, ScrapeError> {
    let selector = parse_selector(selector)?;
    let html = Html::parse_document(document);
    Ok(html.select(&selector).map(|el| el.html()).collect())
}

struct ScrollState {
    fragments: Vec<String>,
    visible: usize,
    reveal_per_scroll: usize,
    fail_on_scroll: Option<usize>,
    hidden_markup: usize,
    timeouts: HashSet<String>,
    navigations: Vec<String>,
    scrolls: usize,
}

/// A single page whose content grows as the last card is scrolled into view.
pub struct FakePage {
    state: Mutex<ScrollState>,
}

impl FakePage {
    /// Every fragment is visible from the start and scrolling adds nothing.
    pub fn new(fragments: Vec<String>) -> Self {
        let visible = fragments.len();
        Self {
            state: Mutex::new(ScrollState {
                fragments,
                visible,
                reveal_per_scroll: 0,
                fail_on_scroll: None,
                hidden_markup: 0,
                timeouts: HashSet::new(),
                navigations: Vec::new(),
                scrolls: 0,
            }),
        }
    }

    pub fn revealing(self, initial: usize, per_scroll: usize) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.visible = initial.min(state.fragments.len());
            state.reveal_per_scroll = per_scroll;
        }
        self
    }

    pub fn with_timeout_on(self, url: &str) -> Self {
        self.state.lock().unwrap().timeouts.insert(url.to_string());
        self
    }

    /// The n-th scroll (1-based) fails as if the tab had crashed.
    pub fn failing_on_scroll(self, n: usize) -> Self {
        self.state.lock().unwrap().fail_on_scroll = Some(n);
        self
    }

    /// The first `n` visible cards still count as matches but yield no
    /// outer HTML, like nodes detached between the query and the read.
    pub fn without_markup_for(self, n: usize) -> Self {
        self.state.lock().unwrap().hidden_markup = n;
        self
    }

    pub fn scrolls(&self) -> usize {
        self.state.lock().unwrap().scrolls
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    fn document(&self) -> String {
        let state = self.state.lock().unwrap();
        format!(
            "<html><body>{}</body></html>",
            state.fragments[..state.visible].concat()
        )
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&self, url: &str) -> Result<(), ScrapeError> {
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        if state.timeouts.contains(url) {
            return Err(ScrapeError::NavigationTimeout {
                url: url.to_string(),
            });
        }
        Ok(())
    }

    async fn outer_html_all(&self, selector: &str) -> Result<Vec<String>, ScrapeError> {
        let hidden = self.state.lock().unwrap().hidden_markup;
        Ok(query(&self.document(), selector)?
            .into_iter()
            .skip(hidden)
            .collect())
    }

    async fn count(&self, selector: &str) -> Result<usize, ScrapeError> {
        Ok(query(&self.document(), selector)?.len())
    }

    async fn scroll_last_into_view(&self, _selector: &str) -> Result<(), ScrapeError> {
        let mut state = self.state.lock().unwrap();
        state.scrolls += 1;
        if state.fail_on_scroll == Some(state.scrolls) {
            return Err(ScrapeError::BrowserUnavailable("page crashed".to_string()));
        }
        state.visible = (state.visible + state.reveal_per_scroll).min(state.fragments.len());
        Ok(())
    }

    async fn content(&self) -> Result<String, ScrapeError> {
        Ok(self.document())
    }
}

struct PaginatorState {
    current: usize,
    timeouts: HashSet<usize>,
    navigations: Vec<String>,
}

/// A listing split into numbered pages selected through the `page` query parameter.
/// Pages past the end render no cards.
pub struct FakePaginator {
    pages: Vec<Vec<String>>,
    state: Mutex<PaginatorState>,
}

impl FakePaginator {
    pub fn new(pages: Vec<Vec<String>>) -> Self {
        Self {
            pages,
            state: Mutex::new(PaginatorState {
                current: 0,
                timeouts: HashSet::new(),
                navigations: Vec::new(),
            }),
        }
    }

    /// Split `cards` into pages of `per_page`.
    pub fn chunked(cards: Vec<String>, per_page: usize) -> Self {
        Self::new(cards.chunks(per_page).map(<[String]>::to_vec).collect())
    }

    pub fn with_timeout_on_page(self, page: usize) -> Self {
        self.state.lock().unwrap().timeouts.insert(page);
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    fn document(&self) -> String {
        let current = self.state.lock().unwrap().current;
        let cards = current
            .checked_sub(1)
            .and_then(|idx| self.pages.get(idx))
            .map(|cards| cards.concat())
            .unwrap_or_default();
        format!("<html><body>{cards}</body></html>")
    }
}

fn page_number(url: &str) -> usize {
    url.split(['?', '&'])
        .find_map(|part| part.strip_prefix("page="))
        .and_then(|n| n.parse().ok())
        .unwrap_or(1)
}

#[async_trait]
impl PageDriver for FakePaginator {
    async fn navigate(&self, url: &str) -> Result<(), ScrapeError> {
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        let page = page_number(url);
        if state.timeouts.contains(&page) {
            state.current = 0;
            return Err(ScrapeError::NavigationTimeout {
                url: url.to_string(),
            });
        }
        state.current = page;
        Ok(())
    }

    async fn outer_html_all(&self, selector: &str) -> Result<Vec<String>, ScrapeError> {
        query(&self.document(), selector)
    }

    async fn count(&self, selector: &str) -> Result<usize, ScrapeError> {
        Ok(query(&self.document(), selector)?.len())
    }

    async fn scroll_last_into_view(&self, _selector: &str) -> Result<(), ScrapeError> {
        Ok(())
    }

    async fn content(&self) -> Result<String, ScrapeError> {
        Ok(self.document())
    }
}
