use chrono::Local;
use scraper::{Html, Selector};

use crate::collectors::normalize::clean_location;
use crate::collectors::{SiteSelectors, parse_selector};
use crate::error::ScrapeError;
use crate::models::listing::{ListingSummary, PostedDate};

pub const UNKNOWN_LOCATION: &str = "not specified";

/// Outer HTML of one rendered card, captured at listing time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardSnapshot(pub String);

/// Turns a card snapshot into a [`ListingSummary`].
pub struct CardExtractor {
    origin: String,
    link: Selector,
    location: Selector,
    date: Selector,
}

impl CardExtractor {
    pub fn new(selectors: &SiteSelectors) -> Result<Self, ScrapeError> {
        Ok(Self {
            origin: selectors.origin.trim_end_matches('/').to_string(),
            link: parse_selector(&selectors.card_link)?,
            location: parse_selector(&selectors.card_location)?,
            date: parse_selector(&selectors.card_date)?,
        })
    }

    /// Returns `None` when the card has no link; such a card is not a job.
    /// Location and date are best effort.
    pub fn extract(&self, card: &CardSnapshot) -> Option<ListingSummary> {
        let fragment = Html::parse_fragment(&card.0);

        let href = fragment
            .select(&self.link)
            .find_map(|el| el.value().attr("data-href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())?;

        let location = fragment
            .select(&self.location)
            .next()
            .map(|el| clean_location(&el.text().collect::<String>()))
            .filter(|loc| !loc.is_empty())
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());

        let posted_date = fragment
            .select(&self.date)
            .find_map(|el| el.value().attr("data-value"))
            .filter(|value| !value.trim().is_empty())
            .map(PostedDate::parse);

        Some(ListingSummary {
            url: self.absolute_url(href),
            location,
            posted_date,
            collected_at: Local::now().naive_local(),
        })
    }

    fn absolute_url(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else if href.starts_with('/') {
            format!("{}{href}", self.origin)
        } else {
            format!("{}/{href}", self.origin)
        }
    }
}
