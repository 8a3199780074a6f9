// Listing collection: navigation, card extraction, the incremental engine
// and the detail fetcher, plus the command runners that wire them together.

pub mod card;
pub mod detail;
pub mod engine;
pub mod navigator;
pub mod normalize;
pub mod runner;

#[cfg(test)]
pub mod testing;

pub use card::{CardExtractor, CardSnapshot};
pub use detail::DetailFetcher;
pub use engine::{CollectConfig, CollectionOutcome, DriveMode, IncrementalCollector};
pub use navigator::{Navigator, NavigatorSettings};

/// CSS selectors describing the target site's markup.
///
/// Any change in the site's markup degrades extraction to skipped cards or
/// default values instead of failing the run.
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    /// Origin joined to relative `data-href` values.
    pub origin: String,
    pub card: String,
    /// Element carrying the listing link in its `data-href` attribute.
    pub card_link: String,
    pub card_location: String,
    /// Element carrying the posting date in its `data-value` attribute.
    pub card_date: String,
    pub detail_title: String,
    pub detail_panels: String,
    pub detail_company: String,
    pub detail_location: String,
    pub detail_salary: String,
    pub detail_description: String,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            origin: "https://www.infojobs.com.br".to_string(),
            card: "div.js_rowCard".to_string(),
            card_link: "div.js_vacancyLoad".to_string(),
            card_location: "div.small.text-medium".to_string(),
            card_date: "div.js_date".to_string(),
            detail_title: "h2.js_vacancyHeaderTitle".to_string(),
            detail_panels: ".js_vacancyDataPanels".to_string(),
            detail_company: r#"div.h4 > a[target="_blank"]"#.to_string(),
            detail_location: ".js_applyVacancyHidden .text-medium.mb-4:nth-of-type(1)".to_string(),
            detail_salary: ".js_applyVacancyHidden .text-medium.mb-4:nth-of-type(2)".to_string(),
            detail_description: ".js_vacancyDataPanels p.mb-16.text-break".to_string(),
        }
    }
}

pub(crate) fn parse_selector(selector: &str) -> Result<scraper::Selector, crate::error::ScrapeError> {
    scraper::Selector::parse(selector)
        .map_err(|e| crate::error::ScrapeError::Selector(format!("{selector}: {e}")))
}
