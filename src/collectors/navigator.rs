use std::time::Duration;

use tokio::time::Instant;

use crate::browser::PageDriver;
use crate::collectors::CardSnapshot;
use crate::error::ScrapeError;

#[derive(Debug, Clone)]
pub struct NavigatorSettings {
    /// How long `wait_for` keeps polling before giving up.
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for NavigatorSettings {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Drives one page: navigation, selector waits and card snapshots.
pub struct Navigator<P> {
    page: P,
    card_selector: String,
    settings: NavigatorSettings,
}

impl<P: PageDriver> Navigator<P> {
    pub fn new(page: P, card_selector: impl Into<String>, settings: NavigatorSettings) -> Self {
        Self {
            page,
            card_selector: card_selector.into(),
            settings,
        }
    }

    pub fn into_page(self) -> P {
        self.page
    }

    /// Navigate to `url`. A timeout yields `Ok(false)`; other failures propagate.
    pub async fn goto(&self, url: &str) -> Result<bool, ScrapeError> {
        match self.page.navigate(url).await {
            Ok(()) => {
                tracing::info!("Loaded {url}");
                Ok(true)
            }
            Err(ScrapeError::NavigationTimeout { .. }) => {
                tracing::warn!("Timed out loading {url}");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Block until at least one element matches `selector`.
    pub async fn wait_for(&self, selector: &str) -> Result<(), ScrapeError> {
        let deadline = Instant::now() + self.settings.wait_timeout;
        loop {
            if self.page.count(selector).await? > 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ScrapeError::NoResultsFound {
                    selector: selector.to_string(),
                });
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    pub async fn wait_for_cards(&self) -> Result<(), ScrapeError> {
        self.wait_for(&self.card_selector).await
    }

    /// Snapshot of the cards currently in the DOM.
    pub async fn list_cards(&self) -> Result<Vec<CardSnapshot>, ScrapeError> {
        let html = self.page.outer_html_all(&self.card_selector).await?;
        Ok(html.into_iter().map(CardSnapshot).collect())
    }

    pub async fn card_count(&self) -> Result<usize, ScrapeError> {
        self.page.count(&self.card_selector).await
    }

    pub async fn scroll_to_last_card(&self) -> Result<(), ScrapeError> {
        self.page.scroll_last_into_view(&self.card_selector).await
    }

    pub async fn content(&self) -> Result<String, ScrapeError> {
        self.page.content().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::testing::{FakePage, card_html, fast_navigator_settings};

    #[tokio::test]
    async fn goto_reports_timeout_as_false() {
        let page = FakePage::new(vec![]).with_timeout_on("https://example.test/slow");
        let nav = Navigator::new(page, "div.js_rowCard", fast_navigator_settings());

        assert!(!nav.goto("https://example.test/slow").await.unwrap());
        assert!(nav.goto("https://example.test/ok").await.unwrap());
    }

    #[tokio::test]
    async fn wait_for_cards_fails_on_empty_page() {
        let nav = Navigator::new(FakePage::new(vec![]), "div.js_rowCard", fast_navigator_settings());

        let err = nav.wait_for_cards().await.unwrap_err();
        assert!(matches!(err, ScrapeError::NoResultsFound { .. }));
    }

    #[tokio::test]
    async fn list_cards_reflects_live_dom() {
        let cards = vec![
            card_html("/a.aspx", "Recife", "2024/01/02 10:00:00"),
            card_html("/b.aspx", "Recife", "2024/01/02 09:00:00"),
        ];
        let page = FakePage::new(cards).revealing(1, 1);
        let nav = Navigator::new(page, "div.js_rowCard", fast_navigator_settings());

        assert_eq!(nav.list_cards().await.unwrap().len(), 1);
        nav.scroll_to_last_card().await.unwrap();
        assert_eq!(nav.list_cards().await.unwrap().len(), 2);
    }
}
