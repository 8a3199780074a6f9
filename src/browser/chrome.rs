use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::error::CdpError;

use crate::browser::PageDriver;
use crate::error::ScrapeError;

/// Resolves once the document is complete and no new resources were
/// requested for 500 ms, or once the budget runs out.
const NETWORK_IDLE_SCRIPT: &str = r#"(async (budgetMs) => {
    const start = Date.now();
    let last = performance.getEntriesByType('resource').length;
    let stable = 0;
    while (Date.now() - start < budgetMs) {
        await new Promise(r => setTimeout(r, 100));
        const now = performance.getEntriesByType('resource').length;
        if (document.readyState === 'complete' && now === last) {
            stable += 100;
            if (stable >= 500) return true;
        } else {
            stable = 0;
        }
        last = now;
    }
    return false;
})"#;

/// A browser tab driven over CDP.
pub struct ChromePage {
    page: Page,
    timeout: Duration,
}

impl ChromePage {
    pub fn new(page: Page, timeout: Duration) -> Self {
        Self { page, timeout }
    }

    async fn load(&self, url: &str) -> Result<bool, CdpError> {
        self.page.goto(url).await?;
        let budget_ms = self.timeout.as_millis();
        let idle = self
            .page
            .evaluate(format!("{NETWORK_IDLE_SCRIPT}({budget_ms})"))
            .await?
            .into_value::<bool>()
            .unwrap_or(false);
        Ok(idle)
    }

    pub async fn close(self) {
        if let Err(e) = self.page.close().await {
            tracing::warn!("Failed to close page: {e}");
        }
    }
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn navigate(&self, url: &str) -> Result<(), ScrapeError> {
        let timed_out = || ScrapeError::NavigationTimeout {
            url: url.to_string(),
        };

        match tokio::time::timeout(self.timeout, self.load(url)).await {
            Ok(Ok(idle)) => {
                if !idle {
                    tracing::debug!("Network never went idle on {url}");
                }
                Ok(())
            }
            Ok(Err(CdpError::Timeout)) | Err(_) => Err(timed_out()),
            Ok(Err(e)) => Err(e.into()),
        }
    }

    async fn outer_html_all(&self, selector: &str) -> Result<Vec<String>, ScrapeError> {
        let elements = self.page.find_elements(selector).await?;
        let mut html = Vec::with_capacity(elements.len());
        for element in &elements {
            if let Some(outer) = element.outer_html().await? {
                html.push(outer);
            }
        }
        Ok(html)
    }

    async fn count(&self, selector: &str) -> Result<usize, ScrapeError> {
        Ok(self.page.find_elements(selector).await?.len())
    }

    async fn scroll_last_into_view(&self, selector: &str) -> Result<(), ScrapeError> {
        if let Some(last) = self.page.find_elements(selector).await?.last() {
            last.scroll_into_view().await?;
        }
        Ok(())
    }

    async fn content(&self) -> Result<String, ScrapeError> {
        Ok(self.page.content().await?)
    }
}
