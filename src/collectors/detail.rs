use scraper::{Html, Selector};

use crate::browser::PageDriver;
use crate::collectors::normalize::{clean_location, clean_salary, clean_text};
use crate::collectors::{Navigator, SiteSelectors, parse_selector};
use crate::error::ScrapeError;
use crate::models::job::JobDetail;

/// Reads the full job fields from a single detail page.
pub struct DetailFetcher {
    title_region: String,
    panels_region: String,
    title: Selector,
    company: Selector,
    location: Selector,
    salary: Selector,
    description: Selector,
}

impl DetailFetcher {
    pub fn new(selectors: &SiteSelectors) -> Result<Self, ScrapeError> {
        Ok(Self {
            title_region: selectors.detail_title.clone(),
            panels_region: selectors.detail_panels.clone(),
            title: parse_selector(&selectors.detail_title)?,
            company: parse_selector(&selectors.detail_company)?,
            location: parse_selector(&selectors.detail_location)?,
            salary: parse_selector(&selectors.detail_salary)?,
            description: parse_selector(&selectors.detail_description)?,
        })
    }

    /// Returns `None` when the page fails to load or its content regions
    /// never render. Missing individual fields are left empty.
    pub async fn fetch<P: PageDriver>(&self, navigator: &Navigator<P>, url: &str) -> Option<JobDetail> {
        match navigator.goto(url).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                tracing::error!("Failed to open {url}: {e}");
                return None;
            }
        }

        for region in [&self.title_region, &self.panels_region] {
            if let Err(e) = navigator.wait_for(region).await {
                tracing::warn!("Detail page {url} incomplete: {e}");
                return None;
            }
        }

        match navigator.content().await {
            Ok(html) => Some(self.parse(url, &html)),
            Err(e) => {
                tracing::error!("Failed to read {url}: {e}");
                None
            }
        }
    }

    /// Extract each field independently from a rendered detail page.
    pub fn parse(&self, url: &str, html: &str) -> JobDetail {
        let document = Html::parse_document(html);

        let detail = JobDetail {
            title: first_text(&document, &self.title).map(|t| clean_text(&t)),
            company: first_text(&document, &self.company).map(|t| clean_text(&t)),
            location: first_text(&document, &self.location).map(|t| clean_location(&t)),
            salary: first_text(&document, &self.salary).map(|t| clean_salary(&t)),
            description: first_text(&document, &self.description).map(|t| clean_text(&t)),
            ..JobDetail::new(url)
        };

        for (field, value) in [
            ("title", &detail.title),
            ("company", &detail.company),
            ("location", &detail.location),
            ("salary", &detail.salary),
            ("description", &detail.description),
        ] {
            if value.is_none() {
                tracing::debug!("No {field} on {url}");
            }
        }

        detail
    }
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    let text = document
        .select(selector)
        .next()?
        .text()
        .collect::<String>();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::testing::{FakePage, fast_navigator_settings};

    const URL: &str = "https://www.infojobs.com.br/vaga-de-analista__1234.aspx";

    fn detail_html(salary: &str) -> String {
        format!(
            r#"<div class="container">
                <h2 class="js_vacancyHeaderTitle">
                    Analista de   Dados
                </h2>
                <div class="h4"><a target="_blank" href="/empresa">Acme Ltda</a></div>
                <div class="js_applyVacancyHidden">
                    <div class="text-medium mb-4">Campinas, 12 km de você</div>
                    {salary}
                </div>
                <div class="js_vacancyDataPanels">
                    <p class="mb-16 text-break">Atuar com
                    pipelines de dados.</p>
                </div>
            </div>"#
        )
    }

    fn fetcher() -> DetailFetcher {
        DetailFetcher::new(&SiteSelectors::default()).unwrap()
    }

    #[test]
    fn parses_and_normalises_fields() {
        let html = detail_html(r#"<div class="text-medium mb-4">R$ 4.000,00 a R$ 6.000,00</div>"#);

        let detail = fetcher().parse(URL, &html);

        assert_eq!(detail.url, URL);
        assert_eq!(detail.title.as_deref(), Some("Analista de Dados"));
        assert_eq!(detail.company.as_deref(), Some("Acme Ltda"));
        assert_eq!(detail.location.as_deref(), Some("Campinas"));
        assert_eq!(detail.salary.as_deref(), Some("R$ 4.000,00 até R$ 6.000,00"));
        assert_eq!(detail.description.as_deref(), Some("Atuar com pipelines de dados."));
    }

    #[test]
    fn missing_field_does_not_affect_others() {
        let detail = fetcher().parse(URL, &detail_html(""));

        assert_eq!(detail.salary, None);
        assert_eq!(detail.title.as_deref(), Some("Analista de Dados"));
        assert_eq!(detail.location.as_deref(), Some("Campinas"));
    }

    #[test]
    fn page_without_fields_keeps_only_the_url() {
        let detail = fetcher().parse(URL, "<html><body><p>Vaga encerrada</p></body></html>");

        assert_eq!(detail, JobDetail::new(URL));
    }

    #[tokio::test]
    async fn fetch_reads_rendered_page() {
        let page = FakePage::new(vec![detail_html("")]);
        let nav = Navigator::new(page, "div.js_rowCard", fast_navigator_settings());

        let detail = fetcher().fetch(&nav, URL).await.unwrap();

        assert_eq!(detail.company.as_deref(), Some("Acme Ltda"));
        assert_eq!(nav.into_page().navigations(), vec![URL.to_string()]);
    }

    #[tokio::test]
    async fn fetch_returns_none_without_content_regions() {
        let page = FakePage::new(vec!["<h2 class=\"js_vacancyHeaderTitle\">Vaga</h2>".to_string()]);
        let nav = Navigator::new(page, "div.js_rowCard", fast_navigator_settings());

        assert!(fetcher().fetch(&nav, URL).await.is_none());
    }

    #[tokio::test]
    async fn fetch_returns_none_on_timeout() {
        let page = FakePage::new(vec![detail_html("")]).with_timeout_on(URL);
        let nav = Navigator::new(page, "div.js_rowCard", fast_navigator_settings());

        assert!(fetcher().fetch(&nav, URL).await.is_none());
    }
}
