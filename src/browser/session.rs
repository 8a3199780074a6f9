use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::handler::viewport::Viewport;
use futures::StreamExt;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use crate::browser::ChromePage;
use crate::error::ScrapeError;

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub user_agent: String,
    pub accept_language: String,
    pub viewport: (u32, u32),
    /// Budget for any single browser operation, navigation included.
    pub operation_timeout: Duration,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            user_agent: DESKTOP_USER_AGENT.to_string(),
            accept_language: "pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
            viewport: (1920, 1080),
            operation_timeout: Duration::from_secs(10),
        }
    }
}

impl BrowserSettings {
    /// Request headers a desktop Chrome 120 on Windows sends for a top-level navigation.
    pub fn extra_headers(&self) -> Value {
        json!({
            "Accept": "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
            "Accept-Language": self.accept_language,
            "Cache-Control": "no-cache",
            "Pragma": "no-cache",
            "Sec-Ch-Ua": r#""Not_A Brand";v="8", "Chromium";v="120", "Google Chrome";v="120""#,
            "Sec-Ch-Ua-Mobile": "?0",
            "Sec-Ch-Ua-Platform": r#""Windows""#,
            "Sec-Fetch-Dest": "document",
            "Sec-Fetch-Mode": "navigate",
            "Sec-Fetch-Site": "none",
            "Sec-Fetch-User": "?1",
            "Upgrade-Insecure-Requests": "1",
        })
    }
}

/// A launched browser process plus one isolated context.
///
/// Callers must hand the session back through [`BrowserSession::release`]
/// on every exit path. Dropping it without release still stops the CDP
/// handler task, and chromiumoxide kills the child process on drop.
pub struct BrowserSession {
    browser: Browser,
    context_id: BrowserContextId,
    handler_task: JoinHandle<()>,
    settings: BrowserSettings,
}

impl BrowserSession {
    /// Launch the browser and create an isolated context.
    pub async fn acquire(settings: &BrowserSettings) -> Result<Self, ScrapeError> {
        let (width, height) = settings.viewport;
        let mut builder = BrowserConfig::builder()
            .window_size(width, height)
            .viewport(Viewport {
                width,
                height,
                ..Default::default()
            })
            .request_timeout(settings.operation_timeout)
            .arg(format!("--user-agent={}", settings.user_agent))
            .arg("--ignore-certificate-errors")
            .arg("--disable-blink-features=AutomationControlled");

        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &settings.chrome_path {
            builder = builder.chrome_executable(path);
        }

        let config = builder.build().map_err(ScrapeError::BrowserUnavailable)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::BrowserUnavailable(format!("launch failed: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler event error: {e}");
                }
            }
        });

        let context_id = match browser.execute(CreateBrowserContextParams::default()).await {
            Ok(resp) => resp.result.browser_context_id,
            Err(e) => {
                handler_task.abort();
                return Err(ScrapeError::BrowserUnavailable(format!(
                    "context creation failed: {e}"
                )));
            }
        };

        tracing::info!("Browser session ready (headless: {})", settings.headless);

        Ok(Self {
            browser,
            context_id,
            handler_task,
            settings: settings.clone(),
        })
    }

    /// Open a configured tab inside this session's context.
    pub async fn new_page(&self) -> Result<ChromePage, ScrapeError> {
        let mut params = CreateTargetParams::new("about:blank");
        params.browser_context_id = Some(self.context_id.clone());

        let page = self.browser.new_page(params).await?;
        page.execute(SetExtraHttpHeadersParams::new(Headers::new(
            self.settings.extra_headers(),
        )))
        .await?;

        Ok(ChromePage::new(page, self.settings.operation_timeout))
    }

    /// Dispose the context and shut the browser down.
    pub async fn release(mut self) {
        if let Err(e) = self
            .browser
            .execute(DisposeBrowserContextParams::new(self.context_id.clone()))
            .await
        {
            tracing::warn!("Failed to dispose browser context: {e}");
        }
        if let Err(e) = self.browser.close().await {
            tracing::warn!("Failed to close browser: {e}");
        }
        if let Err(e) = self.browser.wait().await {
            tracing::warn!("Failed to wait for browser exit: {e}");
        }
        self.handler_task.abort();
        tracing::info!("Browser session released");
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}
