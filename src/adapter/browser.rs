//! Headless Chromium page fetcher.

use super::{FetchedPage, PageFetcher, PageRequest, SearchStep};
use crate::config::{BrowserConfig, HttpConfig};
use crate::error::{Error, Result};
use crate::states::HttpMethod;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A launched browser and the task driving its DevTools connection.
struct Running {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl Drop for Running {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Fetches pages in headless Chromium so JavaScript-only lookups work.
///
/// The browser is launched on the first fetch and shared afterwards; every
/// request gets its own tab. Chromium does not expose the HTTP status of the
/// final document, so rendered pages are reported as `200`.
pub struct BrowserFetcher {
    settings: BrowserConfig,
    timeout: Duration,
    user_agent: String,
    running: OnceCell<Running>,
}

impl BrowserFetcher {
    /// Create a fetcher. Nothing is launched until the first fetch.
    #[must_use]
    pub fn new(settings: &BrowserConfig, http: &HttpConfig) -> Self {
        Self {
            settings: settings.clone(),
            timeout: http.timeout(),
            user_agent: http.user_agent.clone(),
            running: OnceCell::new(),
        }
    }

    async fn launch(&self) -> Result<Running> {
        let mut builder = LaunchConfig::builder()
            .request_timeout(self.timeout)
            .arg(format!("--user-agent={}", self.user_agent));
        if let Some(path) = &self.settings.executable {
            builder = builder.chrome_executable(path);
        }
        if self.settings.no_sandbox {
            builder = builder.no_sandbox();
        }
        let config = builder
            .build()
            .map_err(|e| Error::Config(format!("invalid browser settings: {e}")))?;

        let (browser, mut events) = Browser::launch(config)
            .await
            .map_err(|e| Error::Config(format!("failed to launch browser: {e}")))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    debug!("Browser event error: {}", e);
                }
            }
        });

        info!(
            "Headless browser launched (settle={}ms, screenshots={})",
            self.settings.settle_ms, self.settings.screenshots
        );
        Ok(Running { browser, handler })
    }

    async fn load(&self, page: &Page, request: &PageRequest) -> Result<FetchedPage> {
        match (&request.search, request.method) {
            (Some(search), _) => {
                page.goto(request.url.as_str()).await.map_err(browser_error)?;
                tokio::time::sleep(self.settings.settle()).await;
                submit_search(page, search).await?;
            }
            (None, HttpMethod::Get) => {
                page.goto(request.url.as_str()).await.map_err(browser_error)?;
            }
            (None, HttpMethod::Post) => {
                page.evaluate(submit_form_script(request)?)
                    .await
                    .map_err(browser_error)?;
                page.wait_for_navigation().await.map_err(browser_error)?;
            }
        }
        tokio::time::sleep(self.settings.settle()).await;

        let body = page.content().await.map_err(browser_error)?;
        let url = page
            .url()
            .await
            .map_err(browser_error)?
            .unwrap_or_else(|| request.url.clone());

        let screenshot = if self.settings.screenshots {
            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .full_page(true)
                .build();
            Some(page.screenshot(params).await.map_err(browser_error)?)
        } else {
            None
        };

        debug!(
            "Rendered {} ({} bytes, screenshot={})",
            url,
            body.len(),
            screenshot.is_some()
        );
        Ok(FetchedPage {
            url,
            status: 200,
            body,
            screenshot,
        })
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, request: &PageRequest) -> Result<FetchedPage> {
        let running = self.running.get_or_try_init(|| self.launch()).await?;
        let page = running
            .browser
            .new_page("about:blank")
            .await
            .map_err(browser_error)?;

        // Navigation, searching, settling and the screenshot share one deadline.
        let budget = self.timeout + self.settings.settle() * 2;
        let loaded = tokio::time::timeout(budget, self.load(&page, request)).await;
        if let Err(e) = page.close().await {
            debug!("Failed to close tab for {}: {}", request.url, e);
        }

        loaded.unwrap_or_else(|_| {
            Err(Error::Network(format!(
                "browser timed out after {}s loading {}",
                budget.as_secs(),
                request.url
            )))
        })
    }

    fn supports_javascript(&self) -> bool {
        true
    }
}

/// Fill in and submit a page's search form.
async fn submit_search(page: &Page, search: &SearchStep) -> Result<()> {
    let input = page
        .find_element(search.input.as_str())
        .await
        .map_err(browser_error)?;
    input.click().await.map_err(browser_error)?;
    input.type_str(&search.value).await.map_err(browser_error)?;

    match &search.submit {
        Some(selector) => {
            page.find_element(selector.as_str())
                .await
                .map_err(browser_error)?
                .click()
                .await
                .map_err(browser_error)?;
        }
        None => {
            input.press_key("Enter").await.map_err(browser_error)?;
        }
    }
    // Results rendered in place, without a navigation, are left to the settle delay.
    page.wait_for_navigation().await.map_err(browser_error)?;
    debug!("Submitted search via {}", search.input);
    Ok(())
}

fn browser_error(e: CdpError) -> Error {
    Error::Network(format!("browser: {e}"))
}

/// Script that posts `request.form` to `request.url` from a blank tab.
fn submit_form_script(request: &PageRequest) -> Result<String> {
    let action = serde_json::to_string(&request.url)?;
    let fields = serde_json::to_string(&request.form)?;
    Ok(format!(
        "(() => {{\
            const form = document.createElement('form');\
            form.method = 'POST';\
            form.action = {action};\
            for (const [name, value] of {fields}) {{\
                const input = document.createElement('input');\
                input.type = 'hidden';\
                input.name = name;\
                input.value = value;\
                form.appendChild(input);\
            }}\
            document.body.appendChild(form);\
            form.submit();\
        }})()"
    ))
}
