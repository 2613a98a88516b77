//! Plain HTTP page fetcher.

use super::{FetchedPage, PageFetcher, PageRequest};
use crate::config::HttpConfig;
use crate::error::{Error, Result};
use crate::states::HttpMethod;
use async_trait::async_trait;
use tracing::{debug, info};

/// Fetches pages with `reqwest`. Does not execute JavaScript.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher from HTTP configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        info!(
            "HTTP fetcher initialized (timeout={}s, user_agent={})",
            config.timeout_secs, config.user_agent
        );
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, request: &PageRequest) -> Result<FetchedPage> {
        if request.search.is_some() {
            return Err(Error::Config(format!(
                "{} needs a browser to fill in its search form",
                request.url
            )));
        }

        let builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url).form(&request.form),
        };

        let response = builder.send().await?;
        let status = response.status();
        let url = response.url().to_string();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        debug!("Fetched {} ({} bytes)", url, body.len());

        Ok(FetchedPage {
            url,
            status: status.as_u16(),
            body,
            screenshot: None,
        })
    }
}
