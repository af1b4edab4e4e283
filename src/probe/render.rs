use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tracing::debug;

use crate::settings::RenderSettings;

/// Turns a URL into the HTML of the rendered page.
pub trait Renderer {
    fn render(&self, url: &str, timeout: Duration) -> Result<String>;
}

/// Plain HTTP GET; enough for pages that ship their markup server-side.
pub struct HttpRenderer {
    client: reqwest::blocking::Client,
}

impl HttpRenderer {
    pub fn new(settings: &RenderSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&settings.accept_language)
                .context("Invalid accept_language header")?,
        );
        let client = reqwest::blocking::Client::builder()
            .user_agent(settings.user_agent.clone())
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpRenderer { client })
    }
}

impl Renderer for HttpRenderer {
    fn render(&self, url: &str, timeout: Duration) -> Result<String> {
        let start = Instant::now();
        let body = self
            .client
            .get(url)
            .timeout(timeout)
            .send()?
            .error_for_status()?
            .text()?;
        debug!("Fetched {} ({} bytes) in {}ms", url, body.len(), start.elapsed().as_millis());
        Ok(body)
    }
}

/// Renders client-side pages through spider.cloud and returns the raw HTML.
///
/// spider-client is async; a current-thread runtime keeps each render a
/// blocking call so the pipeline stays sequential.
pub struct SpiderRenderer {
    spider: Spider,
    runtime: tokio::runtime::Runtime,
}

impl SpiderRenderer {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("SPIDER_API_KEY")
            .map_err(|_| anyhow::anyhow!("SPIDER_API_KEY environment variable must be set"))?;
        let spider = Spider::new(Some(api_key))
            .map_err(|e| anyhow::anyhow!("Failed to create Spider client: {}", e))?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start runtime for spider client")?;
        Ok(SpiderRenderer { spider, runtime })
    }
}

impl Renderer for SpiderRenderer {
    fn render(&self, url: &str, timeout: Duration) -> Result<String> {
        let params = RequestParams {
            return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Raw)),
            ..Default::default()
        };

        let start = Instant::now();
        let response = self
            .runtime
            .block_on(async {
                tokio::time::timeout(
                    timeout,
                    self.spider.scrape_url(url, Some(params), "application/json"),
                )
                .await
            })
            .map_err(|_| anyhow::anyhow!("Spider render timed out after {:?}", timeout))?
            .map_err(|e| anyhow::anyhow!("Spider scrape failed: {}", e))?;
        debug!("Rendered {} via spider in {}ms", url, start.elapsed().as_millis());

        extract_content(response)
    }
}

/// Pull `content` out of spider's `[{"content": ..., "status": ...}]` reply.
fn extract_content(response: serde_json::Value) -> Result<String> {
    let parsed: serde_json::Value = match response.as_str() {
        Some(s) => serde_json::from_str(s).unwrap_or(response.clone()),
        None => response,
    };

    let first = parsed.as_array().and_then(|arr| arr.first());

    if let Some(status) = first.and_then(|obj| obj.get("status")).and_then(|s| s.as_i64()) {
        if !(200..300).contains(&status) {
            anyhow::bail!("Spider returned status {}", status);
        }
    }

    first
        .and_then(|obj| obj.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("No content in spider response"))
}
