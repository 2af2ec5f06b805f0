//! HTTP client for the daemon's API.

pub mod types;

use anyhow::{Context, Result, anyhow};
use reqwest::{StatusCode, Url};

use types::SensorView;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:7786";

pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_API_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self::with_http_client(base_url, reqwest::Client::new())
    }

    pub fn with_http_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    /// Build `{base_url}/{segments...}` with each segment escaped.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid API URL {:?}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("API URL {:?} cannot have a path", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn sensors(&self) -> Result<Vec<SensorView>> {
        let response = self.http.get(self.url(&["sensors"])?).send().await?;
        Ok(response.error_for_status()?.json().await?)
    }

    /// Fetch one sensor; `None` if the daemon does not know it.
    pub async fn sensor(&self, id: &str) -> Result<Option<SensorView>> {
        let response = self.http.get(self.url(&["sensors", id])?).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(response.error_for_status()?.json().await?))
    }

    pub async fn door_opened(&self, id: &str) -> Result<SensorView> {
        self.post_event("door-opened", id).await
    }

    pub async fn door_closed(&self, id: &str) -> Result<SensorView> {
        self.post_event("door-closed", id).await
    }

    async fn post_event(&self, event: &str, id: &str) -> Result<SensorView> {
        let response = self.http.post(self.url(&[event, id])?).send().await?;
        Ok(response.error_for_status()?.json().await?)
    }
}
