use std::borrow::Cow;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::DynamicImage;

use artvec_core::config::HttpSettings;
use artvec_core::traits::Downloader;

/// Catalogue image URLs ending in this suffix point at the full-size original.
const FULL_SIZE: &str = "=s0";

/// Fetches images over HTTP(S) and decodes them in memory.
pub struct HttpDownloader {
    client: reqwest::Client,
    rewrite_size: Option<String>,
}

impl HttpDownloader {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.as_str())
            .build()
            .context("building HTTP client")?;
        Ok(Self { client, rewrite_size: settings.rewrite_size.clone() })
    }

    /// Requests a smaller rendition for full-size catalogue URLs when a
    /// rewrite size is configured.
    pub fn resolve_url<'a>(&self, url: &'a str) -> Cow<'a, str> {
        match &self.rewrite_size {
            Some(size) if url.contains(FULL_SIZE) => Cow::Owned(url.replace(FULL_SIZE, size)),
            _ => Cow::Borrowed(url),
        }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    type Output = DynamicImage;

    async fn fetch(&self, url: &str) -> Result<DynamicImage> {
        let url = self.resolve_url(url);
        let bytes = self
            .client
            .get(url.as_ref())
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()?
            .bytes()
            .await?;
        let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await?
            .with_context(|| format!("decoding image from {url}"))?;
        Ok(image)
    }
}
