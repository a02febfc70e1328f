//! Stock image lookup against the Unsplash search API.

use super::{ImageLookup, PlantImageData};
use crate::config::UnsplashConfig;
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    urls: ResultUrls,
    #[serde(default)]
    user: ResultUser,
}

#[derive(Debug, Default, Deserialize)]
struct ResultUrls {
    regular: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResultUser {
    name: Option<String>,
    #[serde(default)]
    links: UserLinks,
}

#[derive(Debug, Default, Deserialize)]
struct UserLinks {
    html: Option<String>,
}

/// A failed search attempt. Only `retryable` failures are attempted again.
#[derive(Debug)]
struct SearchError {
    retryable: bool,
    source: anyhow::Error,
}

impl SearchError {
    fn retryable(source: anyhow::Error) -> Self {
        Self { retryable: true, source }
    }

    fn permanent(source: anyhow::Error) -> Self {
        Self { retryable: false, source }
    }
}

pub struct UnsplashClient {
    client: Client,
    api_url: Url,
    access_key: Option<String>,
    max_retries: u32,
    backoff_base: Duration,
    backoff_cap: Duration,
}

impl UnsplashClient {
    const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(500);
    const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(4);

    pub fn new(config: &UnsplashConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            access_key: config.access_key.clone().filter(|k| !k.is_empty()),
            max_retries: config.max_retries.max(1),
            backoff_base: Self::DEFAULT_BACKOFF_BASE,
            backoff_cap: Self::DEFAULT_BACKOFF_CAP,
        })
    }

    /// Override the retry backoff (base delay doubles per attempt up to `cap`)
    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }

    /// Delays double from `backoff_base` up to `backoff_cap`, for `max_retries` attempts in total
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.backoff_base)
            .with_max_delay(self.backoff_cap)
            .with_max_times(self.max_retries.saturating_sub(1) as usize)
    }

    fn search_url(&self, plant_name: &str) -> Url {
        let mut url = self.api_url.clone();
        url.query_pairs_mut()
            .append_pair("query", plant_name)
            .append_pair("per_page", "1")
            .append_pair("orientation", "landscape");
        url
    }

    async fn search_once(&self, url: &Url, access_key: &str) -> Result<SearchResponse, SearchError> {
        let response = self
            .client
            .get(url.clone())
            .header("Authorization", format!("Client-ID {access_key}"))
            .header("Accept-Version", "v1")
            .send()
            .await
            .map_err(|e| SearchError::retryable(anyhow!(e).context("Unsplash request failed")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let source = anyhow!("Unsplash API error: {} - {}", status, body);
            return Err(if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                SearchError::retryable(source)
            } else {
                SearchError::permanent(source)
            });
        }

        response
            .json::<SearchResponse>()
            .await
            .map_err(|e| SearchError::permanent(anyhow!(e).context("Failed to decode Unsplash response")))
    }
}

#[async_trait]
impl ImageLookup for UnsplashClient {
    #[instrument(skip(self), err)]
    async fn find_image(&self, plant_name: &str) -> anyhow::Result<Option<PlantImageData>> {
        let Some(access_key) = self.access_key.as_deref() else {
            info!("Unsplash access key missing, skipping image fetch");
            return Ok(None);
        };

        let url = self.search_url(plant_name);
        let response = (|| self.search_once(&url, access_key))
            .retry(self.backoff())
            .when(|e: &SearchError| e.retryable)
            .notify(|e: &SearchError, delay: Duration| {
                warn!(?delay, "Unsplash lookup failed, retrying: {:#}", e.source);
            })
            .await
            .map_err(|e| e.source)?;

        let Some(first) = response.results.into_iter().next() else {
            info!("No Unsplash image found");
            return Ok(None);
        };
        let Some(image_url) = first.urls.regular else {
            warn!("Unsplash result is missing an image URL");
            return Ok(None);
        };

        debug!(photographer = ?first.user.name, "Found Unsplash image");
        Ok(Some(PlantImageData {
            image_url,
            photographer_name: first.user.name,
            photographer_url: first.user.links.html,
        }))
    }
}
