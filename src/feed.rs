//! Remote forecast feed access.
//!
//! The upstream dissemination service publishes one directory per forecast
//! cycle, named by its initialization timestamp. Only the 00 and 12 UTC
//! cycles carry tropical cyclone track data.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;

use crate::error::FeedError;
use crate::registry::RunId;

/// A source of available forecast run identifiers.
#[async_trait]
pub trait ForecastFeed: Send + Sync {
    /// Lists every run the feed currently offers, oldest first.
    async fn available_runs(&self) -> Result<Vec<RunId>, FeedError>;

    /// The most recent run the feed offers.
    async fn latest(&self) -> Result<RunId, FeedError> {
        self.available_runs()
            .await?
            .into_iter()
            .max()
            .ok_or(FeedError::Empty)
    }
}

/// HTTP client for the dissemination listing.
pub struct HttpFeed {
    client: Client,
    url: String,
}

impl HttpFeed {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            url: url.into(),
        }
    }
}

#[async_trait]
impl ForecastFeed for HttpFeed {
    async fn available_runs(&self) -> Result<Vec<RunId>, FeedError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()
            .map_err(|err| FeedError::Unavailable(err.to_string()))?;
        let body = response.text().await?;
        Ok(parse_listing(&body))
    }
}

/// Extracts run identifiers from a directory listing.
///
/// Keeps every 14-digit token naming a 00 or 12 UTC cycle, deduplicated and
/// sorted ascending.
pub(crate) fn parse_listing(body: &str) -> Vec<RunId> {
    let token = Regex::new(r"\b(\d{14})\b").expect("run id pattern is valid");
    let mut runs: Vec<RunId> = token
        .find_iter(body)
        .map(|m| m.as_str())
        .filter(|s| s.ends_with("000000") || s.ends_with("120000"))
        .filter_map(|s| RunId::parse(s).ok())
        .collect();
    runs.sort();
    runs.dedup();
    runs
}
