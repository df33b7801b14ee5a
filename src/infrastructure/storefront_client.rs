//! Storefront catalog client.
//!
//! The external API is a black box: one lookup returns the raw per-id
//! JSON document, or `None` when the service degrades to its empty
//! rate-pressure response instead of erroring. Requests are spaced
//! locally so a scan cannot burst the shared budget.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

/// Field filter for the pricing-only lookup.
pub const PRICE_FILTER: &str = "price_overview";
/// Field filter for the descriptive lookup (title, description, cover).
pub const PROFILE_FILTER: &str = "basic";
/// Field filter for the media lookup (screenshots, developer list).
pub const MEDIA_FILTER: &str = "screenshots,developers";

/// One catalog lookup. `None` is the API's rate-exhaustion sentinel; an
/// `Err` is a transport-level failure.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn lookup(&self, id: i64, region: &str, filters: &str) -> Result<Option<Value>>;
}

#[async_trait]
impl<T: CatalogApi + ?Sized> CatalogApi for std::sync::Arc<T> {
    async fn lookup(&self, id: i64, region: &str, filters: &str) -> Result<Option<Value>> {
        (**self).lookup(id, region, filters).await
    }
}

#[derive(Debug, Clone)]
pub struct StorefrontClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
}

impl Default for StorefrontClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://store.steampowered.com/api".to_string(),
            user_agent: "dealcast/0.2".to_string(),
            timeout_seconds: 30,
            max_requests_per_second: 1,
        }
    }
}

/// HTTP client for the storefront's app-details endpoint.
pub struct StorefrontClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    base_url: String,
}

impl StorefrontClient {
    pub fn new(config: StorefrontClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );
        let rate_limiter = RateLimiter::direct(quota);

        Ok(Self { client, rate_limiter, base_url: config.base_url })
    }
}

#[async_trait]
impl CatalogApi for StorefrontClient {
    async fn lookup(&self, id: i64, region: &str, filters: &str) -> Result<Option<Value>> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/appdetails", self.base_url);
        tracing::debug!("Looking up catalog entry {} (filters: {})", id, filters);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("appids", id.to_string().as_str()),
                ("cc", region),
                ("filters", filters),
            ])
            .send()
            .await
            .with_context(|| format!("Catalog lookup request failed for id {id}"))?;

        if !response.status().is_success() {
            anyhow::bail!("Catalog lookup for id {} returned status {}", id, response.status());
        }

        let body: Value = response
            .json()
            .await
            .with_context(|| format!("Catalog lookup for id {id} returned a non-JSON body"))?;

        // Under rate pressure the endpoint answers a literal JSON null.
        if body.is_null() {
            return Ok(None);
        }
        Ok(Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation_with_defaults() {
        let client = StorefrontClient::new(StorefrontClientConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn zero_request_rate_is_rejected() {
        let config =
            StorefrontClientConfig { max_requests_per_second: 0, ..Default::default() };
        assert!(StorefrontClient::new(config).is_err());
    }
}
