//! Retrying gateway over the storefront client.
//!
//! The storefront signals rate exhaustion by answering its empty sentinel
//! instead of an error, so this is where that response becomes a typed
//! outcome: bounded fixed-delay retries for the sentinel, an immediate
//! abort signal for structural surprises, and a plain business variant
//! for entries that are absent in the target region.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};

use crate::infrastructure::storefront_client::CatalogApi;

/// Suspension handle for backoff and pacing sleeps, injectable in tests.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[async_trait]
impl<T: Delay + ?Sized> Delay for std::sync::Arc<T> {
    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}

/// Production delay backed by the tokio timer.
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Hard failures. Every variant means the caller must abandon its whole
/// run and leave recovery to the next scheduled invocation.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("catalog rate budget exhausted after {attempts} attempts")]
    RateLimited { attempts: u32 },
    #[error("unexpected catalog response shape for id {id}: {reason}")]
    Malformed { id: i64, reason: String },
    #[error("catalog transport failure")]
    Transport(#[source] anyhow::Error),
}

/// Business-level outcome of a successful exchange.
#[derive(Debug, Clone)]
pub enum CatalogLookup {
    Found(EntryPayload),
    /// The entry does not exist or is not offered in the target region.
    Unavailable,
}

/// Per-entry payload under a successful lookup. Which fields are present
/// depends on the filter the caller requested.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EntryPayload {
    pub name: Option<String>,
    pub short_description: Option<String>,
    pub header_image: Option<String>,
    pub price_overview: Option<PriceOverview>,
    pub screenshots: Vec<Screenshot>,
    pub developers: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PriceOverview {
    /// Undiscounted price in minor currency units.
    pub initial: i64,
    pub discount_percent: i64,
}

impl PriceOverview {
    /// Minor units to currency units.
    pub fn base_price(self) -> f64 {
        self.initial as f64 / 100.0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Screenshot {
    pub path_full: String,
}

/// Wraps the black-box catalog client with the sentinel retry policy.
pub struct RetryingGateway<C, D> {
    client: C,
    delay: D,
    region: String,
    retry_attempts: u32,
    retry_period: Duration,
}

impl<C: CatalogApi, D: Delay> RetryingGateway<C, D> {
    pub fn new(
        client: C,
        delay: D,
        region: impl Into<String>,
        retry_attempts: u32,
        retry_period: Duration,
    ) -> Self {
        Self { client, delay, region: region.into(), retry_attempts, retry_period }
    }

    /// Look up one entry, absorbing the rate-pressure sentinel with
    /// bounded retries.
    pub async fn fetch(&self, id: i64, filters: &str) -> Result<CatalogLookup, GatewayError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let body = self
                .client
                .lookup(id, &self.region, filters)
                .await
                .map_err(GatewayError::Transport)?;

            match body {
                Some(body) => return parse_entry(id, &body),
                None => {
                    if attempts >= self.retry_attempts {
                        error!(
                            "Catalog rate budget exhausted for id {} after {} attempts",
                            id, attempts
                        );
                        return Err(GatewayError::RateLimited { attempts });
                    }
                    warn!(
                        "Catalog answered its rate-pressure sentinel for id {} (attempt {}/{}), retrying in {}s",
                        id,
                        attempts,
                        self.retry_attempts,
                        self.retry_period.as_secs()
                    );
                    self.delay.sleep(self.retry_period).await;
                }
            }
        }
    }
}

fn parse_entry(id: i64, body: &Value) -> Result<CatalogLookup, GatewayError> {
    let malformed = |reason: &str| GatewayError::Malformed { id, reason: reason.to_string() };

    let entry = body
        .get(id.to_string().as_str())
        .ok_or_else(|| malformed("response is missing the requested id key"))?;
    let success = entry
        .get("success")
        .and_then(Value::as_bool)
        .ok_or_else(|| malformed("entry is missing the success flag"))?;

    if !success {
        return Ok(CatalogLookup::Unavailable);
    }

    let data = entry
        .get("data")
        .ok_or_else(|| malformed("successful entry is missing the data field"))?;

    // Unpriced entries answer an empty array for data; that is a valid
    // "nothing to report" payload, not a contract change.
    if data.as_array().is_some_and(Vec::is_empty) {
        return Ok(CatalogLookup::Found(EntryPayload::default()));
    }

    let payload: EntryPayload = serde_json::from_value(data.clone()).map_err(|err| {
        GatewayError::Malformed { id, reason: format!("data field failed to deserialize: {err}") }
    })?;

    Ok(CatalogLookup::Found(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    pub(crate) struct RecordingDelay {
        slept: Mutex<Vec<Duration>>,
    }

    impl RecordingDelay {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self { slept: Mutex::new(Vec::new()) })
        }

        pub(crate) fn recorded(&self) -> Vec<Duration> {
            self.slept.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Delay for RecordingDelay {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    /// Always answers the rate-pressure sentinel.
    struct SentinelApi {
        calls: AtomicU32,
    }

    #[async_trait]
    impl CatalogApi for SentinelApi {
        async fn lookup(&self, _id: i64, _region: &str, _filters: &str) -> anyhow::Result<Option<Value>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    /// Answers a fixed document for every lookup.
    struct FixedApi {
        body: Value,
    }

    #[async_trait]
    impl CatalogApi for FixedApi {
        async fn lookup(&self, _id: i64, _region: &str, _filters: &str) -> anyhow::Result<Option<Value>> {
            Ok(Some(self.body.clone()))
        }
    }

    fn gateway<C: CatalogApi>(
        client: C,
        delay: Arc<RecordingDelay>,
        retry_attempts: u32,
    ) -> RetryingGateway<C, Arc<RecordingDelay>> {
        RetryingGateway::new(client, delay, "us", retry_attempts, Duration::from_secs(420))
    }

    #[tokio::test]
    async fn sentinel_exhausts_after_bounded_attempts_with_one_less_sleep() {
        let api = SentinelApi { calls: AtomicU32::new(0) };
        let delay = RecordingDelay::new();
        let gateway = gateway(api, Arc::clone(&delay), 2);

        let err = gateway.fetch(1, "price_overview").await.unwrap_err();

        assert!(matches!(err, GatewayError::RateLimited { attempts: 2 }));
        assert_eq!(gateway.client.calls.load(Ordering::SeqCst), 2);
        assert_eq!(delay.recorded(), vec![Duration::from_secs(420)]);
    }

    #[tokio::test]
    async fn sentinel_recovery_within_the_budget_succeeds() {
        struct RecoveringApi {
            calls: AtomicU32,
        }

        #[async_trait]
        impl CatalogApi for RecoveringApi {
            async fn lookup(&self, id: i64, _region: &str, _filters: &str) -> anyhow::Result<Option<Value>> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok(None)
                } else {
                    Ok(Some(json!({ id.to_string(): { "success": false } })))
                }
            }
        }

        let delay = RecordingDelay::new();
        let gateway = RetryingGateway::new(
            RecoveringApi { calls: AtomicU32::new(0) },
            Arc::clone(&delay),
            "us",
            3,
            Duration::from_secs(420),
        );

        let outcome = gateway.fetch(9, "price_overview").await.unwrap();
        assert!(matches!(outcome, CatalogLookup::Unavailable));
        assert_eq!(delay.recorded().len(), 1);
    }

    #[tokio::test]
    async fn missing_id_key_is_malformed() {
        let api = FixedApi { body: json!({ "some": "key" }) };
        let gateway = gateway(api, RecordingDelay::new(), 3);

        let err = gateway.fetch(1, "price_overview").await.unwrap_err();
        assert!(matches!(err, GatewayError::Malformed { id: 1, .. }));
    }

    #[tokio::test]
    async fn success_without_data_is_malformed() {
        let api = FixedApi { body: json!({ "1": { "success": true } }) };
        let gateway = gateway(api, RecordingDelay::new(), 3);

        let err = gateway.fetch(1, "price_overview").await.unwrap_err();
        assert!(matches!(err, GatewayError::Malformed { .. }));
    }

    #[tokio::test]
    async fn business_failure_is_unavailable_not_an_error() {
        let api = FixedApi { body: json!({ "1": { "success": false, "data": {} } }) };
        let gateway = gateway(api, RecordingDelay::new(), 3);

        let outcome = gateway.fetch(1, "price_overview").await.unwrap();
        assert!(matches!(outcome, CatalogLookup::Unavailable));
    }

    #[tokio::test]
    async fn full_payload_deserializes_with_minor_unit_pricing() {
        let api = FixedApi {
            body: json!({ "5": { "success": true, "data": {
                "name": "Sample",
                "short_description": "About it",
                "header_image": "https://img.example/header.jpg",
                "price_overview": {
                    "currency": "USD",
                    "initial": 150000,
                    "final": 105000,
                    "discount_percent": 30
                },
                "screenshots": [
                    { "path_full": "https://img.example/full1.jpg" },
                    { "path_full": "https://img.example/full2.jpg" }
                ],
                "developers": ["Studio One"]
            } } }),
        };
        let gateway = gateway(api, RecordingDelay::new(), 3);

        let CatalogLookup::Found(payload) = gateway.fetch(5, "price_overview").await.unwrap()
        else {
            panic!("expected a found entry");
        };

        let price = payload.price_overview.unwrap();
        assert!((price.base_price() - 1500.0).abs() < 0.001);
        assert_eq!(price.discount_percent, 30);
        assert_eq!(payload.name.as_deref(), Some("Sample"));
        assert_eq!(payload.screenshots.len(), 2);
        assert_eq!(payload.developers, vec!["Studio One".to_string()]);
    }

    #[tokio::test]
    async fn unpriced_entry_with_empty_data_is_found_without_pricing() {
        let api = FixedApi { body: json!({ "2": { "success": true, "data": [] } }) };
        let gateway = gateway(api, RecordingDelay::new(), 3);

        let CatalogLookup::Found(payload) = gateway.fetch(2, "price_overview").await.unwrap()
        else {
            panic!("expected a found entry");
        };
        assert!(payload.price_overview.is_none());
    }
}
