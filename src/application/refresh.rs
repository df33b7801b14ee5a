//! Refresh scanner.
//!
//! Re-queries published records past the staleness threshold and flips
//! drifted ones back to pending so the publisher announces them again.
//! An entry that went unavailable in the target region is frozen in
//! place: not deleted, not flipped, not even timestamp-bumped.

use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use tracing::{debug, error, info};

use crate::application::scheduler::Operation;
use crate::application::{ApiGate, RunError};
use crate::infrastructure::catalog_record_repository::CatalogRecordRepository;
use crate::infrastructure::gateway::{CatalogLookup, Delay, RetryingGateway};
use crate::infrastructure::storefront_client::{CatalogApi, PRICE_FILTER};

/// Age past which a published record is re-checked.
pub const STALENESS_MONTHS: u32 = 1;

pub(crate) fn staleness_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(STALENESS_MONTHS)).unwrap_or(now)
}

pub struct RefreshScanner<C, D> {
    gateway: RetryingGateway<C, D>,
    records: CatalogRecordRepository,
    gate: ApiGate,
    update_limit: u32,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RefreshSummary {
    pub checked: u32,
    pub updated: u32,
    pub unchanged: u32,
    pub frozen: u32,
}

impl<C: CatalogApi, D: Delay> RefreshScanner<C, D> {
    pub fn new(
        gateway: RetryingGateway<C, D>,
        records: CatalogRecordRepository,
        gate: ApiGate,
        update_limit: u32,
    ) -> Self {
        Self { gateway, records, gate, update_limit }
    }

    pub async fn run(&self) -> Result<RefreshSummary, RunError> {
        let _guard = self.gate.lock().await;

        let cutoff = staleness_cutoff(Utc::now());
        let stale = self.records.find_stale_published(cutoff, self.update_limit).await?;

        let mut summary = RefreshSummary::default();
        if stale.is_empty() {
            info!("No published records past the staleness threshold");
            return Ok(summary);
        }
        info!("Re-checking pricing for {} stale records", stale.len());

        for record in &stale {
            match self.gateway.fetch(record.id, PRICE_FILTER).await {
                Ok(CatalogLookup::Found(payload)) => match payload.price_overview {
                    Some(price)
                        if !record.pricing_matches(price.base_price(), price.discount_percent) =>
                    {
                        self.records
                            .update_pricing(
                                record.id,
                                price.base_price(),
                                price.discount_percent,
                                Utc::now(),
                            )
                            .await?;
                        summary.updated += 1;
                        info!(
                            "Entry {} drifted to {:.2} at -{}%, queued for republish",
                            record.id,
                            price.base_price(),
                            price.discount_percent
                        );
                    }
                    Some(_) => {
                        debug!("Entry {} pricing unchanged", record.id);
                        summary.unchanged += 1;
                    }
                    None => {
                        debug!("Entry {} no longer carries pricing, leaving as is", record.id);
                        summary.unchanged += 1;
                    }
                },
                Ok(CatalogLookup::Unavailable) => {
                    debug!("Entry {} unavailable in the target region, frozen in place", record.id);
                    summary.frozen += 1;
                }
                Err(err) => {
                    // Remaining rows are deferred to the next invocation.
                    error!("Refresh run aborted at id {}: {}", record.id, err);
                    return Err(err.into());
                }
            }
            summary.checked += 1;
        }

        info!(
            "Refresh complete: {} checked, {} updated, {} unchanged, {} frozen",
            summary.checked, summary.updated, summary.unchanged, summary.frozen
        );
        Ok(summary)
    }
}

#[async_trait]
impl<C: CatalogApi + Send, D: Delay + Send> Operation for RefreshScanner<C, D> {
    fn name(&self) -> &'static str {
        "refresh"
    }

    async fn tick(&mut self) -> Result<(), RunError> {
        self.run().await.map(drop)
    }
}
