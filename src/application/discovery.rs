//! Discovery scanner.
//!
//! Extends the known identifier range by probing forward from the durable
//! cursor. The cursor only advances when the whole probe window completed
//! without a hard error, so an aborted window is re-probed in full on the
//! next invocation; conflict-ignoring inserts keep that retry harmless.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info};

use crate::application::scheduler::Operation;
use crate::application::{ApiGate, RunError};
use crate::domain::{CatalogRecord, RecordStatus};
use crate::infrastructure::catalog_record_repository::CatalogRecordRepository;
use crate::infrastructure::gateway::{CatalogLookup, Delay, RetryingGateway};
use crate::infrastructure::scan_cursor_repository::ScanCursorRepository;
use crate::infrastructure::storefront_client::{CatalogApi, PRICE_FILTER};

pub struct DiscoveryScanner<C, D> {
    gateway: RetryingGateway<C, D>,
    records: CatalogRecordRepository,
    cursor: ScanCursorRepository,
    gate: ApiGate,
    probe_count: u32,
    insert_batch_size: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiscoverySummary {
    pub probed: u32,
    pub staged: u32,
    pub skipped: u32,
}

impl<C: CatalogApi, D: Delay> DiscoveryScanner<C, D> {
    pub fn new(
        gateway: RetryingGateway<C, D>,
        records: CatalogRecordRepository,
        cursor: ScanCursorRepository,
        gate: ApiGate,
        probe_count: u32,
        insert_batch_size: usize,
    ) -> Self {
        Self { gateway, records, cursor, gate, probe_count, insert_batch_size }
    }

    pub async fn run(&self) -> Result<DiscoverySummary, RunError> {
        let _guard = self.gate.lock().await;

        let start = self.cursor.load().await?.unwrap_or(0);
        let first = start + 1;
        let last = start + i64::from(self.probe_count);
        info!("Probing catalog ids {}..={}", first, last);

        let mut summary = DiscoverySummary::default();
        let mut staged: Vec<CatalogRecord> = Vec::new();

        for id in first..=last {
            match self.gateway.fetch(id, PRICE_FILTER).await {
                Ok(CatalogLookup::Found(payload)) => {
                    if let Some(price) = payload.price_overview {
                        debug!("Discovered priced entry {}", id);
                        staged.push(CatalogRecord {
                            id,
                            discount_percent: price.discount_percent,
                            base_price: price.base_price(),
                            status: RecordStatus::PendingPublish,
                            updated_at: Utc::now(),
                        });
                        summary.staged += 1;

                        if staged.len() >= self.insert_batch_size {
                            self.records.insert_batch(&staged).await?;
                            staged.clear();
                        }
                    } else {
                        debug!("Entry {} carries no pricing, skipping", id);
                        summary.skipped += 1;
                    }
                }
                Ok(CatalogLookup::Unavailable) => {
                    debug!("Entry {} is unavailable in the target region", id);
                    summary.skipped += 1;
                }
                Err(err) => {
                    // Staged rows are dropped and the cursor stays put:
                    // the window is re-probed whole on the next tick.
                    error!("Discovery run aborted at id {}: {}", id, err);
                    return Err(err.into());
                }
            }
            summary.probed += 1;
        }

        self.records.insert_batch(&staged).await?;
        self.cursor.store(last).await?;
        info!(
            "Discovery window complete: {} probed, {} staged, {} skipped",
            summary.probed, summary.staged, summary.skipped
        );
        Ok(summary)
    }
}

#[async_trait]
impl<C: CatalogApi + Send, D: Delay + Send> Operation for DiscoveryScanner<C, D> {
    fn name(&self) -> &'static str {
        "discovery"
    }

    async fn tick(&mut self) -> Result<(), RunError> {
        self.run().await.map(drop)
    }
}
