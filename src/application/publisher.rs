//! Publisher state machine.
//!
//! Each run drains a randomized handful of pending records: select one,
//! enrich it with two further catalog lookups, announce it, flip it to
//! published. Hard gateway errors end the run; a failed delivery only
//! costs its own slot. The pauses between announcements are drawn from a
//! coarse randomized range so the destination channel is never burst,
//! which is also why the outer schedule period must stay well above the
//! worst-case sum of those pauses.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::application::scheduler::Operation;
use crate::application::{ApiGate, RunError};
use crate::domain::{Announcement, CatalogRecord, ListingProfile};
use crate::infrastructure::catalog_record_repository::CatalogRecordRepository;
use crate::infrastructure::gateway::{CatalogLookup, Delay, GatewayError, RetryingGateway};
use crate::infrastructure::storefront_client::{CatalogApi, MEDIA_FILTER, PROFILE_FILTER};
use crate::infrastructure::telegram::AnnouncementChannel;

pub struct Publisher<C, D, A> {
    gateway: RetryingGateway<C, D>,
    pacer: D,
    channel: A,
    records: CatalogRecordRepository,
    gate: ApiGate,
    quota_range: (usize, usize),
    pacing_range_seconds: (u64, u64),
    rng: fastrand::Rng,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishSummary {
    pub published: u32,
    pub failed: u32,
    /// The pending queue emptied before the quota was spent.
    pub drained: bool,
}

impl<C: CatalogApi, D: Delay, A: AnnouncementChannel> Publisher<C, D, A> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: RetryingGateway<C, D>,
        pacer: D,
        channel: A,
        records: CatalogRecordRepository,
        gate: ApiGate,
        quota_range: (usize, usize),
        pacing_range_seconds: (u64, u64),
        rng: fastrand::Rng,
    ) -> Self {
        Self { gateway, pacer, channel, records, gate, quota_range, pacing_range_seconds, rng }
    }

    pub async fn run(&mut self) -> Result<PublishSummary, RunError> {
        let _guard = self.gate.lock().await;

        let quota = self.rng.usize(self.quota_range.0..=self.quota_range.1);
        info!("Publishing up to {} pending records this run", quota);

        let mut summary = PublishSummary::default();
        for iteration in 0..quota {
            if iteration > 0 {
                let pause = Duration::from_secs(
                    self.rng.u64(self.pacing_range_seconds.0..=self.pacing_range_seconds.1),
                );
                debug!("Pacing for {}s before the next announcement", pause.as_secs());
                self.pacer.sleep(pause).await;
            }

            let Some(record) = self.records.find_one_pending().await? else {
                info!("No pending records left, ending the run early");
                summary.drained = true;
                break;
            };

            let profile = match self.enrich(&record).await {
                Ok(Some(profile)) => profile,
                Ok(None) => {
                    summary.failed += 1;
                    continue;
                }
                Err(err) => {
                    error!("Publish run aborted at id {}: {}", record.id, err);
                    return Err(err.into());
                }
            };

            let announcement = Announcement::compose(&record, &profile);
            match self.channel.send(&announcement).await {
                Ok(()) => {
                    self.records.mark_published(record.id, Utc::now()).await?;
                    summary.published += 1;
                    info!(
                        "Announced entry {} ({:.2} at -{}%)",
                        record.id,
                        record.final_price(),
                        record.discount_percent
                    );
                }
                Err(err) => {
                    // Item-local: the record stays pending for a later run.
                    error!("Failed to deliver announcement for entry {}: {:#}", record.id, err);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Publish run complete: {} announced, {} failed",
            summary.published, summary.failed
        );
        Ok(summary)
    }

    /// The two enrichment lookups. `None` means the entry went unavailable
    /// mid-flight and this slot is forfeited.
    async fn enrich(
        &self,
        record: &CatalogRecord,
    ) -> Result<Option<ListingProfile>, GatewayError> {
        let profile = match self.gateway.fetch(record.id, PROFILE_FILTER).await? {
            CatalogLookup::Found(payload) => payload,
            CatalogLookup::Unavailable => {
                warn!("Entry {} became unavailable before publishing, skipping", record.id);
                return Ok(None);
            }
        };
        let media = match self.gateway.fetch(record.id, MEDIA_FILTER).await? {
            CatalogLookup::Found(payload) => payload,
            CatalogLookup::Unavailable => {
                warn!("Entry {} became unavailable before publishing, skipping", record.id);
                return Ok(None);
            }
        };

        Ok(Some(ListingProfile {
            title: profile.name.unwrap_or_default(),
            description: profile.short_description.unwrap_or_default(),
            cover_image: profile.header_image.unwrap_or_default(),
            developers: media.developers,
            screenshots: media.screenshots.into_iter().map(|shot| shot.path_full).collect(),
        }))
    }
}

#[async_trait]
impl<C, D, A> Operation for Publisher<C, D, A>
where
    C: CatalogApi + Send,
    D: Delay + Send,
    A: AnnouncementChannel + Send,
{
    fn name(&self) -> &'static str {
        "publish"
    }

    async fn tick(&mut self) -> Result<(), RunError> {
        self.run().await.map(drop)
    }
}
