use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Publication lifecycle of a discovered catalog entry.
///
/// A record only ever moves PENDING_PUBLISH → PUBLISHED (announced) or
/// PUBLISHED → PENDING_PUBLISH (the refresh pass saw new pricing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    PendingPublish,
    Published,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingPublish => "PENDING_PUBLISH",
            Self::Published => "PUBLISHED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING_PUBLISH" => Some(Self::PendingPublish),
            "PUBLISHED" => Some(Self::Published),
            _ => None,
        }
    }
}

/// One discovered storefront entry and its last observed pricing.
///
/// The id is assigned by the external catalog and immutable once inserted.
/// `updated_at` moves on every status or pricing mutation, never on a
/// no-op check.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRecord {
    pub id: i64,
    pub discount_percent: i64,
    pub base_price: f64,
    pub status: RecordStatus,
    pub updated_at: DateTime<Utc>,
}

impl CatalogRecord {
    /// Price after applying the current discount.
    pub fn final_price(&self) -> f64 {
        self.base_price * (1.0 - self.discount_percent as f64 / 100.0)
    }

    /// Whether freshly observed pricing matches what is stored.
    pub fn pricing_matches(&self, base_price: f64, discount_percent: i64) -> bool {
        self.discount_percent == discount_percent && (self.base_price - base_price).abs() < 0.001
    }
}
