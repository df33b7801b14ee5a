//! Repository for catalog records.
//!
//! All pipeline mutations of the record store go through here: staged
//! batch inserts from discovery, drift updates from refresh, and status
//! flips from the publisher.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::domain::{CatalogRecord, RecordStatus};

#[derive(Clone)]
pub struct CatalogRecordRepository {
    pool: Arc<SqlitePool>,
}

impl CatalogRecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Insert newly discovered records in one transaction. Ids that already
    /// exist are left untouched, so a re-probed window after an aborted run
    /// never duplicates or clobbers a row.
    pub async fn insert_batch(&self, records: &[CatalogRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO catalog_records (id, discount_percent, base_price, status, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(record.id)
            .bind(record.discount_percent)
            .bind(record.base_price)
            .bind(record.status.as_str())
            .bind(record.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::info!("Saved batch of {} catalog records", records.len());
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Option<CatalogRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, discount_percent, base_price, status, updated_at
            FROM catalog_records WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;

        row.map(map_record).transpose()
    }

    /// Published records whose last check predates the staleness cutoff.
    /// No ordering guarantee beyond the store's default.
    pub async fn find_stale_published(
        &self,
        cutoff: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<CatalogRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, discount_percent, base_price, status, updated_at
            FROM catalog_records
            WHERE status = ? AND updated_at <= ?
            LIMIT ?
            "#,
        )
        .bind(RecordStatus::Published.as_str())
        .bind(cutoff)
        .bind(i64::from(limit))
        .fetch_all(&*self.pool)
        .await?;

        rows.into_iter().map(map_record).collect()
    }

    /// One arbitrary record awaiting publication.
    pub async fn find_one_pending(&self) -> Result<Option<CatalogRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, discount_percent, base_price, status, updated_at
            FROM catalog_records
            WHERE status = ? LIMIT 1
            "#,
        )
        .bind(RecordStatus::PendingPublish.as_str())
        .fetch_optional(&*self.pool)
        .await?;

        row.map(map_record).transpose()
    }

    /// Record drift seen by the refresh pass: new pricing, back to pending.
    pub async fn update_pricing(
        &self,
        id: i64,
        base_price: f64,
        discount_percent: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE catalog_records
            SET base_price = ?, discount_percent = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(base_price)
        .bind(discount_percent)
        .bind(RecordStatus::PendingPublish.as_str())
        .bind(updated_at)
        .bind(id)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    /// Flip a record to published after a successful announcement. Only the
    /// status (and its timestamp) moves; pricing stays as discovered.
    pub async fn mark_published(&self, id: i64, updated_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE catalog_records
            SET status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(RecordStatus::Published.as_str())
        .bind(updated_at)
        .bind(id)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }
}

fn map_record(row: SqliteRow) -> Result<CatalogRecord> {
    let status: String = row.get("status");
    let status = RecordStatus::parse(&status)
        .ok_or_else(|| anyhow!("unknown record status in store: {status}"))?;

    Ok(CatalogRecord {
        id: row.get("id"),
        discount_percent: row.get("discount_percent"),
        base_price: row.get("base_price"),
        status,
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database_connection::DatabaseConnection;
    use chrono::Months;

    async fn test_store() -> (DatabaseConnection, CatalogRecordRepository) {
        let db = DatabaseConnection::new("sqlite::memory:", 1).await.unwrap();
        db.migrate().await.unwrap();
        let repo = CatalogRecordRepository::new(db.pool().clone());
        (db, repo)
    }

    fn record(id: i64, status: RecordStatus) -> CatalogRecord {
        CatalogRecord {
            id,
            discount_percent: 30,
            base_price: 1500.0,
            status,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn batch_insert_round_trips() {
        let (_db, repo) = test_store().await;
        let records: Vec<_> =
            (1..=3).map(|id| record(id, RecordStatus::PendingPublish)).collect();

        repo.insert_batch(&records).await.unwrap();

        let stored = repo.get(2).await.unwrap().unwrap();
        assert_eq!(stored.discount_percent, 30);
        assert!((stored.base_price - 1500.0).abs() < 0.001);
        assert_eq!(stored.status, RecordStatus::PendingPublish);
    }

    #[tokio::test]
    async fn conflicting_insert_leaves_the_existing_row_alone() {
        let (_db, repo) = test_store().await;
        let original = record(7, RecordStatus::Published);
        repo.insert_batch(std::slice::from_ref(&original)).await.unwrap();

        let mut replay = record(7, RecordStatus::PendingPublish);
        replay.base_price = 99.0;
        repo.insert_batch(&[replay]).await.unwrap();

        let stored = repo.get(7).await.unwrap().unwrap();
        assert_eq!(stored.status, RecordStatus::Published);
        assert!((stored.base_price - 1500.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn stale_selection_filters_on_status_and_age() {
        let (_db, repo) = test_store().await;
        let now = Utc::now();
        let old = now.checked_sub_months(Months::new(2)).unwrap();

        let mut stale = record(1, RecordStatus::Published);
        stale.updated_at = old;
        let mut fresh = record(2, RecordStatus::Published);
        fresh.updated_at = now;
        let mut pending = record(3, RecordStatus::PendingPublish);
        pending.updated_at = old;
        repo.insert_batch(&[stale, fresh, pending]).await.unwrap();

        let cutoff = now.checked_sub_months(Months::new(1)).unwrap();
        let selected = repo.find_stale_published(cutoff, 10).await.unwrap();

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, 1);
    }

    #[tokio::test]
    async fn stale_selection_honors_the_limit() {
        let (_db, repo) = test_store().await;
        let old = Utc::now().checked_sub_months(Months::new(2)).unwrap();
        let records: Vec<_> = (1..=5)
            .map(|id| {
                let mut rec = record(id, RecordStatus::Published);
                rec.updated_at = old;
                rec
            })
            .collect();
        repo.insert_batch(&records).await.unwrap();

        let cutoff = Utc::now().checked_sub_months(Months::new(1)).unwrap();
        let selected = repo.find_stale_published(cutoff, 3).await.unwrap();
        assert_eq!(selected.len(), 3);
    }

    #[tokio::test]
    async fn pending_selection_never_returns_published_rows() {
        let (_db, repo) = test_store().await;
        repo.insert_batch(&[record(1, RecordStatus::Published)]).await.unwrap();
        assert!(repo.find_one_pending().await.unwrap().is_none());

        repo.insert_batch(&[record(2, RecordStatus::PendingPublish)]).await.unwrap();
        let selected = repo.find_one_pending().await.unwrap().unwrap();
        assert_eq!(selected.id, 2);
    }

    #[tokio::test]
    async fn pricing_update_flips_status_and_timestamp() {
        let (_db, repo) = test_store().await;
        let original = record(4, RecordStatus::Published);
        repo.insert_batch(std::slice::from_ref(&original)).await.unwrap();
        let before = repo.get(4).await.unwrap().unwrap();

        repo.update_pricing(4, 169.94, 0, Utc::now()).await.unwrap();

        let stored = repo.get(4).await.unwrap().unwrap();
        assert!((stored.base_price - 169.94).abs() < 0.001);
        assert_eq!(stored.discount_percent, 0);
        assert_eq!(stored.status, RecordStatus::PendingPublish);
        assert!(stored.updated_at > before.updated_at);
    }

    #[tokio::test]
    async fn mark_published_changes_status_only() {
        let (_db, repo) = test_store().await;
        let original = record(5, RecordStatus::PendingPublish);
        repo.insert_batch(std::slice::from_ref(&original)).await.unwrap();

        repo.mark_published(5, Utc::now()).await.unwrap();

        let stored = repo.get(5).await.unwrap().unwrap();
        assert_eq!(stored.status, RecordStatus::Published);
        assert_eq!(stored.discount_percent, original.discount_percent);
        assert!((stored.base_price - original.base_price).abs() < 0.001);
    }
}
