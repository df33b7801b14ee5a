//! Durable high-water mark for the discovery scan.

use std::sync::Arc;

use anyhow::Result;
use sqlx::{Row, SqlitePool};

#[derive(Clone)]
pub struct ScanCursorRepository {
    pool: Arc<SqlitePool>,
}

impl ScanCursorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Highest identifier already probed, if a discovery window ever
    /// completed. `None` means the scan starts from identifier 1.
    pub async fn load(&self) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT last_probed_id FROM scan_cursor WHERE id = 0")
            .fetch_optional(&*self.pool)
            .await?;
        Ok(row.map(|row| row.get::<i64, _>("last_probed_id")))
    }

    /// Persist the new high-water mark after a fully completed window.
    pub async fn store(&self, last_probed_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scan_cursor (id, last_probed_id) VALUES (0, ?)
            ON CONFLICT (id) DO UPDATE SET last_probed_id = excluded.last_probed_id
            "#,
        )
        .bind(last_probed_id)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }
}
