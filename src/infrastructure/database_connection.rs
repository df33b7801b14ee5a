// Database connection and pool management.
// The record and cursor stores share one SQLite pool managed through sqlx.

use std::path::Path;

use anyhow::Result;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let db_path = if database_url.starts_with("sqlite://") {
            database_url.trim_start_matches("sqlite://")
        } else if database_url.starts_with("sqlite:") {
            database_url.trim_start_matches("sqlite:")
        } else {
            database_url
        };

        // Ensure the database file exists before sqlx opens it.
        if !db_path.starts_with(":memory:") && !Path::new(db_path).exists() {
            if let Some(parent) = Path::new(db_path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(db_path)?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        let create_records_sql = r#"
            CREATE TABLE IF NOT EXISTS catalog_records (
                id INTEGER PRIMARY KEY,
                discount_percent INTEGER NOT NULL,
                base_price REAL NOT NULL,
                status TEXT NOT NULL,
                updated_at DATETIME NOT NULL
            )
        "#;

        // Single-row high-water mark for the discovery scan. Kept separate
        // from catalog_records: a probed id without price data leaves no
        // record behind, so MAX(id) is not a valid resume point.
        let create_cursor_sql = r#"
            CREATE TABLE IF NOT EXISTS scan_cursor (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                last_probed_id INTEGER NOT NULL
            )
        "#;

        let create_indexes_sql = r#"
            CREATE INDEX IF NOT EXISTS idx_catalog_records_status_updated_at
            ON catalog_records (status, updated_at)
        "#;

        sqlx::query(create_records_sql).execute(&self.pool).await?;
        sqlx::query(create_cursor_sql).execute(&self.pool).await?;
        sqlx::query(create_indexes_sql).execute(&self.pool).await?;

        Ok(())
    }
}
