//! Configuration loading and management.
//!
//! Settings live in a single JSON file with serde defaults for every
//! field; a default file is written on first run so an operator has
//! something concrete to edit. Channel secrets can be overridden from the
//! environment so the bot token never has to live on disk.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub catalog: CatalogConfig,
    pub channel: ChannelConfig,
    pub schedule: ScheduleConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite URL for the record and cursor store.
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "sqlite:data/dealcast.db".to_string(), max_connections: 5 }
    }
}

/// Storefront API and scan-shaping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    /// Region code the storefront prices for.
    pub region: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    /// Attempts before a rate-exhaustion sentinel aborts the run.
    pub retry_attempts: u32,
    /// Fixed pause between sentinel retries.
    pub retry_period_seconds: u64,
    /// Identifiers probed per discovery run.
    pub probe_count: u32,
    /// Rows staged per insert transaction.
    pub insert_batch_size: usize,
    /// Stale published rows re-checked per refresh run.
    pub update_limit: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://store.steampowered.com/api".to_string(),
            region: "us".to_string(),
            user_agent: "dealcast/0.2".to_string(),
            timeout_seconds: 30,
            max_requests_per_second: 1,
            retry_attempts: 3,
            retry_period_seconds: 420,
            probe_count: 200,
            insert_batch_size: 30,
            update_limit: 100,
        }
    }
}

/// Announcement channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub bot_token: String,
    pub chat_id: i64,
    /// Per-run publication quota is drawn from this inclusive range.
    pub publish_min: usize,
    pub publish_max: usize,
    /// Pause between successive announcements, drawn from this range.
    pub pacing_min_seconds: u64,
    pub pacing_max_seconds: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: 0,
            publish_min: 2,
            publish_max: 5,
            pacing_min_seconds: 2700,
            pacing_max_seconds: 7200,
        }
    }
}

/// How often the scheduler wakes each operation. The publish period must
/// stay well above the worst-case sum of pacing pauses within one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub discovery_interval_seconds: u64,
    pub refresh_interval_seconds: u64,
    pub publish_interval_seconds: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            discovery_interval_seconds: 6 * 3600,
            refresh_interval_seconds: 12 * 3600,
            publish_interval_seconds: 24 * 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: String,
    /// Also write a rolling log file next to the process.
    pub file_output: bool,
    pub log_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), file_output: true, log_dir: "logs".to_string() }
    }
}

impl AppConfig {
    /// Load configuration from `path`, writing a default file when absent.
    pub async fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            let defaults = Self::default();
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).await?;
                }
            }
            let pretty = serde_json::to_string_pretty(&defaults)?;
            fs::write(path, pretty)
                .await
                .with_context(|| format!("Failed to write default config: {}", path.display()))?;
            defaults
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("DEALCAST_BOT_TOKEN") {
            self.channel.bot_token = token;
        }
        if let Ok(chat_id) = std::env::var("DEALCAST_CHAT_ID") {
            if let Ok(parsed) = chat_id.parse() {
                self.channel.chat_id = parsed;
            }
        }
    }
}
