//! Telegram announcement channel.
//!
//! Announcements go out as one `sendMediaGroup` call so the cover and
//! its screenshots land as a single message.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::domain::Announcement;

/// Deliver one multi-attachment announcement atomically.
#[async_trait]
pub trait AnnouncementChannel: Send + Sync {
    async fn send(&self, announcement: &Announcement) -> Result<()>;
}

#[async_trait]
impl<T: AnnouncementChannel + ?Sized> AnnouncementChannel for std::sync::Arc<T> {
    async fn send(&self, announcement: &Announcement) -> Result<()> {
        (**self).send(announcement).await
    }
}

pub struct TelegramChannel {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: i64,
}

impl TelegramChannel {
    pub fn new(bot_token: impl Into<String>, chat_id: i64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create Telegram HTTP client")?;

        Ok(Self {
            client,
            api_base: "https://api.telegram.org".to_string(),
            bot_token: bot_token.into(),
            chat_id,
        })
    }
}

/// Bot API media array: the captioned cover first, then plain photos.
fn build_media(announcement: &Announcement) -> Vec<Value> {
    announcement
        .attachments
        .iter()
        .map(|attachment| {
            let mut item = json!({ "type": "photo", "media": attachment.image_url });
            if let Some(caption) = &attachment.caption {
                item["caption"] = json!(caption);
                item["parse_mode"] = json!("HTML");
            }
            item
        })
        .collect()
}

#[async_trait]
impl AnnouncementChannel for TelegramChannel {
    async fn send(&self, announcement: &Announcement) -> Result<()> {
        let url = format!("{}/bot{}/sendMediaGroup", self.api_base, self.bot_token);
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "chat_id": self.chat_id,
                "media": build_media(announcement),
            }))
            .send()
            .await
            .context("sendMediaGroup request failed")?;

        let body: Value =
            response.json().await.context("sendMediaGroup response was not JSON")?;
        if !body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            bail!("sendMediaGroup was rejected: {body}");
        }
        Ok(())
    }
}
