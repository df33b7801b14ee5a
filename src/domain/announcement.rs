//! Announcement payload composition.
//!
//! An announcement is one atomic multi-attachment message: the cover image
//! carries the HTML caption, followed by up to [`MAX_SCREENSHOTS`] plain
//! screenshots.

use crate::domain::catalog_record::CatalogRecord;

/// Screenshots attached after the captioned cover.
pub const MAX_SCREENSHOTS: usize = 3;

/// Descriptive and media fields fetched for a record right before publishing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingProfile {
    pub title: String,
    pub description: String,
    pub cover_image: String,
    pub developers: Vec<String>,
    pub screenshots: Vec<String>,
}

/// One image of a multi-attachment announcement.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub image_url: String,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub attachments: Vec<Attachment>,
}

impl Announcement {
    pub fn compose(record: &CatalogRecord, profile: &ListingProfile) -> Self {
        let mut attachments = vec![Attachment {
            image_url: profile.cover_image.clone(),
            caption: Some(build_caption(record, profile)),
        }];
        attachments.extend(
            profile
                .screenshots
                .iter()
                .take(MAX_SCREENSHOTS)
                .map(|url| Attachment { image_url: url.clone(), caption: None }),
        );
        Self { attachments }
    }
}

fn build_caption(record: &CatalogRecord, profile: &ListingProfile) -> String {
    format!(
        "<b>{}</b>\n<i>{}</i>\n\n{}\n\n<s>{:.2}</s> -{}% → {:.2}",
        escape_html(&profile.title),
        escape_html(&profile.developers.join(", ")),
        escape_html(&profile.description),
        record.base_price,
        record.discount_percent,
        record.final_price(),
    )
}

/// Minimal escaping for the channel's HTML parse mode.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
