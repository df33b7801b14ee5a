//! dealcast - storefront discount discovery and announcement daemon
//!
//! Probes a storefront catalog's numeric identifier space for priced
//! entries, tracks price and discount drift on entries it already knows,
//! and announces pending entries to a Telegram channel. All three
//! activities share one external rate budget and are serialized behind a
//! single gate.

pub mod application;
pub mod domain;
pub mod infrastructure;
