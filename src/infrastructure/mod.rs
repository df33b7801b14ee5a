//! Infrastructure: storage, external clients, configuration, and logging.

pub mod catalog_record_repository;
pub mod config;
pub mod database_connection;
pub mod gateway;
pub mod logging;
pub mod scan_cursor_repository;
pub mod storefront_client;
pub mod telegram;
