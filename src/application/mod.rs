//! Pipeline operations: discovery, refresh, publishing, and their schedule.

pub mod discovery;
pub mod publisher;
pub mod refresh;
pub mod scheduler;

use thiserror::Error;

use crate::infrastructure::gateway::GatewayError;

/// The gate every operation holds for its entire run. One external rate
/// budget backs all catalog calls, so the three activities never overlap.
pub type ApiGate = std::sync::Arc<tokio::sync::Mutex<()>>;

/// Why a run was abandoned. Recovery is always the next scheduled tick;
/// nothing here is fatal to the process.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
