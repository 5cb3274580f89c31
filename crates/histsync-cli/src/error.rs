use thiserror::Error;

use histsync_core::{SourceError, StoreError, ValidationError, WarehouseError};

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{failed} of {total} issuer(s) failed to sync")]
    SyncFailures { failed: usize, total: usize },

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::SyncFailures { .. } => 3,
            Self::NotFound(_) => 4,
            Self::Source(_)
            | Self::Warehouse(_)
            | Self::Store(_)
            | Self::Task(_)
            | Self::Serialization(_)
            | Self::Io(_) => 10,
        }
    }
}
