use thiserror::Error;

use histsync_warehouse::WarehouseError;

use crate::source::SourceError;

/// Validation errors for values entering the pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("issuer code cannot be empty")]
    EmptyIssuerCode,
    #[error("issuer code length {len} exceeds max {max}")]
    IssuerCodeTooLong { len: usize, max: usize },
    #[error("issuer code must start with an ASCII letter: '{ch}'")]
    IssuerCodeInvalidStart { ch: char },
    #[error("issuer code contains invalid character '{ch}' at index {index}")]
    IssuerCodeInvalidChar { ch: char, index: usize },

    #[error("invalid date '{value}', expected DD.MM.YYYY")]
    InvalidExchangeDate { value: String },
    #[error("invalid date '{value}', expected YYYY-MM-DD")]
    InvalidIsoDate { value: String },
}

/// Failures of the store gateway.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("stored row is unreadable: {0}")]
    Corrupt(#[from] ValidationError),
}

/// Top-level error for a single issuer sync.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
