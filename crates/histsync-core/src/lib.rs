//! # Histsync Core
//!
//! Incremental fetch-and-reconcile pipeline for exchange stock history.
//!
//! ## Overview
//!
//! For each issuer code the pipeline determines what history is already
//! stored, fetches only what is missing from the exchange website under
//! concurrency limits, normalizes and deduplicates the rows, and fills the days
//! since the last stored entry with carried-forward values so the stored
//! series stays dense.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Sync configuration and environment overrides |
//! | [`dispatch`] | Worker-pool dispatcher and run summaries |
//! | [`domain`] | Issuer codes, entries, company profiles, fetch windows |
//! | [`error`] | Core error types |
//! | [`extract`] | Markup extraction from exchange pages |
//! | [`gap_fill`] | Carry-forward of the last entry to today |
//! | [`http_client`] | HTTP client abstraction |
//! | [`normalize`] | Raw rows to deduplicated, ordered entries |
//! | [`rate_limit`] | In-flight cap and request pacing |
//! | [`retry`] | Bounded retry with backoff |
//! | [`source`] | Remote source contract and exchange implementation |
//! | [`store`] | Async store gateway over the warehouse |
//! | [`sync`] | Per-issuer sync state machine |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use histsync_core::{Dispatcher, IssuerCode, SyncConfig};
//! use histsync_warehouse::Warehouse;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!     let dispatcher = Dispatcher::from_config(warehouse, &SyncConfig::from_env());
//!
//!     let summary = dispatcher.run(vec![IssuerCode::parse("ALK")?]);
//!     println!("{} created, {} failed", summary.created, summary.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   Dispatcher    │  one thread + runtime per worker
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ SyncOrchestrator│────▶│  Store Gateway   │──▶ DuckDB
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  RemoteSource   │────▶│ Rate Limiter     │
//! │  (MseSource)    │     │ + HTTP Client    │
//! └─────────────────┘     └──────────────────┘
//! ```

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod extract;
pub mod gap_fill;
pub mod http_client;
pub mod normalize;
pub mod rate_limit;
pub mod retry;
pub mod source;
pub mod store;
pub mod sync;

pub use config::SyncConfig;

pub use dispatch::{Dispatcher, RunSummary, SourceFactory};

pub use domain::{CompanyProfile, EntryValues, FetchWindow, IssuerCode, RawRow, StockEntry};

pub use error::{StoreError, SyncError, ValidationError};

pub use gap_fill::fill_gap;

pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};

pub use normalize::{normalize, NormalizedHistory};

pub use rate_limit::{RateLimiter, RatePermit};

pub use retry::{Backoff, RetryConfig};

pub use source::{MseSource, RemoteSource, SourceError, SourceErrorKind};

pub use store::{StoreFuture, StoreGateway};

pub use sync::{IssuerOutcome, IssuerStatus, SyncOrchestrator, SyncPhase};

// Warehouse (re-exported from histsync-warehouse)
pub use histsync_warehouse::{Warehouse, WarehouseConfig, WarehouseError};
