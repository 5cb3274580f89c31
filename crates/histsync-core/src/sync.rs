//! Per-issuer sync state machine.
//!
//! ```text
//! CheckExisting ─┬─ absent ──▶ FetchHistory ─▶ Normalize ─▶ PersistBulk ─┐
//!                └─ present ─▶ FetchLastDate ─────────────────────────────┤
//!                                                                          ▼
//!                                               FillGap ─▶ PersistGap ─▶ Done
//! ```
//!
//! An issuer seen for the first time gets its full history fetched window by
//! window and persisted together with its company. A known issuer only gets
//! the days since its last stored entry filled in. A known issuer with no
//! stored entries is treated as unseen.

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use histsync_warehouse::SyncLogRecord;
use serde::Serialize;
use time::Date;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::domain::{exchange_today, FetchWindow, IssuerCode, RawRow};
use crate::error::SyncError;
use crate::gap_fill::fill_gap;
use crate::normalize::normalize;
use crate::source::RemoteSource;
use crate::store::StoreGateway;

/// Final state of one issuer in a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuerStatus {
    /// Full history was fetched and stored.
    Created,
    /// The issuer already existed; only the gap was filled.
    Updated,
    /// The source returned no usable history; nothing was stored.
    NoHistory,
    Failed,
}

impl IssuerStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::NoHistory => "no_history",
            Self::Failed => "failed",
        }
    }
}

/// Steps of the per-issuer state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    CheckExisting,
    FetchHistory,
    Normalize,
    PersistBulk,
    FetchLastDate,
    FillGap,
    PersistGap,
    Done,
}

impl Display for SyncPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::CheckExisting => "check_existing",
            Self::FetchHistory => "fetch_history",
            Self::Normalize => "normalize",
            Self::PersistBulk => "persist_bulk",
            Self::FetchLastDate => "fetch_last_date",
            Self::FillGap => "fill_gap",
            Self::PersistGap => "persist_gap",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuerOutcome {
    pub code: IssuerCode,
    pub status: IssuerStatus,
    pub history_inserted: u64,
    pub gap_inserted: u64,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

impl IssuerOutcome {
    pub fn failed(code: IssuerCode, error: impl Display, elapsed_ms: u64) -> Self {
        Self {
            code,
            status: IssuerStatus::Failed,
            history_inserted: 0,
            gap_inserted: 0,
            elapsed_ms,
            error: Some(error.to_string()),
        }
    }

    pub fn to_log_record(&self, run_id: &str) -> SyncLogRecord {
        SyncLogRecord {
            run_id: run_id.to_string(),
            issuer_code: self.code.as_str().to_string(),
            status: self.status.as_str().to_string(),
            history_inserted: self.history_inserted,
            gap_inserted: self.gap_inserted,
            latency_ms: self.elapsed_ms,
            error: self.error.clone(),
        }
    }
}

struct Progress {
    status: IssuerStatus,
    history_inserted: u64,
    gap_inserted: u64,
}

/// Drives one issuer at a time through the sync phases.
///
/// The source and store are shared handles; any number of issuers may be
/// synced concurrently through one orchestrator.
#[derive(Clone)]
pub struct SyncOrchestrator {
    source: Arc<dyn RemoteSource>,
    store: Arc<dyn StoreGateway>,
    history_days: u32,
    window_days: u32,
}

impl SyncOrchestrator {
    pub fn new(source: Arc<dyn RemoteSource>, store: Arc<dyn StoreGateway>) -> Self {
        let defaults = SyncConfig::default();
        Self {
            source,
            store,
            history_days: defaults.history_days,
            window_days: defaults.window_days,
        }
    }

    pub fn with_history(mut self, history_days: u32, window_days: u32) -> Self {
        self.history_days = history_days;
        self.window_days = window_days;
        self
    }

    pub fn store(&self) -> &Arc<dyn StoreGateway> {
        &self.store
    }

    pub async fn sync_issuer(&self, code: &IssuerCode) -> IssuerOutcome {
        self.sync_issuer_on(code, exchange_today()).await
    }

    /// Sync with `today` as the upper bound for history and gap filling.
    pub async fn sync_issuer_on(&self, code: &IssuerCode, today: Date) -> IssuerOutcome {
        let started = Instant::now();
        let mut phase = SyncPhase::CheckExisting;
        let result = self.run(code, today, &mut phase).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(progress) => {
                info!(
                    code = %code,
                    status = progress.status.as_str(),
                    history_inserted = progress.history_inserted,
                    gap_inserted = progress.gap_inserted,
                    elapsed_ms,
                    "issuer synced"
                );
                IssuerOutcome {
                    code: code.clone(),
                    status: progress.status,
                    history_inserted: progress.history_inserted,
                    gap_inserted: progress.gap_inserted,
                    elapsed_ms,
                    error: None,
                }
            }
            Err(error) => {
                warn!(code = %code, phase = %phase, error = %error, elapsed_ms, "issuer sync failed");
                IssuerOutcome::failed(code.clone(), format!("{phase}: {error}"), elapsed_ms)
            }
        }
    }

    async fn run(
        &self,
        code: &IssuerCode,
        today: Date,
        phase: &mut SyncPhase,
    ) -> Result<Progress, SyncError> {
        enter(code, phase, SyncPhase::CheckExisting);
        let existing = self.store.find_issuer_by_code(code).await?;

        let stored = match existing {
            Some(issuer_id) => {
                enter(code, phase, SyncPhase::FetchLastDate);
                let last_date = self.store.last_persisted_date(issuer_id).await?;
                last_date.map(|last_date| (issuer_id, last_date))
            }
            None => None,
        };

        // An issuer without entries, left behind by an interrupted first
        // sync, gets its history fetched again like a new one.
        let (issuer_id, status, history_inserted, last_date) = match stored {
            Some((issuer_id, last_date)) => (issuer_id, IssuerStatus::Updated, 0, last_date),
            None => {
                let Some((issuer_id, inserted, last_date)) =
                    self.fetch_and_persist_history(code, today, phase).await?
                else {
                    enter(code, phase, SyncPhase::Done);
                    return Ok(Progress {
                        status: IssuerStatus::NoHistory,
                        history_inserted: 0,
                        gap_inserted: 0,
                    });
                };
                (issuer_id, IssuerStatus::Created, inserted, last_date)
            }
        };

        enter(code, phase, SyncPhase::FillGap);
        let mut gap_inserted = 0;
        if let Some(last_entry) = self.store.read_entry(issuer_id, last_date).await? {
            let filled = fill_gap(&last_entry, today);
            if !filled.is_empty() {
                enter(code, phase, SyncPhase::PersistGap);
                gap_inserted = self.store.bulk_upsert_entries(issuer_id, &filled).await? as u64;
            }
        }

        enter(code, phase, SyncPhase::Done);
        Ok(Progress {
            status,
            history_inserted,
            gap_inserted,
        })
    }

    /// Fetch, normalize, and persist the full history window set. Returns
    /// `None` when the source has no usable rows; nothing is written then.
    async fn fetch_and_persist_history(
        &self,
        code: &IssuerCode,
        today: Date,
        phase: &mut SyncPhase,
    ) -> Result<Option<(i64, u64, Date)>, SyncError> {
        enter(code, phase, SyncPhase::FetchHistory);
        let windows = FetchWindow::plan(code, today, self.history_days, self.window_days);
        let (profile, pages) = futures::join!(
            self.source.fetch_company_profile(code),
            join_all(
                windows
                    .iter()
                    .map(|window| self.source.fetch_history_window(window))
            ),
        );
        let pages = pages.into_iter().collect::<Result<Vec<Vec<RawRow>>, _>>()?;

        enter(code, phase, SyncPhase::Normalize);
        let history = normalize(pages);
        let Some(last_date) = history.entries.last().map(|entry| entry.date) else {
            return Ok(None);
        };

        enter(code, phase, SyncPhase::PersistBulk);
        let issuer_id = self.store.create_company_and_issuer(&profile, code).await?;
        let inserted = self
            .store
            .bulk_upsert_entries(issuer_id, &history.entries)
            .await?;
        Ok(Some((issuer_id, inserted as u64, last_date)))
    }
}

fn enter(code: &IssuerCode, phase: &mut SyncPhase, next: SyncPhase) {
    *phase = next;
    debug!(code = %code, phase = %next, "sync phase");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_outcome_maps_to_log_record() {
        let code = IssuerCode::parse("ALK").expect("code");
        let outcome = IssuerOutcome::failed(code, "fetch_history: timeout", 42);

        let record = outcome.to_log_record("run-1");
        assert_eq!(record.status, "failed");
        assert_eq!(record.issuer_code, "ALK");
        assert_eq!(record.latency_ms, 42);
        assert_eq!(record.error.as_deref(), Some("fetch_history: timeout"));
    }

    #[test]
    fn status_serializes_in_snake_case() {
        let json = serde_json::to_string(&IssuerStatus::NoHistory).expect("json");
        assert_eq!(json, "\"no_history\"");
        assert_eq!(SyncPhase::PersistGap.to_string(), "persist_gap");
    }
}
