//! Worker-pool dispatcher for sync runs.
//!
//! Each worker is an OS thread running its own single-threaded tokio runtime,
//! with its own warehouse connection pool and its own remote source (and so its
//! own rate limiter). Issuers reach workers through a shared queue; a worker
//! syncs the issuers it takes one after another. A panic while syncing one
//! issuer becomes a `Failed` outcome for it and the worker moves on.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use futures::FutureExt;
use histsync_warehouse::Warehouse;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::domain::{exchange_today, IssuerCode};
use crate::source::{RemoteSource, SourceError};
use crate::store::StoreGateway;
use crate::sync::{IssuerOutcome, IssuerStatus, SyncOrchestrator};

/// Builds the remote source of one worker, given the worker index.
pub type SourceFactory =
    Arc<dyn Fn(usize) -> Result<Arc<dyn RemoteSource>, SourceError> + Send + Sync>;

/// Aggregate result of a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    /// RFC 3339 UTC timestamp.
    pub started_at: String,
    pub elapsed_ms: u64,
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub no_history: usize,
    pub failed: usize,
    /// Ordered by issuer code.
    pub outcomes: Vec<IssuerOutcome>,
}

impl RunSummary {
    fn from_outcomes(
        run_id: String,
        started_at: OffsetDateTime,
        elapsed_ms: u64,
        mut outcomes: Vec<IssuerOutcome>,
    ) -> Self {
        outcomes.sort_by(|left, right| left.code.cmp(&right.code));
        let count = |status: IssuerStatus| {
            outcomes
                .iter()
                .filter(|outcome| outcome.status == status)
                .count()
        };

        Self {
            started_at: started_at
                .format(&Rfc3339)
                .unwrap_or_else(|_| started_at.to_string()),
            elapsed_ms,
            total: outcomes.len(),
            created: count(IssuerStatus::Created),
            updated: count(IssuerStatus::Updated),
            no_history: count(IssuerStatus::NoHistory),
            failed: count(IssuerStatus::Failed),
            run_id,
            outcomes,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn outcome(&self, code: &str) -> Option<&IssuerOutcome> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.code.as_str() == code)
    }
}

/// Fans issuers out over a fixed pool of isolated workers.
#[derive(Clone)]
pub struct Dispatcher {
    warehouse: Warehouse,
    source_factory: SourceFactory,
    workers: usize,
    history_days: u32,
    window_days: u32,
    today: Option<Date>,
}

impl Dispatcher {
    pub fn new(warehouse: Warehouse, source_factory: SourceFactory) -> Self {
        let defaults = SyncConfig::default();
        Self {
            warehouse,
            source_factory,
            workers: defaults.workers,
            history_days: defaults.history_days,
            window_days: defaults.window_days,
            today: None,
        }
    }

    /// Dispatcher whose workers each build an [`MseSource`](crate::MseSource)
    /// from `config`.
    pub fn from_config(warehouse: Warehouse, config: &SyncConfig) -> Self {
        let source_config = config.clone();
        let factory: SourceFactory = Arc::new(move |_| {
            let source: Arc<dyn RemoteSource> = Arc::new(source_config.mse_source());
            Ok(source)
        });

        Self::new(warehouse, factory)
            .with_workers(config.workers)
            .with_history(config.history_days, config.window_days)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_history(mut self, history_days: u32, window_days: u32) -> Self {
        self.history_days = history_days;
        self.window_days = window_days;
        self
    }

    /// Fix the calendar day used as "today" for every issuer in a run.
    pub fn with_today(mut self, today: Date) -> Self {
        self.today = Some(today);
        self
    }

    /// Sync every issuer and wait for all workers to finish.
    ///
    /// Blocks the calling thread. A failing issuer never stops the others;
    /// it shows up as a `Failed` outcome in the summary.
    pub fn run(&self, codes: Vec<IssuerCode>) -> RunSummary {
        let run_id = Uuid::new_v4().to_string();
        let started_at = OffsetDateTime::now_utc();
        let started = Instant::now();
        let today = self.today.unwrap_or_else(exchange_today);

        let mut codes = codes;
        let mut seen = std::collections::HashSet::new();
        codes.retain(|code| seen.insert(code.clone()));

        let worker_count = self.workers.clamp(1, codes.len().max(1));
        info!(run_id = %run_id, issuers = codes.len(), workers = worker_count, "starting sync run");

        let (job_sender, job_receiver) = mpsc::channel();
        for code in codes {
            // The receiver is alive until this function returns.
            let _ = job_sender.send(code);
        }
        drop(job_sender);
        let jobs = Arc::new(Mutex::new(job_receiver));
        let (outcome_sender, outcome_receiver) = mpsc::channel();

        let mut handles = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let worker = Worker {
                index,
                run_id: run_id.clone(),
                today,
                warehouse: self.warehouse.clone(),
                source_factory: Arc::clone(&self.source_factory),
                history_days: self.history_days,
                window_days: self.window_days,
                jobs: Arc::clone(&jobs),
                outcomes: outcome_sender.clone(),
            };
            let spawned = thread::Builder::new()
                .name(format!("histsync-worker-{index}"))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(spawn_error) => {
                    error!(worker = index, error = %spawn_error, "failed to spawn worker");
                }
            }
        }
        drop(outcome_sender);

        for handle in handles {
            if handle.join().is_err() {
                error!(run_id = %run_id, "worker panicked");
            }
        }

        let mut outcomes: Vec<IssuerOutcome> = outcome_receiver.try_iter().collect();
        // Whatever is still queued had no worker left to take it.
        while let Some(code) = next_job(&jobs) {
            outcomes.push(IssuerOutcome::failed(code, "no worker available", 0));
        }

        let summary = RunSummary::from_outcomes(
            run_id,
            started_at,
            started.elapsed().as_millis() as u64,
            outcomes,
        );
        info!(
            run_id = %summary.run_id,
            total = summary.total,
            created = summary.created,
            updated = summary.updated,
            no_history = summary.no_history,
            failed = summary.failed,
            elapsed_ms = summary.elapsed_ms,
            "sync run finished"
        );
        summary
    }
}

struct Worker {
    index: usize,
    run_id: String,
    today: Date,
    warehouse: Warehouse,
    source_factory: SourceFactory,
    history_days: u32,
    window_days: u32,
    jobs: Arc<Mutex<Receiver<IssuerCode>>>,
    outcomes: Sender<IssuerOutcome>,
}

impl Worker {
    fn run(self) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| format!("runtime: {error}"));
        let source = (self.source_factory)(self.index).map_err(|error| format!("source: {error}"));

        let (runtime, source) = match (runtime, source) {
            (Ok(runtime), Ok(source)) => (runtime, source),
            (Err(setup_error), _) | (_, Err(setup_error)) => {
                warn!(worker = self.index, error = %setup_error, "worker setup failed");
                self.fail_remaining(&setup_error);
                return;
            }
        };

        let store: Arc<dyn StoreGateway> = Arc::new(self.warehouse.isolated());
        let orchestrator = SyncOrchestrator::new(source, Arc::clone(&store))
            .with_history(self.history_days, self.window_days);

        while let Some(code) = next_job(&self.jobs) {
            let outcome = runtime.block_on(async {
                let started = Instant::now();
                let outcome = match AssertUnwindSafe(orchestrator.sync_issuer_on(&code, self.today))
                    .catch_unwind()
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!(worker = self.index, code = %code, panic = %message, "issuer sync panicked");
                        IssuerOutcome::failed(
                            code.clone(),
                            format!("panicked: {message}"),
                            started.elapsed().as_millis() as u64,
                        )
                    }
                };
                if let Err(log_error) = store
                    .record_sync_run(outcome.to_log_record(&self.run_id))
                    .await
                {
                    warn!(code = %code, error = %log_error, "failed to record sync outcome");
                }
                outcome
            });
            if self.outcomes.send(outcome).is_err() {
                break;
            }
        }
    }

    fn fail_remaining(&self, setup_error: &str) {
        while let Some(code) = next_job(&self.jobs) {
            let outcome =
                IssuerOutcome::failed(code, format!("worker setup failed: {setup_error}"), 0);
            if self.outcomes.send(outcome).is_err() {
                break;
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn next_job(jobs: &Mutex<Receiver<IssuerCode>>) -> Option<IssuerCode> {
    jobs.lock()
        .expect("dispatch job queue mutex poisoned")
        .try_recv()
        .ok()
}
