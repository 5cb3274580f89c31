//! # Histsync Warehouse
//!
//! DuckDB-based storage layer for histsync.
//!
//! ## Overview
//!
//! The warehouse owns every persisted record of the ingestion pipeline:
//! companies, issuers, the daily stock history of each issuer, and an audit
//! log of sync runs. Writes of stock history are idempotent: a row whose
//! `(issuer_id, date)` already exists is silently skipped, so overlapping or
//! repeated batches converge to the same stored set.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use histsync_warehouse::{StockEntryRecord, Warehouse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!
//!     if let Some(issuer_id) = warehouse.find_issuer_by_code("ALK")? {
//!         let last = warehouse.last_persisted_date(issuer_id)?;
//!         println!("ALK last persisted: {last:?}");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `company` | Company profile per issuer |
//! | `issuer` | Issuer code and owning company |
//! | `stock_history` | One row per issuer per calendar day |
//! | `sync_log` | Per-issuer outcome of every sync run |

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{Connection, OptionalExt, ToSql};
use serde::Serialize;
use thiserror::Error;

pub use duckdb::{DuckDbConnectionManager, PooledConnection};

/// Separator used to move phone lists in and out of the `VARCHAR[]` column.
/// Source pages already split phone numbers on it, so no number contains it.
const PHONE_SEPARATOR: &str = "; ";

const INSERT_ENTRY_SQL: &str = "INSERT INTO stock_history \
     (issuer_id, date, last_trade_price, max_price, min_price, avg_price, \
      percent_change, volume, turnover_best, total_turnover) \
     VALUES (?, CAST(? AS DATE), ?, ?, ?, ?, ?, ?, ?, ?) \
     ON CONFLICT (issuer_id, date) DO NOTHING";

const SELECT_ENTRY_COLUMNS: &str = "issuer_id, CAST(date AS VARCHAR), last_trade_price, \
     max_price, min_price, avg_price, percent_change, volume, turnover_best, total_turnover";

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A write left the store in a state it cannot read back.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for histsync data.
    pub histsync_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept per pool.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let histsync_home = resolve_histsync_home();
        let db_path = histsync_home.join("warehouse.duckdb");
        Self {
            histsync_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

impl WarehouseConfig {
    /// Configuration pointing at an explicit database file.
    pub fn at_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }
}

/// Company profile row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyRecord {
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub email: Option<String>,
    pub phones: Vec<String>,
}

/// One day of stock history for an issuer.
///
/// Value columns hold the exchange's locale-formatted numbers verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockEntryRecord {
    pub issuer_id: i64,
    /// Calendar day as `YYYY-MM-DD`.
    pub date: String,
    pub last_trade_price: String,
    pub max_price: String,
    pub min_price: String,
    pub avg_price: String,
    pub percent_change: String,
    pub volume: String,
    pub turnover_best: String,
    pub total_turnover: String,
}

/// Outcome of one issuer in one sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncLogRecord {
    pub run_id: String,
    pub issuer_code: String,
    pub status: String,
    pub history_inserted: u64,
    pub gap_inserted: u64,
    pub latency_ms: u64,
    pub error: Option<String>,
}

/// The main warehouse interface for issuer and stock-history storage.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse with the specified configuration.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self { config, manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Initialize database schema.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    /// A handle over the same database with its own connection pool.
    #[must_use]
    pub fn isolated(&self) -> Self {
        Self {
            config: self.config.clone(),
            manager: self.manager.isolated(),
        }
    }

    /// Get the path to the database file.
    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    pub fn find_issuer_by_code(&self, code: &str) -> Result<Option<i64>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let id = connection
            .query_row("SELECT id FROM issuer WHERE code = ?", [code], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(id)
    }

    /// Most recent persisted date (`YYYY-MM-DD`) for an issuer.
    pub fn last_persisted_date(&self, issuer_id: i64) -> Result<Option<String>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let date = connection.query_row(
            "SELECT CAST(MAX(date) AS VARCHAR) FROM stock_history WHERE issuer_id = ?",
            [issuer_id],
            |row| row.get(0),
        )?;
        Ok(date)
    }

    /// Create the company row and then the issuer row referencing it.
    ///
    /// The two inserts are not wrapped in a transaction. A company left behind
    /// by an interrupted earlier call is adopted instead of rejected, so
    /// retrying converges.
    pub fn create_company_and_issuer(
        &self,
        company: &CompanyRecord,
        issuer_code: &str,
    ) -> Result<i64, WarehouseError> {
        let connection = self.manager.acquire()?;
        let phones = company.phones.join(PHONE_SEPARATOR);

        // SECURITY: All values are passed as parameters, not interpolated
        let params: [&dyn ToSql; 9] = [
            &company.code,
            &company.name,
            &company.address,
            &company.city,
            &company.state,
            &company.email,
            &phones,
            &phones,
            &PHONE_SEPARATOR,
        ];
        connection.execute(
            "INSERT INTO company (code, name, address, city, state, email, phones) \
             VALUES (?, ?, ?, ?, ?, ?, \
                     CASE WHEN ? = '' THEN CAST([] AS VARCHAR[]) ELSE string_split(?, ?) END) \
             ON CONFLICT (code) DO NOTHING",
            params.as_slice(),
        )?;
        let company_id: i64 = connection.query_row(
            "SELECT id FROM company WHERE code = ?",
            [&company.code],
            |row| row.get(0),
        )?;

        let params: [&dyn ToSql; 2] = [&issuer_code, &company_id];
        connection.execute(
            "INSERT INTO issuer (code, company_id) VALUES (?, ?) ON CONFLICT (code) DO NOTHING",
            params.as_slice(),
        )?;
        let issuer_id = connection
            .query_row("SELECT id FROM issuer WHERE code = ?", [issuer_code], |row| {
                row.get(0)
            })
            .optional()?;

        issuer_id.ok_or_else(|| {
            WarehouseError::InvalidData(format!("issuer '{issuer_code}' missing after insert"))
        })
    }

    /// Insert stock-history rows, skipping any `(issuer_id, date)` already stored.
    ///
    /// All rows are written in one transaction. Returns the number of rows
    /// actually inserted.
    pub fn bulk_upsert_entries(&self, rows: &[StockEntryRecord]) -> Result<usize, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let connection = self.manager.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            let mut statement = connection.prepare(INSERT_ENTRY_SQL)?;
            let mut inserted = 0;
            for row in rows {
                let params: [&dyn ToSql; 10] = [
                    &row.issuer_id,
                    &row.date,
                    &row.last_trade_price,
                    &row.max_price,
                    &row.min_price,
                    &row.avg_price,
                    &row.percent_change,
                    &row.volume,
                    &row.turnover_best,
                    &row.total_turnover,
                ];
                inserted += statement.execute(params.as_slice())?;
            }
            Ok(inserted)
        })();

        finalize_transaction(&connection, result)
    }

    pub fn read_entry(
        &self,
        issuer_id: i64,
        date: &str,
    ) -> Result<Option<StockEntryRecord>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let sql = format!(
            "SELECT {SELECT_ENTRY_COLUMNS} FROM stock_history \
             WHERE issuer_id = ? AND date = CAST(? AS DATE)"
        );
        let params: [&dyn ToSql; 2] = [&issuer_id, &date];
        let entry = connection
            .query_row(sql.as_str(), params.as_slice(), read_entry_row)
            .optional()?;
        Ok(entry)
    }

    /// All stored entries of an issuer, oldest first.
    pub fn entries(&self, issuer_id: i64) -> Result<Vec<StockEntryRecord>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let sql = format!(
            "SELECT {SELECT_ENTRY_COLUMNS} FROM stock_history WHERE issuer_id = ? ORDER BY date"
        );
        let mut statement = connection.prepare(sql.as_str())?;
        let rows = statement.query_map([issuer_id], read_entry_row)?;
        let entries = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Company profile owning the issuer with the given code.
    pub fn company_for_issuer(&self, code: &str) -> Result<Option<CompanyRecord>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let company = connection
            .query_row(
                "SELECT c.code, c.name, c.address, c.city, c.state, c.email, \
                        array_to_string(c.phones, ?) \
                 FROM issuer i JOIN company c ON c.id = i.company_id \
                 WHERE i.code = ?",
                [PHONE_SEPARATOR, code],
                |row| {
                    let phones: Option<String> = row.get(6)?;
                    Ok(CompanyRecord {
                        code: row.get(0)?,
                        name: row.get(1)?,
                        address: row.get(2)?,
                        city: row.get(3)?,
                        state: row.get(4)?,
                        email: row.get(5)?,
                        phones: split_phones(phones.as_deref()),
                    })
                },
            )
            .optional()?;
        Ok(company)
    }

    pub fn record_sync_run(&self, record: &SyncLogRecord) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        let params: [&dyn ToSql; 7] = [
            &record.run_id,
            &record.issuer_code,
            &record.status,
            &record.history_inserted,
            &record.gap_inserted,
            &record.latency_ms,
            &record.error,
        ];
        connection.execute(
            "INSERT INTO sync_log \
             (run_id, issuer_code, status, history_inserted, gap_inserted, latency_ms, error, timestamp) \
             VALUES (?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// Logged outcomes of one run, ordered by issuer code.
    pub fn sync_runs(&self, run_id: &str) -> Result<Vec<SyncLogRecord>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT run_id, issuer_code, status, history_inserted, gap_inserted, latency_ms, error \
             FROM sync_log WHERE run_id = ? ORDER BY issuer_code",
        )?;
        let rows = statement.query_map([run_id], |row| {
            let latency_ms: Option<u64> = row.get(5)?;
            Ok(SyncLogRecord {
                run_id: row.get(0)?,
                issuer_code: row.get(1)?,
                status: row.get(2)?,
                history_inserted: row.get(3)?,
                gap_inserted: row.get(4)?,
                latency_ms: latency_ms.unwrap_or_default(),
                error: row.get(6)?,
            })
        })?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn read_entry_row(row: &::duckdb::Row<'_>) -> Result<StockEntryRecord, ::duckdb::Error> {
    Ok(StockEntryRecord {
        issuer_id: row.get(0)?,
        date: row.get(1)?,
        last_trade_price: row.get(2)?,
        max_price: row.get(3)?,
        min_price: row.get(4)?,
        avg_price: row.get(5)?,
        percent_change: row.get(6)?,
        volume: row.get(7)?,
        turnover_best: row.get(8)?,
        total_turnover: row.get(9)?,
    })
}

fn split_phones(joined: Option<&str>) -> Vec<String> {
    match joined {
        Some(value) if !value.is_empty() => {
            value.split(PHONE_SEPARATOR).map(str::to_string).collect()
        }
        _ => Vec::new(),
    }
}

/// Finalize a transaction, committing on success or rolling back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

/// Resolve the histsync home directory from environment or default.
fn resolve_histsync_home() -> PathBuf {
    if let Some(path) = env::var_os("HISTSYNC_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".histsync");
    }

    PathBuf::from(".histsync")
}
