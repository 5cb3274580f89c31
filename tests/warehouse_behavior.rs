//! Behavior-driven tests for Warehouse behavior
//!
//! These tests verify what the warehouse keeps across handles and reopens,
//! and how repeated writes of the same days converge.

use histsync_warehouse::{
    CompanyRecord, StockEntryRecord, SyncLogRecord, Warehouse, WarehouseConfig,
};
use tempfile::{tempdir, TempDir};

fn open(temp: &TempDir) -> Warehouse {
    Warehouse::open(WarehouseConfig {
        histsync_home: temp.path().to_path_buf(),
        db_path: temp.path().join("warehouse.duckdb"),
        max_pool_size: 2,
    })
    .expect("warehouse open")
}

fn company(code: &str) -> CompanyRecord {
    CompanyRecord {
        code: code.to_string(),
        name: format!("{code} AD Skopje"),
        address: None,
        city: Some("Skopje".to_string()),
        state: None,
        email: None,
        phones: vec!["+389 2 000 000".to_string(), "+389 2 000 001".to_string()],
    }
}

fn entry(issuer_id: i64, date: &str, price: &str) -> StockEntryRecord {
    StockEntryRecord {
        issuer_id,
        date: date.to_string(),
        last_trade_price: price.to_string(),
        max_price: price.to_string(),
        min_price: price.to_string(),
        avg_price: price.to_string(),
        percent_change: "0,00".to_string(),
        volume: "10".to_string(),
        turnover_best: "1.000".to_string(),
        total_turnover: "1.000".to_string(),
    }
}

fn dates(warehouse: &Warehouse, issuer_id: i64) -> Vec<String> {
    warehouse
        .entries(issuer_id)
        .expect("entries")
        .into_iter()
        .map(|entry| entry.date)
        .collect()
}

// =============================================================================
// Warehouse: Durability
// =============================================================================

#[test]
fn when_warehouse_is_reopened_issuers_and_entries_are_still_there() {
    // Given: A warehouse holding one issuer with two days
    let temp = tempdir().expect("tempdir");
    let issuer_id = {
        let warehouse = open(&temp);
        let issuer_id = warehouse
            .create_company_and_issuer(&company("ALK"), "ALK")
            .expect("create");
        warehouse
            .bulk_upsert_entries(&[
                entry(issuer_id, "2024-01-02", "100"),
                entry(issuer_id, "2024-01-03", "101"),
            ])
            .expect("upsert");
        issuer_id
    };

    // When: The database file is opened again
    let warehouse = open(&temp);

    // Then: The issuer, its company, and its last date are read back
    assert_eq!(
        warehouse.find_issuer_by_code("ALK").expect("lookup"),
        Some(issuer_id)
    );
    assert_eq!(
        warehouse.last_persisted_date(issuer_id).expect("last date"),
        Some("2024-01-03".to_string())
    );
    let stored = warehouse
        .company_for_issuer("ALK")
        .expect("company")
        .expect("company stored");
    assert_eq!(stored.phones, vec!["+389 2 000 000", "+389 2 000 001"]);
}

#[test]
fn when_isolated_handle_writes_other_handles_see_it() {
    // Given: Two handles over one database file
    let temp = tempdir().expect("tempdir");
    let warehouse = open(&temp);
    let worker = warehouse.isolated();

    // When: The isolated handle creates an issuer and stores a day
    let issuer_id = worker
        .create_company_and_issuer(&company("KMB"), "KMB")
        .expect("create");
    worker
        .bulk_upsert_entries(&[entry(issuer_id, "2024-01-02", "21.000,00")])
        .expect("upsert");

    // Then: The original handle reads the same rows
    assert_eq!(
        warehouse.find_issuer_by_code("KMB").expect("lookup"),
        Some(issuer_id)
    );
    assert_eq!(dates(&warehouse, issuer_id), vec!["2024-01-02"]);
}

// =============================================================================
// Warehouse: Convergent Writes
// =============================================================================

#[test]
fn when_overlapping_batches_are_upserted_result_is_their_union() {
    // Given: An issuer and two batches sharing one day
    let temp = tempdir().expect("tempdir");
    let warehouse = open(&temp);
    let issuer_id = warehouse
        .create_company_and_issuer(&company("TEL"), "TEL")
        .expect("create");
    let first = vec![
        entry(issuer_id, "2024-01-02", "350"),
        entry(issuer_id, "2024-01-03", "351"),
    ];
    let second = vec![
        entry(issuer_id, "2024-01-03", "999"),
        entry(issuer_id, "2024-01-04", "352"),
    ];

    // When: Both batches are written
    let inserted_first = warehouse.bulk_upsert_entries(&first).expect("first");
    let inserted_second = warehouse.bulk_upsert_entries(&second).expect("second");

    // Then: Each day exists once and the earlier write for the shared day wins
    assert_eq!(inserted_first, 2);
    assert_eq!(inserted_second, 1);
    assert_eq!(
        dates(&warehouse, issuer_id),
        vec!["2024-01-02", "2024-01-03", "2024-01-04"]
    );
    let shared = warehouse
        .read_entry(issuer_id, "2024-01-03")
        .expect("read")
        .expect("entry");
    assert_eq!(shared.last_trade_price, "351");
}

#[test]
fn when_issuer_is_created_twice_the_same_id_is_returned() {
    // Given: An issuer created once
    let temp = tempdir().expect("tempdir");
    let warehouse = open(&temp);
    let first = warehouse
        .create_company_and_issuer(&company("ALK"), "ALK")
        .expect("create");

    // When: It is created again
    let second = warehouse
        .create_company_and_issuer(&company("ALK"), "ALK")
        .expect("create again");

    // Then: No second issuer appears
    assert_eq!(first, second);
}

// =============================================================================
// Warehouse: Sync Log
// =============================================================================

#[test]
fn when_runs_are_logged_each_run_reads_back_its_own_rows() {
    // Given: Outcomes from two runs
    let temp = tempdir().expect("tempdir");
    let warehouse = open(&temp);
    let record = |run_id: &str, code: &str, status: &str, error: Option<&str>| SyncLogRecord {
        run_id: run_id.to_string(),
        issuer_code: code.to_string(),
        status: status.to_string(),
        history_inserted: 3,
        gap_inserted: 1,
        latency_ms: 15,
        error: error.map(str::to_string),
    };

    // When: They are recorded
    warehouse
        .record_sync_run(&record("run-1", "TEL", "created", None))
        .expect("log");
    warehouse
        .record_sync_run(&record("run-1", "ALK", "failed", Some("fetch_history: 503")))
        .expect("log");
    warehouse
        .record_sync_run(&record("run-2", "KMB", "updated", None))
        .expect("log");

    // Then: A run reads back only its rows, ordered by code
    let runs = warehouse.sync_runs("run-1").expect("runs");
    let codes: Vec<&str> = runs.iter().map(|run| run.issuer_code.as_str()).collect();
    assert_eq!(codes, vec!["ALK", "TEL"]);
    assert_eq!(runs[0].error.as_deref(), Some("fetch_history: 503"));
    assert_eq!(runs[1].history_inserted, 3);
    assert!(warehouse.sync_runs("run-3").expect("runs").is_empty());
}
