//! Async store gateway over the warehouse.
//!
//! Warehouse calls block on DuckDB, so the [`Warehouse`] implementation runs
//! each one on the blocking pool.

use std::future::Future;
use std::pin::Pin;

use histsync_warehouse::{SyncLogRecord, Warehouse, WarehouseError};
use time::Date;

use crate::domain::{format_iso_date, parse_iso_date, CompanyProfile, IssuerCode, StockEntry};
use crate::error::StoreError;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Idempotent persistence operations used by the sync pipeline.
pub trait StoreGateway: Send + Sync {
    fn find_issuer_by_code<'a>(&'a self, code: &'a IssuerCode) -> StoreFuture<'a, Option<i64>>;

    fn last_persisted_date<'a>(&'a self, issuer_id: i64) -> StoreFuture<'a, Option<Date>>;

    /// Company first, then the issuer referencing it. The two writes are not
    /// atomic; a company left by an interrupted call is adopted.
    fn create_company_and_issuer<'a>(
        &'a self,
        company: &'a CompanyProfile,
        code: &'a IssuerCode,
    ) -> StoreFuture<'a, i64>;

    /// Insert entries for an issuer, skipping dates already stored.
    /// Returns the number of rows inserted.
    fn bulk_upsert_entries<'a>(
        &'a self,
        issuer_id: i64,
        entries: &'a [StockEntry],
    ) -> StoreFuture<'a, usize>;

    fn read_entry<'a>(&'a self, issuer_id: i64, date: Date) -> StoreFuture<'a, Option<StockEntry>>;

    fn record_sync_run<'a>(&'a self, record: SyncLogRecord) -> StoreFuture<'a, ()>;
}

async fn blocking<T, F>(warehouse: &Warehouse, task: F) -> Result<T, StoreError>
where
    F: FnOnce(Warehouse) -> Result<T, WarehouseError> + Send + 'static,
    T: Send + 'static,
{
    let warehouse = warehouse.clone();
    Ok(tokio::task::spawn_blocking(move || task(warehouse)).await??)
}

impl StoreGateway for Warehouse {
    fn find_issuer_by_code<'a>(&'a self, code: &'a IssuerCode) -> StoreFuture<'a, Option<i64>> {
        let code = code.as_str().to_string();
        Box::pin(blocking(self, move |warehouse| {
            warehouse.find_issuer_by_code(&code)
        }))
    }

    fn last_persisted_date<'a>(&'a self, issuer_id: i64) -> StoreFuture<'a, Option<Date>> {
        Box::pin(async move {
            let stored = blocking(self, move |warehouse| {
                warehouse.last_persisted_date(issuer_id)
            })
            .await?;
            Ok(stored.as_deref().map(parse_iso_date).transpose()?)
        })
    }

    fn create_company_and_issuer<'a>(
        &'a self,
        company: &'a CompanyProfile,
        code: &'a IssuerCode,
    ) -> StoreFuture<'a, i64> {
        let record = company.to_record();
        let code = code.as_str().to_string();
        Box::pin(blocking(self, move |warehouse| {
            warehouse.create_company_and_issuer(&record, &code)
        }))
    }

    fn bulk_upsert_entries<'a>(
        &'a self,
        issuer_id: i64,
        entries: &'a [StockEntry],
    ) -> StoreFuture<'a, usize> {
        let rows: Vec<_> = entries
            .iter()
            .map(|entry| entry.to_record(issuer_id))
            .collect();
        Box::pin(blocking(self, move |warehouse| {
            warehouse.bulk_upsert_entries(&rows)
        }))
    }

    fn read_entry<'a>(&'a self, issuer_id: i64, date: Date) -> StoreFuture<'a, Option<StockEntry>> {
        let date = format_iso_date(date);
        Box::pin(async move {
            let stored = blocking(self, move |warehouse| warehouse.read_entry(issuer_id, &date))
                .await?;
            Ok(stored.map(StockEntry::from_record).transpose()?)
        })
    }

    fn record_sync_run<'a>(&'a self, record: SyncLogRecord) -> StoreFuture<'a, ()> {
        Box::pin(blocking(self, move |warehouse| {
            warehouse.record_sync_run(&record)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntryValues;
    use histsync_warehouse::WarehouseConfig;
    use tempfile::tempdir;
    use time::macros::date;

    fn entry(date: Date, price: &str) -> StockEntry {
        let cells: Vec<String> = [price, price, price, price, "0,00", "5", "500", "500"]
            .iter()
            .map(|cell| cell.to_string())
            .collect();
        StockEntry::new(date, EntryValues::from_cells(&cells).expect("values"))
    }

    #[tokio::test]
    async fn gateway_round_trips_entries() {
        let temp = tempdir().expect("tempdir");
        let warehouse =
            Warehouse::open(WarehouseConfig::at_path(temp.path().join("store.duckdb")))
                .expect("warehouse open");
        let store: &dyn StoreGateway = &warehouse;
        let code = IssuerCode::parse("ALK").expect("code");

        assert_eq!(store.find_issuer_by_code(&code).await.expect("find"), None);

        let issuer_id = store
            .create_company_and_issuer(&CompanyProfile::code_only(code.clone()), &code)
            .await
            .expect("create");
        let entries = vec![
            entry(date!(2024 - 01 - 01), "100"),
            entry(date!(2024 - 01 - 02), "101"),
        ];
        let inserted = store
            .bulk_upsert_entries(issuer_id, &entries)
            .await
            .expect("upsert");

        assert_eq!(inserted, 2);
        assert_eq!(
            store.last_persisted_date(issuer_id).await.expect("last"),
            Some(date!(2024 - 01 - 02))
        );
        assert_eq!(
            store
                .read_entry(issuer_id, date!(2024 - 01 - 01))
                .await
                .expect("read"),
            Some(entries[0].clone())
        );
        assert_eq!(
            store.find_issuer_by_code(&code).await.expect("find"),
            Some(issuer_id)
        );
    }
}
