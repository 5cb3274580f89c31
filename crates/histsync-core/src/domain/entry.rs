use serde::Serialize;
use time::Date;

use histsync_warehouse::StockEntryRecord;

use super::calendar::{format_iso_date, parse_iso_date};
use crate::ValidationError;

/// One table row as extracted from a page: trimmed cell texts in column order.
pub type RawRow = Vec<String>;

/// The eight value columns of a trading day, kept as the exchange prints them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EntryValues {
    pub last_trade_price: String,
    pub max_price: String,
    pub min_price: String,
    pub avg_price: String,
    pub percent_change: String,
    pub volume: String,
    pub turnover_best: String,
    pub total_turnover: String,
}

impl EntryValues {
    /// Build from the eight value cells that follow the date cell.
    pub fn from_cells(cells: &[String]) -> Option<Self> {
        let [last_trade_price, max_price, min_price, avg_price, percent_change, volume, turnover_best, total_turnover] =
            cells
        else {
            return None;
        };

        Some(Self {
            last_trade_price: last_trade_price.clone(),
            max_price: max_price.clone(),
            min_price: min_price.clone(),
            avg_price: avg_price.clone(),
            percent_change: percent_change.clone(),
            volume: volume.clone(),
            turnover_best: turnover_best.clone(),
            total_turnover: total_turnover.clone(),
        })
    }
}

/// A dated history entry, not yet bound to a stored issuer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StockEntry {
    pub date: Date,
    pub values: EntryValues,
}

impl StockEntry {
    pub fn new(date: Date, values: EntryValues) -> Self {
        Self { date, values }
    }

    pub fn to_record(&self, issuer_id: i64) -> StockEntryRecord {
        let values = self.values.clone();
        StockEntryRecord {
            issuer_id,
            date: format_iso_date(self.date),
            last_trade_price: values.last_trade_price,
            max_price: values.max_price,
            min_price: values.min_price,
            avg_price: values.avg_price,
            percent_change: values.percent_change,
            volume: values.volume,
            turnover_best: values.turnover_best,
            total_turnover: values.total_turnover,
        }
    }

    pub fn from_record(record: StockEntryRecord) -> Result<Self, ValidationError> {
        let date = parse_iso_date(&record.date)?;
        Ok(Self {
            date,
            values: EntryValues {
                last_trade_price: record.last_trade_price,
                max_price: record.max_price,
                min_price: record.min_price,
                avg_price: record.avg_price,
                percent_change: record.percent_change,
                volume: record.volume,
                turnover_best: record.turnover_best,
                total_turnover: record.total_turnover,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn values_require_exactly_eight_cells() {
        assert!(EntryValues::from_cells(&cells(&["1", "2", "3"])).is_none());

        let values = EntryValues::from_cells(&cells(&[
            "100", "110", "90", "100", "0.5", "1000", "100000", "100000",
        ]))
        .expect("eight cells");
        assert_eq!(values.max_price, "110");
        assert_eq!(values.total_turnover, "100000");
    }

    #[test]
    fn record_conversion_keeps_date_and_values() {
        let values = EntryValues::from_cells(&cells(&[
            "21.500,00", "21.600,00", "21.400,00", "21.512,33", "0,47", "120", "2.581.480", "2.581.480",
        ]))
        .expect("eight cells");
        let entry = StockEntry::new(date!(2023 - 11 - 30), values);

        let record = entry.to_record(7);
        assert_eq!(record.issuer_id, 7);
        assert_eq!(record.date, "2023-11-30");

        let restored = StockEntry::from_record(record).expect("valid record");
        assert_eq!(restored, entry);
    }
}
