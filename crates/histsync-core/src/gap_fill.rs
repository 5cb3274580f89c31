//! Carry-forward entries for days without trading.
//!
//! Every calendar day counts, weekends and holidays included. There is no
//! trading calendar.

use time::Date;

use crate::domain::StockEntry;

/// Entries for each day strictly after `last.date` up to and including
/// `today`, all carrying `last`'s values. Empty when `last.date >= today`.
pub fn fill_gap(last: &StockEntry, today: Date) -> Vec<StockEntry> {
    let mut filled = Vec::new();
    let mut cursor = last.date;
    while cursor < today {
        let Some(next) = cursor.next_day() else {
            break;
        };
        filled.push(StockEntry::new(next, last.values.clone()));
        cursor = next;
    }
    filled
}
