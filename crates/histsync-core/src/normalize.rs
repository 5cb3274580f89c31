//! Raw history rows to typed, deduplicated entries.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::domain::{parse_exchange_date, EntryValues, RawRow, StockEntry};

/// Cells in a complete history row: the date and eight values.
pub const HISTORY_ROW_CELLS: usize = 9;

/// Normalized history of one issuer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedHistory {
    /// Strictly date-ascending, one entry per date.
    pub entries: Vec<StockEntry>,
    /// Rows discarded as incomplete or carrying an unparsable date.
    pub dropped: usize,
}

impl NormalizedHistory {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Normalize the rows of several windows.
///
/// `windows` must be in request order, newest window first. When two
/// different rows claim the same date the one from the oldest window wins,
/// matching a plain insert of every window oldest-first that ignores date
/// conflicts. Identical rows collapse silently.
pub fn normalize<I>(windows: I) -> NormalizedHistory
where
    I: IntoIterator<Item = Vec<RawRow>>,
{
    let mut by_date: BTreeMap<time::Date, StockEntry> = BTreeMap::new();
    let mut dropped = 0;

    for row in windows.into_iter().flatten() {
        let Some(entry) = parse_row(&row) else {
            dropped += 1;
            continue;
        };

        match by_date.entry(entry.date) {
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
            Entry::Occupied(mut kept) => {
                if kept.get() != &entry {
                    warn!(date = %entry.date, "conflicting rows for one date, keeping the older window's");
                    kept.insert(entry);
                }
            }
        }
    }

    if dropped > 0 {
        debug!(dropped, "dropped unusable history rows");
    }

    NormalizedHistory {
        entries: by_date.into_values().collect(),
        dropped,
    }
}

fn parse_row(row: &RawRow) -> Option<StockEntry> {
    if row.len() != HISTORY_ROW_CELLS || row.iter().any(|cell| cell.is_empty()) {
        return None;
    }

    let (date_cell, value_cells) = row.split_first()?;
    let date = match parse_exchange_date(date_cell) {
        Ok(date) => date,
        Err(error) => {
            debug!(error = %error, "skipping history row");
            return None;
        }
    };
    let values = EntryValues::from_cells(value_cells)?;
    Some(StockEntry::new(date, values))
}
