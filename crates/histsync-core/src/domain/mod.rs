//! # Domain Models
//!
//! Typed values flowing through the sync pipeline.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`IssuerCode`] | Validated issuer code |
//! | [`CompanyProfile`] | Company details scraped from the issuer page |
//! | [`EntryValues`] | The eight value columns of a trading day |
//! | [`StockEntry`] | A dated history entry |
//! | [`FetchWindow`] | Date range requested in one history call |
//!
//! Value columns stay as the exchange prints them (`21.500,00`); the pipeline
//! never interprets them as numbers.

mod calendar;
mod company;
mod entry;
mod issuer_code;
mod window;

pub use calendar::{
    exchange_date_at, exchange_offset, exchange_today, format_iso_date, format_query_date,
    parse_exchange_date, parse_iso_date,
};
pub use company::CompanyProfile;
pub use entry::{EntryValues, RawRow, StockEntry};
pub use issuer_code::IssuerCode;
pub use window::FetchWindow;
