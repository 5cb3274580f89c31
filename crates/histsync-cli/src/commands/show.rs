use serde::Serialize;

use histsync_core::domain::{format_iso_date, parse_iso_date};
use histsync_core::IssuerCode;
use histsync_warehouse::{CompanyRecord, StockEntryRecord, Warehouse};

use crate::cli::ShowArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct ShowResponseData {
    issuer: IssuerCode,
    company: Option<CompanyRecord>,
    entry: StockEntryRecord,
}

pub fn run(args: &ShowArgs, warehouse: &Warehouse) -> Result<CommandResult, CliError> {
    let code = IssuerCode::parse(&args.code)?;
    let issuer_id = warehouse
        .find_issuer_by_code(code.as_str())?
        .ok_or_else(|| CliError::NotFound(format!("issuer '{code}'")))?;

    let date = match &args.date {
        Some(raw) => format_iso_date(parse_iso_date(raw)?),
        None => warehouse
            .last_persisted_date(issuer_id)?
            .ok_or_else(|| CliError::NotFound(format!("history for '{code}'")))?,
    };

    let entry = warehouse
        .read_entry(issuer_id, &date)?
        .ok_or_else(|| CliError::NotFound(format!("entry for '{code}' on {date}")))?;
    let company = warehouse.company_for_issuer(code.as_str())?;

    let data = serde_json::to_value(ShowResponseData {
        issuer: code,
        company,
        entry,
    })?;
    Ok(CommandResult::ok(data).with_counts(1, 0))
}
