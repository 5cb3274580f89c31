use serde::Serialize;

use histsync_core::{IssuerCode, RemoteSource, SyncConfig};

use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct IssuersResponseData {
    count: usize,
    issuers: Vec<IssuerCode>,
}

pub async fn run(config: &SyncConfig) -> Result<CommandResult, CliError> {
    let issuers = config.mse_source().fetch_issuer_list().await?;
    let total = issuers.len();
    let data = serde_json::to_value(IssuersResponseData {
        count: total,
        issuers,
    })?;
    Ok(CommandResult::ok(data).with_counts(total, 0))
}
