use tracing::info;

use histsync_core::{Dispatcher, IssuerCode, RemoteSource, SyncConfig};

use crate::cli::{Cli, SyncArgs};
use crate::error::CliError;

use super::{open_warehouse, CommandResult};

pub async fn run(args: &SyncArgs, cli: &Cli, mut config: SyncConfig) -> Result<CommandResult, CliError> {
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(max_in_flight) = args.max_in_flight {
        config.max_in_flight = max_in_flight;
    }

    let mut codes = args
        .codes
        .iter()
        .map(|raw| IssuerCode::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;

    if codes.is_empty() {
        codes = config.mse_source().fetch_issuer_list().await?;
        info!(issuers = codes.len(), "fetched issuer list");
    }

    let warehouse = open_warehouse(cli)?;
    let dispatcher = Dispatcher::from_config(warehouse, &config);
    let summary = tokio::task::spawn_blocking(move || dispatcher.run(codes)).await?;

    let data = serde_json::to_value(&summary)?;
    Ok(CommandResult::ok(data).with_counts(summary.total, summary.failed))
}
