mod issuers;
mod show;
mod sync;

use serde_json::Value;

use histsync_core::SyncConfig;
use histsync_warehouse::{Warehouse, WarehouseConfig};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub struct CommandResult {
    pub data: Value,
    pub total: usize,
    pub failed: usize,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            total: 0,
            failed: 0,
        }
    }

    pub fn with_counts(mut self, total: usize, failed: usize) -> Self {
        self.total = total;
        self.failed = failed;
        self
    }
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    let config = sync_config(cli);

    match &cli.command {
        Command::Sync(args) => sync::run(args, cli, config).await,
        Command::Issuers => issuers::run(&config).await,
        Command::Show(args) => show::run(args, &open_warehouse(cli)?),
    }
}

/// Environment-derived configuration with global flags applied on top.
fn sync_config(cli: &Cli) -> SyncConfig {
    let mut config = SyncConfig::from_env();
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.request_timeout_ms = timeout_ms;
    }
    config
}

fn open_warehouse(cli: &Cli) -> Result<Warehouse, CliError> {
    let config = match &cli.db {
        Some(path) => WarehouseConfig::at_path(path),
        None => WarehouseConfig::default(),
    };
    Ok(Warehouse::open(config)?)
}
