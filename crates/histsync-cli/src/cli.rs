//! CLI argument definitions for histsync.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sync` | Fetch and reconcile stock history into the warehouse |
//! | `issuers` | List issuer codes currently on the exchange |
//! | `show` | Print a stored entry for an issuer |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--db` | `$HISTSYNC_HOME/warehouse.duckdb` | Warehouse database file |
//! | `--base-url` | `https://www.mse.mk` | Exchange website root |
//! | `--timeout-ms` | `30000` | Per-request timeout in ms |
//! | `--pretty` | `false` | Pretty-print JSON output |
//!
//! # Examples
//!
//! ```bash
//! # Sync every listed issuer
//! histsync sync
//!
//! # Sync two issuers with four workers
//! histsync sync ALK KMB --workers 4 --pretty
//!
//! # Show the latest stored day for ALK
//! histsync show ALK
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Incremental stock-history sync for the Macedonian Stock Exchange.
///
/// Logs go to stderr (filter with RUST_LOG); results are printed to stdout
/// as JSON.
#[derive(Debug, Parser)]
#[command(
    name = "histsync",
    author,
    version,
    about = "Incremental stock-history sync for the Macedonian Stock Exchange"
)]
pub struct Cli {
    /// Path to the DuckDB warehouse file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Exchange website root URL.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Per-request timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch missing history and fill gaps for issuers.
    ///
    /// With no codes, the current issuer list is fetched first.
    ///
    /// # Examples
    ///
    ///   histsync sync
    ///   histsync sync ALK KMB --workers 2
    ///   histsync sync --fail-on-error
    Sync(SyncArgs),

    /// List issuer codes currently on the exchange schedule.
    Issuers,

    /// Print a stored entry for an issuer.
    ///
    /// # Examples
    ///
    ///   histsync show ALK
    ///   histsync show ALK 2024-01-05
    Show(ShowArgs),
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Issuer codes to sync (all listed issuers when omitted).
    pub codes: Vec<String>,

    /// Worker threads in the pool.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Concurrent requests per worker.
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// Exit with code 3 when any issuer failed.
    #[arg(long, default_value_t = false)]
    pub fail_on_error: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Issuer code.
    pub code: String,

    /// Day as YYYY-MM-DD (latest stored day when omitted).
    pub date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sync_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "histsync",
            "sync",
            "ALK",
            "KMB",
            "--workers",
            "4",
            "--fail-on-error",
            "--db",
            "/tmp/h.duckdb",
        ])
        .expect("valid arguments");

        let Command::Sync(args) = cli.command else {
            panic!("expected sync command");
        };
        assert_eq!(args.codes, vec!["ALK", "KMB"]);
        assert_eq!(args.workers, Some(4));
        assert!(args.fail_on_error);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/h.duckdb")));
    }

    #[test]
    fn show_date_is_optional() {
        let cli = Cli::try_parse_from(["histsync", "show", "ALK"]).expect("valid arguments");
        let Command::Show(args) = cli.command else {
            panic!("expected show command");
        };
        assert_eq!(args.code, "ALK");
        assert!(args.date.is_none());
    }
}
