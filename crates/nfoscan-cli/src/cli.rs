//! CLI argument definitions for nfoscan.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cycle` | Print the expiry token for a cycle |
//! | `resolve` | Resolve, filter and enrich the universe's contracts |
//! | `gainers` | Resolve, then list options up by at least the threshold |
//! | `watch` | Repeat the gainers scan and report changes between runs |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | `config/app_config.json` | Application config file |
//! | `--universe` | config `universe_path` | Underlying list, one symbol per line |
//! | `--snapshot-file` | none | Serve catalog and quotes from a broker dump |
//! | `--mock` | `false` | Use the deterministic synthetic broker |
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//!
//! # Examples
//!
//! ```bash
//! nfoscan cycle --year 2025 --month 9
//! nfoscan --mock resolve --max-strikes 2 --pretty
//! nfoscan --snapshot-file dumps/session.json gainers --threshold 150
//! nfoscan --mock watch --once --snapshot output/options_up_latest.json
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub const DEFAULT_CONFIG_PATH: &str = "config/app_config.json";

/// NFO contract resolver
///
/// Resolves futures and near-ATM options for a universe of underlyings
/// against the brokerage instrument catalog and enriches them with quotes.
#[derive(Debug, Parser)]
#[command(name = "nfoscan", author, version, about = "NFO contract resolver")]
pub struct Cli {
    /// Application config file (JSON). Missing file means defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Underlying list, overriding the configured universe path.
    #[arg(long, global = true)]
    pub universe: Option<PathBuf>,

    /// Broker dump (JSON) providing catalog, spots and quotes.
    #[arg(long, global = true, conflicts_with = "mock")]
    pub snapshot_file: Option<PathBuf>,

    /// Use the deterministic synthetic broker.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the expiry token (e.g. 25SEP) for a cycle.
    ///
    /// Without arguments the month override from config is used, falling
    /// back to the current IST calendar month.
    Cycle(CycleArgs),

    /// Resolve the universe's contracts for a cycle and enrich them with quotes.
    Resolve(RunArgs),

    /// Resolve, then list options whose price rose at least `--threshold` percent.
    Gainers(GainersArgs),

    /// Repeat the gainers scan and report added/removed underlyings.
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
pub struct CycleArgs {
    #[arg(long, requires = "month", conflicts_with = "date")]
    pub year: Option<i32>,

    #[arg(long, requires = "year")]
    pub month: Option<u8>,

    /// Calendar date (YYYY-MM-DD) whose cycle to print.
    #[arg(long)]
    pub date: Option<String>,

    /// Also print the following cycle.
    #[arg(long, default_value_t = false)]
    pub next: bool,
}

/// Options shared by every command that runs the pipeline.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Underlyings to resolve, overriding the universe file.
    pub symbols: Vec<String>,

    /// Cycle token such as 25OCT, overriding config.
    #[arg(long)]
    pub cycle: Option<String>,

    /// Strike steps kept on each side of ATM.
    #[arg(long)]
    pub max_strikes: Option<u32>,

    /// Resolve only; skip quote enrichment.
    #[arg(long, default_value_t = false)]
    pub no_enrich: bool,
}

#[derive(Debug, Args)]
pub struct GainersArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Minimum change percent over the previous close.
    #[arg(long)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub gainers: GainersArgs,

    /// File holding the previous run's underlying names.
    #[arg(long, default_value = "output/options_up_latest.json")]
    pub snapshot: PathBuf,

    /// Run a single scan and exit.
    #[arg(long, default_value_t = false)]
    pub once: bool,

    /// Seconds between scans, overriding config.
    #[arg(long)]
    pub interval: Option<u64>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "nfoscan",
            "resolve",
            "SBIN",
            "INFY",
            "--mock",
            "--format",
            "table",
            "--max-strikes",
            "2",
        ])
        .expect("valid arguments");

        assert!(cli.mock);
        assert_eq!(cli.format, OutputFormat::Table);
        let Command::Resolve(args) = cli.command else {
            panic!("expected resolve command");
        };
        assert_eq!(args.symbols, vec!["SBIN", "INFY"]);
        assert_eq!(args.max_strikes, Some(2));
    }

    #[test]
    fn mock_and_snapshot_are_exclusive() {
        let result = Cli::try_parse_from([
            "nfoscan",
            "--mock",
            "--snapshot-file",
            "dump.json",
            "resolve",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn watch_accepts_once_and_threshold() {
        let cli = Cli::try_parse_from([
            "nfoscan", "watch", "--once", "--threshold", "150", "--snapshot", "out/prev.json",
        ])
        .expect("valid arguments");

        let Command::Watch(args) = cli.command else {
            panic!("expected watch command");
        };
        assert!(args.once);
        assert_eq!(args.gainers.threshold, Some(150.0));
        assert_eq!(args.snapshot, PathBuf::from("out/prev.json"));
    }
}
