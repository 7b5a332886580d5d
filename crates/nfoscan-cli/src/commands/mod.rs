mod cycle;
mod gainers;
mod resolve;
mod watch;

use std::path::Path;
use std::sync::Arc;

use nfoscan_core::{
    AppConfig, CancellationFlag, ExpiryToken, ResolutionReport, ResolutionRequest, Resolver,
    SnapshotBroker, SyntheticBroker, Underlying, ValidationError,
};
use serde_json::Value;
use time::macros::offset;
use time::{Date, OffsetDateTime};
use tracing::{debug, info};

use crate::cli::{Cli, Command, RunArgs};
use crate::error::CliError;
use crate::output::{self, Output};

#[derive(Debug)]
pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    let config = load_config(&cli.config)?;

    match &cli.command {
        Command::Cycle(args) => emit(cli, "cycle", cycle::run(args, &config)?),
        Command::Resolve(args) => emit(cli, "resolve", resolve::run(cli, args, &config).await?),
        Command::Gainers(args) => emit(cli, "gainers", gainers::run(cli, args, &config).await?),
        Command::Watch(args) => {
            watch::run(cli, args, &config, |result| emit(cli, "watch", result)).await
        }
    }
}

fn emit(cli: &Cli, command: &'static str, result: CommandResult) -> Result<(), CliError> {
    output::render(&Output::new(command, result), cli.format, cli.pretty)
}

/// Config file followed by `NFOSCAN_*` environment overrides.
fn load_config(path: &Path) -> Result<AppConfig, CliError> {
    let config = AppConfig::from_file(path)?.with_env_overrides()?;
    debug!(
        path = %path.display(),
        universe = %config.universe_path.display(),
        "configuration loaded"
    );
    Ok(config)
}

/// Reads one underlying per line. Blank lines and `#` comments are skipped.
fn load_universe(path: &Path) -> Result<Vec<Underlying>, CliError> {
    let content = std::fs::read_to_string(path).map_err(|error| {
        if error.kind() == std::io::ErrorKind::NotFound {
            CliError::Command(format!("universe file '{}' not found", path.display()))
        } else {
            CliError::Io(error)
        }
    })?;

    parse_universe(&content).map_err(|(line, source)| CliError::Universe {
        path: path.display().to_string(),
        line,
        source,
    })
}

fn parse_universe(content: &str) -> Result<Vec<Underlying>, (usize, ValidationError)> {
    content
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(number, line)| Underlying::parse(line).map_err(|error| (number, error)))
        .collect()
}

/// Symbols given on the command line win over the universe file.
fn select_universe(
    cli: &Cli,
    symbols: &[String],
    config: &AppConfig,
) -> Result<Vec<Underlying>, CliError> {
    if !symbols.is_empty() {
        return symbols
            .iter()
            .map(|symbol| Underlying::parse(symbol).map_err(CliError::from))
            .collect();
    }

    let path = cli.universe.as_deref().unwrap_or(&config.universe_path);
    let universe = load_universe(path)?;
    info!(path = %path.display(), underlyings = universe.len(), "universe loaded");
    Ok(universe)
}

/// Explicit token, then the configured override, then the current IST month.
fn select_cycle(explicit: Option<&str>, config: &AppConfig) -> Result<ExpiryToken, CliError> {
    if let Some(token) = explicit {
        return Ok(ExpiryToken::parse(token)?);
    }
    if let Some(token) = config.month_override_token()? {
        return Ok(token);
    }
    Ok(ExpiryToken::for_date(market_today()))
}

/// Calendar date on the exchange (UTC+05:30).
fn market_today() -> Date {
    OffsetDateTime::now_utc().to_offset(offset!(+5:30)).date()
}

fn build_resolver(
    cli: &Cli,
    config: &AppConfig,
    universe: &[Underlying],
    cycle: ExpiryToken,
) -> Result<Resolver, CliError> {
    if let Some(path) = &cli.snapshot_file {
        let broker = Arc::new(SnapshotBroker::load(path)?);
        info!(
            path = %path.display(),
            instruments = broker.instrument_count(),
            "using broker snapshot"
        );
        return Ok(Resolver::from_config(config, broker.clone(), broker.clone(), broker));
    }

    if cli.mock {
        let broker = Arc::new(SyntheticBroker::new(universe.to_vec(), cycle));
        info!(instruments = broker.instruments().len(), "using synthetic broker");
        return Ok(Resolver::from_config(config, broker.clone(), broker.clone(), broker));
    }

    Err(CliError::Command(String::from(
        "no market data source configured; pass --snapshot-file <path> or --mock",
    )))
}

/// Runs one resolution for the shared run options.
async fn resolve_once(
    cli: &Cli,
    args: &RunArgs,
    config: &AppConfig,
    cancel: &CancellationFlag,
) -> Result<ResolutionReport, CliError> {
    let universe = select_universe(cli, &args.symbols, config)?;
    let cycle = select_cycle(args.cycle.as_deref(), config)?;
    let window = args.max_strikes.unwrap_or(config.options_filter_max_strikes);

    let resolver = build_resolver(cli, config, &universe, cycle)?.with_cancellation(cancel.clone());
    let mut request = ResolutionRequest::for_token(universe, cycle).with_window_size(window);
    if args.no_enrich {
        request = request.without_enrichment();
    }

    Ok(resolver.run(&request).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn universe_skips_blank_and_comment_lines() {
        let universe = parse_universe("# banks\nSBIN\n\n  infy  \nM&M\n").expect("valid universe");
        let names: Vec<&str> = universe.iter().map(Underlying::as_str).collect();
        assert_eq!(names, vec!["SBIN", "INFY", "M&M"]);
    }

    #[test]
    fn universe_file_accepts_symbols_with_leading_digits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("universe.txt");
        std::fs::write(&path, "SBIN\n360ONE\n").expect("write universe");

        let universe = load_universe(&path).expect("valid universe");
        let names: Vec<&str> = universe.iter().map(Underlying::as_str).collect();
        assert_eq!(names, vec!["SBIN", "360ONE"]);
    }

    #[test]
    fn universe_reports_offending_line() {
        let (line, _) = parse_universe("SBIN\nINFY\nBAD SYMBOL\n").expect_err("must fail");
        assert_eq!(line, 3);
    }

    #[test]
    fn missing_universe_file_is_a_command_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let error = load_universe(&dir.path().join("absent.txt")).expect_err("must fail");
        assert!(matches!(error, CliError::Command(_)));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn explicit_cycle_beats_config_override() {
        let config = AppConfig {
            month_override: String::from("25NOV"),
            ..AppConfig::default()
        };

        let explicit = select_cycle(Some("25oct"), &config).expect("valid token");
        assert_eq!(explicit.to_string(), "25OCT");

        let configured = select_cycle(None, &config).expect("valid override");
        assert_eq!(configured.to_string(), "25NOV");
    }

    #[test]
    fn cycle_defaults_to_current_market_month() {
        let cycle = select_cycle(None, &AppConfig::default()).expect("current month");
        assert_eq!(cycle, ExpiryToken::for_date(market_today()));
    }
}
