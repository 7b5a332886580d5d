use nfoscan_core::{
    options_up, AppConfig, CancellationFlag, EnrichmentState, ExpiryToken, Gainer, GainerSnapshot,
};
use serde::Serialize;
use uuid::Uuid;

use crate::cli::{Cli, GainersArgs};
use crate::error::CliError;

use super::{resolve_once, CommandResult};

#[derive(Debug, Serialize)]
struct GainersResponseData {
    run_id: Uuid,
    cycle: ExpiryToken,
    threshold_pct: f64,
    enrichment: EnrichmentState,
    partial: bool,
    underlyings: Vec<String>,
    gainers: Vec<Gainer>,
}

/// Outcome of one scan, shared with the watch loop.
pub(super) struct Scan {
    pub snapshot: GainerSnapshot,
    pub partial: bool,
    pub result: CommandResult,
}

pub async fn run(
    cli: &Cli,
    args: &GainersArgs,
    config: &AppConfig,
) -> Result<CommandResult, CliError> {
    Ok(scan(cli, args, config, &CancellationFlag::new()).await?.result)
}

pub(super) async fn scan(
    cli: &Cli,
    args: &GainersArgs,
    config: &AppConfig,
    cancel: &CancellationFlag,
) -> Result<Scan, CliError> {
    let threshold_pct = threshold(args, config)?;
    let report = resolve_once(cli, &args.run, config, cancel).await?;

    let gainers = options_up(&report.contracts, threshold_pct);
    let snapshot = GainerSnapshot::from_gainers(&gainers);

    let mut warnings = report.warnings;
    if report.enrichment == EnrichmentState::NotEnriched {
        warnings.push(String::from(
            "contracts are not enriched; no option can qualify",
        ));
    }

    let data = serde_json::to_value(GainersResponseData {
        run_id: report.run_id,
        cycle: report.cycle,
        threshold_pct,
        enrichment: report.enrichment,
        partial: report.partial,
        underlyings: snapshot.names().map(str::to_owned).collect(),
        gainers,
    })?;

    Ok(Scan {
        snapshot,
        partial: report.partial,
        result: CommandResult::ok(data).with_warnings(warnings),
    })
}

fn threshold(args: &GainersArgs, config: &AppConfig) -> Result<f64, CliError> {
    let value = args
        .threshold
        .unwrap_or(config.options_up_threshold_percent);
    if !value.is_finite() {
        return Err(CliError::Command(format!("threshold must be finite, got {value}")));
    }
    Ok(value)
}
