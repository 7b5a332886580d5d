use nfoscan_core::{AppConfig, CancellationFlag, ContractSummary, EnrichmentState, ResolutionReport};
use serde::Serialize;

use crate::cli::{Cli, RunArgs};
use crate::error::CliError;

use super::{resolve_once, CommandResult};

#[derive(Debug, Serialize)]
struct ResolveResponseData<'a> {
    summary: ContractSummary,
    #[serde(flatten)]
    report: &'a ResolutionReport,
}

pub async fn run(cli: &Cli, args: &RunArgs, config: &AppConfig) -> Result<CommandResult, CliError> {
    let report = resolve_once(cli, args, config, &CancellationFlag::new()).await?;

    let data = serde_json::to_value(ResolveResponseData {
        summary: report.summary(),
        report: &report,
    })?;

    let mut result = CommandResult::ok(data).with_warnings(report.warnings.clone());
    if report.enrichment == EnrichmentState::NotEnriched && !args.no_enrich {
        result = result.with_warning("no quote batch returned data; contracts are not enriched");
    }
    Ok(result)
}
