use nfoscan_core::{resolve_cycle, AppConfig, ExpiryToken};
use serde::Serialize;
use time::macros::format_description;
use time::Date;

use crate::cli::CycleArgs;
use crate::error::CliError;

use super::{select_cycle, CommandResult};

#[derive(Debug, Serialize)]
struct CycleResponseData {
    cycle: ExpiryToken,
    year: i32,
    month: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    next: Option<ExpiryToken>,
}

pub fn run(args: &CycleArgs, config: &AppConfig) -> Result<CommandResult, CliError> {
    let cycle = match (args.year, args.month, args.date.as_deref()) {
        (Some(year), Some(month), _) => resolve_cycle(year, month)?,
        (_, _, Some(date)) => ExpiryToken::for_date(parse_date(date)?),
        _ => select_cycle(None, config)?,
    };
    let next = if args.next { Some(cycle.next()?) } else { None };

    let data = serde_json::to_value(CycleResponseData {
        cycle,
        year: cycle.year(),
        month: cycle.month(),
        next,
    })?;
    Ok(CommandResult::ok(data))
}

fn parse_date(input: &str) -> Result<Date, CliError> {
    Date::parse(input.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|error| CliError::Command(format!("invalid date '{input}': {error}")))
}
