use std::time::Duration;

use nfoscan_core::{AppConfig, CancellationFlag, GainerSnapshot, SnapshotDiff};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cli::{Cli, WatchArgs};
use crate::error::CliError;

use super::gainers::{scan, Scan};
use super::CommandResult;

#[derive(Debug, Serialize)]
struct WatchResponseData {
    iteration: u64,
    snapshot_path: String,
    #[serde(flatten)]
    diff: SnapshotDiff,
    scan: Value,
}

/// Repeats the gainers scan until interrupted, emitting one result per run.
///
/// Each complete scan replaces the snapshot file. A scan cut short by Ctrl-C
/// is reported but does not overwrite the previous snapshot.
pub async fn run<F>(
    cli: &Cli,
    args: &WatchArgs,
    config: &AppConfig,
    mut emit: F,
) -> Result<(), CliError>
where
    F: FnMut(CommandResult) -> Result<(), CliError>,
{
    let interval = match args.interval {
        Some(0) => {
            return Err(CliError::Command(String::from(
                "--interval must be greater than zero",
            )))
        }
        Some(seconds) => Duration::from_secs(seconds),
        None => config.scheduler.interval(),
    };

    let cancel = CancellationFlag::new();
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let signal = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after the current scan");
                cancel.cancel();
                let _ = stop_tx.send(true);
            }
        })
    };

    let mut iteration = 0_u64;
    let outcome = loop {
        iteration += 1;
        let result = match scan(cli, &args.gainers, config, &cancel).await {
            Ok(current) => record(args, iteration, current),
            Err(error) => Err(error),
        };
        if let Err(error) = result.and_then(&mut emit) {
            break Err(error);
        }

        if args.once || cancel.is_cancelled() {
            break Ok(());
        }

        info!(iteration, next_in_secs = interval.as_secs(), "waiting for next scan");
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            Ok(()) = stop_rx.changed() => break Ok(()),
        }
    };

    signal.abort();
    outcome
}

fn record(args: &WatchArgs, iteration: u64, current: Scan) -> Result<CommandResult, CliError> {
    let previous = GainerSnapshot::load(&args.snapshot)?;
    let diff = current.snapshot.diff(&previous);

    let Scan {
        snapshot,
        partial,
        result,
    } = current;
    let mut warnings = result.warnings;

    if partial {
        warnings.push(String::from(
            "scan was interrupted; previous snapshot left unchanged",
        ));
    } else {
        snapshot.save(&args.snapshot)?;
    }
    if !diff.is_empty() {
        info!(iteration, added = ?diff.added, removed = ?diff.removed, "gainer set changed");
    }

    let data = serde_json::to_value(WatchResponseData {
        iteration,
        snapshot_path: args.snapshot.display().to_string(),
        diff,
        scan: result.data,
    })?;
    Ok(CommandResult::ok(data).with_warnings(warnings))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, Command};

    fn watch_args(cli: Cli) -> WatchArgs {
        match cli.command {
            Command::Watch(args) => args,
            _ => panic!("expected watch command"),
        }
    }

    fn scan_of(names: &[&str], partial: bool) -> Scan {
        Scan {
            snapshot: GainerSnapshot::from_names(names),
            partial,
            result: CommandResult::ok(Value::Null),
        }
    }

    #[test]
    fn record_diffs_against_previous_snapshot_and_replaces_it() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("options_up_latest.json");
        GainerSnapshot::from_names(["INFY", "SBIN"]).save(&path).expect("seed");

        let args = watch_args(Cli::parse_from([
            "nfoscan",
            "watch",
            "--once",
            "--snapshot",
            path.to_str().expect("utf-8 path"),
        ]));

        let result = record(&args, 1, scan_of(&["SBIN", "TCS"], false)).expect("recorded");
        assert_eq!(result.data["added"], serde_json::json!(["TCS"]));
        assert_eq!(result.data["removed"], serde_json::json!(["INFY"]));
        assert!(result.warnings.is_empty());

        let saved = GainerSnapshot::load(&path).expect("load");
        assert_eq!(saved, GainerSnapshot::from_names(["SBIN", "TCS"]));
    }

    #[test]
    fn interrupted_scan_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("options_up_latest.json");
        GainerSnapshot::from_names(["INFY"]).save(&path).expect("seed");

        let args = watch_args(Cli::parse_from([
            "nfoscan",
            "watch",
            "--snapshot",
            path.to_str().expect("utf-8 path"),
        ]));

        let result = record(&args, 2, scan_of(&[], true)).expect("recorded");
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(
            GainerSnapshot::load(&path).expect("load"),
            GainerSnapshot::from_names(["INFY"])
        );
    }
}
