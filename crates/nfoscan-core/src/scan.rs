//! "Options up" scan and change detection between scans.
//!
//! The scan is a pure filter over enriched contracts. Watch runs persist the
//! set of underlyings that had a qualifying option and diff it against the
//! previous run.

use std::collections::BTreeSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{EnrichedContract, InstrumentToken, InstrumentType, Underlying};
use crate::CoreError;

/// Option whose price rose at least the threshold over the previous close.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gainer {
    pub underlying: Underlying,
    pub tradingsymbol: String,
    pub instrument_token: InstrumentToken,
    pub instrument_type: InstrumentType,
    pub strike: Option<Decimal>,
    pub ltp: f64,
    pub close: f64,
    pub change_pct: f64,
}

/// CE/PE contracts with `change_pct >= threshold_pct`, biggest movers first.
///
/// Ties are ordered by tradingsymbol. Contracts without a change percentage
/// never qualify.
pub fn options_up(contracts: &[EnrichedContract], threshold_pct: f64) -> Vec<Gainer> {
    let mut gainers: Vec<Gainer> = contracts
        .iter()
        .filter(|enriched| enriched.contract.instrument_type.is_option())
        .filter_map(|enriched| {
            let change_pct = enriched.market.change_pct?;
            if change_pct < threshold_pct {
                return None;
            }
            Some(Gainer {
                underlying: enriched.contract.underlying.clone(),
                tradingsymbol: enriched.contract.tradingsymbol.clone(),
                instrument_token: enriched.contract.instrument_token,
                instrument_type: enriched.contract.instrument_type.clone(),
                strike: enriched.contract.strike,
                ltp: enriched.market.ltp?,
                close: enriched.market.close?,
                change_pct,
            })
        })
        .collect();

    gainers.sort_by(|left, right| {
        right
            .change_pct
            .total_cmp(&left.change_pct)
            .then_with(|| left.tradingsymbol.cmp(&right.tradingsymbol))
    });
    gainers
}

/// Sorted, de-duplicated, uppercase underlying names seen in a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct GainerSnapshot {
    names: BTreeSet<String>,
}

/// Names that appeared or disappeared between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Entry of a snapshot file: current (name) or legacy (object) form.
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotEntry {
    Name(String),
    Legacy {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        tradingsymbol: Option<String>,
    },
}

impl SnapshotEntry {
    fn into_name(self) -> Option<String> {
        match self {
            Self::Name(name) => Some(name),
            Self::Legacy { name, tradingsymbol } => name
                .filter(|name| !name.trim().is_empty())
                .or(tradingsymbol),
        }
    }
}

impl GainerSnapshot {
    pub fn from_gainers(gainers: &[Gainer]) -> Self {
        Self::from_names(gainers.iter().map(|gainer| gainer.underlying.as_str()))
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|name| name.as_ref().trim().to_ascii_uppercase())
            .filter(|name| !name.is_empty())
            .collect();
        Self { names }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Changes from `previous` to `self`.
    pub fn diff(&self, previous: &GainerSnapshot) -> SnapshotDiff {
        SnapshotDiff {
            added: self.names.difference(&previous.names).cloned().collect(),
            removed: previous.names.difference(&self.names).cloned().collect(),
        }
    }

    /// Parses a snapshot document, migrating the legacy list-of-objects form.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let entries: Vec<SnapshotEntry> = serde_json::from_str(json)?;
        Ok(Self::from_names(
            entries.into_iter().filter_map(SnapshotEntry::into_name),
        ))
    }

    /// Loads the previous snapshot. A missing file is an empty snapshot.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_json(&content),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no previous snapshot");
                Ok(Self::default())
            }
            Err(error) => Err(error.into()),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

impl From<Vec<String>> for GainerSnapshot {
    fn from(value: Vec<String>) -> Self {
        Self::from_names(value)
    }
}

impl From<GainerSnapshot> for Vec<String> {
    fn from(value: GainerSnapshot) -> Self {
        value.names.into_iter().collect()
    }
}
