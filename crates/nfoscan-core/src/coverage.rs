//! Per-underlying coverage of a resolution run.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{ResolvedContract, Underlying};
use crate::ResolveError;

/// Why an underlying was dropped from the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoSpotPrice,
    EmptyOptionChain,
}

impl SkipReason {
    /// Maps a per-underlying resolve error to its skip reason.
    pub fn from_error(error: &ResolveError) -> Option<Self> {
        match error {
            ResolveError::NoSpotPrice { .. } => Some(Self::NoSpotPrice),
            ResolveError::EmptyOptionChain { .. } => Some(Self::EmptyOptionChain),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoSpotPrice => "no_spot_price",
            Self::EmptyOptionChain => "empty_option_chain",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnderlyingCoverage {
    pub underlying: Underlying,
    pub found_fut: bool,
    pub found_opt: bool,
    pub futures: usize,
    pub options: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub skipped: Option<SkipReason>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub requested_count: usize,
    pub matched_count: usize,
    pub futures_count: usize,
    pub options_count: usize,
    pub missing_underlyings: Vec<Underlying>,
    pub entries: Vec<UnderlyingCoverage>,
}

/// Summarises which requested underlyings ended up with contracts.
///
/// An underlying is missing when it has neither futures nor retained options,
/// or when it was skipped for a per-underlying error.
pub fn build_coverage(
    underlyings: &[Underlying],
    contracts: &[ResolvedContract],
    skipped: &HashMap<Underlying, SkipReason>,
) -> CoverageSummary {
    let mut summary = CoverageSummary {
        requested_count: underlyings.len(),
        ..CoverageSummary::default()
    };

    for underlying in underlyings {
        let (futures, options) = contracts
            .iter()
            .filter(|contract| &contract.underlying == underlying)
            .fold((0_usize, 0_usize), |(futures, options), contract| {
                if contract.instrument_type.is_future() {
                    (futures + 1, options)
                } else if contract.instrument_type.is_option() {
                    (futures, options + 1)
                } else {
                    (futures, options)
                }
            });

        let skip = skipped.get(underlying).copied();
        if (futures == 0 && options == 0) || skip.is_some() {
            summary.missing_underlyings.push(underlying.clone());
        }

        summary.futures_count += futures;
        summary.options_count += options;
        summary.entries.push(UnderlyingCoverage {
            underlying: underlying.clone(),
            found_fut: futures > 0,
            found_opt: options > 0,
            futures,
            options,
            skipped: skip,
        });
    }

    summary.matched_count = summary.requested_count - summary.missing_underlyings.len();
    summary
}
