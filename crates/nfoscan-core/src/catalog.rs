//! Catalog matching.
//!
//! A raw record is accepted when all of the following hold:
//!
//! - its `name` equals a requested underlying exactly (after normalisation),
//! - its tradingsymbol contains the rendered expiry token (case-sensitive),
//! - its type is FUT, CE or PE.
//!
//! Substring matching is applied to the expiry component only. `SBIN` never
//! picks up `SBICARD` contracts.
//!
//! Duplicate [`ContractKey`]s are collapsed with a **first match wins**
//! policy: the earliest record in catalog order is kept.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::calendar::ExpiryToken;
use crate::domain::{ContractKey, RawInstrument, ResolvedContract, Underlying};

/// Filters `raw` down to the contracts of `underlyings` for the `token` cycle.
///
/// Output is grouped by underlying in requested order and keeps catalog order
/// within a group. Underlyings with no match contribute nothing.
pub fn match_contracts(
    raw: &[RawInstrument],
    underlyings: &[Underlying],
    token: ExpiryToken,
) -> Vec<ResolvedContract> {
    let rendered = token.to_string();
    let requested = dedup_underlyings(underlyings);
    let positions: HashMap<&str, usize> = requested
        .iter()
        .enumerate()
        .map(|(position, underlying)| (underlying.as_str(), position))
        .collect();

    let mut groups: Vec<Vec<ResolvedContract>> = vec![Vec::new(); requested.len()];
    let mut seen: HashSet<ContractKey> = HashSet::new();
    let mut duplicates = 0_usize;

    for record in raw {
        if !record.instrument_type.is_derivative() || !record.tradingsymbol.contains(&rendered) {
            continue;
        }

        let name = record.name.trim().to_ascii_uppercase();
        let Some(&position) = positions.get(name.as_str()) else {
            continue;
        };

        let contract = ResolvedContract::from_raw(requested[position].clone(), record);
        if !seen.insert(contract.key()) {
            duplicates += 1;
            continue;
        }
        groups[position].push(contract);
    }

    if duplicates > 0 {
        debug!(token = %rendered, duplicates, "collapsed duplicate catalog records");
    }

    groups.into_iter().flatten().collect()
}

/// Futures and options of one underlying, in resolved order.
#[derive(Debug, Clone, PartialEq)]
pub struct UnderlyingChain {
    pub underlying: Underlying,
    pub futures: Vec<ResolvedContract>,
    pub options: Vec<ResolvedContract>,
}

/// Splits a matched contract list into per-underlying chains, in first-seen order.
pub fn split_chains(contracts: &[ResolvedContract]) -> Vec<UnderlyingChain> {
    let mut index: HashMap<Underlying, usize> = HashMap::new();
    let mut chains: Vec<UnderlyingChain> = Vec::new();

    for contract in contracts {
        let slot = *index.entry(contract.underlying.clone()).or_insert_with(|| {
            chains.push(UnderlyingChain {
                underlying: contract.underlying.clone(),
                futures: Vec::new(),
                options: Vec::new(),
            });
            chains.len() - 1
        });

        let chain = &mut chains[slot];
        if contract.instrument_type.is_future() {
            chain.futures.push(contract.clone());
        } else if contract.instrument_type.is_option() {
            chain.options.push(contract.clone());
        }
    }

    chains
}

/// Drops repeated underlyings, keeping the first occurrence.
pub(crate) fn dedup_underlyings(underlyings: &[Underlying]) -> Vec<Underlying> {
    let mut seen = HashSet::new();
    underlyings
        .iter()
        .filter(|underlying| seen.insert((*underlying).clone()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use time::macros::date;

    use super::*;
    use crate::calendar::resolve_cycle;
    use crate::domain::{InstrumentToken, InstrumentType};

    fn row(token: u64, symbol: &str, name: &str, kind: &str, strike: Option<i64>) -> RawInstrument {
        RawInstrument {
            instrument_token: InstrumentToken(token),
            tradingsymbol: symbol.to_owned(),
            name: name.to_owned(),
            instrument_type: InstrumentType::parse(kind),
            strike: strike.map(Decimal::from),
            expiry: Some(date!(2025 - 09 - 30)),
            lot_size: 750,
            last_price: None,
        }
    }

    fn underlyings(names: &[&str]) -> Vec<Underlying> {
        names
            .iter()
            .map(|name| Underlying::parse(name).expect("valid symbol"))
            .collect()
    }

    fn catalog() -> Vec<RawInstrument> {
        vec![
            row(1, "SBICARD25SEPFUT", "SBICARD", "FUT", None),
            row(2, "SBIN25SEPFUT", "SBIN", "FUT", None),
            row(3, "SBIN25SEP800CE", "SBIN", "CE", Some(800)),
            row(4, "SBIN25OCTFUT", "SBIN", "FUT", None),
            row(5, "INFY25SEPFUT", "INFY", "FUT", None),
            row(6, "SBIN25SEP800PE", "SBIN", "PE", Some(800)),
            row(7, "SBIN", "SBIN", "EQ", None),
            row(8, "INFY25SEP1500CE", "INFY", "CE", Some(1500)),
        ]
    }

    #[test]
    fn exact_underlying_match_excludes_prefix_siblings() {
        let token = resolve_cycle(2025, 9).expect("valid");
        let matched = match_contracts(&catalog(), &underlyings(&["SBIN"]), token);

        let symbols: Vec<&str> = matched.iter().map(|c| c.tradingsymbol.as_str()).collect();
        assert_eq!(symbols, vec!["SBIN25SEPFUT", "SBIN25SEP800CE", "SBIN25SEP800PE"]);
    }

    #[test]
    fn output_is_grouped_in_requested_order() {
        let token = resolve_cycle(2025, 9).expect("valid");
        let matched = match_contracts(&catalog(), &underlyings(&["INFY", "SBIN", "TCS"]), token);

        let tokens: Vec<u64> = matched.iter().map(|c| c.instrument_token.get()).collect();
        assert_eq!(tokens, vec![5, 8, 2, 3, 6]);
    }

    #[test]
    fn duplicate_keys_keep_first_occurrence() {
        let mut raw = catalog();
        raw.push(row(99, "SBIN25SEP800CE", "SBIN", "CE", Some(800)));
        let token = resolve_cycle(2025, 9).expect("valid");

        let matched = match_contracts(&raw, &underlyings(&["SBIN"]), token);
        let calls: Vec<u64> = matched
            .iter()
            .filter(|c| c.instrument_type == InstrumentType::Ce)
            .map(|c| c.instrument_token.get())
            .collect();
        assert_eq!(calls, vec![3]);
    }

    #[test]
    fn matching_is_idempotent() {
        let token = resolve_cycle(2025, 9).expect("valid");
        let requested = underlyings(&["SBIN", "INFY"]);
        let first = match_contracts(&catalog(), &requested, token);
        let second = match_contracts(&catalog(), &requested, token);
        assert_eq!(first, second);
    }

    #[test]
    fn catalog_names_are_normalised_before_lookup() {
        let raw = vec![row(1, "SBIN25SEPFUT", " sbin ", "FUT", None)];
        let token = resolve_cycle(2025, 9).expect("valid");
        let matched = match_contracts(&raw, &underlyings(&["SBIN"]), token);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].underlying.as_str(), "SBIN");
    }

    #[test]
    fn repeated_underlyings_are_requested_once() {
        let token = resolve_cycle(2025, 9).expect("valid");
        let matched = match_contracts(&catalog(), &underlyings(&["SBIN", "sbin", "SBIN"]), token);
        assert_eq!(matched.len(), 3);
        assert_eq!(dedup_underlyings(&underlyings(&["SBIN", "INFY", "SBIN"])).len(), 2);
    }

    #[test]
    fn token_match_is_case_sensitive() {
        let raw = vec![row(1, "sbin25sepfut", "SBIN", "FUT", None)];
        let token = resolve_cycle(2025, 9).expect("valid");
        assert!(match_contracts(&raw, &underlyings(&["SBIN"]), token).is_empty());
    }

    #[test]
    fn split_chains_separates_futures_and_options() {
        let token = resolve_cycle(2025, 9).expect("valid");
        let matched = match_contracts(&catalog(), &underlyings(&["SBIN", "INFY"]), token);
        let chains = split_chains(&matched);

        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].underlying.as_str(), "SBIN");
        assert_eq!(chains[0].futures.len(), 1);
        assert_eq!(chains[0].options.len(), 2);
        assert_eq!(chains[1].underlying.as_str(), "INFY");
    }
}
