//! ATM strike and strike-window selection for one underlying's option chain.
//!
//! Defaults:
//! - ATM ties resolve toward the lower strike.
//! - Only strikes present in the chain are selected. Missing strikes are never synthesised.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{ResolvedContract, Underlying};
use crate::ResolveError;

/// Strike window retained for one underlying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeWindow {
    pub underlying: Underlying,
    pub spot: Decimal,
    pub atm_strike: Decimal,
    pub interval: Decimal,
    /// Distinct selected strikes, ascending.
    pub strikes: Vec<Decimal>,
    /// Selected CE/PE contracts in input order.
    pub contracts: Vec<ResolvedContract>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrikeSelector {
    /// Strike steps kept on each side of ATM.
    pub window_size: u32,
    /// Interval used when a chain has fewer than two distinct strikes.
    pub default_interval: Decimal,
}

impl Default for StrikeSelector {
    fn default() -> Self {
        Self {
            window_size: 5,
            default_interval: Decimal::ONE,
        }
    }
}

impl StrikeSelector {
    pub const fn new(window_size: u32, default_interval: Decimal) -> Self {
        Self {
            window_size,
            default_interval,
        }
    }

    pub fn select(
        &self,
        underlying: &Underlying,
        options: &[ResolvedContract],
        spot: Option<Decimal>,
    ) -> Result<StrikeWindow, ResolveError> {
        select_window(
            underlying,
            options,
            spot,
            self.window_size,
            self.default_interval,
        )
    }
}

/// Selects the options within `window_size` interval steps of the ATM strike.
///
/// All expiries present in `options` are windowed around the same ATM.
pub fn select_window(
    underlying: &Underlying,
    options: &[ResolvedContract],
    spot: Option<Decimal>,
    window_size: u32,
    default_interval: Decimal,
) -> Result<StrikeWindow, ResolveError> {
    let distinct: Vec<Decimal> = options
        .iter()
        .filter(|contract| contract.instrument_type.is_option())
        .filter_map(|contract| contract.strike)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if distinct.is_empty() {
        return Err(ResolveError::EmptyOptionChain {
            underlying: underlying.to_string(),
        });
    }

    let spot = spot
        .filter(|price| *price > Decimal::ZERO)
        .ok_or_else(|| ResolveError::NoSpotPrice {
            underlying: underlying.to_string(),
        })?;

    let interval = strike_interval(&distinct).unwrap_or(default_interval);
    let atm = atm_strike(&distinct, spot).ok_or_else(|| ResolveError::EmptyOptionChain {
        underlying: underlying.to_string(),
    })?;
    let reach = interval * Decimal::from(window_size);

    let strikes: Vec<Decimal> = distinct
        .iter()
        .copied()
        .filter(|strike| (*strike - atm).abs() <= reach)
        .collect();

    let contracts = options
        .iter()
        .filter(|contract| contract.instrument_type.is_option())
        .filter(|contract| {
            contract
                .strike
                .is_some_and(|strike| strikes.binary_search(&strike).is_ok())
        })
        .cloned()
        .collect();

    Ok(StrikeWindow {
        underlying: underlying.clone(),
        spot,
        atm_strike: atm,
        interval,
        strikes,
        contracts,
    })
}

/// Minimum positive gap between consecutive sorted distinct strikes.
///
/// `None` when fewer than two distinct strikes exist.
pub fn strike_interval(sorted_distinct: &[Decimal]) -> Option<Decimal> {
    sorted_distinct
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .filter(|gap| *gap > Decimal::ZERO)
        .min()
}

/// Present strike closest to `spot`; ties go to the lower strike.
///
/// `sorted_distinct` must be ascending. `None` when it is empty.
pub fn atm_strike(sorted_distinct: &[Decimal], spot: Decimal) -> Option<Decimal> {
    let (&first, rest) = sorted_distinct.split_first()?;
    let mut best = first;
    let mut best_distance = (best - spot).abs();
    for strike in rest {
        let distance = (*strike - spot).abs();
        // strict comparison keeps the earlier, lower strike on ties
        if distance < best_distance {
            best = *strike;
            best_distance = distance;
        }
    }
    Some(best)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use time::macros::date;

    use super::*;
    use crate::domain::{InstrumentToken, InstrumentType};

    fn option(token: u64, kind: InstrumentType, strike: Decimal) -> ResolvedContract {
        ResolvedContract {
            underlying: Underlying::parse("SBIN").expect("valid"),
            instrument_type: kind,
            strike: Some(strike),
            expiry: Some(date!(2025 - 09 - 30)),
            instrument_token: InstrumentToken(token),
            tradingsymbol: format!("SBIN25SEP{strike}"),
            lot_size: 750,
        }
    }

    fn chain(strikes: &[Decimal]) -> Vec<ResolvedContract> {
        strikes
            .iter()
            .enumerate()
            .flat_map(|(index, strike)| {
                let base = index as u64 * 2;
                [
                    option(base, InstrumentType::Ce, *strike),
                    option(base + 1, InstrumentType::Pe, *strike),
                ]
            })
            .collect()
    }

    fn sbin() -> Underlying {
        Underlying::parse("SBIN").expect("valid")
    }

    #[test]
    fn atm_is_nearest_strike() {
        let strikes = [dec!(90), dec!(95), dec!(100), dec!(105), dec!(110)];
        assert_eq!(atm_strike(&strikes, dec!(101)), Some(dec!(100)));
    }

    #[test]
    fn atm_tie_prefers_lower_strike() {
        assert_eq!(atm_strike(&[dec!(90), dec!(100)], dec!(95)), Some(dec!(90)));
    }

    #[test]
    fn atm_of_no_strikes_is_none() {
        assert_eq!(atm_strike(&[], dec!(95)), None);
    }

    #[test]
    fn interval_is_minimum_positive_gap() {
        assert_eq!(
            strike_interval(&[dec!(90), dec!(100), dec!(102.5), dec!(105)]),
            Some(dec!(2.5))
        );
        assert_eq!(strike_interval(&[dec!(100)]), None);
    }

    #[test]
    fn window_of_two_keeps_whole_five_strike_chain() {
        let options = chain(&[dec!(90), dec!(95), dec!(100), dec!(105), dec!(110)]);
        let window =
            select_window(&sbin(), &options, Some(dec!(101)), 2, dec!(1)).expect("window");

        assert_eq!(window.atm_strike, dec!(100));
        assert_eq!(window.interval, dec!(5));
        assert_eq!(window.strikes.len(), 5);
        assert_eq!(window.contracts.len(), 10);
    }

    #[test]
    fn window_of_one_keeps_neighbours_of_atm() {
        let options = chain(&[dec!(90), dec!(95), dec!(100), dec!(105), dec!(110)]);
        let window =
            select_window(&sbin(), &options, Some(dec!(101)), 1, dec!(1)).expect("window");

        assert_eq!(window.strikes, vec![dec!(95), dec!(100), dec!(105)]);
        assert!(window
            .contracts
            .iter()
            .any(|c| c.instrument_type == InstrumentType::Ce));
        assert!(window
            .contracts
            .iter()
            .any(|c| c.instrument_type == InstrumentType::Pe));
    }

    #[test]
    fn gaps_in_chain_are_not_synthesised() {
        let options = chain(&[dec!(90), dec!(95), dec!(105), dec!(110)]);
        let window =
            select_window(&sbin(), &options, Some(dec!(99)), 1, dec!(1)).expect("window");

        assert_eq!(window.atm_strike, dec!(95));
        assert_eq!(window.strikes, vec![dec!(90), dec!(95)]);
    }

    #[test]
    fn single_strike_uses_default_interval() {
        let options = chain(&[dec!(100)]);
        let window =
            select_window(&sbin(), &options, Some(dec!(150)), 3, dec!(10)).expect("window");
        assert_eq!(window.interval, dec!(10));
        assert_eq!(window.strikes, vec![dec!(100)]);
    }

    #[test]
    fn missing_or_zero_spot_is_rejected() {
        let options = chain(&[dec!(100)]);
        for spot in [None, Some(Decimal::ZERO), Some(dec!(-1))] {
            let err = select_window(&sbin(), &options, spot, 1, dec!(1)).expect_err("must fail");
            assert!(matches!(err, ResolveError::NoSpotPrice { .. }));
        }
    }

    #[test]
    fn empty_chain_is_rejected_before_spot_check() {
        let err = StrikeSelector::default()
            .select(&sbin(), &[], None)
            .expect_err("must fail");
        assert_eq!(
            err,
            ResolveError::EmptyOptionChain {
                underlying: String::from("SBIN")
            }
        );
    }
}
