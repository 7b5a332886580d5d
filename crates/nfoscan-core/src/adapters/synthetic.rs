use std::collections::HashMap;

use rust_decimal::Decimal;
use time::Weekday;

use crate::calendar::ExpiryToken;
use crate::domain::{InstrumentToken, InstrumentType, QuoteSnapshot, RawInstrument, Underlying};
use crate::source::{CatalogSource, QuoteMap, QuoteSource, SourceError, SourceFuture, SpotSource};

const STRIKES_PER_SIDE: i64 = 5;

/// Offline broker that derives a stable catalog, spot set and quote set from
/// the universe alone.
///
/// Each underlying gets a future and an eleven-strike CE/PE chain for the
/// requested cycle and the following one. Prices are seeded by symbol, so the
/// same universe always produces the same data.
#[derive(Debug, Clone)]
pub struct SyntheticBroker {
    instruments: Vec<RawInstrument>,
    spots: HashMap<Underlying, Decimal>,
    quotes: QuoteMap,
}

impl SyntheticBroker {
    pub fn new(universe: Vec<Underlying>, cycle: ExpiryToken) -> Self {
        let cycles: Vec<ExpiryToken> = std::iter::once(cycle).chain(cycle.next().ok()).collect();

        let mut instruments = Vec::new();
        let mut spots = HashMap::new();
        let mut quotes = HashMap::new();

        for (position, underlying) in universe.iter().enumerate() {
            let seed = symbol_seed(underlying);
            let spot = Decimal::from(100 + seed % 2_000) + Decimal::new((seed % 100) as i64, 2);
            let interval = strike_step(spot);
            let center = (spot / interval).round() * interval;
            spots.insert(underlying.clone(), spot);

            let mut next_token = (position as u64 + 1) * 100_000;
            for cycle in &cycles {
                let expiry = cycle.last_weekday(Weekday::Tuesday);
                let future = RawInstrument {
                    instrument_token: InstrumentToken(next_token),
                    tradingsymbol: format!("{underlying}{cycle}FUT"),
                    name: underlying.to_string(),
                    instrument_type: InstrumentType::Fut,
                    strike: None,
                    expiry: Some(expiry),
                    lot_size: lot_size(seed),
                    last_price: decimal_to_f64(spot).map(|price| price * 1.002),
                };
                next_token += 1;
                instruments.push(future);

                for step in -STRIKES_PER_SIDE..=STRIKES_PER_SIDE {
                    let strike = center + interval * Decimal::from(step);
                    for kind in [InstrumentType::Ce, InstrumentType::Pe] {
                        instruments.push(RawInstrument {
                            instrument_token: InstrumentToken(next_token),
                            tradingsymbol: format!(
                                "{underlying}{cycle}{}{kind}",
                                strike.normalize()
                            ),
                            name: underlying.to_string(),
                            instrument_type: kind,
                            strike: Some(strike),
                            expiry: Some(expiry),
                            lot_size: lot_size(seed),
                            last_price: None,
                        });
                        next_token += 1;
                    }
                }
            }
        }

        for instrument in &instruments {
            if let Some(quote) = synthetic_quote(instrument.instrument_token) {
                quotes.insert(instrument.instrument_token, quote);
            }
        }

        Self {
            instruments,
            spots,
            quotes,
        }
    }

    pub fn instruments(&self) -> &[RawInstrument] {
        &self.instruments
    }

    pub fn spot(&self, underlying: &Underlying) -> Option<Decimal> {
        self.spots.get(underlying).copied()
    }

    pub fn quotes(&self) -> &QuoteMap {
        &self.quotes
    }
}

impl CatalogSource for SyntheticBroker {
    fn fetch_instruments<'a>(&'a self) -> SourceFuture<'a, Vec<RawInstrument>> {
        Box::pin(async move { Ok(self.instruments.clone()) })
    }
}

impl SpotSource for SyntheticBroker {
    fn fetch_spot_price<'a>(
        &'a self,
        underlying: &'a Underlying,
    ) -> SourceFuture<'a, Option<Decimal>> {
        Box::pin(async move { Ok(self.spot(underlying)) })
    }
}

impl QuoteSource for SyntheticBroker {
    fn fetch_quotes<'a>(&'a self, tokens: &'a [InstrumentToken]) -> SourceFuture<'a, QuoteMap> {
        Box::pin(async move {
            if tokens.is_empty() {
                return Err(SourceError::invalid_request(
                    "quote request requires at least one instrument",
                ));
            }
            let quotes: QuoteMap = tokens
                .iter()
                .filter_map(|token| self.quotes.get(token).map(|quote| (*token, quote.clone())))
                .collect();
            Ok(quotes)
        })
    }
}

fn synthetic_quote(token: InstrumentToken) -> Option<QuoteSnapshot> {
    let seed = token.get();
    let close = 10.0 + (seed % 90) as f64;
    // every eleventh instrument is a big mover
    let factor = if seed % 11 == 0 {
        3.5
    } else {
        0.8 + (seed % 40) as f64 / 100.0
    };
    let ltp = (close * factor * 100.0).round() / 100.0;
    let high = ltp.max(close) * 1.01;
    let low = ltp.min(close) * 0.99;

    QuoteSnapshot::new(
        ltp,
        Some(close),
        Some(high),
        Some(low),
        Some(close),
        Some(1_000 + seed % 50_000),
    )
    .ok()
}

fn strike_step(spot: Decimal) -> Decimal {
    if spot < Decimal::from(250) {
        Decimal::new(25, 1)
    } else if spot < Decimal::from(1_000) {
        Decimal::from(10)
    } else {
        Decimal::from(20)
    }
}

fn lot_size(seed: u64) -> u32 {
    [250, 375, 500, 750, 1_200][(seed % 5) as usize]
}

fn decimal_to_f64(value: Decimal) -> Option<f64> {
    value.to_string().parse().ok()
}

fn symbol_seed(symbol: &Underlying) -> u64 {
    symbol
        .as_str()
        .bytes()
        .fold(0_u64, |acc, byte| acc.wrapping_mul(33).wrapping_add(byte as u64))
}
