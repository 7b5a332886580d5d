use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{InstrumentToken, QuoteSnapshot, RawInstrument, Underlying};
use crate::source::{CatalogSource, QuoteMap, QuoteSource, SourceError, SourceFuture, SpotSource};
use crate::CoreError;

/// Quote row of a snapshot file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotQuote {
    pub instrument_token: InstrumentToken,
    #[serde(flatten)]
    pub quote: QuoteSnapshot,
}

/// On-disk layout of a broker dump.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrokerSnapshot {
    #[serde(default)]
    pub instruments: Vec<RawInstrument>,
    #[serde(default)]
    pub spots: BTreeMap<Underlying, Decimal>,
    #[serde(default)]
    pub quotes: Vec<SnapshotQuote>,
}

/// Serves catalog, spots and quotes captured earlier from a live session.
#[derive(Debug, Clone)]
pub struct SnapshotBroker {
    instruments: Vec<RawInstrument>,
    spots: BTreeMap<Underlying, Decimal>,
    quotes: QuoteMap,
}

impl SnapshotBroker {
    pub fn from_snapshot(snapshot: BrokerSnapshot) -> Self {
        let quotes: HashMap<InstrumentToken, QuoteSnapshot> = snapshot
            .quotes
            .into_iter()
            .map(|row| (row.instrument_token, row.quote))
            .collect();

        Self {
            instruments: snapshot.instruments,
            spots: snapshot.spots,
            quotes,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let snapshot: BrokerSnapshot = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let broker = Self::from_json(&content)?;
        debug!(
            path = %path.display(),
            instruments = broker.instruments.len(),
            quotes = broker.quotes.len(),
            "loaded broker snapshot"
        );
        Ok(broker)
    }

    pub fn instrument_count(&self) -> usize {
        self.instruments.len()
    }
}

impl CatalogSource for SnapshotBroker {
    fn fetch_instruments<'a>(&'a self) -> SourceFuture<'a, Vec<RawInstrument>> {
        Box::pin(async move {
            if self.instruments.is_empty() {
                return Err(SourceError::unavailable("snapshot contains no instruments"));
            }
            Ok(self.instruments.clone())
        })
    }
}

impl SpotSource for SnapshotBroker {
    fn fetch_spot_price<'a>(
        &'a self,
        underlying: &'a Underlying,
    ) -> SourceFuture<'a, Option<Decimal>> {
        Box::pin(async move { Ok(self.spots.get(underlying).copied()) })
    }
}

impl QuoteSource for SnapshotBroker {
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
