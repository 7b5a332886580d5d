use std::fmt::{Display, Formatter};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use super::Underlying;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Brokerage-assigned stable instrument identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentToken(pub u64);

impl InstrumentToken {
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Display for InstrumentToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog instrument type. Only `Fut`, `Ce` and `Pe` are ever resolved.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InstrumentType {
    Fut,
    Ce,
    Pe,
    Other(String),
}

impl InstrumentType {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "FUT" => Self::Fut,
            "CE" => Self::Ce,
            "PE" => Self::Pe,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Fut => "FUT",
            Self::Ce => "CE",
            Self::Pe => "PE",
            Self::Other(value) => value.as_str(),
        }
    }

    pub const fn is_future(&self) -> bool {
        matches!(self, Self::Fut)
    }

    pub const fn is_option(&self) -> bool {
        matches!(self, Self::Ce | Self::Pe)
    }

    pub const fn is_derivative(&self) -> bool {
        self.is_future() || self.is_option()
    }
}

impl Display for InstrumentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for InstrumentType {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<InstrumentType> for String {
    fn from(value: InstrumentType) -> Self {
        value.as_str().to_owned()
    }
}

/// One row of the brokerage instrument dump. Owned by the catalog source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInstrument {
    pub instrument_token: InstrumentToken,
    pub tradingsymbol: String,
    /// Underlying name as published by the catalog (`name` column).
    pub name: String,
    pub instrument_type: InstrumentType,
    #[serde(default)]
    pub strike: Option<Decimal>,
    #[serde(default, with = "iso_date::option")]
    pub expiry: Option<Date>,
    #[serde(default)]
    pub lot_size: u32,
    /// Last price stamped on the dump, used as a spot fallback for futures.
    #[serde(default)]
    pub last_price: Option<f64>,
}

/// Identity of a resolved contract. Unique within a resolution run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractKey {
    pub underlying: Underlying,
    pub instrument_type: InstrumentType,
    pub strike: Option<Decimal>,
    #[serde(with = "iso_date::option")]
    pub expiry: Option<Date>,
}

/// Catalog record selected for the requested universe and cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedContract {
    pub underlying: Underlying,
    pub instrument_type: InstrumentType,
    pub strike: Option<Decimal>,
    #[serde(with = "iso_date::option")]
    pub expiry: Option<Date>,
    pub instrument_token: InstrumentToken,
    pub tradingsymbol: String,
    pub lot_size: u32,
}

impl ResolvedContract {
    pub fn from_raw(underlying: Underlying, raw: &RawInstrument) -> Self {
        Self {
            underlying,
            instrument_type: raw.instrument_type.clone(),
            // Futures carry a zero strike in the brokerage dump.
            strike: if raw.instrument_type.is_option() {
                raw.strike
            } else {
                None
            },
            expiry: raw.expiry,
            instrument_token: raw.instrument_token,
            tradingsymbol: raw.tradingsymbol.clone(),
            lot_size: raw.lot_size,
        }
    }

    pub fn key(&self) -> ContractKey {
        ContractKey {
            underlying: self.underlying.clone(),
            instrument_type: self.instrument_type.clone(),
            strike: self.strike,
            expiry: self.expiry,
        }
    }
}
