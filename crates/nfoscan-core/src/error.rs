use thiserror::Error;
use time::Date;

use crate::config::ConfigError;

/// Validation and contract errors exposed by `nfoscan-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter or digit: '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("expiry token must look like 25SEP: '{value}'")]
    InvalidExpiryToken { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("underlying list must contain at least one symbol")]
    EmptyUniverse,
    #[error("batch size must be greater than zero")]
    ZeroBatchSize,
}

/// Failure taxonomy of a resolution run.
///
/// `InvalidCycle` and `CatalogUnavailable` abort the run. `NoSpotPrice` and
/// `EmptyOptionChain` are recorded against a single underlying.
/// `MarketDataUnavailable` and `RateLimitTimeout` degrade one quote batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("invalid expiry cycle {year}-{month:02}")]
    InvalidCycle { year: i32, month: u8 },

    #[error("no expiry on or after {as_of}")]
    NoUpcomingExpiry { as_of: Date },

    #[error("no spot price available for {underlying}")]
    NoSpotPrice { underlying: String },

    #[error("option chain for {underlying} is empty")]
    EmptyOptionChain { underlying: String },

    #[error("instrument catalog unavailable: {reason}")]
    CatalogUnavailable { reason: String },

    #[error("market data unavailable for batch {batch}: {reason}")]
    MarketDataUnavailable { batch: usize, reason: String },

    #[error("rate limiter did not grant a permit within {waited_ms}ms")]
    RateLimitTimeout { waited_ms: u64 },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ResolveError {
    /// Stable machine-readable code, used in reports and logs.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidCycle { .. } => "resolve.invalid_cycle",
            Self::NoUpcomingExpiry { .. } => "resolve.no_upcoming_expiry",
            Self::NoSpotPrice { .. } => "resolve.no_spot_price",
            Self::EmptyOptionChain { .. } => "resolve.empty_option_chain",
            Self::CatalogUnavailable { .. } => "resolve.catalog_unavailable",
            Self::MarketDataUnavailable { .. } => "resolve.market_data_unavailable",
            Self::RateLimitTimeout { .. } => "resolve.rate_limit_timeout",
            Self::Validation(_) => "resolve.validation",
        }
    }

    /// Whether the error invalidates the whole run rather than one underlying or batch.
    pub const fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidCycle { .. } | Self::CatalogUnavailable { .. } | Self::Validation(_)
        )
    }
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blocking resolution called from inside an async runtime; await Resolver::run instead")]
    NestedRuntime,
}
