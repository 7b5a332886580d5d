//! # nfoscan core
//!
//! Contract resolution and filtering engine for NSE derivatives (NFO).
//!
//! Given a universe of underlying stocks and a target expiry cycle, the crate
//! derives the cycle's symbol token, matches it against the brokerage
//! instrument catalog, picks a strike window around the at-the-money strike of
//! each underlying, and enriches the result with batched market quotes.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Offline brokers (synthetic and snapshot-backed) |
//! | [`calendar`] | Expiry token derivation and nearest-expiry lookup |
//! | [`catalog`] | Exact-underlying / expiry-token catalog matching |
//! | [`config`] | Application configuration |
//! | [`coverage`] | Found / missing summary per underlying |
//! | [`domain`] | Symbols, instruments, quotes |
//! | [`enrich`] | Batched, throttled quote enrichment |
//! | [`error`] | Error types |
//! | [`pipeline`] | End-to-end resolution run |
//! | [`retry`] | Backoff policy |
//! | [`scan`] | "Options up" scan and watch snapshots |
//! | [`source`] | Collaborator traits for catalog, spot and quotes |
//! | [`strikes`] | ATM strike and strike window selection |
//! | [`throttling`] | Shared rate limiter |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use nfoscan_core::{resolve_cycle, ResolutionRequest, Resolver, SyntheticBroker, Underlying};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let universe = vec![Underlying::parse("SBIN")?, Underlying::parse("INFY")?];
//!     let broker = Arc::new(SyntheticBroker::new(universe.clone(), resolve_cycle(2025, 9)?));
//!     let resolver = Resolver::new(broker.clone(), broker.clone(), broker);
//!
//!     let report = resolver.run(&ResolutionRequest::new(universe, 2025, 9)).await?;
//!     println!("{} contracts for {}", report.contracts.len(), report.cycle);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Only run-invalidating failures are returned from [`Resolver::run`]:
//!
//! ```rust
//! use nfoscan_core::ResolveError;
//!
//! fn describe(error: &ResolveError) -> &'static str {
//!     if error.is_run_fatal() {
//!         "run aborted"
//!     } else {
//!         "recorded in report"
//!     }
//! }
//! ```

pub mod adapters;
pub mod calendar;
pub mod catalog;
pub mod config;
pub mod coverage;
pub mod domain;
pub mod enrich;
pub mod error;
pub mod pipeline;
pub mod retry;
pub mod scan;
pub mod source;
pub mod strikes;
pub mod throttling;

pub use adapters::{BrokerSnapshot, SnapshotBroker, SnapshotQuote, SyntheticBroker};

pub use calendar::{nearest_expiry_date, resolve_cycle, ExpiryToken};

pub use catalog::{match_contracts, split_chains, UnderlyingChain};

pub use config::{AppConfig, ConfigError, EnrichmentSettings, SchedulerSettings};

pub use coverage::{build_coverage, CoverageSummary, SkipReason, UnderlyingCoverage};

pub use domain::{
    change_pct, ContractKey, EnrichedContract, InstrumentToken, InstrumentType, MarketData,
    MarketStatus, QuoteSnapshot, RawInstrument, ResolvedContract, Underlying,
};

pub use enrich::{
    BatchReport, BatchStatus, CancellationFlag, EnrichConfig, EnrichmentOutcome, EnrichmentState,
    MarketEnricher,
};

pub use error::{CoreError, ResolveError, ValidationError};

pub use pipeline::{
    run_resolution, ContractSummary, PriceOrigin, ResolutionReport, ResolutionRequest, Resolver,
    ResolverSettings, WindowSummary,
};

pub use retry::{Backoff, RetryPolicy};

pub use scan::{options_up, Gainer, GainerSnapshot, SnapshotDiff};

pub use source::{
    CatalogSource, QuoteMap, QuoteSource, SourceError, SourceErrorKind, SourceFuture, SpotSource,
};

pub use strikes::{atm_strike, select_window, strike_interval, StrikeSelector, StrikeWindow};

pub use throttling::RateLimiter;
