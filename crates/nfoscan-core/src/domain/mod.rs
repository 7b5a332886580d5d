//! # Domain Models
//!
//! Typed records for the derivatives catalog and its market overlay.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Underlying`] | Validated underlying stock symbol |
//! | [`InstrumentToken`] | Brokerage instrument identifier |
//! | [`InstrumentType`] | FUT / CE / PE classification |
//! | [`RawInstrument`] | Row of the brokerage instrument dump |
//! | [`ResolvedContract`] | Contract selected for a cycle |
//! | [`ContractKey`] | Uniqueness key of a resolved contract |
//! | [`QuoteSnapshot`] | Quote returned for one instrument |
//! | [`EnrichedContract`] | Resolved contract with market fields |
//!
//! Catalog-facing types are read-only to the resolver; every derived value is
//! built fresh per run.

mod instrument;
mod market;
mod symbol;

pub use instrument::{ContractKey, InstrumentToken, InstrumentType, RawInstrument, ResolvedContract};
pub use market::{change_pct, EnrichedContract, MarketData, MarketStatus, QuoteSnapshot};
pub use symbol::Underlying;
