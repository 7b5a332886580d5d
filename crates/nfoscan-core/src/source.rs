//! Collaborator contracts consumed by the resolver.
//!
//! The brokerage session, authentication and raw network calls live outside
//! this crate. They are reached through three narrow traits:
//!
//! | Trait | Call | Used for |
//! |-------|------|----------|
//! | [`CatalogSource`] | [`fetch_instruments`](CatalogSource::fetch_instruments) | NFO instrument dump, once per run |
//! | [`SpotSource`] | [`fetch_spot_price`](SpotSource::fetch_spot_price) | Underlying LTP, once per underlying with options |
//! | [`QuoteSource`] | [`fetch_quotes`](QuoteSource::fetch_quotes) | Quote batches for enrichment |
//!
//! Implementations must be `Send + Sync`; the resolver shares them across
//! concurrently issued quote batches.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use rust_decimal::Decimal;

use crate::domain::{InstrumentToken, QuoteSnapshot, RawInstrument, Underlying};

/// Boxed future returned by source calls.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Quotes keyed by instrument token. Missing tokens are allowed.
pub type QuoteMap = HashMap<InstrumentToken, QuoteSnapshot>;

/// Source-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Unavailable,
    RateLimited,
    Timeout,
    InvalidRequest,
    Internal,
}

/// Structured error returned by collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Timeout,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::Timeout => "source.timeout",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Provides the full derivatives instrument catalog.
pub trait CatalogSource: Send + Sync {
    /// Fetches every instrument of the segment.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the catalog cannot be downloaded.
    fn fetch_instruments<'a>(&'a self) -> SourceFuture<'a, Vec<RawInstrument>>;
}

/// Provides the current cash-market price of an underlying.
pub trait SpotSource: Send + Sync {
    /// `Ok(None)` when the source has no price for the symbol.
    fn fetch_spot_price<'a>(&'a self, underlying: &'a Underlying)
        -> SourceFuture<'a, Option<Decimal>>;
}

/// Provides quotes for a batch of instruments.
pub trait QuoteSource: Send + Sync {
    /// Fetches quotes for `tokens`. Tokens without data are simply absent
    /// from the returned map.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the whole batch failed. Retryable errors
    /// are retried by the enricher.
    fn fetch_quotes<'a>(&'a self, tokens: &'a [InstrumentToken]) -> SourceFuture<'a, QuoteMap>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_retryable() {
        assert!(SourceError::unavailable("502").retryable());
        assert!(SourceError::rate_limited("429").retryable());
        assert!(SourceError::timeout("30s").retryable());
        assert!(!SourceError::invalid_request("bad token").retryable());
    }

    #[test]
    fn display_includes_code() {
        let error = SourceError::rate_limited("too many requests");
        assert_eq!(error.to_string(), "too many requests (source.rate_limited)");
        assert_eq!(error.kind(), SourceErrorKind::RateLimited);
    }
}
