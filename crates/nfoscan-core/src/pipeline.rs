//! Resolution pipeline.
//!
//! ```text
//! underlyings + cycle
//!   -> resolve_cycle          (abort on InvalidCycle)
//!   -> CatalogSource          (abort on CatalogUnavailable)
//!   -> match_contracts        (next-month fallback when no futures)
//!   -> SpotSource + StrikeSelector, per underlying with options
//!   -> build_coverage
//!   -> MarketEnricher         (per-batch degradation)
//!   -> ResolutionReport
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::calendar::{resolve_cycle, ExpiryToken};
use crate::catalog::{dedup_underlyings, match_contracts, split_chains, UnderlyingChain};
use crate::config::AppConfig;
use crate::coverage::{build_coverage, CoverageSummary, SkipReason};
use crate::domain::{
    ContractKey, EnrichedContract, InstrumentToken, RawInstrument, ResolvedContract, Underlying,
};
use crate::enrich::{
    BatchReport, BatchStatus, CancellationFlag, EnrichConfig, EnrichmentOutcome, EnrichmentState,
    MarketEnricher,
};
use crate::source::{CatalogSource, QuoteSource, SpotSource};
use crate::strikes::StrikeSelector;
use crate::throttling::RateLimiter;
use crate::{CoreError, ResolveError, ValidationError};

/// Inputs of one resolution run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    pub underlyings: Vec<Underlying>,
    pub year: i32,
    pub month: u8,
    /// Strike steps kept on each side of ATM.
    pub window_size: u32,
    /// Fetch quotes for the resolved contracts.
    pub enrich: bool,
}

impl ResolutionRequest {
    pub fn new(underlyings: Vec<Underlying>, year: i32, month: u8) -> Self {
        Self {
            underlyings,
            year,
            month,
            window_size: 5,
            enrich: true,
        }
    }

    pub fn for_token(underlyings: Vec<Underlying>, token: ExpiryToken) -> Self {
        Self::new(underlyings, token.year(), token.month())
    }

    pub fn with_window_size(mut self, window_size: u32) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn without_enrichment(mut self) -> Self {
        self.enrich = false;
        self
    }
}

/// Tunables that are not part of a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverSettings {
    pub fallback_next_month: bool,
    pub spot_fallback_to_future: bool,
    pub default_strike_interval: Decimal,
    pub enrich: EnrichConfig,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl ResolverSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            fallback_next_month: config.fallback_next_month,
            spot_fallback_to_future: config.spot_fallback_to_future,
            default_strike_interval: config.default_strike_interval,
            enrich: EnrichConfig::from_settings(&config.enrichment),
        }
    }
}

/// Where the ATM reference price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceOrigin {
    Spot,
    FutureLastPrice,
}

/// Strike window chosen for one underlying.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowSummary {
    pub underlying: Underlying,
    pub spot: Decimal,
    pub price_origin: PriceOrigin,
    pub atm_strike: Decimal,
    pub interval: Decimal,
    pub strikes: Vec<Decimal>,
}

/// Contract totals of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractSummary {
    pub cycle: ExpiryToken,
    pub total_futures: usize,
    pub total_options: usize,
    pub catalog_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionReport {
    pub run_id: Uuid,
    /// Cycle asked for by the caller.
    pub requested_cycle: ExpiryToken,
    /// Cycle actually matched; differs after a next-month fallback.
    pub cycle: ExpiryToken,
    pub catalog_size: usize,
    pub contracts: Vec<EnrichedContract>,
    pub coverage: CoverageSummary,
    pub windows: Vec<WindowSummary>,
    pub enrichment: EnrichmentState,
    pub partial: bool,
    pub batches: Vec<BatchReport>,
    pub warnings: Vec<String>,
}

impl ResolutionReport {
    pub fn summary(&self) -> ContractSummary {
        let total_futures = self
            .contracts
            .iter()
            .filter(|contract| contract.contract.instrument_type.is_future())
            .count();
        let total_options = self
            .contracts
            .iter()
            .filter(|contract| contract.contract.instrument_type.is_option())
            .count();

        ContractSummary {
            cycle: self.cycle,
            total_futures,
            total_options,
            catalog_size: self.catalog_size,
        }
    }

    pub fn contract_keys(&self) -> Vec<ContractKey> {
        self.contracts
            .iter()
            .map(|contract| contract.contract.key())
            .collect()
    }
}

/// Runs the pipeline against injected collaborators.
pub struct Resolver {
    catalog: Arc<dyn CatalogSource>,
    spots: Arc<dyn SpotSource>,
    quotes: Arc<dyn QuoteSource>,
    settings: ResolverSettings,
    limiter: RateLimiter,
    cancel: CancellationFlag,
}

impl Resolver {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        spots: Arc<dyn SpotSource>,
        quotes: Arc<dyn QuoteSource>,
    ) -> Self {
        Self {
            catalog,
            spots,
            quotes,
            settings: ResolverSettings::default(),
            limiter: RateLimiter::unlimited(),
            cancel: CancellationFlag::new(),
        }
    }

    /// Builds a resolver with settings and throttling taken from `config`.
    pub fn from_config(
        config: &AppConfig,
        catalog: Arc<dyn CatalogSource>,
        spots: Arc<dyn SpotSource>,
        quotes: Arc<dyn QuoteSource>,
    ) -> Self {
        let limiter = match config.enrichment.requests_per_second {
            0 => RateLimiter::unlimited(),
            rps => RateLimiter::per_second(rps),
        };

        Self::new(catalog, spots, quotes)
            .with_settings(ResolverSettings::from_config(config))
            .with_rate_limiter(limiter)
    }

    pub fn with_settings(mut self, settings: ResolverSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }

    /// Resolves, filters and enriches the contracts of one cycle.
    ///
    /// # Errors
    ///
    /// Only run-invalidating failures are returned: an invalid cycle, an
    /// unavailable or empty catalog, or an invalid request. Per-underlying and
    /// per-batch failures are recorded in the report.
    pub async fn run(&self, request: &ResolutionRequest) -> Result<ResolutionReport, ResolveError> {
        if request.underlyings.is_empty() {
            return Err(ValidationError::EmptyUniverse.into());
        }
        self.settings.enrich.validate()?;

        let requested_cycle = resolve_cycle(request.year, request.month)?;
        let run_id = Uuid::new_v4();
        let underlyings = dedup_underlyings(&request.underlyings);
        info!(
            %run_id,
            cycle = %requested_cycle,
            underlyings = underlyings.len(),
            "starting resolution run"
        );

        let catalog = self
            .catalog
            .fetch_instruments()
            .await
            .map_err(|error| ResolveError::CatalogUnavailable {
                reason: error.to_string(),
            })?;
        if catalog.is_empty() {
            return Err(ResolveError::CatalogUnavailable {
                reason: String::from("instrument catalog is empty"),
            });
        }

        let mut warnings = Vec::new();
        let (cycle, matched) =
            self.match_with_fallback(&catalog, &underlyings, requested_cycle, &mut warnings);

        let last_prices = future_last_prices(&catalog);
        let selector =
            StrikeSelector::new(request.window_size, self.settings.default_strike_interval);
        let mut retained: HashSet<ContractKey> = HashSet::new();
        let mut skipped: HashMap<Underlying, SkipReason> = HashMap::new();
        let mut windows = Vec::new();

        for chain in split_chains(&matched) {
            retained.extend(chain.futures.iter().map(ResolvedContract::key));
            if chain.options.is_empty() {
                continue;
            }

            let (spot, origin) = self.reference_price(&chain, &last_prices, run_id).await;
            match selector.select(&chain.underlying, &chain.options, spot) {
                Ok(window) => {
                    retained.extend(window.contracts.iter().map(ResolvedContract::key));
                    windows.push(WindowSummary {
                        underlying: window.underlying,
                        spot: window.spot,
                        price_origin: origin.unwrap_or(PriceOrigin::Spot),
                        atm_strike: window.atm_strike,
                        interval: window.interval,
                        strikes: window.strikes,
                    });
                }
                Err(error) => {
                    warn!(
                        %run_id,
                        underlying = %chain.underlying,
                        code = error.code(),
                        "skipping option chain"
                    );
                    warnings.push(error.to_string());
                    if let Some(reason) = SkipReason::from_error(&error) {
                        skipped.insert(chain.underlying.clone(), reason);
                    }
                }
            }
        }

        let resolved: Vec<ResolvedContract> = matched
            .into_iter()
            .filter(|contract| retained.contains(&contract.key()))
            .collect();
        let coverage = build_coverage(&underlyings, &resolved, &skipped);

        let outcome = if request.enrich {
            MarketEnricher::new(self.settings.enrich.clone(), self.limiter.clone())
                .enrich(resolved, Arc::clone(&self.quotes), &self.cancel)
                .await
        } else {
            EnrichmentOutcome::not_requested(resolved)
        };

        for batch in &outcome.batches {
            if let BatchStatus::Failed { reason, .. } = &batch.status {
                warnings.push(format!("quote batch {} failed: {reason}", batch.index));
            }
        }

        info!(
            %run_id,
            cycle = %cycle,
            contracts = outcome.contracts.len(),
            missing = coverage.missing_underlyings.len(),
            enrichment = ?outcome.state,
            partial = outcome.partial,
            "resolution run finished"
        );

        Ok(ResolutionReport {
            run_id,
            requested_cycle,
            cycle,
            catalog_size: catalog.len(),
            contracts: outcome.contracts,
            coverage,
            windows,
            enrichment: outcome.state,
            partial: outcome.partial,
            batches: outcome.batches,
            warnings,
        })
    }

    fn match_with_fallback(
        &self,
        catalog: &[RawInstrument],
        underlyings: &[Underlying],
        requested: ExpiryToken,
        warnings: &mut Vec<String>,
    ) -> (ExpiryToken, Vec<ResolvedContract>) {
        let matched = match_contracts(catalog, underlyings, requested);
        if !self.settings.fallback_next_month || has_futures(&matched) {
            return (requested, matched);
        }

        let Ok(next) = requested.next() else {
            return (requested, matched);
        };
        let candidate = match_contracts(catalog, underlyings, next);
        if !has_futures(&candidate) {
            return (requested, matched);
        }

        warn!(
            requested = %requested,
            using = %next,
            "no futures listed for requested cycle, falling back"
        );
        warnings.push(format!("no futures listed for {requested}; using {next}"));
        (next, candidate)
    }

    async fn reference_price(
        &self,
        chain: &UnderlyingChain,
        last_prices: &HashMap<InstrumentToken, Decimal>,
        run_id: Uuid,
    ) -> (Option<Decimal>, Option<PriceOrigin>) {
        let spot = match self.spots.fetch_spot_price(&chain.underlying).await {
            Ok(price) => price.filter(|price| *price > Decimal::ZERO),
            Err(error) => {
                warn!(
                    %run_id,
                    underlying = %chain.underlying,
                    code = error.code(),
                    "spot price fetch failed"
                );
                None
            }
        };
        if spot.is_some() {
            return (spot, Some(PriceOrigin::Spot));
        }
        if !self.settings.spot_fallback_to_future {
            return (None, None);
        }

        let fallback = chain
            .futures
            .iter()
            .find_map(|future| last_prices.get(&future.instrument_token).copied());
        if fallback.is_some() {
            info!(%run_id, underlying = %chain.underlying, "using future last price as spot");
        }
        (fallback, fallback.map(|_| PriceOrigin::FutureLastPrice))
    }
}

/// Blocking wrapper around [`Resolver::run`] for synchronous callers.
///
/// # Errors
///
/// Returns [`CoreError::NestedRuntime`] when called from inside a tokio
/// runtime, [`CoreError::Io`] when a runtime cannot be built, and the run's
/// own [`ResolveError`] otherwise.
pub fn run_resolution(
    resolver: &Resolver,
    request: &ResolutionRequest,
) -> Result<ResolutionReport, CoreError> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(CoreError::NestedRuntime);
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(resolver.run(request))?)
}

fn has_futures(contracts: &[ResolvedContract]) -> bool {
    contracts
        .iter()
        .any(|contract| contract.instrument_type.is_future())
}

fn future_last_prices(catalog: &[RawInstrument]) -> HashMap<InstrumentToken, Decimal> {
    catalog
        .iter()
        .filter(|raw| raw.instrument_type.is_future())
        .filter_map(|raw| {
            let price = raw.last_price.filter(|price| *price > 0.0)?;
            Decimal::try_from(price)
                .ok()
                .map(|price| (raw.instrument_token, price))
        })
        .collect()
}
