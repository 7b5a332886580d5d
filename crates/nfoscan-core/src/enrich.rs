//! Batched market-data enrichment.
//!
//! Contracts are split into batches of at most `batch_size` instrument tokens
//! and each batch is one [`QuoteSource::fetch_quotes`] call. Batches run with
//! bounded concurrency through the shared [`RateLimiter`]. A failing batch only
//! degrades its own contracts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::EnrichmentSettings;
use crate::domain::{EnrichedContract, InstrumentToken, MarketStatus, ResolvedContract};
use crate::retry::RetryPolicy;
use crate::source::{QuoteMap, QuoteSource};
use crate::throttling::RateLimiter;
use crate::{ResolveError, ValidationError};

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichConfig {
    pub batch_size: usize,
    /// 1 issues batches sequentially.
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
    /// Longest wait for a rate-limiter permit before a batch is given up.
    pub rate_limit_wait: Duration,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self::from_settings(&EnrichmentSettings::default())
    }
}

impl EnrichConfig {
    pub fn from_settings(settings: &EnrichmentSettings) -> Self {
        Self {
            batch_size: settings.batch_size,
            max_concurrency: settings.max_concurrency,
            retry: settings.retry_policy(),
            rate_limit_wait: settings.rate_limit_wait(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_size == 0 {
            return Err(ValidationError::ZeroBatchSize);
        }
        Ok(())
    }
}

/// Cooperative cancellation shared between a run and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Whether market fields were merged for the resolved contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentState {
    /// Every batch returned.
    Complete,
    /// Some batches failed or were abandoned.
    Partial,
    /// Resolved only; no batch returned data.
    NotEnriched,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchStatus {
    Succeeded { returned: usize, missing: usize },
    Failed { code: String, reason: String },
    NotRequested,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub index: usize,
    pub size: usize,
    /// Quote calls issued for the batch.
    pub attempts: u32,
    #[serde(flatten)]
    pub status: BatchStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentOutcome {
    /// Same order as the input contracts.
    pub contracts: Vec<EnrichedContract>,
    pub state: EnrichmentState,
    pub batches: Vec<BatchReport>,
    /// Set when cancellation abandoned at least one batch.
    pub partial: bool,
}

impl EnrichmentOutcome {
    /// Outcome for a run that resolved contracts without fetching quotes.
    pub fn not_requested(contracts: Vec<ResolvedContract>) -> Self {
        Self {
            contracts: contracts
                .into_iter()
                .map(|contract| {
                    EnrichedContract::without_data(contract, MarketStatus::NotRequested)
                })
                .collect(),
            state: EnrichmentState::NotEnriched,
            batches: Vec::new(),
            partial: false,
        }
    }
}

struct BatchResult {
    attempts: u32,
    outcome: Result<QuoteMap, ResolveError>,
}

pub struct MarketEnricher {
    config: EnrichConfig,
    limiter: RateLimiter,
}

impl MarketEnricher {
    pub fn new(config: EnrichConfig, limiter: RateLimiter) -> Self {
        Self { config, limiter }
    }

    pub fn config(&self) -> &EnrichConfig {
        &self.config
    }

    /// Fetches quotes for `contracts` and merges them in input order.
    ///
    /// Batch failures never fail the call; they surface as per-contract
    /// [`MarketStatus`] values and in [`EnrichmentOutcome::batches`].
    pub async fn enrich(
        &self,
        contracts: Vec<ResolvedContract>,
        source: Arc<dyn QuoteSource>,
        cancel: &CancellationFlag,
    ) -> EnrichmentOutcome {
        if contracts.is_empty() {
            return EnrichmentOutcome {
                contracts: Vec::new(),
                state: EnrichmentState::Complete,
                batches: Vec::new(),
                partial: false,
            };
        }

        let batch_size = self.config.batch_size.max(1);
        let batches: Vec<Vec<InstrumentToken>> = contracts
            .chunks(batch_size)
            .map(|chunk| chunk.iter().map(|contract| contract.instrument_token).collect())
            .collect();
        let batch_count = batches.len();

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut issued = 0_usize;

        for (index, tokens) in batches.into_iter().enumerate() {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            if cancel.is_cancelled() {
                info!(
                    abandoned = batch_count - index,
                    "enrichment cancelled, abandoning remaining batches"
                );
                break;
            }

            let source = Arc::clone(&source);
            let limiter = self.limiter.clone();
            let retry = self.config.retry.clone();
            let wait = self.config.rate_limit_wait;
            tasks.spawn(async move {
                let result =
                    fetch_batch(index, &tokens, source.as_ref(), &limiter, &retry, wait).await;
                drop(permit);
                (index, result)
            });
            issued += 1;
        }

        let mut results: Vec<Option<BatchResult>> = (0..batch_count).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(error) => warn!(%error, "quote batch task did not complete"),
            }
        }

        merge(contracts, results, batch_size, issued)
    }
}

async fn fetch_batch(
    index: usize,
    tokens: &[InstrumentToken],
    source: &dyn QuoteSource,
    limiter: &RateLimiter,
    retry: &RetryPolicy,
    wait: Duration,
) -> BatchResult {
    let mut attempt = 0_u32;
    loop {
        if let Err(error) = limiter.acquire(wait).await {
            warn!(
                batch = index,
                attempt,
                code = error.code(),
                "no rate-limit permit for quote batch"
            );
            return BatchResult {
                attempts: attempt,
                outcome: Err(error),
            };
        }

        match source.fetch_quotes(tokens).await {
            Ok(quotes) => {
                debug!(
                    batch = index,
                    attempt,
                    size = tokens.len(),
                    returned = quotes.len(),
                    "quote batch fetched"
                );
                return BatchResult {
                    attempts: attempt + 1,
                    outcome: Ok(quotes),
                };
            }
            Err(error) if retry.should_retry(&error, attempt) => {
                let delay = retry.delay_for_attempt(attempt);
                warn!(
                    batch = index,
                    attempt,
                    code = error.code(),
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "quote batch failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => {
                warn!(batch = index, attempt, code = error.code(), "quote batch failed");
                return BatchResult {
                    attempts: attempt + 1,
                    outcome: Err(ResolveError::MarketDataUnavailable {
                        batch: index,
                        reason: error.to_string(),
                    }),
                };
            }
        }
    }
}

fn merge(
    contracts: Vec<ResolvedContract>,
    results: Vec<Option<BatchResult>>,
    batch_size: usize,
    issued: usize,
) -> EnrichmentOutcome {
    let mut reports = Vec::with_capacity(results.len());
    let mut succeeded = 0_usize;
    let total = contracts.len();

    for (index, result) in results.iter().enumerate() {
        let size = batch_size.min(total - index * batch_size);
        let (attempts, status) = match result {
            Some(BatchResult {
                attempts,
                outcome: Ok(quotes),
            }) => {
                succeeded += 1;
                let start = index * batch_size;
                let missing = contracts[start..start + size]
                    .iter()
                    .filter(|contract| !quotes.contains_key(&contract.instrument_token))
                    .count();
                (
                    *attempts,
                    BatchStatus::Succeeded {
                        returned: size - missing,
                        missing,
                    },
                )
            }
            Some(BatchResult {
                attempts,
                outcome: Err(error),
            }) => (
                *attempts,
                BatchStatus::Failed {
                    code: error.code().to_owned(),
                    reason: error.to_string(),
                },
            ),
            None if index < issued => (
                0,
                BatchStatus::Failed {
                    code: String::from("resolve.market_data_unavailable"),
                    reason: String::from("batch task did not complete"),
                },
            ),
            None => (0, BatchStatus::NotRequested),
        };
        reports.push(BatchReport {
            index,
            size,
            attempts,
            status,
        });
    }

    let enriched = contracts
        .into_iter()
        .enumerate()
        .map(|(position, contract)| {
            let index = position / batch_size;
            match (&results[index], &reports[index].status) {
                (Some(BatchResult { outcome: Ok(quotes), .. }), _) => {
                    match quotes.get(&contract.instrument_token) {
                        Some(quote) => EnrichedContract::enriched(contract, quote),
                        None => EnrichedContract::without_data(contract, MarketStatus::NoData),
                    }
                }
                (_, BatchStatus::Failed { reason, .. }) => EnrichedContract::without_data(
                    contract,
                    MarketStatus::Unavailable {
                        reason: reason.clone(),
                    },
                ),
                _ => EnrichedContract::without_data(contract, MarketStatus::NotRequested),
            }
        })
        .collect();

    let state = if succeeded == reports.len() {
        EnrichmentState::Complete
    } else if succeeded == 0 {
        EnrichmentState::NotEnriched
    } else {
        EnrichmentState::Partial
    };

    EnrichmentOutcome {
        contracts: enriched,
        state,
        batches: reports,
        partial: issued < results.len(),
    }
}
