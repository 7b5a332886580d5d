use std::sync::Arc;

use nfoscan_core::{
    resolve_cycle, BrokerSnapshot, CatalogSource, InstrumentToken, QuoteSource, ResolutionRequest,
    Resolver, SnapshotBroker, SnapshotQuote, SourceErrorKind, SpotSource, SyntheticBroker,
    Underlying,
};
use rust_decimal::Decimal;

#[derive(Clone)]
struct BrokerCase {
    name: &'static str,
    catalog: Arc<dyn CatalogSource>,
    spots: Arc<dyn SpotSource>,
    quotes: Arc<dyn QuoteSource>,
}

impl BrokerCase {
    fn new<B>(name: &'static str, broker: B) -> Self
    where
        B: CatalogSource + SpotSource + QuoteSource + 'static,
    {
        let broker = Arc::new(broker);
        Self {
            name,
            catalog: broker.clone(),
            spots: broker.clone(),
            quotes: broker,
        }
    }
}

fn universe() -> Vec<Underlying> {
    ["SBIN", "INFY", "M&M"]
        .into_iter()
        .map(|name| Underlying::parse(name).expect("valid underlying"))
        .collect()
}

fn synthetic() -> SyntheticBroker {
    SyntheticBroker::new(universe(), resolve_cycle(2025, 9).expect("valid cycle"))
}

/// Snapshot captured from the synthetic broker, so both cases share one market.
fn snapshot_of(source: &SyntheticBroker) -> SnapshotBroker {
    let spots = universe()
        .into_iter()
        .filter_map(|underlying| source.spot(&underlying).map(|price| (underlying, price)))
        .collect();
    let quotes = source
        .quotes()
        .iter()
        .map(|(token, quote)| SnapshotQuote {
            instrument_token: *token,
            quote: quote.clone(),
        })
        .collect();

    SnapshotBroker::from_snapshot(BrokerSnapshot {
        instruments: source.instruments().to_vec(),
        spots,
        quotes,
    })
}

fn broker_cases() -> Vec<BrokerCase> {
    let synthetic = synthetic();
    let snapshot = snapshot_of(&synthetic);
    vec![
        BrokerCase::new("synthetic", synthetic),
        BrokerCase::new("snapshot", snapshot),
    ]
}

#[tokio::test]
async fn catalog_rows_are_complete_for_all_brokers() {
    for case in broker_cases() {
        let catalog = case
            .catalog
            .fetch_instruments()
            .await
            .unwrap_or_else(|error| panic!("broker '{}' catalog failed: {error}", case.name));
        assert!(!catalog.is_empty(), "broker '{}': catalog empty", case.name);

        for row in catalog.iter().filter(|row| row.instrument_type.is_derivative()) {
            assert!(
                !row.name.is_empty(),
                "broker '{}': {} has no name",
                case.name,
                row.tradingsymbol
            );
            assert!(
                row.expiry.is_some(),
                "broker '{}': {} has no expiry",
                case.name,
                row.tradingsymbol
            );
            if row.instrument_type.is_option() {
                assert!(
                    row.strike.is_some_and(|strike| strike > Decimal::ZERO),
                    "broker '{}': {} has no strike",
                    case.name,
                    row.tradingsymbol
                );
            }
        }
    }
}

#[tokio::test]
async fn spot_is_positive_or_absent_for_all_brokers() {
    let unknown = Underlying::parse("NOSUCHSTOCK").expect("valid underlying");

    for case in broker_cases() {
        for underlying in universe() {
            let spot = case
                .spots
                .fetch_spot_price(&underlying)
                .await
                .unwrap_or_else(|error| panic!("broker '{}' spot failed: {error}", case.name));
            assert!(
                spot.is_some_and(|price| price > Decimal::ZERO),
                "broker '{}': spot for {underlying}",
                case.name
            );
        }

        let spot = case
            .spots
            .fetch_spot_price(&unknown)
            .await
            .unwrap_or_else(|error| panic!("broker '{}' spot failed: {error}", case.name));
        assert_eq!(spot, None, "broker '{}': unknown underlying", case.name);
    }
}

#[tokio::test]
async fn quotes_cover_only_requested_tokens_for_all_brokers() {
    for case in broker_cases() {
        let catalog = case
            .catalog
            .fetch_instruments()
            .await
            .expect("catalog");
        let mut tokens: Vec<InstrumentToken> =
            catalog.iter().take(4).map(|row| row.instrument_token).collect();
        tokens.push(InstrumentToken(u64::MAX));

        let quotes = case
            .quotes
            .fetch_quotes(&tokens)
            .await
            .unwrap_or_else(|error| panic!("broker '{}' quotes failed: {error}", case.name));

        assert!(
            quotes.keys().all(|token| tokens.contains(token)),
            "broker '{}': returned unrequested tokens",
            case.name
        );
        assert!(
            !quotes.contains_key(&InstrumentToken(u64::MAX)),
            "broker '{}': quoted an unknown token",
            case.name
        );
        assert!(
            quotes.values().all(|quote| quote.ltp.is_finite() && quote.ltp >= 0.0),
            "broker '{}': invalid last price",
            case.name
        );
    }
}

#[tokio::test]
async fn empty_quote_request_is_rejected_by_all_brokers() {
    for case in broker_cases() {
        let error = case
            .quotes
            .fetch_quotes(&[])
            .await
            .expect_err("empty request should be rejected");
        assert_eq!(
            error.kind(),
            SourceErrorKind::InvalidRequest,
            "broker '{}': empty request error",
            case.name
        );
        assert!(!error.retryable(), "broker '{}': retryable", case.name);
    }
}

#[tokio::test]
async fn resolution_output_parity_across_brokers() {
    let mut signatures = Vec::new();

    for case in broker_cases() {
        let resolver = Resolver::new(case.catalog, case.spots, case.quotes);
        let request = ResolutionRequest::new(universe(), 2025, 9).with_window_size(2);
        let report = resolver
            .run(&request)
            .await
            .unwrap_or_else(|error| panic!("broker '{}' run failed: {error}", case.name));

        signatures.push((
            report.cycle,
            report.contract_keys(),
            report
                .contracts
                .iter()
                .map(|contract| contract.market.ltp)
                .collect::<Vec<_>>(),
        ));
    }

    for signature in signatures.iter().skip(1) {
        assert_eq!(signature, &signatures[0]);
    }
}
