use serde::{Deserialize, Serialize};

use super::ResolvedContract;
use crate::ValidationError;

/// Quote fields returned by the brokerage for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub ltp: f64,
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    /// Previous session close.
    #[serde(default)]
    pub close: Option<f64>,
    #[serde(default)]
    pub volume: Option<u64>,
}

impl QuoteSnapshot {
    pub fn new(
        ltp: f64,
        open: Option<f64>,
        high: Option<f64>,
        low: Option<f64>,
        close: Option<f64>,
        volume: Option<u64>,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("ltp", ltp)?;
        validate_optional_non_negative("open", open)?;
        validate_optional_non_negative("high", high)?;
        validate_optional_non_negative("low", low)?;
        validate_optional_non_negative("close", close)?;

        Ok(Self {
            ltp,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    pub fn ltp_only(ltp: f64) -> Result<Self, ValidationError> {
        Self::new(ltp, None, None, None, None, None)
    }
}

/// Per-contract enrichment outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MarketStatus {
    /// Quote merged.
    Enriched,
    /// The batch succeeded but the response carried no entry for this token.
    NoData,
    /// The batch failed after retries.
    Unavailable { reason: String },
    /// The batch was never issued because the run was cancelled.
    NotRequested,
}

impl MarketStatus {
    pub const fn is_enriched(&self) -> bool {
        matches!(self, Self::Enriched)
    }
}

/// Market fields merged onto a contract. All fields are null when no quote exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub ltp: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
    pub change_pct: Option<f64>,
}

impl MarketData {
    pub fn from_quote(quote: &QuoteSnapshot) -> Self {
        Self {
            ltp: Some(quote.ltp),
            open: quote.open,
            high: quote.high,
            low: quote.low,
            close: quote.close,
            volume: quote.volume,
            change_pct: change_pct(quote.ltp, quote.close),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ltp.is_none()
    }
}

/// Percentage change of `ltp` over the previous close, rounded to two decimals.
///
/// Undefined (`None`) when the close is absent or zero.
pub fn change_pct(ltp: f64, previous_close: Option<f64>) -> Option<f64> {
    let close = previous_close.filter(|close| *close > 0.0 && close.is_finite())?;
    let raw = (ltp - close) / close * 100.0;
    raw.is_finite().then(|| (raw * 100.0).round() / 100.0)
}

/// Resolved contract with its market fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedContract {
    #[serde(flatten)]
    pub contract: ResolvedContract,
    #[serde(flatten)]
    pub market: MarketData,
    pub market_status: MarketStatus,
}

impl EnrichedContract {
    pub fn enriched(contract: ResolvedContract, quote: &QuoteSnapshot) -> Self {
        Self {
            contract,
            market: MarketData::from_quote(quote),
            market_status: MarketStatus::Enriched,
        }
    }

    pub fn without_data(contract: ResolvedContract, status: MarketStatus) -> Self {
        Self {
            contract,
            market: MarketData::default(),
            market_status: status,
        }
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_optional_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        validate_non_negative(field, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_pct_is_relative_to_previous_close() {
        assert_eq!(change_pct(30.0, Some(10.0)), Some(200.0));
        assert_eq!(change_pct(9.0, Some(10.0)), Some(-10.0));
        assert_eq!(change_pct(10.0, Some(3.0)), Some(233.33));
    }

    #[test]
    fn change_pct_is_null_without_a_usable_close() {
        assert_eq!(change_pct(12.0, None), None);
        assert_eq!(change_pct(12.0, Some(0.0)), None);
    }

    #[test]
    fn rejects_negative_prices() {
        let err = QuoteSnapshot::new(1.0, Some(-1.0), None, None, None, None)
            .expect_err("must fail");
        assert!(matches!(err, ValidationError::NegativeValue { field: "open" }));

        let err = QuoteSnapshot::ltp_only(f64::NAN).expect_err("must fail");
        assert!(matches!(err, ValidationError::NonFiniteValue { field: "ltp" }));
    }

    #[test]
    fn market_status_serializes_with_tag() {
        let value = serde_json::to_value(MarketStatus::Unavailable {
            reason: String::from("timeout"),
        })
        .expect("serializable");
        assert_eq!(
            value,
            serde_json::json!({"status": "unavailable", "reason": "timeout"})
        );
    }
}
