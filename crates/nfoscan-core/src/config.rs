//! Application configuration.
//!
//! Loaded from a JSON file whose keys mirror the trader's `app_config.json`.
//! Every field has a default, so a missing file or an empty object yields a
//! usable configuration. `NFOSCAN_*` environment variables override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::calendar::ExpiryToken;
use crate::retry::{Backoff, RetryPolicy};

pub const ENV_MONTH_OVERRIDE: &str = "NFOSCAN_MONTH_OVERRIDE";
pub const ENV_UNIVERSE_PATH: &str = "NFOSCAN_UNIVERSE_PATH";
pub const ENV_MAX_STRIKES: &str = "NFOSCAN_MAX_STRIKES";
pub const ENV_BATCH_SIZE: &str = "NFOSCAN_BATCH_SIZE";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {error}")]
    Io { path: String, error: String },
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// One underlying symbol per line.
    #[serde(alias = "nfo_list_path")]
    pub universe_path: PathBuf,
    /// Forces the cycle, e.g. `25OCT`. Empty means the current month.
    pub month_override: String,
    /// Retry with the next cycle when the requested one has no futures listed.
    pub fallback_next_month: bool,
    /// Strike steps kept on each side of ATM.
    pub options_filter_max_strikes: u32,
    pub options_up_threshold_percent: f64,
    /// Used when a chain has a single distinct strike.
    pub default_strike_interval: Decimal,
    /// Use the matched future's catalog `last_price` when the spot source has none.
    pub spot_fallback_to_future: bool,
    pub enrichment: EnrichmentSettings,
    pub scheduler: SchedulerSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            universe_path: PathBuf::from("data/Nfo_List.txt"),
            month_override: String::new(),
            fallback_next_month: true,
            options_filter_max_strikes: 5,
            options_up_threshold_percent: 200.0,
            default_strike_interval: Decimal::ONE,
            spot_fallback_to_future: true,
            enrichment: EnrichmentSettings::default(),
            scheduler: SchedulerSettings::default(),
        }
    }
}

/// Watch loop cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub interval_seconds: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval_seconds: 300,
        }
    }
}

impl SchedulerSettings {
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentSettings {
    pub batch_size: usize,
    pub max_concurrency: usize,
    /// 0 disables throttling.
    pub requests_per_second: u32,
    pub rate_limit_wait_ms: u64,
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            batch_size: 500,
            max_concurrency: 1,
            requests_per_second: 3,
            rate_limit_wait_ms: 5_000,
            max_retries: 3,
            initial_delay_ms: 200,
            max_delay_ms: 3_000,
            multiplier: 2.0,
        }
    }
}

impl EnrichmentSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(self.initial_delay_ms),
                factor: self.multiplier,
                max: Duration::from_millis(self.max_delay_ms),
                jitter: true,
            },
        }
    }

    pub const fn rate_limit_wait(&self) -> Duration {
        Duration::from_millis(self.rate_limit_wait_ms)
    }
}

impl AppConfig {
    /// Loads a JSON config file. A missing file yields the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(error) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    error: error.to_string(),
                })
            }
        };

        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|error| ConfigError::Parse(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `NFOSCAN_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MONTH_OVERRIDE) {
            self.month_override = value;
        }
        if let Some(value) = lookup(ENV_UNIVERSE_PATH) {
            self.universe_path = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_MAX_STRIKES) {
            self.options_filter_max_strikes =
                value.trim().parse().map_err(|_| ConfigError::Invalid {
                    field: "options_filter_max_strikes",
                    reason: format!("'{value}' is not a non-negative integer"),
                })?;
        }
        if let Some(value) = lookup(ENV_BATCH_SIZE) {
            self.enrichment.batch_size =
                value.trim().parse().map_err(|_| ConfigError::Invalid {
                    field: "enrichment.batch_size",
                    reason: format!("'{value}' is not a non-negative integer"),
                })?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.month_override_token()?;

        if self.default_strike_interval <= Decimal::ZERO {
            return Err(ConfigError::Invalid {
                field: "default_strike_interval",
                reason: String::from("must be greater than zero"),
            });
        }
        if !self.options_up_threshold_percent.is_finite() {
            return Err(ConfigError::Invalid {
                field: "options_up_threshold_percent",
                reason: String::from("must be finite"),
            });
        }

        if self.scheduler.interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "scheduler.interval_seconds",
                reason: String::from("must be greater than zero"),
            });
        }

        let enrichment = &self.enrichment;
        if enrichment.batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "enrichment.batch_size",
                reason: String::from("must be greater than zero"),
            });
        }
        if enrichment.max_concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "enrichment.max_concurrency",
                reason: String::from("must be greater than zero"),
            });
        }
        if !enrichment.multiplier.is_finite() || enrichment.multiplier < 1.0 {
            return Err(ConfigError::Invalid {
                field: "enrichment.multiplier",
                reason: String::from("must be a finite value >= 1.0"),
            });
        }
        if enrichment.max_delay_ms < enrichment.initial_delay_ms {
            return Err(ConfigError::Invalid {
                field: "enrichment.max_delay_ms",
                reason: String::from("must not be below initial_delay_ms"),
            });
        }

        Ok(())
    }

    /// Parsed month override, `None` when unset.
    pub fn month_override_token(&self) -> Result<Option<ExpiryToken>, ConfigError> {
        let trimmed = self.month_override.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        ExpiryToken::parse(trimmed)
            .map(Some)
            .map_err(|error| ConfigError::Invalid {
                field: "month_override",
                reason: error.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = AppConfig::from_json("{}").expect("valid config");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.universe_path, PathBuf::from("data/Nfo_List.txt"));
        assert_eq!(config.options_filter_max_strikes, 5);
        assert_eq!(config.enrichment.batch_size, 500);
    }

    #[test]
    fn accepts_legacy_key_names() {
        let config = AppConfig::from_json(
            r#"{"nfo_list_path": "lists/nfo.txt", "month_override": "25OCT",
                "options_filter_max_strikes": 3, "default_strike_interval": 2.5,
                "kite_timeout_seconds": 30, "scheduler": {"interval_seconds": 60},
                "comments": {"month_override": "e.g. 25OCT"}}"#,
        )
        .expect("valid config");

        assert_eq!(config.universe_path, PathBuf::from("lists/nfo.txt"));
        assert_eq!(config.options_filter_max_strikes, 3);
        assert_eq!(config.default_strike_interval, dec!(2.5));
        assert_eq!(config.scheduler.interval(), Duration::from_secs(60));
        let token = config.month_override_token().expect("valid").expect("set");
        assert_eq!(token.to_string(), "25OCT");
    }

    #[test]
    fn rejects_invalid_values() {
        let err = AppConfig::from_json(r#"{"enrichment": {"batch_size": 0}}"#)
            .expect_err("must fail");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "enrichment.batch_size",
                ..
            }
        ));

        let err = AppConfig::from_json(r#"{"month_override": "OCT25"}"#).expect_err("must fail");
        assert!(matches!(err, ConfigError::Invalid { field: "month_override", .. }));

        assert!(matches!(
            AppConfig::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn overrides_replace_file_values() {
        let vars = HashMap::from([
            (ENV_MONTH_OVERRIDE, "25NOV"),
            (ENV_MAX_STRIKES, "2"),
            (ENV_BATCH_SIZE, "100"),
        ]);

        let config = AppConfig::default()
            .with_overrides(|key| vars.get(key).map(|value| (*value).to_owned()))
            .expect("valid overrides");

        assert_eq!(config.month_override, "25NOV");
        assert_eq!(config.options_filter_max_strikes, 2);
        assert_eq!(config.enrichment.batch_size, 100);
    }

    #[test]
    fn malformed_override_is_rejected() {
        let err = AppConfig::default()
            .with_overrides(|key| (key == ENV_MAX_STRIKES).then(|| String::from("many")))
            .expect_err("must fail");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "options_filter_max_strikes",
                ..
            }
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig::from_file(dir.path().join("absent.json")).expect("defaults");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn loads_file_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("app_config.json");
        std::fs::write(&path, r#"{"fallback_next_month": false}"#).expect("write config");

        let config = AppConfig::from_file(&path).expect("valid config");
        assert!(!config.fallback_next_month);
    }

    #[test]
    fn retry_policy_reflects_settings() {
        let settings = EnrichmentSettings {
            max_retries: 5,
            ..EnrichmentSettings::default()
        };
        assert_eq!(settings.retry_policy().max_retries, 5);
        assert_eq!(settings.rate_limit_wait(), Duration::from_secs(5));
    }
}
