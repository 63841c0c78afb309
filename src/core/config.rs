//! Engine Configuration
//!
//! Tunables for allocation and settlement. Loaded from defaults, a JSON
//! document, or `FAIRSPLIT_*` environment variables.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::allocation::shapley::ValueCurve;

/// Default number of permutation samples for Shapley estimation.
pub const DEFAULT_PERMUTATIONS: usize = 25;

/// Default platform fee taken from each bounty payout.
pub const DEFAULT_PLATFORM_FEE_RATE: f64 = 0.05;

/// Default creator reserve percentage.
pub const DEFAULT_RESERVE_PCT: f64 = 0.10;

/// Reserve floor for high-risk creators.
pub const HIGH_RISK_RESERVE_FLOOR: f64 = 0.25;

/// Default number of videos paid out per bounty settlement.
pub const DEFAULT_SETTLE_TOP_N: usize = 3;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JSON document could not be parsed.
    #[error("invalid config document: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is outside its allowed range.
    #[error("invalid value for {field}: {reason}")]
    OutOfRange {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Allocation and settlement configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Permutation samples (K) per Shapley estimate.
    pub permutations: usize,
    /// Coalition value curve.
    pub value_curve: ValueCurve,
    /// Platform fee fraction on each payout.
    pub platform_fee_rate: f64,
    /// Reserve fraction for creators without an explicit one.
    pub default_reserve_pct: f64,
    /// Minimum reserve fraction for high-risk creators.
    pub high_risk_reserve_floor: f64,
    /// Videos paid out per bounty settlement.
    pub settle_top_n: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            permutations: DEFAULT_PERMUTATIONS,
            value_curve: ValueCurve::Sqrt,
            platform_fee_rate: DEFAULT_PLATFORM_FEE_RATE,
            default_reserve_pct: DEFAULT_RESERVE_PCT,
            high_risk_reserve_floor: HIGH_RISK_RESERVE_FLOOR,
            settle_top_n: DEFAULT_SETTLE_TOP_N,
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    ///
    /// Absent or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(k) = env_parse::<usize>("FAIRSPLIT_PERMUTATIONS") {
            config.permutations = k;
        }
        if let Some(exponent) = env_parse::<f64>("FAIRSPLIT_VALUE_EXPONENT") {
            config.value_curve = ValueCurve::Power { exponent };
        }
        if let Some(rate) = env_parse::<f64>("FAIRSPLIT_FEE_RATE") {
            config.platform_fee_rate = rate;
        }
        if let Some(n) = env_parse::<usize>("FAIRSPLIT_TOP_N") {
            config.settle_top_n = n;
        }

        config
    }

    /// Parse and validate a JSON config document.
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.permutations == 0 {
            return Err(ConfigError::OutOfRange {
                field: "permutations",
                reason: "must be at least 1".to_string(),
            });
        }
        self.value_curve
            .validate()
            .map_err(|reason| ConfigError::OutOfRange {
                field: "value_curve",
                reason,
            })?;
        for (field, value) in [
            ("platform_fee_rate", self.platform_fee_rate),
            ("default_reserve_pct", self.default_reserve_pct),
            ("high_risk_reserve_floor", self.high_risk_reserve_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange {
                    field,
                    reason: format!("{} is not within [0, 1]", value),
                });
            }
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}
