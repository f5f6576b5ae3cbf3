//! Pipeline configuration
//!
//! Cleaning thresholds, filter sentinel, and synthetic-source settings.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::PipelineError;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Records whose revenue exceeds this multiple of the mean are dropped
    #[serde(default = "default_outlier_multiplier")]
    pub outlier_multiplier: f64,

    /// Decimal places kept on per-record profit margin
    #[serde(default = "default_margin_decimals")]
    pub margin_decimals: u32,

    /// Filter value meaning "no restriction on this dimension"
    #[serde(default = "default_match_all")]
    pub match_all_sentinel: String,

    /// Synthetic record source
    #[serde(default)]
    pub synthetic: SyntheticConfig,
}

fn default_outlier_multiplier() -> f64 {
    5.0
}
fn default_margin_decimals() -> u32 {
    2
}
fn default_match_all() -> String {
    "All".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            outlier_multiplier: default_outlier_multiplier(),
            margin_decimals: default_margin_decimals(),
            match_all_sentinel: default_match_all(),
            synthetic: SyntheticConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load from `ETL_CONFIG_PATH` (or `etl_config.toml`), then apply env overrides.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let path =
            std::env::var("ETL_CONFIG_PATH").unwrap_or_else(|_| "etl_config.toml".to_string());

        let mut config = Self::load(&path).unwrap_or_else(|e| {
            tracing::debug!("Using default ETL config ({}): {}", path, e);
            Self::default()
        });
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply `ETL_*` overrides. Unparsable values are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("ETL_OUTLIER_MULTIPLIER") {
            match raw.trim().parse::<f64>() {
                Ok(value) => self.outlier_multiplier = value,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid ETL_OUTLIER_MULTIPLIER"),
            }
        }
        if let Some(raw) = lookup("ETL_MATCH_ALL") {
            self.match_all_sentinel = raw.trim().to_string();
        }
        if let Some(raw) = lookup("ETL_SYNTHETIC_SEED") {
            match raw.trim().parse::<u64>() {
                Ok(value) => self.synthetic.seed = value,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid ETL_SYNTHETIC_SEED"),
            }
        }
    }

    /// Save to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.outlier_multiplier.is_finite() || self.outlier_multiplier <= 0.0 {
            return Err(PipelineError::config(format!(
                "outlier_multiplier must be a positive finite number, got {}",
                self.outlier_multiplier
            )));
        }
        if self.margin_decimals > 6 {
            return Err(PipelineError::config(format!(
                "margin_decimals must be at most 6, got {}",
                self.margin_decimals
            )));
        }
        if self.match_all_sentinel.trim().is_empty() {
            return Err(PipelineError::config("match_all_sentinel must not be blank"));
        }
        self.synthetic.validate()
    }
}

/// Synthetic record source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Number of base records before duplicates are injected
    #[serde(default = "default_records")]
    pub records: usize,

    /// RNG seed
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Fraction of records re-emitted with the same id
    #[serde(default = "default_duplicate_rate")]
    pub duplicate_rate: f64,

    /// Fraction of records with a blank category or segment
    #[serde(default = "default_missing_rate")]
    pub missing_rate: f64,

    /// Fraction of records with negative quantity and revenue
    #[serde(default = "default_negative_rate")]
    pub negative_rate: f64,

    /// Fraction of records with inflated revenue
    #[serde(default = "default_outlier_rate")]
    pub outlier_rate: f64,

    /// First day of the generated date range (YYYY-MM-DD)
    #[serde(default = "default_start_date")]
    pub start_date: String,

    /// Length of the generated date range in days
    #[serde(default = "default_span_days")]
    pub span_days: u32,
}

fn default_records() -> usize {
    1000
}
fn default_seed() -> u64 {
    42
}
fn default_duplicate_rate() -> f64 {
    0.02
}
fn default_missing_rate() -> f64 {
    0.03
}
fn default_negative_rate() -> f64 {
    0.02
}
fn default_outlier_rate() -> f64 {
    0.01
}
fn default_start_date() -> String {
    "2024-01-01".to_string()
}
fn default_span_days() -> u32 {
    365
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            records: default_records(),
            seed: default_seed(),
            duplicate_rate: default_duplicate_rate(),
            missing_rate: default_missing_rate(),
            negative_rate: default_negative_rate(),
            outlier_rate: default_outlier_rate(),
            start_date: default_start_date(),
            span_days: default_span_days(),
        }
    }
}

impl SyntheticConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let rates = [
            ("duplicate_rate", self.duplicate_rate),
            ("missing_rate", self.missing_rate),
            ("negative_rate", self.negative_rate),
            ("outlier_rate", self.outlier_rate),
        ];
        for (name, rate) in rates {
            if !(0.0..=1.0).contains(&rate) {
                return Err(PipelineError::config(format!(
                    "synthetic.{} must be within [0, 1], got {}",
                    name, rate
                )));
            }
        }
        if self.missing_rate + self.negative_rate + self.outlier_rate > 1.0 {
            return Err(PipelineError::config(
                "synthetic defect rates must not sum above 1",
            ));
        }
        if chrono::NaiveDate::parse_from_str(&self.start_date, "%Y-%m-%d").is_err() {
            return Err(PipelineError::config(format!(
                "synthetic.start_date is not a YYYY-MM-DD date: {}",
                self.start_date
            )));
        }
        if self.span_days == 0 {
            return Err(PipelineError::config("synthetic.span_days must be positive"));
        }
        Ok(())
    }
}
