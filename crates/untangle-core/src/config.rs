//! Analyzer configuration
//!
//! Every numeric threshold in the detectors and the prune engine can be
//! overridden through a small TOML file; anything not mentioned keeps its
//! documented default. The merged config is resolved once at the top of an
//! analysis call and passed down by reference.
//!
//! Example override file:
//!
//! ```toml
//! unpaid_aging_min_days = 30
//! spike_multiplier = 3.0
//! max_issues = 5
//! ```

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::detect::DetectionConfig;
use crate::error::Result;
use crate::prune::DEFAULT_MAX_ISSUES;

/// Fully resolved analysis configuration
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub detection: DetectionConfig,
    /// Hard cap on the final issue list
    pub max_issues: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            max_issues: DEFAULT_MAX_ISSUES,
        }
    }
}

/// On-disk override shape: every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    /// Reference date override ("YYYY-MM-DD"), mainly for reproducing scans
    today: Option<NaiveDate>,
    unpaid_aging_min_days: Option<i64>,
    gap_threshold_days: Option<i64>,
    drift_min_occurrences: Option<usize>,
    drift_stability_tolerance: Option<f64>,
    drift_drop_threshold: Option<f64>,
    new_recurring_window_days: Option<i64>,
    new_recurring_high_annual: Option<f64>,
    creep_min_occurrences: Option<usize>,
    creep_stability_tolerance: Option<f64>,
    creep_increase_threshold: Option<f64>,
    creep_high_annual_delta: Option<f64>,
    bank_duplicate_medium_amount: Option<f64>,
    spike_min_occurrences: Option<usize>,
    spike_multiplier: Option<f64>,
    spike_high_delta: Option<f64>,
    max_issues: Option<usize>,
}

impl AnalyzerConfig {
    /// Load overrides from a TOML file and merge them over the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        tracing::debug!(path = %path.display(), "Loaded analyzer config");
        Ok(config)
    }

    /// Parse a TOML override document and merge it over the defaults
    pub fn from_toml(text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text)?;
        let mut config = Self::default();
        let d = &mut config.detection;

        if let Some(v) = file.today {
            d.today = v;
        }
        if let Some(v) = file.unpaid_aging_min_days {
            d.unpaid_aging_min_days = v;
        }
        if let Some(v) = file.gap_threshold_days {
            d.gap_threshold_days = v;
        }
        if let Some(v) = file.drift_min_occurrences {
            d.drift_min_occurrences = v;
        }
        if let Some(v) = file.drift_stability_tolerance {
            d.drift_stability_tolerance = v;
        }
        if let Some(v) = file.drift_drop_threshold {
            d.drift_drop_threshold = v;
        }
        if let Some(v) = file.new_recurring_window_days {
            d.new_recurring_window_days = v;
        }
        if let Some(v) = file.new_recurring_high_annual {
            d.new_recurring_high_annual = v;
        }
        if let Some(v) = file.creep_min_occurrences {
            d.creep_min_occurrences = v;
        }
        if let Some(v) = file.creep_stability_tolerance {
            d.creep_stability_tolerance = v;
        }
        if let Some(v) = file.creep_increase_threshold {
            d.creep_increase_threshold = v;
        }
        if let Some(v) = file.creep_high_annual_delta {
            d.creep_high_annual_delta = v;
        }
        if let Some(v) = file.bank_duplicate_medium_amount {
            d.bank_duplicate_medium_amount = v;
        }
        if let Some(v) = file.spike_min_occurrences {
            d.spike_min_occurrences = v;
        }
        if let Some(v) = file.spike_multiplier {
            d.spike_multiplier = v;
        }
        if let Some(v) = file.spike_high_delta {
            d.spike_high_delta = v;
        }
        if let Some(v) = file.max_issues {
            config.max_issues = v;
        }

        Ok(config)
    }
}
