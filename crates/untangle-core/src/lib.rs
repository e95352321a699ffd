//! Untangle Core Library
//!
//! Deterministic analysis pipeline for spotting "chaos" in financial records:
//! - Entity canonicalization (merchant-description normalization)
//! - Exclusion classification for non-merchant noise (transfers, fees)
//! - Two-tier recurrence classification from timing/amount patterns
//! - Billing-mode and bank-mode issue detectors
//! - Strict, conservative impact estimation
//! - Deterministic issue pruning and ranking with transparency counters
//!
//! The whole pipeline is a pure, synchronous function over an in-memory
//! fact set: same input, same output, no I/O beyond optional config loading.

pub mod canonical;
pub mod config;
pub mod detect;
pub mod error;
pub mod evidence;
pub mod exclusion;
pub mod models;
pub mod prune;
pub mod recurrence;
pub mod scan;
pub mod stats;

/// Test utilities (fact builders for unit and integration tests)
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use canonical::{canonicalize, canonicalize_facts, entity_key};
pub use config::AnalyzerConfig;
pub use detect::{DetectionConfig, DetectorContext};
pub use error::{Error, Result};
pub use evidence::ImpactEstimate;
pub use exclusion::Exclusion;
pub use models::{
    AnalysisReport, BankDiagnostics, BankInsights, ClearingStatus, DateRange, DateType,
    DetectorEligibility, Direction, EvidenceStats, Fact, FactStatus, FactType, IssueType,
    ProposedIssue, PruneStats, Recurrence, RecurringMerchant, ScanMode, Severity,
};
pub use prune::{PruneOptions, DEFAULT_MAX_ISSUES};
pub use recurrence::{RecurrenceClassification, RecurrenceTier};
pub use scan::{analyze, direction_coverage, select_scan_mode};
