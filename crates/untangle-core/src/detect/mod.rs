//! Chaos-issue detectors
//!
//! All detectors are pure functions over a shared [`DetectorContext`]:
//! facts in, candidate [`ProposedIssue`]s out. They share one discipline:
//! never invent missing data, always attach rationale and evidence fact IDs,
//! and let impact stay null when the strict impact rules aren't met.
//!
//! The scan mode picks one of two fixed detector tables; there is no runtime
//! dispatch beyond that lookup.

pub mod bank;
pub mod billing;

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};

use crate::canonical::entity_key;
use crate::models::{Fact, IssueType, ProposedIssue, Recurrence, ScanMode};
use crate::recurrence::RecurrenceClassification;

/// Detection thresholds, constructed once at the top of an analysis call
///
/// Defaults follow the documented analysis policy; every field can be
/// overridden through the TOML config file.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Reference date for invoice aging; injected for deterministic runs
    pub today: NaiveDate,
    /// Minimum age in days before an unpaid invoice counts as aging
    pub unpaid_aging_min_days: i64,
    /// A consecutive payment gap longer than this flags a missing payment
    pub gap_threshold_days: i64,
    /// Occurrences needed before amount drift is considered
    pub drift_min_occurrences: usize,
    /// Prior-run stability tolerance for drift detection
    pub drift_stability_tolerance: f64,
    /// Relative drop below the prior median that counts as drift
    pub drift_drop_threshold: f64,
    /// How recently a first charge must appear to count as "new" (days
    /// before the dataset end)
    pub new_recurring_window_days: i64,
    /// Annualized amount above which a new recurring charge is high severity
    pub new_recurring_high_annual: f64,
    /// Occurrences needed before price creep is considered
    pub creep_min_occurrences: usize,
    /// Baseline stability tolerance for price creep
    pub creep_stability_tolerance: f64,
    /// Relative increase over the baseline that counts as creep
    pub creep_increase_threshold: f64,
    /// Annualized delta above which price creep is high severity
    pub creep_high_annual_delta: f64,
    /// Duplicate bank charges at or above this amount are medium severity
    pub bank_duplicate_medium_amount: f64,
    /// Occurrences needed for spike detection (history plus current)
    pub spike_min_occurrences: usize,
    /// Multiple of the historical median that counts as a spike
    pub spike_multiplier: f64,
    /// Dollar delta above which a spike is high severity
    pub spike_high_delta: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            today: Utc::now().date_naive(),
            unpaid_aging_min_days: 45,
            gap_threshold_days: 45,
            drift_min_occurrences: 4,
            drift_stability_tolerance: 0.10,
            drift_drop_threshold: 0.20,
            new_recurring_window_days: 60,
            new_recurring_high_annual: 500.0,
            creep_min_occurrences: 4,
            creep_stability_tolerance: 0.10,
            creep_increase_threshold: 0.15,
            creep_high_annual_delta: 100.0,
            bank_duplicate_medium_amount: 100.0,
            spike_min_occurrences: 7,
            spike_multiplier: 2.5,
            spike_high_delta: 200.0,
        }
    }
}

/// Everything a detector gets to see for one run
pub struct DetectorContext<'a> {
    pub facts: &'a [Fact],
    pub config: &'a DetectionConfig,
    /// Derived recurrence classification per entity, built once per run
    pub recurrence: &'a BTreeMap<String, RecurrenceClassification>,
}

/// A detector: facts and context in, candidate issues out
pub type DetectorFn = fn(&DetectorContext<'_>) -> Vec<ProposedIssue>;

/// Fixed detector table for a scan mode
pub fn detectors_for_mode(mode: ScanMode) -> &'static [(IssueType, DetectorFn)] {
    match mode {
        ScanMode::Billing => &[
            (
                IssueType::UnpaidInvoiceAging,
                billing::detect_unpaid_invoice_aging as DetectorFn,
            ),
            (
                IssueType::RecurringPaymentGap,
                billing::detect_recurring_payment_gap as DetectorFn,
            ),
            (IssueType::AmountDrift, billing::detect_amount_drift as DetectorFn),
            (
                IssueType::DuplicateCharge,
                billing::detect_duplicate_charges as DetectorFn,
            ),
        ],
        ScanMode::Bank => &[
            (
                IssueType::NewRecurringCharge,
                bank::detect_new_recurring_charges as DetectorFn,
            ),
            (IssueType::PriceCreep, bank::detect_price_creep as DetectorFn),
            (
                IssueType::DuplicateCharge,
                bank::detect_bank_duplicate_charges as DetectorFn,
            ),
            (IssueType::UnusualSpike, bank::detect_unusual_spikes as DetectorFn),
        ],
    }
}

/// Run the detector table for a mode and collect all candidates
pub fn run_detectors(mode: ScanMode, ctx: &DetectorContext<'_>) -> Vec<ProposedIssue> {
    let mut candidates = Vec::new();
    for (issue_type, detector) in detectors_for_mode(mode) {
        let found = detector(ctx);
        tracing::debug!(
            detector = issue_type.as_str(),
            candidates = found.len(),
            "Detector complete"
        );
        candidates.extend(found);
    }
    candidates
}

/// Group facts by their entity key; BTreeMap keeps detector output
/// deterministic regardless of input order
pub fn group_by_entity<'a>(facts: &'a [Fact]) -> BTreeMap<String, Vec<&'a Fact>> {
    let mut by_entity: BTreeMap<String, Vec<&Fact>> = BTreeMap::new();
    for fact in facts {
        by_entity.entry(entity_key(fact)).or_default().push(fact);
    }
    by_entity
}

/// Whether a fact counts as monthly for the gap/drift detectors
///
/// Explicit metadata wins; the derived classification only stands in when
/// the explicit field is one_time or absent. Returns the answer and whether
/// the derived fallback supplied it.
pub fn is_effectively_monthly(
    fact: &Fact,
    entity: &str,
    recurrence: &BTreeMap<String, RecurrenceClassification>,
) -> (bool, bool) {
    match fact.recurrence {
        Recurrence::Monthly => (true, false),
        Recurrence::Quarterly | Recurrence::Annual => (false, false),
        Recurrence::OneTime | Recurrence::Unknown => {
            let derived = recurrence
                .get(entity)
                .map(|c| c.is_monthly)
                .unwrap_or(false);
            (derived, derived)
        }
    }
}

/// Sort a fact group by date (then id, for same-day stability)
pub fn sort_by_date(group: &mut [&Fact]) {
    group.sort_by(|a, b| a.date_value.cmp(&b.date_value).then(a.id.cmp(&b.id)));
}

/// Amount in integer cents for exact duplicate grouping
pub fn amount_cents(value: f64) -> i64 {
    (value * 100.0).round() as i64
}
