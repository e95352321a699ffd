//! Domain models for untangle
//!
//! Facts are the normalized input records produced by upstream collaborators
//! (extraction, CSV ingestion). Everything here is plain data: the analysis
//! pipeline consumes a `&[Fact]` and produces an [`AnalysisReport`] without
//! touching any of it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Kind of financial record a fact describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactType {
    Invoice,
    Payment,
    Subscription,
    BankTransaction,
}

impl FactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::Payment => "payment",
            Self::Subscription => "subscription",
            Self::BankTransaction => "bank_transaction",
        }
    }
}

impl std::str::FromStr for FactType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "invoice" => Ok(Self::Invoice),
            "payment" => Ok(Self::Payment),
            "subscription" => Ok(Self::Subscription),
            "bank_transaction" => Ok(Self::BankTransaction),
            _ => Err(format!("Unknown fact type: {}", s)),
        }
    }
}

impl std::fmt::Display for FactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a fact's date refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateType {
    /// Invoice due date
    Due,
    /// Invoice issue date
    Issued,
    /// Payment date
    Paid,
    /// Bank posting date
    Posted,
}

/// Settlement status of a fact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FactStatus {
    Paid,
    Unpaid,
    Pending,
    #[default]
    Unknown,
}

/// Explicit recurrence metadata carried on a fact
///
/// Distinct from the *derived* recurrence classification: this is whatever the
/// upstream extractor claimed, and it may simply be absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    Monthly,
    Quarterly,
    Annual,
    OneTime,
    #[default]
    Unknown,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Annual => "annual",
            Self::OneTime => "one_time",
            Self::Unknown => "unknown",
        }
    }
}

/// Money direction for bank transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inflow,
    Outflow,
    #[default]
    Unknown,
}

impl Direction {
    /// True when the upstream parser resolved a direction at all
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Clearing status for bank transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClearingStatus {
    Cleared,
    Pending,
    Reversed,
    #[default]
    Unknown,
}

/// A normalized financial record, immutable once produced upstream
///
/// `entity_canonical` is filled in by the canonicalizer at the start of an
/// analysis run; `direction` and `clearing_status` are only meaningful for
/// bank transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub id: String,
    pub fact_type: FactType,
    /// Display name for the counterparty, if the extractor produced one
    pub entity_name: Option<String>,
    /// Raw free-text description (e.g. a bank statement line)
    pub entity_raw: Option<String>,
    /// Canonical grouping key derived from the raw description
    #[serde(default)]
    pub entity_canonical: Option<String>,
    pub amount_value: Option<f64>,
    pub amount_currency: Option<String>,
    pub date_value: Option<NaiveDate>,
    pub date_type: Option<DateType>,
    #[serde(default)]
    pub status: FactStatus,
    #[serde(default)]
    pub recurrence: Recurrence,
    /// Pointer back to the source document/row for audit trails
    pub source_reference: Option<String>,
    /// Extraction confidence (upstream filters to >= 0.6 before we see it)
    pub confidence: f64,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub clearing_status: ClearingStatus,
}

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Numeric weight for ranking (higher = more urgent)
    pub fn weight(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kinds of chaos issues the detectors can raise
///
/// Billing-mode and bank-mode duplicate detection share one issue type; the
/// two detector sets never run in the same scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    UnpaidInvoiceAging,
    RecurringPaymentGap,
    AmountDrift,
    DuplicateCharge,
    NewRecurringCharge,
    PriceCreep,
    UnusualSpike,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnpaidInvoiceAging => "unpaid_invoice_aging",
            Self::RecurringPaymentGap => "recurring_payment_gap",
            Self::AmountDrift => "amount_drift",
            Self::DuplicateCharge => "duplicate_charge",
            Self::NewRecurringCharge => "new_recurring_charge",
            Self::PriceCreep => "price_creep",
            Self::UnusualSpike => "unusual_spike",
        }
    }

    /// Hard minimum evidence count enforced by the prune engine's evidence gate
    pub fn min_evidence(&self) -> usize {
        match self {
            Self::UnpaidInvoiceAging => 1,
            Self::RecurringPaymentGap => 3,
            Self::AmountDrift => 4,
            Self::DuplicateCharge => 2,
            Self::NewRecurringCharge => 3,
            Self::PriceCreep => 4,
            Self::UnusualSpike => 6,
        }
    }
}

impl std::str::FromStr for IssueType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "unpaid_invoice_aging" => Ok(Self::UnpaidInvoiceAging),
            "recurring_payment_gap" => Ok(Self::RecurringPaymentGap),
            "amount_drift" => Ok(Self::AmountDrift),
            "duplicate_charge" => Ok(Self::DuplicateCharge),
            "new_recurring_charge" => Ok(Self::NewRecurringCharge),
            "price_creep" => Ok(Self::PriceCreep),
            "unusual_spike" => Ok(Self::UnusualSpike),
            _ => Err(format!("Unknown issue type: {}", s)),
        }
    }
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which detector set and prune profile a scan runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    Billing,
    Bank,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Billing => "billing",
            Self::Bank => "bank",
        }
    }
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inclusive date range covered by a set of evidence facts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Structured evidence summary attached to every issue, used downstream for
/// audit and report rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceStats {
    pub count: usize,
    pub date_range: Option<DateRange>,
    pub median_amount: Option<f64>,
    /// None whenever more than one distinct non-null currency appears
    pub currency: Option<String>,
    pub source_references: Vec<String>,
}

/// A candidate issue proposed by a detector
///
/// `impact_min`/`impact_max` stay `None` unless the strict impact rules are
/// satisfied; impact is never estimated under uncertainty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedIssue {
    pub issue_type: IssueType,
    pub title: String,
    pub severity: Severity,
    pub confidence: f64,
    pub impact_min: Option<f64>,
    pub impact_max: Option<f64>,
    pub currency: Option<String>,
    pub rationale: Vec<String>,
    pub evidence_fact_ids: Vec<String>,
    pub entity_name: String,
    pub evidence_summary: String,
    pub evidence_stats: EvidenceStats,
}

/// Per-stage drop counters from the prune engine
///
/// These are user-facing transparency data ("why you're seeing fewer issues
/// than detected"), not implementation detail, and must be exact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneStats {
    pub dropped_low_evidence: usize,
    pub dropped_duplicates: usize,
    pub dropped_per_entity_cap: usize,
    pub dropped_low_severity: usize,
    pub dropped_by_cap: usize,
    pub was_capped: bool,
}

/// A recurring merchant surfaced for informational display (not an issue)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringMerchant {
    pub name: String,
    pub tier: String,
    pub median_amount: Option<f64>,
    pub currency: Option<String>,
    pub evidence_count: usize,
}

/// Bank-mode recurring-spend aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankInsights {
    pub recurring_merchant_count: usize,
    pub recurring_merchants: Vec<RecurringMerchant>,
    /// Only present when every recurring merchant has a known amount in a
    /// single shared currency, matching the impact calculators' conservatism
    pub total_monthly_recurring: Option<f64>,
    pub can_sum_recurring: bool,
}

/// Per-detector eligibility count for bank diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorEligibility {
    pub detector: IssueType,
    pub eligible_entities: usize,
}

/// Explains why a bank scan found few or no issues
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankDiagnostics {
    pub total_facts: usize,
    /// Percentage of facts carrying a date
    pub date_coverage_percent: f64,
    /// Facts passing the outflow + cleared + dated + amounted predicate
    pub qualifying_facts: usize,
    pub total_entities: usize,
    pub excluded_entities: usize,
    pub exclusion_rate_percent: f64,
    pub detector_eligibility: Vec<DetectorEligibility>,
    /// Human-readable blockers, most significant first
    pub top_blockers: Vec<String>,
}

/// Final output of an analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub issues: Vec<ProposedIssue>,
    pub not_flagged: Vec<String>,
    pub scan_mode: ScanMode,
    pub bank_insights: Option<BankInsights>,
    pub bank_diagnostics: Option<BankDiagnostics>,
    pub prune_stats: PruneStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_severity_weight_ordering() {
        assert!(Severity::High.weight() > Severity::Medium.weight());
        assert!(Severity::Medium.weight() > Severity::Low.weight());
    }

    #[test]
    fn test_issue_type_round_trip() {
        for ty in [
            IssueType::UnpaidInvoiceAging,
            IssueType::RecurringPaymentGap,
            IssueType::AmountDrift,
            IssueType::DuplicateCharge,
            IssueType::NewRecurringCharge,
            IssueType::PriceCreep,
            IssueType::UnusualSpike,
        ] {
            assert_eq!(IssueType::from_str(ty.as_str()).unwrap(), ty);
        }
    }

    #[test]
    fn test_evidence_gate_minimums() {
        assert_eq!(IssueType::UnpaidInvoiceAging.min_evidence(), 1);
        assert_eq!(IssueType::AmountDrift.min_evidence(), 4);
        assert_eq!(IssueType::UnusualSpike.min_evidence(), 6);
    }

    #[test]
    fn test_direction_default_is_unknown() {
        assert_eq!(Direction::default(), Direction::Unknown);
        assert!(!Direction::Unknown.is_known());
        assert!(Direction::Outflow.is_known());
    }
}
