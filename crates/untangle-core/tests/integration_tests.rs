//! Integration tests for untangle-core
//!
//! These exercise the full pipeline (canonicalize, classify, detect, prune)
//! through the public `analyze` entry point.

use chrono::NaiveDate;
use untangle_core::test_utils::{monthly_outflows, FactBuilder};
use untangle_core::{
    analyze, AnalyzerConfig, DateType, FactStatus, IssueType, Recurrence, ScanMode, Severity,
};

fn config_at(today: &str) -> AnalyzerConfig {
    let mut config = AnalyzerConfig::default();
    config.detection.today = today.parse::<NaiveDate>().unwrap();
    config
}

// =============================================================================
// Billing-mode scenarios
// =============================================================================

#[test]
fn test_billing_payment_gap_end_to_end() {
    // 4 monthly $8500 payments, then a 5th payment 92 days after the 4th.
    // Directions are unknown, so this scans as billing.
    let dates = ["2024-01-01", "2024-02-01", "2024-03-01", "2024-04-01", "2024-07-02"];
    let facts: Vec<_> = dates
        .iter()
        .enumerate()
        .map(|(i, d)| {
            FactBuilder::payment(&format!("acme-{}", i + 1))
                .entity("ACME CONSULTING")
                .amount(8500.0, "USD")
                .date(d)
                .status(FactStatus::Paid)
                .recurrence(Recurrence::Monthly)
                .build()
        })
        .collect();

    let report = analyze(&facts, &config_at("2024-07-10"));
    assert_eq!(report.scan_mode, ScanMode::Billing);
    assert!(report.bank_insights.is_none());
    assert!(report.bank_diagnostics.is_none());

    assert_eq!(report.issues.len(), 1);
    let issue = &report.issues[0];
    assert_eq!(issue.issue_type, IssueType::RecurringPaymentGap);
    assert_eq!(issue.severity, Severity::Medium);
    // Stable, explicitly monthly amounts: 8500 * 2 missed months
    assert_eq!(issue.impact_min, Some(17000.0));
    assert_eq!(issue.impact_max, Some(17000.0));
    assert_eq!(issue.currency.as_deref(), Some("USD"));
    assert_eq!(issue.evidence_fact_ids.len(), 5);
}

#[test]
fn test_billing_aging_and_duplicates_ranked() {
    let mut facts = vec![
        // 100-day-old unpaid invoice: high severity
        FactBuilder::invoice("inv-1")
            .entity("GLOBEX")
            .amount(12000.0, "USD")
            .date("2024-02-01")
            .date_type(DateType::Due)
            .status(FactStatus::Unpaid)
            .build(),
    ];
    // Same-day duplicate pair: low severity
    for id in ["dup-1", "dup-2"] {
        facts.push(
            FactBuilder::payment(id)
                .entity("INITECH")
                .amount(250.0, "USD")
                .date("2024-04-15")
                .build(),
        );
    }

    let report = analyze(&facts, &config_at("2024-05-11"));
    assert_eq!(report.issues.len(), 2);
    // High-severity aging outranks the low-severity duplicate
    assert_eq!(report.issues[0].issue_type, IssueType::UnpaidInvoiceAging);
    assert_eq!(report.issues[0].severity, Severity::High);
    assert_eq!(report.issues[1].issue_type, IssueType::DuplicateCharge);
    assert_eq!(report.issues[1].impact_min, Some(250.0));
    assert!(!report.prune_stats.was_capped);
}

// =============================================================================
// Bank-mode scenarios
// =============================================================================

#[test]
fn test_bank_scan_full_report() {
    // Established stable subscription
    let mut facts = monthly_outflows(
        "NETFLIX",
        15.99,
        "USD",
        &["2024-01-09", "2024-02-08", "2024-03-09", "2024-04-08", "2024-05-08"],
    );
    // New recurring vendor appearing in the last 60 days of data
    facts.extend(monthly_outflows(
        "CRM VENDOR",
        89.0,
        "USD",
        &["2024-03-10", "2024-04-09", "2024-05-09"],
    ));
    // Excluded transfer activity
    facts.extend(monthly_outflows(
        "ZELLE JOHN SMITH",
        400.0,
        "USD",
        &["2024-03-01", "2024-03-31", "2024-04-30"],
    ));

    let report = analyze(&facts, &config_at("2024-05-15"));
    assert_eq!(report.scan_mode, ScanMode::Bank);

    // Only the CRM vendor is an issue: new, recurring, $1068/year
    assert_eq!(report.issues.len(), 1);
    let issue = &report.issues[0];
    assert_eq!(issue.issue_type, IssueType::NewRecurringCharge);
    assert_eq!(issue.entity_name, "CRM VENDOR");
    assert_eq!(issue.severity, Severity::High);
    // Bank pattern detectors never estimate impact
    assert!(issue.impact_min.is_none());

    // Insights: the transfer is excluded, both real merchants are recurring
    let insights = report.bank_insights.expect("bank insights");
    assert_eq!(insights.recurring_merchant_count, 2);
    assert!(insights.can_sum_recurring);
    let total = insights.total_monthly_recurring.unwrap();
    assert!((total - (15.99 + 89.0)).abs() < 1e-9);

    // Diagnostics: 3 entities, 1 excluded
    let diag = report.bank_diagnostics.expect("bank diagnostics");
    assert_eq!(diag.total_entities, 3);
    assert_eq!(diag.excluded_entities, 1);
    assert_eq!(diag.qualifying_facts, facts.len());

    assert!(report
        .not_flagged
        .iter()
        .any(|n| n.contains("excluded from pattern detection")));
}

#[test]
fn test_bank_duplicate_flagged_even_for_transfers() {
    let facts = vec![
        FactBuilder::bank_outflow("t1")
            .entity("ZELLE JOHN SMITH")
            .amount(200.0, "USD")
            .date("2024-04-01")
            .build(),
        FactBuilder::bank_outflow("t2")
            .entity("ZELLE JOHN SMITH")
            .amount(200.0, "USD")
            .date("2024-04-01")
            .build(),
    ];
    let report = analyze(&facts, &config_at("2024-04-10"));
    assert_eq!(report.scan_mode, ScanMode::Bank);
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].issue_type, IssueType::DuplicateCharge);
    // >= $100: medium
    assert_eq!(report.issues[0].severity, Severity::Medium);
}

// =============================================================================
// Canonicalization through the pipeline
// =============================================================================

#[test]
fn test_raw_descriptions_group_into_one_entity() {
    // Five noisy spellings of the same merchant, two of them a same-day
    // duplicate pair
    let rows = [
        ("w1", "WALMART", "2024-03-01"),
        ("w2", "WALMART STORE #1234", "2024-03-08"),
        ("w3", "POS DEBIT WALMART", "2024-03-15"),
        ("w4", "CHECKCARD WALMART 5678", "2024-03-22"),
        ("w5", "WALMART INC", "2024-03-22"),
    ];
    let facts: Vec<_> = rows
        .iter()
        .map(|(id, raw, date)| {
            FactBuilder::bank_outflow(id)
                .raw(raw)
                .amount(55.20, "USD")
                .date(date)
                .build()
        })
        .collect();

    let report = analyze(&facts, &config_at("2024-04-01"));
    let diag = report.bank_diagnostics.expect("bank diagnostics");
    assert_eq!(diag.total_entities, 1);

    // w4 and w5 land on the same day with the same amount
    let dup = report
        .issues
        .iter()
        .find(|i| i.issue_type == IssueType::DuplicateCharge)
        .expect("duplicate issue");
    assert_eq!(dup.entity_name, "WALMART");
    assert_eq!(dup.evidence_fact_ids, vec!["w4", "w5"]);
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn test_analysis_is_deterministic() {
    let mut facts = monthly_outflows(
        "CRM VENDOR",
        89.0,
        "USD",
        &["2024-03-10", "2024-04-09", "2024-05-09"],
    );
    facts.extend(monthly_outflows(
        "NETFLIX",
        15.99,
        "USD",
        &["2024-03-09", "2024-04-08", "2024-05-08"],
    ));
    let config = config_at("2024-05-15");

    let first = analyze(&facts, &config);
    // Same input in reversed order must produce the identical report
    facts.reverse();
    let second = analyze(&facts, &config);

    assert_eq!(format!("{:?}", first), format!("{:?}", second));
}
