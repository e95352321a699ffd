//! Scan-mode selection and top-level analysis orchestration
//!
//! `analyze` is the library's entry point: canonicalize, pick a scan mode,
//! build the recurrence map, run the mode's detector table, prune, and
//! assemble the report with its transparency extras (not-flagged notes,
//! bank insights, bank diagnostics).

use std::collections::BTreeSet;

use crate::canonical::canonicalize_facts;
use crate::config::AnalyzerConfig;
use crate::detect::{group_by_entity, run_detectors, DetectorContext};
use crate::exclusion;
use crate::models::{
    AnalysisReport, BankDiagnostics, BankInsights, DetectorEligibility, Fact, IssueType,
    ProposedIssue, RecurringMerchant, ScanMode,
};
use crate::prune::{prune, PruneOptions};
use crate::recurrence::{build_recurrence_map, is_qualifying, RecurrenceClassification};

/// Bank mode requires strictly more than this fraction of facts to carry a
/// known direction
pub const BANK_MODE_DIRECTION_THRESHOLD: f64 = 0.8;

/// Fraction of facts with a known direction; 0 for an empty set
pub fn direction_coverage(facts: &[Fact]) -> f64 {
    if facts.is_empty() {
        return 0.0;
    }
    let known = facts.iter().filter(|f| f.direction.is_known()).count();
    known as f64 / facts.len() as f64
}

/// Pick the detector set and prune profile for a fact set
///
/// The threshold is strictly greater-than: a set that is exactly 80% known
/// direction still scans as billing.
pub fn select_scan_mode(facts: &[Fact]) -> ScanMode {
    if direction_coverage(facts) > BANK_MODE_DIRECTION_THRESHOLD {
        ScanMode::Bank
    } else {
        ScanMode::Billing
    }
}

/// Run the full analysis pipeline over a fact set
pub fn analyze(facts: &[Fact], config: &AnalyzerConfig) -> AnalysisReport {
    let facts = canonicalize_facts(facts);
    let mode = select_scan_mode(&facts);
    tracing::info!(
        facts = facts.len(),
        mode = mode.as_str(),
        "Starting analysis"
    );

    let recurrence = build_recurrence_map(&facts);
    let ctx = DetectorContext {
        facts: &facts,
        config: &config.detection,
        recurrence: &recurrence,
    };
    let candidates = run_detectors(mode, &ctx);
    assert_evidence_exists(&facts, &candidates);

    let mut options = PruneOptions::for_mode(mode);
    options.max_issues = config.max_issues;
    let (issues, prune_stats) = prune(mode, candidates, &options);

    let not_flagged = build_not_flagged(mode, &facts, &recurrence, &issues);
    let (bank_insights, bank_diagnostics) = match mode {
        ScanMode::Bank => (
            Some(build_bank_insights(&facts, &recurrence)),
            Some(build_bank_diagnostics(&facts, &recurrence, config)),
        ),
        ScanMode::Billing => (None, None),
    };

    tracing::info!(issues = issues.len(), "Analysis complete");
    AnalysisReport {
        issues,
        not_flagged,
        scan_mode: mode,
        bank_insights,
        bank_diagnostics,
        prune_stats,
    }
}

/// Detectors must never reference fact IDs absent from their input. A
/// violation is a programming bug, so it fails loudly in debug builds
/// instead of silently miscounting evidence.
fn assert_evidence_exists(facts: &[Fact], candidates: &[ProposedIssue]) {
    if cfg!(debug_assertions) {
        let ids: BTreeSet<&str> = facts.iter().map(|f| f.id.as_str()).collect();
        for issue in candidates {
            for id in &issue.evidence_fact_ids {
                debug_assert!(
                    ids.contains(id.as_str()),
                    "issue {} references unknown fact id {}",
                    issue.issue_type,
                    id
                );
            }
        }
    }
}

type RecurrenceMap = std::collections::BTreeMap<String, RecurrenceClassification>;

fn entity_raw<'a>(group: &[&'a Fact]) -> Option<&'a str> {
    group.iter().find_map(|f| f.entity_raw.as_deref())
}

/// Short notes on what the scan saw and deliberately declined to flag
fn build_not_flagged(
    mode: ScanMode,
    facts: &[Fact],
    recurrence: &RecurrenceMap,
    issues: &[ProposedIssue],
) -> Vec<String> {
    let mut notes = Vec::new();
    let flagged: BTreeSet<&str> = issues.iter().map(|i| i.entity_name.as_str()).collect();
    let groups = group_by_entity(facts);

    match mode {
        ScanMode::Bank => {
            let excluded = groups
                .iter()
                .filter(|(entity, group)| exclusion::is_excluded(entity, entity_raw(group)))
                .count();
            if excluded > 0 {
                notes.push(format!(
                    "{} transfer/fee entities (P2P, card payments, bank fees) were excluded from pattern detection",
                    excluded
                ));
            }

            let stable = recurrence
                .iter()
                .filter(|(entity, c)| {
                    c.is_monthly
                        && !flagged.contains(entity.as_str())
                        && !groups
                            .get(entity.as_str())
                            .map(|g| exclusion::is_excluded(entity, entity_raw(g)))
                            .unwrap_or(false)
                })
                .count();
            if stable > 0 {
                notes.push(format!(
                    "{} recurring merchants looked stable and were not flagged",
                    stable
                ));
            }

            let pending = facts
                .iter()
                .filter(|f| f.clearing_status == crate::models::ClearingStatus::Pending)
                .count();
            if pending > 0 {
                notes.push(format!(
                    "{} pending transactions were ignored until they clear",
                    pending
                ));
            }
        }
        ScanMode::Billing => {
            let paid_invoices = facts
                .iter()
                .filter(|f| {
                    f.fact_type == crate::models::FactType::Invoice
                        && f.status == crate::models::FactStatus::Paid
                })
                .count();
            if paid_invoices > 0 {
                notes.push(format!(
                    "{} invoices are already paid and were not flagged",
                    paid_invoices
                ));
            }

            let steady = groups
                .keys()
                .filter(|entity| !flagged.contains(entity.as_str()))
                .count();
            if steady > 0 && !issues.is_empty() {
                notes.push(format!(
                    "{} entities showed no billing anomalies",
                    steady
                ));
            }
        }
    }

    notes
}

/// Informational recurring-spend aggregation for bank scans
///
/// The total is only summed when every recurring merchant has a known median
/// in one shared currency.
fn build_bank_insights(facts: &[Fact], recurrence: &RecurrenceMap) -> BankInsights {
    let groups = group_by_entity(facts);
    let mut merchants = Vec::new();

    for (entity, classification) in recurrence {
        if !classification.is_monthly {
            continue;
        }
        let group = match groups.get(entity) {
            Some(g) => g,
            None => continue,
        };
        if exclusion::is_excluded(entity, entity_raw(group)) {
            continue;
        }
        let currencies: BTreeSet<&str> = group
            .iter()
            .filter(|f| is_qualifying(f))
            .filter_map(|f| f.amount_currency.as_deref())
            .collect();
        let currency = match currencies.len() {
            1 => currencies.into_iter().next().map(String::from),
            _ => None,
        };
        merchants.push(RecurringMerchant {
            name: entity.clone(),
            tier: classification.tier.as_str().to_string(),
            median_amount: classification.median_amount,
            currency,
            evidence_count: classification.evidence_count,
        });
    }

    let shared_currencies: BTreeSet<&str> = merchants
        .iter()
        .filter_map(|m| m.currency.as_deref())
        .collect();
    let can_sum = !merchants.is_empty()
        && shared_currencies.len() == 1
        && merchants
            .iter()
            .all(|m| m.median_amount.is_some() && m.currency.is_some());
    let total = can_sum
        .then(|| merchants.iter().filter_map(|m| m.median_amount).sum());

    BankInsights {
        recurring_merchant_count: merchants.len(),
        recurring_merchants: merchants,
        total_monthly_recurring: total,
        can_sum_recurring: can_sum,
    }
}

/// Explains why a bank scan surfaced few or no issues
fn build_bank_diagnostics(
    facts: &[Fact],
    recurrence: &RecurrenceMap,
    config: &AnalyzerConfig,
) -> BankDiagnostics {
    let cfg = &config.detection;
    let total_facts = facts.len();
    let dated = facts.iter().filter(|f| f.date_value.is_some()).count();
    let date_coverage_percent = if total_facts == 0 {
        0.0
    } else {
        dated as f64 / total_facts as f64 * 100.0
    };
    let qualifying_facts = facts.iter().filter(|f| is_qualifying(f)).count();

    let groups = group_by_entity(facts);
    let total_entities = groups.len();
    let excluded_entities = groups
        .iter()
        .filter(|(entity, group)| exclusion::is_excluded(entity, entity_raw(group)))
        .count();
    let exclusion_rate_percent = if total_entities == 0 {
        0.0
    } else {
        excluded_entities as f64 / total_entities as f64 * 100.0
    };

    let qualifying_count = |entity: &str| -> usize {
        groups
            .get(entity)
            .map(|g| g.iter().filter(|f| is_qualifying(f)).count())
            .unwrap_or(0)
    };
    let included = |entity: &str| -> bool {
        groups
            .get(entity)
            .map(|g| !exclusion::is_excluded(entity, entity_raw(g)))
            .unwrap_or(false)
    };

    let new_recurring_eligible = recurrence
        .iter()
        .filter(|(entity, c)| c.is_monthly && c.evidence_count >= 3 && included(entity))
        .count();
    let creep_eligible = groups
        .keys()
        .filter(|entity| included(entity) && qualifying_count(entity) >= cfg.creep_min_occurrences)
        .count();
    let duplicate_eligible = groups
        .keys()
        .filter(|entity| qualifying_count(entity) >= 2)
        .count();
    let spike_eligible = groups
        .keys()
        .filter(|entity| included(entity) && qualifying_count(entity) >= cfg.spike_min_occurrences)
        .count();

    let detector_eligibility = vec![
        DetectorEligibility {
            detector: IssueType::NewRecurringCharge,
            eligible_entities: new_recurring_eligible,
        },
        DetectorEligibility {
            detector: IssueType::PriceCreep,
            eligible_entities: creep_eligible,
        },
        DetectorEligibility {
            detector: IssueType::DuplicateCharge,
            eligible_entities: duplicate_eligible,
        },
        DetectorEligibility {
            detector: IssueType::UnusualSpike,
            eligible_entities: spike_eligible,
        },
    ];

    // Most significant blocker first
    let mut top_blockers = Vec::new();
    if date_coverage_percent < 80.0 {
        top_blockers.push(format!(
            "Only {:.0}% of transactions carry a date; undated transactions cannot support pattern detection",
            date_coverage_percent
        ));
    }
    if total_facts > 0 && qualifying_facts < total_facts / 2 {
        top_blockers.push(format!(
            "Only {} of {} transactions are cleared outflows with both a date and an amount",
            qualifying_facts, total_facts
        ));
    }
    if exclusion_rate_percent > 50.0 {
        top_blockers.push(format!(
            "{} of {} entities are transfers, card payments, or bank fees and were excluded",
            excluded_entities, total_entities
        ));
    }
    if total_entities > 0 && creep_eligible == 0 && spike_eligible == 0 {
        top_blockers.push(format!(
            "No merchant has {}+ charges yet; price and spike detection need more history",
            cfg.creep_min_occurrences
        ));
    }

    BankDiagnostics {
        total_facts,
        date_coverage_percent,
        qualifying_facts,
        total_entities,
        excluded_entities,
        exclusion_rate_percent,
        detector_eligibility,
        top_blockers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use crate::test_utils::{monthly_outflows, FactBuilder};

    #[test]
    fn test_empty_set_is_billing() {
        assert_eq!(select_scan_mode(&[]), ScanMode::Billing);
    }

    #[test]
    fn test_mode_threshold_is_strict() {
        // Exactly 80% known direction: still billing
        let mut facts: Vec<Fact> = (0..4)
            .map(|i| {
                FactBuilder::bank_outflow(&format!("b{}", i))
                    .entity("X")
                    .amount(10.0, "USD")
                    .date("2024-01-01")
                    .build()
            })
            .collect();
        facts.push(
            FactBuilder::payment("p1")
                .entity("X")
                .direction(Direction::Unknown)
                .build(),
        );
        assert_eq!(select_scan_mode(&facts), ScanMode::Billing);

        // 5 of 6 known: strictly above 80%, bank
        facts.push(
            FactBuilder::bank_outflow("b5")
                .entity("X")
                .amount(10.0, "USD")
                .date("2024-01-02")
                .build(),
        );
        assert_eq!(select_scan_mode(&facts), ScanMode::Bank);
    }

    #[test]
    fn test_analyze_stable_merchant_not_flagged() {
        // A long-running stable subscription produces no issues, but shows up
        // in insights and the not-flagged notes
        let facts = monthly_outflows(
            "NETFLIX",
            15.99,
            "USD",
            &["2024-01-01", "2024-01-31", "2024-03-01", "2024-03-31", "2024-04-30"],
        );
        let config = AnalyzerConfig::default();
        let report = analyze(&facts, &config);
        assert_eq!(report.scan_mode, ScanMode::Bank);
        assert!(report.issues.is_empty());
        assert!(report
            .not_flagged
            .iter()
            .any(|n| n.contains("recurring merchants looked stable")));

        let insights = report.bank_insights.unwrap();
        assert_eq!(insights.recurring_merchant_count, 1);
        assert!(insights.can_sum_recurring);
        assert_eq!(insights.total_monthly_recurring, Some(15.99));
    }

    #[test]
    fn test_excluded_merchant_absent_from_insights() {
        let facts = monthly_outflows(
            "ZELLE JOHN SMITH",
            500.0,
            "USD",
            &["2024-01-01", "2024-01-31", "2024-03-01"],
        );
        let config = AnalyzerConfig::default();
        let report = analyze(&facts, &config);
        let insights = report.bank_insights.unwrap();
        assert_eq!(insights.recurring_merchant_count, 0);
        assert!(!insights.can_sum_recurring);
        assert!(report
            .not_flagged
            .iter()
            .any(|n| n.contains("excluded from pattern detection")));
    }

    #[test]
    fn test_diagnostics_counts() {
        let mut facts = monthly_outflows(
            "NETFLIX",
            15.99,
            "USD",
            &["2024-01-01", "2024-01-31", "2024-03-01"],
        );
        facts.push(
            FactBuilder::bank_outflow("z1")
                .entity("ZELLE JOHN SMITH")
                .amount(100.0, "USD")
                .date("2024-02-15")
                .build(),
        );
        let config = AnalyzerConfig::default();
        let report = analyze(&facts, &config);
        let diag = report.bank_diagnostics.unwrap();
        assert_eq!(diag.total_facts, 4);
        assert_eq!(diag.qualifying_facts, 4);
        assert_eq!(diag.total_entities, 2);
        assert_eq!(diag.excluded_entities, 1);
        assert_eq!(diag.exclusion_rate_percent, 50.0);
        let new_recurring = diag
            .detector_eligibility
            .iter()
            .find(|e| e.detector == IssueType::NewRecurringCharge)
            .unwrap();
        assert_eq!(new_recurring.eligible_entities, 1);
    }
}
