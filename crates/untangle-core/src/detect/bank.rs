//! Bank-mode detectors
//!
//! Run over bank-transaction fact sets: newly appeared recurring charges,
//! price creep on established subscriptions, same-day duplicate charges, and
//! one-off spending spikes. All but the duplicate detector skip entities the
//! exclusion classifier marks as transfers, card payments, or bank fees.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::evidence::{
    build_evidence_stats, duplicate_impact, format_amount, summarize_evidence,
};
use crate::exclusion;
use crate::models::{ClearingStatus, Direction, Fact, IssueType, ProposedIssue, Severity};
use crate::recurrence::is_qualifying;
use crate::stats::{all_within, median};

use super::{amount_cents, group_by_entity, sort_by_date, DetectorContext};

const PRICE_CREEP_CONFIDENCE: f64 = 0.80;
const SPIKE_CONFIDENCE: f64 = 0.85;

/// Duplicate issues start from this base, then take the mandatory 0.8 factor
const DUPLICATE_BASE_CONFIDENCE: f64 = 0.90;
const DUPLICATE_CONFIDENCE_FACTOR: f64 = 0.80;

/// First raw description in a group, for the weak-transfer exclusion rule
fn group_raw<'a>(group: &[&'a Fact]) -> Option<&'a str> {
    group.iter().find_map(|f| f.entity_raw.as_deref())
}

/// Latest date across all qualifying facts; the "end" of the dataset for
/// recency windows
pub fn dataset_end(facts: &[Fact]) -> Option<NaiveDate> {
    facts
        .iter()
        .filter(|f| is_qualifying(f))
        .filter_map(|f| f.date_value)
        .max()
}

/// Flag recurring charges whose first occurrence is recent
///
/// "Recurring" comes from the derived classification; the recency window is
/// anchored to the dataset end, not the wall clock, so old exports don't
/// flag everything.
pub fn detect_new_recurring_charges(ctx: &DetectorContext<'_>) -> Vec<ProposedIssue> {
    let cfg = ctx.config;
    let Some(end) = dataset_end(ctx.facts) else {
        return Vec::new();
    };
    let mut issues = Vec::new();

    for (entity, group) in group_by_entity(ctx.facts) {
        if exclusion::is_excluded(&entity, group_raw(&group)) {
            continue;
        }
        let Some(classification) = ctx.recurrence.get(&entity) else {
            continue;
        };
        if !classification.is_monthly || classification.evidence_count < 3 {
            continue;
        }

        let mut qualifying: Vec<&Fact> =
            group.into_iter().filter(|f| is_qualifying(f)).collect();
        sort_by_date(&mut qualifying);
        let Some(first_date) = qualifying.first().and_then(|f| f.date_value) else {
            continue;
        };
        if (end - first_date).num_days() > cfg.new_recurring_window_days {
            continue;
        }

        let annualized = classification.median_amount.map(|m| m * 12.0);
        let severity = match annualized {
            Some(a) if a > cfg.new_recurring_high_annual => Severity::High,
            _ => Severity::Medium,
        };

        let stats = build_evidence_stats(&qualifying);
        let mut rationale = vec![
            format!(
                "First charge on {}, within {} days of the latest activity",
                first_date, cfg.new_recurring_window_days
            ),
            format!(
                "{} charges at a monthly cadence ({} tier)",
                classification.evidence_count,
                classification.tier.as_str()
            ),
        ];
        if let (Some(m), Some(a)) = (classification.median_amount, annualized) {
            rationale.push(format!(
                "Roughly {} per month ({} per year) if it continues",
                format_amount(m, stats.currency.as_deref()),
                format_amount(a, stats.currency.as_deref())
            ));
        }

        issues.push(ProposedIssue {
            issue_type: IssueType::NewRecurringCharge,
            title: format!("New recurring charge: {}", entity),
            severity,
            confidence: classification.confidence,
            impact_min: None,
            impact_max: None,
            currency: stats.currency.clone(),
            rationale,
            evidence_fact_ids: qualifying.iter().map(|f| f.id.clone()).collect(),
            entity_name: entity,
            evidence_summary: summarize_evidence("charges", &qualifying),
            evidence_stats: stats,
        });
    }

    issues
}

/// Flag established charges whose latest amount jumped above a stable baseline
pub fn detect_price_creep(ctx: &DetectorContext<'_>) -> Vec<ProposedIssue> {
    let cfg = ctx.config;
    let mut issues = Vec::new();

    for (entity, group) in group_by_entity(ctx.facts) {
        if exclusion::is_excluded(&entity, group_raw(&group)) {
            continue;
        }
        let mut qualifying: Vec<&Fact> =
            group.into_iter().filter(|f| is_qualifying(f)).collect();
        if qualifying.len() < cfg.creep_min_occurrences {
            continue;
        }
        sort_by_date(&mut qualifying);

        let (baseline, latest) = qualifying.split_at(qualifying.len() - 1);
        let baseline_amounts: Vec<f64> =
            baseline.iter().filter_map(|f| f.amount_value).collect();
        let Some(baseline_median) = median(&baseline_amounts).filter(|m| *m > 0.0) else {
            continue;
        };
        if !all_within(&baseline_amounts, baseline_median, cfg.creep_stability_tolerance) {
            continue;
        }
        let Some(latest_amount) = latest[0].amount_value else {
            continue;
        };
        if latest_amount < baseline_median * (1.0 + cfg.creep_increase_threshold) {
            continue;
        }

        let annual_delta = (latest_amount - baseline_median) * 12.0;
        let severity = if annual_delta > cfg.creep_high_annual_delta {
            Severity::High
        } else {
            Severity::Medium
        };

        let stats = build_evidence_stats(&qualifying);
        let increase_pct = (latest_amount / baseline_median - 1.0) * 100.0;
        let rationale = vec![
            format!(
                "{} charges stable around {}",
                baseline.len(),
                format_amount(baseline_median, stats.currency.as_deref())
            ),
            format!(
                "Latest charge of {} is {:.0}% higher",
                format_amount(latest_amount, stats.currency.as_deref()),
                increase_pct
            ),
            format!(
                "Adds about {} per year at the new price",
                format_amount(annual_delta, stats.currency.as_deref())
            ),
        ];

        issues.push(ProposedIssue {
            issue_type: IssueType::PriceCreep,
            title: format!("Price increase: {}", entity),
            severity,
            confidence: PRICE_CREEP_CONFIDENCE,
            impact_min: None,
            impact_max: None,
            currency: stats.currency.clone(),
            rationale,
            evidence_fact_ids: qualifying.iter().map(|f| f.id.clone()).collect(),
            entity_name: entity,
            evidence_summary: summarize_evidence("charges", &qualifying),
            evidence_stats: stats,
        });
    }

    issues
}

/// Flag same-entity, same-day, same-amount cleared outflows
///
/// No exclusion check: a double-posted transfer is still worth a look.
pub fn detect_bank_duplicate_charges(ctx: &DetectorContext<'_>) -> Vec<ProposedIssue> {
    let cfg = ctx.config;
    let mut issues = Vec::new();

    for (entity, group) in group_by_entity(ctx.facts) {
        let qualifying: Vec<&Fact> = group
            .into_iter()
            .filter(|f| {
                f.direction == Direction::Outflow
                    && f.clearing_status == ClearingStatus::Cleared
                    && f.date_value.is_some()
                    && f.amount_value.is_some()
            })
            .collect();

        let mut by_key: BTreeMap<(NaiveDate, i64), Vec<&Fact>> = BTreeMap::new();
        for f in qualifying {
            let key = (f.date_value.unwrap(), amount_cents(f.amount_value.unwrap()));
            by_key.entry(key).or_default().push(f);
        }

        for ((date, _), mut dup_group) in by_key {
            if dup_group.len() < 2 {
                continue;
            }
            dup_group.sort_by(|a, b| a.id.cmp(&b.id));

            let amount = dup_group[0].amount_value.unwrap_or(0.0);
            let severity = if amount >= cfg.bank_duplicate_medium_amount {
                Severity::Medium
            } else {
                Severity::Low
            };

            let impact = duplicate_impact(&dup_group);
            let stats = build_evidence_stats(&dup_group);
            let currency = impact.currency.clone().or_else(|| stats.currency.clone());
            let mut rationale = vec![
                format!(
                    "{} charges of {} on {}",
                    dup_group.len(),
                    format_amount(amount, currency.as_deref()),
                    date
                ),
                "Identical same-day charges usually indicate double billing".to_string(),
            ];
            if let Some(reason) = &impact.reason {
                rationale.push(format!("Impact not estimated: {}", reason));
            }

            issues.push(ProposedIssue {
                issue_type: IssueType::DuplicateCharge,
                title: format!("Possible duplicate charge: {}", entity),
                severity,
                confidence: DUPLICATE_BASE_CONFIDENCE * DUPLICATE_CONFIDENCE_FACTOR,
                impact_min: impact.min,
                impact_max: impact.max,
                currency,
                rationale,
                evidence_fact_ids: dup_group.iter().map(|f| f.id.clone()).collect(),
                entity_name: entity.clone(),
                evidence_summary: summarize_evidence("charges", &dup_group),
                evidence_stats: stats,
            });
        }
    }

    issues
}

/// Flag a latest charge far above an entity's established history
pub fn detect_unusual_spikes(ctx: &DetectorContext<'_>) -> Vec<ProposedIssue> {
    let cfg = ctx.config;
    let mut issues = Vec::new();

    for (entity, group) in group_by_entity(ctx.facts) {
        if exclusion::is_excluded(&entity, group_raw(&group)) {
            continue;
        }
        let mut qualifying: Vec<&Fact> =
            group.into_iter().filter(|f| is_qualifying(f)).collect();
        if qualifying.len() < cfg.spike_min_occurrences {
            continue;
        }
        sort_by_date(&mut qualifying);

        let (history, latest) = qualifying.split_at(qualifying.len() - 1);
        let history_amounts: Vec<f64> =
            history.iter().filter_map(|f| f.amount_value).collect();
        let Some(history_median) = median(&history_amounts).filter(|m| *m > 0.0) else {
            continue;
        };
        let Some(latest_amount) = latest[0].amount_value else {
            continue;
        };
        if latest_amount < history_median * cfg.spike_multiplier {
            continue;
        }

        let delta = latest_amount - history_median;
        let severity = if delta >= cfg.spike_high_delta {
            Severity::High
        } else {
            Severity::Medium
        };

        let stats = build_evidence_stats(&qualifying);
        let rationale = vec![
            format!(
                "Typical charge is {} across {} prior transactions",
                format_amount(history_median, stats.currency.as_deref()),
                history.len()
            ),
            format!(
                "Latest charge of {} is {:.1}x the typical amount",
                format_amount(latest_amount, stats.currency.as_deref()),
                latest_amount / history_median
            ),
        ];

        issues.push(ProposedIssue {
            issue_type: IssueType::UnusualSpike,
            title: format!("Unusual spike: {}", entity),
            severity,
            confidence: SPIKE_CONFIDENCE,
            impact_min: None,
            impact_max: None,
            currency: stats.currency.clone(),
            rationale,
            evidence_fact_ids: qualifying.iter().map(|f| f.id.clone()).collect(),
            entity_name: entity,
            evidence_summary: summarize_evidence("charges", &qualifying),
            evidence_stats: stats,
        });
    }

    issues
}
