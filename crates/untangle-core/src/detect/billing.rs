//! Billing-mode detectors
//!
//! Run over invoice/payment fact sets: aging unpaid invoices, missing
//! recurring payments, shrinking payment amounts, and same-day duplicate
//! charges.

use std::collections::BTreeMap;

use crate::evidence::{
    build_evidence_stats, drift_impact, duplicate_impact, format_amount, payment_gap_impact,
    summarize_evidence, unpaid_aging_impact, ImpactEstimate,
};
use crate::models::{
    DateType, Fact, FactStatus, FactType, IssueType, ProposedIssue, Severity,
};
use crate::stats::{all_within, day_gaps, mean, median};

use super::{
    amount_cents, group_by_entity, is_effectively_monthly, sort_by_date, DetectorContext,
};

/// Unpaid invoices older than this are high severity
const AGING_HIGH_DAYS: i64 = 90;
/// Unpaid invoices older than this are medium severity
const AGING_MEDIUM_DAYS: i64 = 60;
const AGING_CONFIDENCE: f64 = 0.85;

/// Missing this many months is high severity
const GAP_HIGH_MONTHS: i64 = 3;
const GAP_MEDIUM_MONTHS: i64 = 2;
const GAP_CONFIDENCE: f64 = 0.80;

/// Relative drop that makes drift high severity
const DRIFT_HIGH_DROP: f64 = 0.40;
const DRIFT_MEDIUM_DROP: f64 = 0.30;
const DRIFT_CONFIDENCE: f64 = 0.75;

/// Duplicate issues start from this base, then take the mandatory 0.8 factor
const DUPLICATE_BASE_CONFIDENCE: f64 = 0.90;
const DUPLICATE_CONFIDENCE_FACTOR: f64 = 0.80;

/// Rationale line attached whenever monthly cadence came from the derived
/// classification instead of explicit metadata
pub const DERIVED_CADENCE_NOTE: &str = "Monthly cadence derived from transaction pattern.";

fn impact_note(rationale: &mut Vec<String>, impact: &ImpactEstimate) {
    if let Some(reason) = &impact.reason {
        rationale.push(format!("Impact not estimated: {}", reason));
    }
}

/// Flag unpaid invoices that have been sitting past the aging threshold
pub fn detect_unpaid_invoice_aging(ctx: &DetectorContext<'_>) -> Vec<ProposedIssue> {
    let cfg = ctx.config;
    let mut issues = Vec::new();

    for (entity, group) in group_by_entity(ctx.facts) {
        let mut aged: Vec<&Fact> = group
            .into_iter()
            .filter(|f| {
                f.fact_type == FactType::Invoice
                    && f.status == FactStatus::Unpaid
                    && matches!(f.date_type, Some(DateType::Due) | Some(DateType::Issued))
            })
            .filter(|f| match f.date_value {
                Some(d) => (cfg.today - d).num_days() >= cfg.unpaid_aging_min_days,
                None => false,
            })
            .collect();
        if aged.is_empty() {
            continue;
        }
        sort_by_date(&mut aged);

        // Sorted ascending, so the oldest invoice is first
        let oldest = aged[0];
        let max_age = (cfg.today - oldest.date_value.unwrap_or(cfg.today)).num_days();
        let severity = if max_age > AGING_HIGH_DAYS {
            Severity::High
        } else if max_age > AGING_MEDIUM_DAYS {
            Severity::Medium
        } else {
            Severity::Low
        };

        let impact = unpaid_aging_impact(&aged);
        let mut rationale = vec![
            format!(
                "{} unpaid invoice(s) outstanding for {}+ days",
                aged.len(),
                cfg.unpaid_aging_min_days
            ),
            format!("Oldest unpaid invoice is {} days old", max_age),
        ];
        impact_note(&mut rationale, &impact);

        let stats = build_evidence_stats(&aged);
        issues.push(ProposedIssue {
            issue_type: IssueType::UnpaidInvoiceAging,
            title: format!("Aging unpaid invoices: {}", entity),
            severity,
            confidence: AGING_CONFIDENCE,
            impact_min: impact.min,
            impact_max: impact.max,
            currency: impact.currency.clone().or_else(|| stats.currency.clone()),
            rationale,
            evidence_fact_ids: aged.iter().map(|f| f.id.clone()).collect(),
            entity_name: entity,
            evidence_summary: summarize_evidence("unpaid invoices", &aged),
            evidence_stats: stats,
        });
    }

    issues
}

/// Flag entities whose monthly payment stream has a hole in it
pub fn detect_recurring_payment_gap(ctx: &DetectorContext<'_>) -> Vec<ProposedIssue> {
    let cfg = ctx.config;
    let mut issues = Vec::new();

    for (entity, group) in group_by_entity(ctx.facts) {
        let mut used_derived = false;
        let mut payments: Vec<&Fact> = group
            .into_iter()
            .filter(|f| {
                f.fact_type == FactType::Payment
                    && f.status == FactStatus::Paid
                    && f.date_value.is_some()
            })
            .filter(|f| {
                let (monthly, derived) = is_effectively_monthly(f, &entity, ctx.recurrence);
                used_derived |= monthly && derived;
                monthly
            })
            .collect();
        if payments.len() < 2 {
            continue;
        }
        sort_by_date(&mut payments);

        let dates: Vec<_> = payments.iter().filter_map(|f| f.date_value).collect();
        let gaps = day_gaps(&dates);
        let Some((gap_idx, &largest_gap)) = gaps
            .iter()
            .enumerate()
            .max_by_key(|(_, g)| **g)
        else {
            continue;
        };
        if largest_gap <= cfg.gap_threshold_days {
            continue;
        }

        let gap_start = dates[gap_idx];
        let gap_end = dates[gap_idx + 1];
        let months_missed = ((largest_gap as f64 / 30.0).round() as i64 - 1).max(1);
        let severity = if months_missed >= GAP_HIGH_MONTHS {
            Severity::High
        } else if months_missed >= GAP_MEDIUM_MONTHS {
            Severity::Medium
        } else {
            Severity::Low
        };

        let pre_gap: Vec<&Fact> = payments
            .iter()
            .copied()
            .filter(|f| f.date_value.map(|d| d <= gap_start).unwrap_or(false))
            .collect();
        let impact = payment_gap_impact(&pre_gap, months_missed);

        let mut rationale = vec![
            format!(
                "No payment for {} days between {} and {}",
                largest_gap, gap_start, gap_end
            ),
            format!("Roughly {} expected monthly payment(s) missing", months_missed),
        ];
        if used_derived {
            rationale.push(DERIVED_CADENCE_NOTE.to_string());
        }
        impact_note(&mut rationale, &impact);

        let stats = build_evidence_stats(&payments);
        issues.push(ProposedIssue {
            issue_type: IssueType::RecurringPaymentGap,
            title: format!("Missing recurring payment: {}", entity),
            severity,
            confidence: GAP_CONFIDENCE,
            impact_min: impact.min,
            impact_max: impact.max,
            currency: impact.currency.clone().or_else(|| stats.currency.clone()),
            rationale,
            evidence_fact_ids: payments.iter().map(|f| f.id.clone()).collect(),
            entity_name: entity,
            evidence_summary: summarize_evidence("payments", &payments),
            evidence_stats: stats,
        });
    }

    issues
}

/// Flag monthly payment streams whose recent amounts dropped well below the
/// stable prior run
pub fn detect_amount_drift(ctx: &DetectorContext<'_>) -> Vec<ProposedIssue> {
    let cfg = ctx.config;
    let mut issues = Vec::new();

    for (entity, group) in group_by_entity(ctx.facts) {
        let mut used_derived = false;
        let mut payments: Vec<&Fact> = group
            .into_iter()
            .filter(|f| {
                f.fact_type == FactType::Payment
                    && f.status == FactStatus::Paid
                    && f.date_value.is_some()
                    && f.amount_value.is_some()
            })
            .filter(|f| {
                let (monthly, derived) = is_effectively_monthly(f, &entity, ctx.recurrence);
                used_derived |= monthly && derived;
                monthly
            })
            .collect();
        if payments.len() < cfg.drift_min_occurrences {
            continue;
        }
        sort_by_date(&mut payments);

        let split = payments.len() - 2;
        let (prior, recent) = payments.split_at(split);
        let prior_amounts: Vec<f64> = prior.iter().filter_map(|f| f.amount_value).collect();
        let recent_amounts: Vec<f64> = recent.iter().filter_map(|f| f.amount_value).collect();

        let Some(prior_median) = median(&prior_amounts).filter(|m| *m > 0.0) else {
            continue;
        };
        if !all_within(&prior_amounts, prior_median, cfg.drift_stability_tolerance) {
            continue;
        }
        let Some(recent_avg) = mean(&recent_amounts) else {
            continue;
        };
        let drop_fraction = (prior_median - recent_avg) / prior_median;
        if drop_fraction < cfg.drift_drop_threshold {
            continue;
        }

        let severity = if drop_fraction >= DRIFT_HIGH_DROP {
            Severity::High
        } else if drop_fraction >= DRIFT_MEDIUM_DROP {
            Severity::Medium
        } else {
            Severity::Low
        };

        let impact = drift_impact(prior, recent);
        let stats = build_evidence_stats(&payments);
        let currency = impact.currency.clone().or_else(|| stats.currency.clone());
        let mut rationale = vec![
            format!(
                "Prior {} payments stable around {}",
                prior.len(),
                format_amount(prior_median, currency.as_deref())
            ),
            format!(
                "Average of last 2 payments ({}) is {:.0}% below the prior median",
                format_amount(recent_avg, currency.as_deref()),
                drop_fraction * 100.0
            ),
        ];
        if used_derived {
            rationale.push(DERIVED_CADENCE_NOTE.to_string());
        }
        impact_note(&mut rationale, &impact);

        issues.push(ProposedIssue {
            issue_type: IssueType::AmountDrift,
            title: format!("Payment amounts drifting down: {}", entity),
            severity,
            confidence: DRIFT_CONFIDENCE,
            impact_min: impact.min,
            impact_max: impact.max,
            currency,
            rationale,
            evidence_fact_ids: payments.iter().map(|f| f.id.clone()).collect(),
            entity_name: entity,
            evidence_summary: summarize_evidence("payments", &payments),
            evidence_stats: stats,
        });
    }

    issues
}

/// Flag same-entity, same-day, same-amount payment groups
///
/// No exclusion check here: duplicate transfers are still a legitimate
/// concern.
pub fn detect_duplicate_charges(ctx: &DetectorContext<'_>) -> Vec<ProposedIssue> {
    let mut issues = Vec::new();

    for (entity, group) in group_by_entity(ctx.facts) {
        let qualifying: Vec<&Fact> = group
            .into_iter()
            .filter(|f| {
                f.fact_type == FactType::Payment
                    && f.date_value.is_some()
                    && f.amount_value.is_some()
            })
            .collect();

        let mut by_key: BTreeMap<(chrono::NaiveDate, i64), Vec<&Fact>> = BTreeMap::new();
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
            let impact = duplicate_impact(&dup_group);
            let stats = build_evidence_stats(&dup_group);
            let currency = impact.currency.clone().or_else(|| stats.currency.clone());
            let mut rationale = vec![
                format!(
                    "{} payments of {} on {}",
                    dup_group.len(),
                    format_amount(amount, currency.as_deref()),
                    date
                ),
                "Identical same-day charges usually indicate double billing".to_string(),
            ];
            impact_note(&mut rationale, &impact);

            issues.push(ProposedIssue {
                issue_type: IssueType::DuplicateCharge,
                title: format!("Possible duplicate charge: {}", entity),
                severity: Severity::Low,
                confidence: DUPLICATE_BASE_CONFIDENCE * DUPLICATE_CONFIDENCE_FACTOR,
                impact_min: impact.min,
                impact_max: impact.max,
                currency,
                rationale,
                evidence_fact_ids: dup_group.iter().map(|f| f.id.clone()).collect(),
                entity_name: entity.clone(),
                evidence_summary: summarize_evidence("payments", &dup_group),
                evidence_stats: stats,
            });
        }
    }

    issues
}
