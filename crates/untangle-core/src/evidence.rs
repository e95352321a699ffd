//! Evidence summaries and strict impact calculation
//!
//! Impact is only ever computed from unambiguous data: every contributing
//! fact must carry an amount, and all of them must agree on a single
//! currency. The gap and drift calculators additionally require explicit
//! monthly recurrence metadata and stable amounts. Any violation yields a
//! specific human-readable refusal reason instead of a best-guess number.

use crate::models::{DateRange, EvidenceStats, Fact, Recurrence};
use crate::stats::{all_within, mean, median};

/// Amount stability tolerance for the gap and drift impact calculators
const IMPACT_STABILITY_TOLERANCE: f64 = 0.10;

/// A conservative monetary-impact estimate
///
/// Either both bounds and the currency are present, or neither is and
/// `reason` says why.
#[derive(Debug, Clone)]
pub struct ImpactEstimate {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub currency: Option<String>,
    pub reason: Option<String>,
}

impl ImpactEstimate {
    fn known(amount: f64, currency: String) -> Self {
        Self {
            min: Some(amount),
            max: Some(amount),
            currency: Some(currency),
            reason: None,
        }
    }

    fn unknown(reason: impl Into<String>) -> Self {
        Self {
            min: None,
            max: None,
            currency: None,
            reason: Some(reason.into()),
        }
    }

    pub fn is_known(&self) -> bool {
        self.min.is_some()
    }
}

/// Distinct non-null currencies across a group, in first-seen order
fn distinct_currencies(facts: &[&Fact]) -> Vec<String> {
    let mut seen = Vec::new();
    for f in facts {
        if let Some(c) = &f.amount_currency {
            if !seen.contains(c) {
                seen.push(c.clone());
            }
        }
    }
    seen
}

/// The single shared currency of a group, or `None` when absent or mixed
fn shared_currency(facts: &[&Fact]) -> Option<String> {
    let currencies = distinct_currencies(facts);
    match currencies.len() {
        1 => currencies.into_iter().next(),
        _ => None,
    }
}

/// Common preconditions: every amount present, exactly one currency.
/// Returns the currency on success, a refusal reason otherwise.
fn check_amounts_and_currency(facts: &[&Fact], noun: &str) -> Result<String, String> {
    if facts.is_empty() {
        return Err(format!("No {} to estimate from", noun));
    }
    if facts.iter().any(|f| f.amount_value.is_none()) {
        return Err(format!("Missing amounts on some {}", noun));
    }
    let currencies = distinct_currencies(facts);
    match currencies.len() {
        0 => Err(format!("No currency information on {}", noun)),
        1 => Ok(currencies.into_iter().next().unwrap()),
        _ => Err(format!("Mixed currencies across {}", noun)),
    }
}

fn all_explicitly_monthly(facts: &[&Fact]) -> bool {
    facts.iter().all(|f| f.recurrence == Recurrence::Monthly)
}

/// Impact of aging unpaid invoices: the sum of the aged amounts
pub fn unpaid_aging_impact(aged_invoices: &[&Fact]) -> ImpactEstimate {
    let currency = match check_amounts_and_currency(aged_invoices, "invoices") {
        Ok(c) => c,
        Err(reason) => return ImpactEstimate::unknown(reason),
    };
    let total: f64 = aged_invoices.iter().filter_map(|f| f.amount_value).sum();
    ImpactEstimate::known(total, currency)
}

/// Impact of a recurring-payment gap: pre-gap median times months missed
///
/// Requires explicit monthly recurrence on every contributing payment and
/// amount stability within ±10% of the pre-gap median.
pub fn payment_gap_impact(pre_gap_payments: &[&Fact], months_missed: i64) -> ImpactEstimate {
    let currency = match check_amounts_and_currency(pre_gap_payments, "payments") {
        Ok(c) => c,
        Err(reason) => return ImpactEstimate::unknown(reason),
    };
    if !all_explicitly_monthly(pre_gap_payments) {
        return ImpactEstimate::unknown("Recurrence not explicitly monthly for all payments");
    }
    let amounts: Vec<f64> = pre_gap_payments.iter().filter_map(|f| f.amount_value).collect();
    let med = match median(&amounts) {
        Some(m) if m > 0.0 => m,
        _ => return ImpactEstimate::unknown("Payment amounts are zero or unavailable"),
    };
    if !all_within(&amounts, med, IMPACT_STABILITY_TOLERANCE) {
        return ImpactEstimate::unknown("Payment amounts not stable enough to estimate");
    }
    if months_missed <= 0 {
        return ImpactEstimate::unknown("No full months missed");
    }
    ImpactEstimate::known(med * months_missed as f64, currency)
}

/// Impact of amount drift, annualized: `(prior median − recent average) × 12`
///
/// Same strictness as the gap calculator: explicit monthly recurrence across
/// the whole group, single currency, and prior-run stability within ±10%.
pub fn drift_impact(prior: &[&Fact], recent: &[&Fact]) -> ImpactEstimate {
    let all: Vec<&Fact> = prior.iter().chain(recent.iter()).copied().collect();
    let currency = match check_amounts_and_currency(&all, "payments") {
        Ok(c) => c,
        Err(reason) => return ImpactEstimate::unknown(reason),
    };
    if !all_explicitly_monthly(&all) {
        return ImpactEstimate::unknown("Recurrence not explicitly monthly for all payments");
    }
    let prior_amounts: Vec<f64> = prior.iter().filter_map(|f| f.amount_value).collect();
    let recent_amounts: Vec<f64> = recent.iter().filter_map(|f| f.amount_value).collect();
    let prior_median = match median(&prior_amounts) {
        Some(m) if m > 0.0 => m,
        _ => return ImpactEstimate::unknown("Prior amounts are zero or unavailable"),
    };
    if !all_within(&prior_amounts, prior_median, IMPACT_STABILITY_TOLERANCE) {
        return ImpactEstimate::unknown("Prior amounts not stable enough to estimate");
    }
    let recent_avg = match mean(&recent_amounts) {
        Some(a) => a,
        None => return ImpactEstimate::unknown("No recent payments to compare"),
    };
    let annualized = (prior_median - recent_avg) * 12.0;
    if annualized <= 0.0 {
        return ImpactEstimate::unknown("Recent amounts are not below the prior median");
    }
    ImpactEstimate::known(annualized, currency)
}

/// Impact of a duplicate-charge group: one unit per extra occurrence
pub fn duplicate_impact(group: &[&Fact]) -> ImpactEstimate {
    let currency = match check_amounts_and_currency(group, "charges") {
        Ok(c) => c,
        Err(reason) => return ImpactEstimate::unknown(reason),
    };
    if group.len() < 2 {
        return ImpactEstimate::unknown("Not enough charges to be a duplicate");
    }
    let amount = match group[0].amount_value {
        Some(a) => a,
        None => return ImpactEstimate::unknown("Missing amounts on some charges"),
    };
    ImpactEstimate::known(amount * (group.len() - 1) as f64, currency)
}

/// Structured evidence stats for audit/report rendering
pub fn build_evidence_stats(facts: &[&Fact]) -> EvidenceStats {
    let mut dates: Vec<_> = facts.iter().filter_map(|f| f.date_value).collect();
    dates.sort();
    let date_range = match (dates.first(), dates.last()) {
        (Some(start), Some(end)) => Some(DateRange {
            start: *start,
            end: *end,
        }),
        _ => None,
    };

    let amounts: Vec<f64> = facts.iter().filter_map(|f| f.amount_value).collect();

    let mut source_references = Vec::new();
    for f in facts {
        if let Some(r) = &f.source_reference {
            if !source_references.contains(r) {
                source_references.push(r.clone());
            }
        }
    }

    EvidenceStats {
        count: facts.len(),
        date_range,
        median_amount: median(&amounts),
        currency: shared_currency(facts),
        source_references,
    }
}

/// Format an amount with its currency, `$` shorthand for USD
pub fn format_amount(value: f64, currency: Option<&str>) -> String {
    match currency {
        Some("USD") => format!("${:.2}", value),
        Some(c) => format!("{:.2} {}", value, c),
        None => format!("{:.2}", value),
    }
}

/// Plain-language one-line evidence summary: count, month range, median
pub fn summarize_evidence(noun: &str, facts: &[&Fact]) -> String {
    let stats = build_evidence_stats(facts);
    let range = match stats.date_range {
        Some(r) if r.start == r.end => format!(" on {}", r.start.format("%b %-d, %Y")),
        Some(r) => format!(
            " from {} to {}",
            r.start.format("%b %Y"),
            r.end.format("%b %Y")
        ),
        None => String::new(),
    };
    let median_part = match stats.median_amount {
        Some(m) => format!(
            ", median {}",
            format_amount(m, stats.currency.as_deref())
        ),
        None => String::new(),
    };
    format!("{} {}{}{}", stats.count, noun, range, median_part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FactBuilder;

    #[test]
    fn test_mixed_currencies_refused() {
        let a = FactBuilder::invoice("i1").entity("ACME").amount(1000.0, "USD").build();
        let b = FactBuilder::invoice("i2").entity("ACME").amount(500.0, "EUR").build();
        let impact = unpaid_aging_impact(&[&a, &b]);
        assert!(impact.min.is_none());
        assert!(impact.max.is_none());
        assert!(impact.reason.unwrap().contains("Mixed currencies"));
    }

    #[test]
    fn test_unpaid_aging_sums() {
        let a = FactBuilder::invoice("i1").entity("ACME").amount(1000.0, "USD").build();
        let b = FactBuilder::invoice("i2").entity("ACME").amount(500.0, "USD").build();
        let impact = unpaid_aging_impact(&[&a, &b]);
        assert_eq!(impact.min, Some(1500.0));
        assert_eq!(impact.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_missing_amount_refused() {
        let a = FactBuilder::invoice("i1").entity("ACME").amount(1000.0, "USD").build();
        let b = FactBuilder::invoice("i2").entity("ACME").build();
        let impact = unpaid_aging_impact(&[&a, &b]);
        assert!(impact.min.is_none());
        assert!(impact.reason.unwrap().contains("Missing amounts"));
    }

    #[test]
    fn test_gap_impact_requires_explicit_monthly() {
        use crate::models::Recurrence;
        let facts: Vec<_> = (1..=4)
            .map(|i| {
                FactBuilder::payment(&format!("p{}", i))
                    .entity("ACME")
                    .amount(8500.0, "USD")
                    .date(&format!("2024-0{}-01", i))
                    .build()
            })
            .collect();
        let refs: Vec<&Fact> = facts.iter().collect();
        // Recurrence unknown: refuse
        let impact = payment_gap_impact(&refs, 2);
        assert!(impact.min.is_none());
        assert!(impact.reason.unwrap().contains("not explicitly monthly"));

        // Explicit monthly: median * months
        let monthly: Vec<_> = facts
            .iter()
            .map(|f| {
                let mut f = f.clone();
                f.recurrence = Recurrence::Monthly;
                f
            })
            .collect();
        let refs: Vec<&Fact> = monthly.iter().collect();
        let impact = payment_gap_impact(&refs, 2);
        assert_eq!(impact.min, Some(17000.0));
    }

    #[test]
    fn test_gap_impact_rejects_unstable_amounts() {
        use crate::models::Recurrence;
        let amounts = [100.0, 100.0, 100.0, 150.0];
        let facts: Vec<_> = amounts
            .iter()
            .enumerate()
            .map(|(i, amt)| {
                FactBuilder::payment(&format!("p{}", i))
                    .entity("ACME")
                    .amount(*amt, "USD")
                    .date(&format!("2024-0{}-01", i + 1))
                    .recurrence(Recurrence::Monthly)
                    .build()
            })
            .collect();
        let refs: Vec<&Fact> = facts.iter().collect();
        let impact = payment_gap_impact(&refs, 1);
        assert!(impact.min.is_none());
        assert!(impact.reason.unwrap().contains("not stable"));
    }

    #[test]
    fn test_drift_impact_annualizes() {
        use crate::models::Recurrence;
        let prior: Vec<_> = (1..=3)
            .map(|i| {
                FactBuilder::payment(&format!("p{}", i))
                    .entity("ACME")
                    .amount(1000.0, "USD")
                    .date(&format!("2024-0{}-01", i))
                    .recurrence(Recurrence::Monthly)
                    .build()
            })
            .collect();
        let recent: Vec<_> = (4..=5)
            .map(|i| {
                FactBuilder::payment(&format!("p{}", i))
                    .entity("ACME")
                    .amount(700.0, "USD")
                    .date(&format!("2024-0{}-01", i))
                    .recurrence(Recurrence::Monthly)
                    .build()
            })
            .collect();
        let prior_refs: Vec<&Fact> = prior.iter().collect();
        let recent_refs: Vec<&Fact> = recent.iter().collect();
        let impact = drift_impact(&prior_refs, &recent_refs);
        // (1000 - 700) * 12
        assert_eq!(impact.min, Some(3600.0));
    }

    #[test]
    fn test_duplicate_impact_counts_extras() {
        let a = FactBuilder::payment("p1").entity("ACME").amount(100.0, "USD").date("2024-01-15").build();
        let b = FactBuilder::payment("p2").entity("ACME").amount(100.0, "USD").date("2024-01-15").build();
        let impact = duplicate_impact(&[&a, &b]);
        assert_eq!(impact.min, Some(100.0));
        assert_eq!(impact.max, Some(100.0));
    }

    #[test]
    fn test_evidence_stats_mixed_currency_is_none() {
        let a = FactBuilder::payment("p1").entity("X").amount(10.0, "USD").date("2024-01-01").build();
        let b = FactBuilder::payment("p2").entity("X").amount(20.0, "EUR").date("2024-02-01").build();
        let stats = build_evidence_stats(&[&a, &b]);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.currency, None);
        assert!(stats.date_range.is_some());
    }

    #[test]
    fn test_summarize_evidence_reads_naturally() {
        let a = FactBuilder::payment("p1").entity("X").amount(85.0, "USD").date("2024-01-05").build();
        let b = FactBuilder::payment("p2").entity("X").amount(85.0, "USD").date("2024-05-05").build();
        let s = summarize_evidence("payments", &[&a, &b]);
        assert!(s.starts_with("2 payments"));
        assert!(s.contains("Jan 2024"));
        assert!(s.contains("$85.00"));
    }
}
