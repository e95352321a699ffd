//! Two-tier recurrence classification
//!
//! Derives an "is this entity billed monthly?" answer from transaction
//! timing and amount patterns, for use when explicit recurrence metadata is
//! absent. Deliberately conservative: only cleared outflows with both a date
//! and an amount count as evidence; pending, reversed, and inflow facts are
//! ignored entirely.
//!
//! Computed fresh per analysis run and never persisted. The map built by
//! [`build_recurrence_map`] is passed by shared reference into every
//! detector call.

use std::collections::BTreeMap;

use crate::canonical::entity_key;
use crate::models::{ClearingStatus, Direction, Fact};
use crate::stats::{day_gaps, median, relative_deviations};

/// Strict tier: gaps must land in [28, 33] days
const STRICT_GAP_RANGE: (i64, i64) = (28, 33);
/// Likely tier: looser [28, 35] day window
const LOOSE_GAP_RANGE: (i64, i64) = (28, 35);
/// Strict tier amount tolerance around the median
const STRICT_AMOUNT_TOLERANCE: f64 = 0.10;
/// Likely tier amount tolerance around the median
const LIKELY_AMOUNT_TOLERANCE: f64 = 0.20;
/// Minimum qualifying facts before any classification is attempted
const MIN_QUALIFYING_FACTS: usize = 3;
/// The likely tier needs one more occurrence than the strict tier
const LIKELY_MIN_FACTS: usize = 4;

/// Classification tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceTier {
    Strict,
    Likely,
    None,
}

impl RecurrenceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Likely => "likely",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for RecurrenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Gap counts reported for diagnostics regardless of which tier was reached
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntervalStats {
    pub gap_count: usize,
    /// Gaps inside the strict [28, 33] window
    pub strict_window_gaps: usize,
    /// Gaps inside the loose [28, 35] window
    pub loose_window_gaps: usize,
}

/// Derived monthly-cadence classification for one entity
#[derive(Debug, Clone)]
pub struct RecurrenceClassification {
    pub is_monthly: bool,
    pub tier: RecurrenceTier,
    pub confidence: f64,
    pub evidence_count: usize,
    pub median_amount: Option<f64>,
    pub interval_stats: IntervalStats,
}

impl RecurrenceClassification {
    fn none(evidence_count: usize, median_amount: Option<f64>, stats: IntervalStats) -> Self {
        Self {
            is_monthly: false,
            tier: RecurrenceTier::None,
            confidence: 0.0,
            evidence_count,
            median_amount,
            interval_stats: stats,
        }
    }
}

/// Predicate for facts that count as recurrence evidence
pub fn is_qualifying(fact: &Fact) -> bool {
    fact.direction == Direction::Outflow
        && fact.clearing_status == ClearingStatus::Cleared
        && fact.amount_value.is_some()
        && fact.date_value.is_some()
}

/// Classify one entity's facts into a recurrence tier
pub fn classify_entity(facts: &[&Fact]) -> RecurrenceClassification {
    let mut qualifying: Vec<&Fact> = facts.iter().copied().filter(|f| is_qualifying(f)).collect();
    // Secondary sort on id keeps same-day charges in a stable order
    qualifying.sort_by(|a, b| a.date_value.cmp(&b.date_value).then(a.id.cmp(&b.id)));

    let amounts: Vec<f64> = qualifying.iter().filter_map(|f| f.amount_value).collect();
    let dates: Vec<_> = qualifying.iter().filter_map(|f| f.date_value).collect();
    let med = median(&amounts);

    let gaps = day_gaps(&dates);
    let stats = IntervalStats {
        gap_count: gaps.len(),
        strict_window_gaps: gaps
            .iter()
            .filter(|g| (STRICT_GAP_RANGE.0..=STRICT_GAP_RANGE.1).contains(*g))
            .count(),
        loose_window_gaps: gaps
            .iter()
            .filter(|g| (LOOSE_GAP_RANGE.0..=LOOSE_GAP_RANGE.1).contains(*g))
            .count(),
    };

    let count = qualifying.len();
    if count < MIN_QUALIFYING_FACTS {
        return RecurrenceClassification::none(count, med, stats);
    }

    let median_amount = match med {
        Some(m) if m > 0.0 => m,
        _ => return RecurrenceClassification::none(count, med, stats),
    };

    let deviations = match relative_deviations(&amounts, median_amount) {
        Some(d) => d,
        None => return RecurrenceClassification::none(count, med, stats),
    };
    let avg_deviation = deviations.iter().sum::<f64>() / deviations.len() as f64;
    let max_deviation = deviations.iter().cloned().fold(0.0, f64::max);

    // Strict tier: at least 2 gaps in the tight window and every amount
    // within ±10% of the median
    if stats.strict_window_gaps >= 2 && max_deviation <= STRICT_AMOUNT_TOLERANCE {
        let interval_consistency = stats.strict_window_gaps as f64 / stats.gap_count as f64;
        let amount_consistency = (1.0 - avg_deviation / STRICT_AMOUNT_TOLERANCE).clamp(0.0, 1.0);
        let evidence_boost = (count as f64 / 6.0).min(1.0);
        let confidence = (interval_consistency * 0.5
            + amount_consistency * 0.3
            + evidence_boost * 0.2)
            .min(1.0)
            .max(0.85);
        return RecurrenceClassification {
            is_monthly: true,
            tier: RecurrenceTier::Strict,
            confidence,
            evidence_count: count,
            median_amount: Some(median_amount),
            interval_stats: stats,
        };
    }

    // Likely tier, only attempted when strict fails: one more occurrence
    // required, looser gap window, ±20% amounts. Evidence boost counts from
    // the 4th occurrence onward.
    if count >= LIKELY_MIN_FACTS
        && stats.loose_window_gaps >= 2
        && max_deviation <= LIKELY_AMOUNT_TOLERANCE
    {
        let interval_consistency = stats.loose_window_gaps as f64 / stats.gap_count as f64;
        let amount_consistency = (1.0 - avg_deviation / LIKELY_AMOUNT_TOLERANCE).clamp(0.0, 1.0);
        let evidence_boost = ((count.saturating_sub(3)) as f64 / 6.0).min(1.0);
        let confidence = (interval_consistency * 0.4
            + amount_consistency * 0.3
            + evidence_boost * 0.3)
            .max(0.5)
            .min(0.75);
        return RecurrenceClassification {
            is_monthly: true,
            tier: RecurrenceTier::Likely,
            confidence,
            evidence_count: count,
            median_amount: Some(median_amount),
            interval_stats: stats,
        };
    }

    RecurrenceClassification::none(count, Some(median_amount), stats)
}

/// Build the per-entity classification lookup map for one analysis run
///
/// Keyed by canonical entity key; BTreeMap so iteration order (and therefore
/// everything derived from it) is deterministic.
pub fn build_recurrence_map(facts: &[Fact]) -> BTreeMap<String, RecurrenceClassification> {
    let mut by_entity: BTreeMap<String, Vec<&Fact>> = BTreeMap::new();
    for fact in facts {
        by_entity.entry(entity_key(fact)).or_default().push(fact);
    }

    by_entity
        .into_iter()
        .map(|(entity, group)| {
            let classification = classify_entity(&group);
            tracing::debug!(
                entity = %entity,
                tier = classification.tier.as_str(),
                evidence = classification.evidence_count,
                "Recurrence classified"
            );
            (entity, classification)
        })
        .collect()
}
