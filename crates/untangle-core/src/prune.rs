//! Deterministic issue pruning and ranking
//!
//! Six stages over the full candidate list, in a fixed order: score-sort,
//! evidence gate, dedup, per-entity cap, low-severity filter, total cap.
//! The order is load-bearing; reordering the stages changes output. Every
//! stage counts what it drops because the counters are shown to users as
//! the explanation for "fewer issues than detected".

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{IssueType, ProposedIssue, PruneStats, ScanMode, Severity};

/// Default total-issue cap
pub const DEFAULT_MAX_ISSUES: usize = 8;
/// Default per-entity cap in billing mode
const BILLING_MAX_PER_ENTITY: usize = 2;
/// Bank mode is noisier, so the per-entity cap is tighter
const BANK_MAX_PER_ENTITY: usize = 1;

/// Bank mode stops allowing low-severity issues once this many non-low
/// issues survive the per-entity cap
const BANK_LOW_SEVERITY_SIGNAL: usize = 3;

/// Knobs for one prune run
#[derive(Debug, Clone)]
pub struct PruneOptions {
    /// Hard cap on the final list length
    pub max_issues: usize,
    /// Per-entity cap applied after dedup
    pub max_per_entity: usize,
    /// Whether low-severity issues are allowed at all; bank mode may force
    /// this off dynamically when enough stronger signal exists
    pub allow_low_severity: bool,
}

impl PruneOptions {
    pub fn for_mode(mode: ScanMode) -> Self {
        Self {
            max_issues: DEFAULT_MAX_ISSUES,
            max_per_entity: match mode {
                ScanMode::Billing => BILLING_MAX_PER_ENTITY,
                ScanMode::Bank => BANK_MAX_PER_ENTITY,
            },
            allow_low_severity: true,
        }
    }
}

/// Ranking score; higher is more urgent
///
/// Severity dominates, confidence separates within a severity band, and
/// impact/evidence act as small tie-breakers.
pub fn score(issue: &ProposedIssue) -> f64 {
    let impact = issue
        .impact_min
        .unwrap_or(0.0)
        .max(issue.impact_max.unwrap_or(0.0))
        .max(0.0);
    issue.severity.weight() as f64 * 10.0
        + issue.confidence * 5.0
        + (impact + 1.0).log10()
        + issue.evidence_fact_ids.len() as f64 * 0.2
}

/// Run the six-stage prune pipeline
pub fn prune(
    mode: ScanMode,
    candidates: Vec<ProposedIssue>,
    options: &PruneOptions,
) -> (Vec<ProposedIssue>, PruneStats) {
    let mut stats = PruneStats::default();
    let mut issues = candidates;

    // Stage 1: score and sort, descending. The sort is stable, so equal
    // scores keep detector emission order and the result is deterministic.
    issues.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Stage 2: evidence gate
    issues.retain(|i| {
        let keep = i.evidence_fact_ids.len() >= i.issue_type.min_evidence();
        if !keep {
            stats.dropped_low_evidence += 1;
        }
        keep
    });

    // Stage 3: dedup per (entity, issue type); first seen wins, which after
    // stage 1 means highest-scored
    let mut seen: BTreeSet<(String, IssueType)> = BTreeSet::new();
    issues.retain(|i| {
        let keep = seen.insert((i.entity_name.clone(), i.issue_type));
        if !keep {
            stats.dropped_duplicates += 1;
        }
        keep
    });

    // Stage 4: per-entity cap, highest-scored first
    let mut per_entity: BTreeMap<String, usize> = BTreeMap::new();
    issues.retain(|i| {
        let count = per_entity.entry(i.entity_name.clone()).or_insert(0);
        *count += 1;
        let keep = *count <= options.max_per_entity;
        if !keep {
            stats.dropped_per_entity_cap += 1;
        }
        keep
    });

    // Stage 5: low-severity filter. When lows are disallowed they are still
    // kept to backfill the quota if dropping them all would leave fewer than
    // max_issues. Bank mode disallows lows dynamically once enough non-low
    // signal survived stage 4.
    let non_low = issues.iter().filter(|i| i.severity != Severity::Low).count();
    let allow_low = options.allow_low_severity
        && !(mode == ScanMode::Bank && non_low >= BANK_LOW_SEVERITY_SIGNAL);
    if !allow_low {
        let low_quota = options.max_issues.saturating_sub(non_low);
        let mut kept_lows = 0;
        issues.retain(|i| {
            if i.severity != Severity::Low {
                return true;
            }
            if kept_lows < low_quota {
                kept_lows += 1;
                return true;
            }
            stats.dropped_low_severity += 1;
            false
        });
    }

    // Stage 6: total cap
    if issues.len() > options.max_issues {
        stats.dropped_by_cap = issues.len() - options.max_issues;
        issues.truncate(options.max_issues);
    }
    stats.was_capped = stats.dropped_by_cap > 0 || stats.dropped_per_entity_cap > 0;

    tracing::debug!(
        surviving = issues.len(),
        dropped_low_evidence = stats.dropped_low_evidence,
        dropped_duplicates = stats.dropped_duplicates,
        dropped_per_entity_cap = stats.dropped_per_entity_cap,
        dropped_low_severity = stats.dropped_low_severity,
        dropped_by_cap = stats.dropped_by_cap,
        "Prune complete"
    );

    (issues, stats)
}
