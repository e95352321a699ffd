//! Scan command: load a fact file, run the analysis, render the report

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use untangle_core::evidence::format_amount;
use untangle_core::{analyze, AnalysisReport, AnalyzerConfig, Fact, Severity};

/// Read a JSON array of facts, the shape upstream collaborators produce
pub fn load_facts(path: &Path) -> Result<Vec<Fact>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read fact file {}", path.display()))?;
    let facts: Vec<Fact> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse facts from {}", path.display()))?;
    Ok(facts)
}

pub fn cmd_scan(
    file: &Path,
    json: bool,
    config_path: Option<&Path>,
    max_issues: Option<usize>,
) -> Result<()> {
    let facts = load_facts(file)?;

    let mut config = match config_path {
        Some(path) => AnalyzerConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AnalyzerConfig::default(),
    };
    if let Some(n) = max_issues {
        config.max_issues = n;
    }

    let report = analyze(&facts, &config);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, facts.len());
    }
    Ok(())
}

fn severity_marker(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "🔴",
        Severity::Medium => "🟡",
        Severity::Low => "⚪",
    }
}

fn print_report(report: &AnalysisReport, fact_count: usize) {
    println!(
        "🔍 Scanned {} facts in {} mode",
        fact_count, report.scan_mode
    );
    println!();

    if report.issues.is_empty() {
        println!("✅ No issues found");
    } else {
        println!("Found {} issue(s):", report.issues.len());
        println!();
        for (i, issue) in report.issues.iter().enumerate() {
            println!(
                "{}. {} {} [{}]",
                i + 1,
                severity_marker(issue.severity),
                issue.title,
                issue.severity
            );
            println!("   Evidence: {}", issue.evidence_summary);
            if let Some(min) = issue.impact_min {
                println!(
                    "   Estimated impact: {}",
                    format_amount(min, issue.currency.as_deref())
                );
            }
            for line in &issue.rationale {
                println!("   - {}", line);
            }
            println!("   Confidence: {:.0}%", issue.confidence * 100.0);
            println!();
        }
    }

    if !report.not_flagged.is_empty() {
        println!("Not flagged:");
        for note in &report.not_flagged {
            println!("   - {}", note);
        }
        println!();
    }

    if let Some(insights) = &report.bank_insights {
        println!(
            "Recurring merchants: {}",
            insights.recurring_merchant_count
        );
        for m in &insights.recurring_merchants {
            let amount = match m.median_amount {
                Some(a) => format_amount(a, m.currency.as_deref()),
                None => "amount unknown".to_string(),
            };
            println!(
                "   - {} ({} tier, {} charges, ~{}/month)",
                m.name, m.tier, m.evidence_count, amount
            );
        }
        if let Some(total) = insights.total_monthly_recurring {
            println!("   Total recurring: ~{}/month", format_amount(total, None));
        }
        println!();
    }

    if let Some(diag) = &report.bank_diagnostics {
        if !diag.top_blockers.is_empty() {
            println!("Why not more issues:");
            for blocker in &diag.top_blockers {
                println!("   - {}", blocker);
            }
            println!();
        }
    }

    let stats = &report.prune_stats;
    let dropped = stats.dropped_low_evidence
        + stats.dropped_duplicates
        + stats.dropped_per_entity_cap
        + stats.dropped_low_severity
        + stats.dropped_by_cap;
    if dropped > 0 {
        println!(
            "Filtered {} weaker candidate(s): {} low evidence, {} duplicates, {} per-entity cap, {} low severity, {} over cap",
            dropped,
            stats.dropped_low_evidence,
            stats.dropped_duplicates,
            stats.dropped_per_entity_cap,
            stats.dropped_low_severity,
            stats.dropped_by_cap
        );
    }
}
