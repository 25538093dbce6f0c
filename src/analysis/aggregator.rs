//! Result classification and report compilation.
//!
//! Every checker outcome lands in exactly one of three buckets; the
//! workflow verdict is folded from those buckets with a sticky `fail`.

use crate::models::{
    AgentReport, AggregateReport, AnalysisStatus, CheckerOutcome, OverallStatus, ReportSummary,
};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;

/// Three-way classification of one checker's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Warning,
    Failed,
}

/// Not completed, or explicitly non-compliant, is a failure. Indeterminate
/// compliance is a warning.
pub fn classify(status: AnalysisStatus, compliance: Option<bool>) -> Verdict {
    match (status, compliance) {
        (AnalysisStatus::Failed, _) | (_, Some(false)) => Verdict::Failed,
        (_, None) => Verdict::Warning,
        (_, Some(true)) => Verdict::Passed,
    }
}

pub fn classify_outcome(outcome: &CheckerOutcome) -> Verdict {
    classify(outcome.status(), outcome.is_compliant())
}

/// Classify a serialized checker result. Non-objects are skipped.
///
/// Only an explicit `"failed"` status counts as a failure here; a result
/// without an `is_compliant` boolean is indeterminate.
pub fn classify_value(result: &Value) -> Option<Verdict> {
    let object = result.as_object()?;

    if object.get("status").and_then(Value::as_str) == Some("failed") {
        return Some(Verdict::Failed);
    }

    Some(match object.get("is_compliant").and_then(Value::as_bool) {
        Some(false) => Verdict::Failed,
        Some(true) => Verdict::Passed,
        None => Verdict::Warning,
    })
}

/// Fold one verdict into the running workflow status. `Fail` never downgrades.
pub fn fold_status(current: OverallStatus, verdict: Verdict) -> OverallStatus {
    match (current, verdict) {
        (_, Verdict::Failed) | (OverallStatus::Fail, _) => OverallStatus::Fail,
        (OverallStatus::Pass, Verdict::Warning) => OverallStatus::Warning,
        (current, _) => current,
    }
}

/// Compile the aggregate report for a finished workflow.
pub fn compile_report(results: &BTreeMap<String, CheckerOutcome>) -> AggregateReport {
    let mut summary = ReportSummary {
        total: results.len(),
        ..ReportSummary::default()
    };
    let mut overall_status = OverallStatus::Pass;
    let mut agents = BTreeMap::new();

    for (name, outcome) in results {
        let verdict = classify_outcome(outcome);
        match verdict {
            Verdict::Passed => summary.passed += 1,
            Verdict::Warning => summary.warnings += 1,
            Verdict::Failed => summary.failed += 1,
        }
        overall_status = fold_status(overall_status, verdict);

        agents.insert(
            name.clone(),
            AgentReport {
                status: outcome.status(),
                compliance: outcome.is_compliant(),
                details: outcome.details(),
                errors: outcome.errors(),
            },
        );
    }

    AggregateReport {
        generated_at: Utc::now(),
        agents,
        summary,
        overall_status,
    }
}

/// Names of checkers that failed, in name order.
pub fn failed_agents(report: &AggregateReport) -> Vec<&str> {
    report
        .agents
        .iter()
        .filter(|(_, a)| classify(a.status, a.compliance) == Verdict::Failed)
        .map(|(name, _)| name.as_str())
        .collect()
}

/// Generate a text summary of the report counts.
pub fn summary_text(report: &AggregateReport) -> String {
    let summary = &report.summary;
    let mut lines = Vec::new();

    lines.push(format!(
        "Overall: {} {}",
        report.overall_status.emoji(),
        report.overall_status.to_string().to_uppercase()
    ));
    lines.push(format!("Checkers: {}", summary.total));
    lines.push(format!("- ✅ Passed: {}", summary.passed));
    lines.push(format!("- ⚠️ Warnings: {}", summary.warnings));
    lines.push(format!("- ❌ Failed: {}", summary.failed));

    let failed = failed_agents(report);
    if !failed.is_empty() {
        lines.push(String::new());
        lines.push(format!("Failing: {}", failed.join(", ")));
    }

    lines.join("\n")
}
