//! Markdown and JSON report generation.
//!
//! This module renders the aggregate report of one workflow session into
//! a document that can be attached to a council submission.

use crate::analysis::{classify, failed_agents, Verdict};
use crate::models::{AgentReport, AggregateReport, Issue, OverallStatus};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Run information shown alongside the aggregate report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub project_id: String,
    pub session_id: String,
    /// Enrichment model, or `None` when enrichment was off.
    pub enrichment_model: Option<String>,
    pub duration_seconds: f64,
    pub timed_out: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    metadata: &'a ReportMetadata,
    #[serde(flatten)]
    report: &'a AggregateReport,
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &AggregateReport, metadata: &ReportMetadata) -> String {
    let mut output = String::new();

    output.push_str("# PlanCheck Compliance Report\n\n");
    output.push_str(&generate_metadata_section(report, metadata));
    output.push_str(&generate_summary_section(report));
    output.push_str(&generate_checkers_section(report));
    output.push_str(&generate_recommendations_section(report));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(report: &AggregateReport, metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Project:** {}\n", metadata.project_id));
    section.push_str(&format!("- **Session:** `{}`\n", metadata.session_id));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    match metadata.enrichment_model {
        Some(ref model) => section.push_str(&format!("- **Enrichment Model:** `{}`\n", model)),
        None => section.push_str("- **Enrichment:** disabled\n"),
    }
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    if metadata.timed_out {
        section.push_str("- **Timed Out:** yes, unfinished checkers were aborted\n");
    }
    section.push('\n');

    section
}

fn generate_summary_section(report: &AggregateReport) -> String {
    let summary = &report.summary;
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str(&format!(
        "**Overall Status:** {} {}\n\n",
        report.overall_status.emoji(),
        report.overall_status.to_string().to_uppercase()
    ));

    section.push_str("| ✅ Passed | ⚠️ Warnings | ❌ Failed | **Total** |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** |\n\n",
        summary.passed, summary.warnings, summary.failed, summary.total
    ));

    section
}

fn generate_checkers_section(report: &AggregateReport) -> String {
    let mut section = String::new();

    section.push_str("## Checker Results\n\n");

    if report.agents.is_empty() {
        section.push_str("No checkers were run.\n\n");
        return section;
    }

    for (name, agent) in &report.agents {
        section.push_str(&generate_agent_block(name, agent));
    }

    section
}

fn generate_agent_block(name: &str, agent: &AgentReport) -> String {
    let mut block = String::new();

    let badge = match classify(agent.status, agent.compliance) {
        Verdict::Passed => "✅ **PASS**",
        Verdict::Warning => "⚠️ **WARNING**",
        Verdict::Failed => "❌ **FAIL**",
    };
    block.push_str(&format!("### {} {}\n\n", badge, name));

    let compliance = match agent.compliance {
        Some(true) => "compliant",
        Some(false) => "non-compliant",
        None => "indeterminate",
    };
    block.push_str(&format!(
        "*Status: {} | Compliance: {}*\n\n",
        agent.status, compliance
    ));

    for error in &agent.errors {
        block.push_str(&format!("> ❗ {}\n\n", error));
    }

    let issues = reported_issues(agent);
    let issues_found = agent
        .details
        .get("issues_found")
        .and_then(Value::as_u64)
        .unwrap_or(issues.len() as u64);

    if !issues.is_empty() {
        block.push_str(&format!("**Issues found:** {}\n\n", issues_found));
        for issue in &issues {
            block.push_str(&generate_issue_line(issue));
        }
        if issues_found > issues.len() as u64 {
            block.push_str(&format!(
                "- *...and {} more*\n",
                issues_found - issues.len() as u64
            ));
        }
        block.push('\n');
    }

    block
}

fn reported_issues(agent: &AgentReport) -> Vec<Issue> {
    agent
        .details
        .get("issues")
        .and_then(Value::as_array)
        .map(|issues| {
            issues
                .iter()
                .filter_map(|i| serde_json::from_value(i.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn generate_issue_line(issue: &Issue) -> String {
    let context: Vec<String> = issue
        .context
        .iter()
        .filter(|(_, v)| !v.is_array() && !v.is_object())
        .map(|(k, v)| match v {
            Value::String(s) => format!("{}: {}", k, s),
            other => format!("{}: {}", k, other),
        })
        .collect();

    if context.is_empty() {
        format!(
            "- {} **{}** `{}`\n",
            issue.severity.emoji(),
            issue.severity.to_string().to_uppercase(),
            issue.kind
        )
    } else {
        format!(
            "- {} **{}** `{}` ({})\n",
            issue.severity.emoji(),
            issue.severity.to_string().to_uppercase(),
            issue.kind,
            context.join(", ")
        )
    }
}

fn generate_recommendations_section(report: &AggregateReport) -> String {
    let mut section = String::new();

    section.push_str("## Recommendations\n\n");

    let failed = failed_agents(report);
    let indeterminate: Vec<&str> = report
        .agents
        .iter()
        .filter(|(_, a)| classify(a.status, a.compliance) == Verdict::Warning)
        .map(|(name, _)| name.as_str())
        .collect();

    if report.overall_status == OverallStatus::Pass {
        section.push_str("All checks passed. The submission is ready for council review. 🎉\n\n");
        return section;
    }

    let mut n = 0;
    for name in failed {
        n += 1;
        section.push_str(&format!(
            "{}. Resolve the issues reported by `{}` before submission.\n",
            n, name
        ));
    }
    for name in indeterminate {
        n += 1;
        section.push_str(&format!(
            "{}. Review `{}` manually; its compliance could not be determined.\n",
            n, name
        ));
    }
    section.push('\n');

    section
}

fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by PlanCheck*\n");

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &AggregateReport, metadata: &ReportMetadata) -> Result<String> {
    serde_json::to_string_pretty(&JsonReport { metadata, report }).map_err(Into::into)
}
