//! Compiles upstream checker results into a human-readable compliance report.
//!
//! The formatter never validates anything itself; it always reports
//! `is_compliant = true` and puts the report under `details.report`.

use super::{details, Checker, CheckerDescriptor, Rule, FORMATTER};
use crate::analysis::{classify_value, Verdict};
use crate::error::CheckerError;
use crate::models::{AnalysisResult, AnalysisStatus, ComplianceSummary};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};

pub const REPORT_TYPE: &str = "Compliance Report";
pub const REPORT_VERSION: &str = "1.0";

/// Reduces a `compliance_results` mapping into one report.
pub struct ComplianceFormatter {
    descriptor: CheckerDescriptor,
}

impl ComplianceFormatter {
    pub fn new() -> Self {
        let rules = vec![
            Rule::new(
                "format_001",
                "Report Structure",
                "formatting",
                "National",
                "Internal Standards",
                "Compliance reports must follow standard structure",
            ),
            Rule::new(
                "format_002",
                "Summary Section",
                "formatting",
                "National",
                "Internal Standards",
                "Reports must include PASS/FAIL/WARNINGS summary",
            ),
            Rule::new(
                "format_003",
                "Recommendations",
                "formatting",
                "National",
                "Internal Standards",
                "Reports must include suggested corrections",
            ),
        ];

        Self {
            descriptor: CheckerDescriptor::new(
                FORMATTER,
                "Compiles findings into human-readable report with PASS/FAIL/WARNINGS summary",
                rules,
            ),
        }
    }
}

impl Default for ComplianceFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Checker for ComplianceFormatter {
    fn descriptor(&self) -> &CheckerDescriptor {
        &self.descriptor
    }

    async fn analyze(&self, project: &Value) -> Result<AnalysisResult, CheckerError> {
        let empty = Map::new();
        let results = project
            .get("compliance_results")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let project_info = project
            .get("project_info")
            .cloned()
            .unwrap_or_else(|| json!({}));

        Ok(AnalysisResult {
            status: AnalysisStatus::Completed,
            is_compliant: Some(true),
            summary: ComplianceSummary::default(),
            details: details([("report", generate_report(results, project_info))]),
            timestamp: Utc::now(),
        })
    }
}

/// Build the full report value.
pub fn generate_report(results: &Map<String, Value>, project_info: Value) -> Value {
    let overall_status = overall_status(results);

    json!({
        "report_metadata": {
            "generated_at": Utc::now().to_rfc3339(),
            "report_type": REPORT_TYPE,
            "version": REPORT_VERSION,
        },
        "project_info": project_info,
        "summary": summary(results, overall_status),
        "detailed_findings": detailed_findings(results),
        "recommendations": recommendations(results),
        "overall_status": overall_status,
    })
}

/// `unknown` when empty; otherwise `FAIL` beats `WARNINGS` beats `PASS`.
pub fn overall_status(results: &Map<String, Value>) -> &'static str {
    if results.is_empty() {
        return "unknown";
    }

    let verdicts: Vec<Verdict> = results.values().filter_map(classify_value).collect();
    if verdicts.contains(&Verdict::Failed) {
        "FAIL"
    } else if verdicts.contains(&Verdict::Warning) {
        "WARNINGS"
    } else {
        "PASS"
    }
}

fn summary(results: &Map<String, Value>, overall_status: &str) -> Value {
    let (mut passed, mut failed, mut warnings) = (0usize, 0usize, 0usize);

    for result in results.values().filter(|r| r.is_object()) {
        // Anything short of a completed run counts as failed here.
        if result.get("status").and_then(Value::as_str) != Some("completed") {
            failed += 1;
            continue;
        }
        match result.get("is_compliant").and_then(Value::as_bool) {
            Some(true) => passed += 1,
            Some(false) => failed += 1,
            None => warnings += 1,
        }
    }

    let total = results.len();
    let pass_rate = if total > 0 {
        format!("{}/{}", passed, total)
    } else {
        "N/A".to_string()
    };

    json!({
        "overall_status": overall_status,
        "total_agents": total,
        "passed": passed,
        "failed": failed,
        "warnings": warnings,
        "pass_rate": pass_rate,
    })
}

fn detailed_findings(results: &Map<String, Value>) -> Vec<Value> {
    results
        .iter()
        .filter(|(_, r)| r.is_object())
        .map(|(agent, result)| {
            json!({
                "agent": agent,
                "status": result.get("status").cloned().unwrap_or_else(|| json!("unknown")),
                "compliance": result.get("is_compliant").cloned().unwrap_or(Value::Null),
                "details": result.get("details").cloned().unwrap_or_else(|| json!({})),
                "summary": result.get("summary").cloned().unwrap_or_else(|| json!({})),
            })
        })
        .collect()
}

fn recommendations(results: &Map<String, Value>) -> Vec<Value> {
    results
        .iter()
        .filter_map(|(agent, result)| {
            let failed_run = result.get("status").and_then(Value::as_str) == Some("failed");
            let (kind, message) = match classify_value(result)? {
                Verdict::Failed if failed_run => (
                    "critical",
                    format!(
                        "Agent {} failed to complete analysis. Please review input data.",
                        agent
                    ),
                ),
                Verdict::Failed => (
                    "critical",
                    format!("Compliance failure detected by {}. Review required.", agent),
                ),
                Verdict::Warning => (
                    "warning",
                    format!("{} detected potential issues. Review recommended.", agent),
                ),
                Verdict::Passed => return None,
            };
            Some(json!({"agent": agent, "type": kind, "message": message}))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(project: Value) -> Value {
        let result = tokio_test::block_on(ComplianceFormatter::new().analyze(&project)).unwrap();
        assert_eq!(result.is_compliant, Some(true));
        result.details["report"].clone()
    }

    #[test]
    fn test_empty_results_are_unknown() {
        let report = report(json!({"compliance_results": {}}));
        assert_eq!(report["overall_status"], "unknown");
        assert_eq!(report["summary"]["pass_rate"], "N/A");
        assert_eq!(report["report_metadata"]["report_type"], REPORT_TYPE);
    }

    #[test]
    fn test_single_indeterminate_is_warnings() {
        let report = report(json!({
            "compliance_results": {"wall_agent": {"status": "completed", "is_compliant": null}}
        }));
        assert_eq!(report["overall_status"], "WARNINGS");
        assert_eq!(report["summary"]["warnings"], 1);
        assert_eq!(report["recommendations"][0]["type"], "warning");
    }

    #[test]
    fn test_failure_dominates() {
        let report = report(json!({
            "project_info": {"name": "House A"},
            "compliance_results": {
                "area_agent": {"status": "completed", "is_compliant": null},
                "energy_agent": {"status": "failed", "error": "boom"},
                "wall_agent": {"status": "completed", "is_compliant": true}
            }
        }));

        assert_eq!(report["overall_status"], "FAIL");
        assert_eq!(report["project_info"]["name"], "House A");
        assert_eq!(report["summary"]["pass_rate"], "1/3");
        assert_eq!(report["summary"]["failed"], 1);
        assert_eq!(report["detailed_findings"].as_array().unwrap().len(), 3);

        let recommendations = report["recommendations"].as_array().unwrap();
        assert_eq!(recommendations.len(), 2);
        assert!(recommendations[1]["message"]
            .as_str()
            .unwrap()
            .contains("failed to complete analysis"));
    }

    #[test]
    fn test_all_compliant_is_pass() {
        let report = report(json!({
            "compliance_results": {"wall_agent": {"status": "completed", "is_compliant": true}}
        }));
        assert_eq!(report["overall_status"], "PASS");
        assert!(report["recommendations"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_missing_mapping_is_unknown() {
        let report = report(json!({}));
        assert_eq!(report["overall_status"], "unknown");
    }
}
