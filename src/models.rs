//! Data models for the compliance workflow.
//!
//! This module contains the core data structures shared by checkers, the
//! execution wrapper and the orchestrator: rule outcomes, analysis results,
//! execution statistics, workflow sessions and the aggregate report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Severity of a compliance issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Advisory finding, still counts as a failed check.
    Warning,
    /// Blocking finding for a council submission.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "Warning"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

impl Severity {
    /// Returns an emoji representation of the severity.
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Warning => "🟡",
            Severity::Critical => "🔴",
        }
    }
}

/// Outcome of evaluating one rule against one item (or a group of items).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCheckOutcome {
    /// Human-readable rule name, e.g. "Minimum Wall Thickness".
    pub rule: String,
    /// Whether the rule passed.
    pub passed: bool,
    /// Explanation of the outcome.
    pub details: String,
    /// Advisory note attached to a passing outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl RuleCheckOutcome {
    pub fn pass(rule: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            passed: true,
            details: details.into(),
            warning: None,
        }
    }

    pub fn fail(rule: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            passed: false,
            details: details.into(),
            warning: None,
        }
    }

    /// Attach an advisory warning to this outcome.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }
}

/// Summary folded from a list of rule outcomes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    pub total_checks: usize,
    pub passed: usize,
    pub failed: usize,
    /// `passed / total_checks`, or 0 when there were no checks.
    pub compliance_rate: f64,
    pub details: Vec<RuleCheckOutcome>,
}

impl ComplianceSummary {
    /// Creates a summary from a list of outcomes.
    pub fn from_outcomes(outcomes: Vec<RuleCheckOutcome>) -> Self {
        let total_checks = outcomes.len();
        let passed = outcomes.iter().filter(|o| o.passed).count();
        let compliance_rate = if total_checks == 0 {
            0.0
        } else {
            passed as f64 / total_checks as f64
        };

        Self {
            total_checks,
            passed,
            failed: total_checks - passed,
            compliance_rate,
            details: outcomes,
        }
    }
}

/// A structured rule violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Violation kind, e.g. `thickness` or `missing_egress`.
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    /// Free-form context (ids, actual and limit values, nested issue lists).
    #[serde(flatten)]
    pub context: Map<String, Value>,
}

impl Issue {
    pub fn new(kind: impl Into<String>, severity: Severity) -> Self {
        Self {
            kind: kind.into(),
            severity,
            context: Map::new(),
        }
    }

    /// Add a context field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

/// Terminal status of a single analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Completed,
    Failed,
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisStatus::Completed => write!(f, "completed"),
            AnalysisStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Result of one `Checker::analyze` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub status: AnalysisStatus,
    /// `None` means indeterminate (reported as a warning).
    pub is_compliant: Option<bool>,
    pub summary: ComplianceSummary,
    pub details: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

/// Record produced when a checker errors instead of returning a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub status: AnalysisStatus,
    pub error: String,
    pub agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl FailureRecord {
    pub fn new(agent: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: AnalysisStatus::Failed,
            error: error.into(),
            agent: agent.into(),
            session_id: None,
        }
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Enrichment metadata merged next to a base result.
///
/// Flattened next to [`AnalysisResult`]; no key here (`ai_*`, `using_fallback`)
/// shares a name with a result field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    /// `false` when no enrichment client is configured for the run.
    pub ai_enabled: bool,
    pub ai_enhanced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_thinking: Option<String>,
    #[serde(default)]
    pub using_fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_error: Option<String>,
}

impl Enrichment {
    /// No enrichment client was available.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// The enrichment step itself failed.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ai_enabled: true,
            ai_error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// A checker result plus its enrichment metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedResult {
    #[serde(flatten)]
    pub result: AnalysisResult,
    #[serde(flatten)]
    pub enrichment: Enrichment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// What one checker task produced: a result or a captured error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckerOutcome {
    Analyzed(Box<EnrichedResult>),
    Errored(FailureRecord),
}

impl CheckerOutcome {
    pub fn status(&self) -> AnalysisStatus {
        match self {
            CheckerOutcome::Analyzed(r) => r.result.status,
            CheckerOutcome::Errored(f) => f.status,
        }
    }

    pub fn is_compliant(&self) -> Option<bool> {
        match self {
            CheckerOutcome::Analyzed(r) => r.result.is_compliant,
            CheckerOutcome::Errored(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status() == AnalysisStatus::Failed
    }

    pub fn details(&self) -> Map<String, Value> {
        match self {
            CheckerOutcome::Analyzed(r) => r.result.details.clone(),
            CheckerOutcome::Errored(_) => Map::new(),
        }
    }

    pub fn errors(&self) -> Vec<String> {
        match self {
            CheckerOutcome::Analyzed(r) => r.enrichment.ai_error.iter().cloned().collect(),
            CheckerOutcome::Errored(f) => vec![f.error.clone()],
        }
    }

    /// The plain analysis result, if the checker produced one.
    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            CheckerOutcome::Analyzed(r) => Some(&r.result),
            CheckerOutcome::Errored(_) => None,
        }
    }
}

/// Lifecycle status of a checker as seen by its execution wrapper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckerStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

/// The most recent invocation of a checker. Overwritten on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastRun {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Per-checker execution statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub name: String,
    pub description: String,
    pub status: CheckerStatus,
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub last_run: Option<LastRun>,
    pub execution_log_count: usize,
}

/// One entry of a checker's execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub agent: String,
    pub session_id: Option<String>,
    pub event: String,
    pub details: Value,
}

/// Lifecycle of a workflow session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Completed,
}

/// One execution of the checker workflow for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSession {
    pub session_id: String,
    pub project_id: String,
    pub started_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub results: BTreeMap<String, CheckerOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_report: Option<AggregateReport>,
    /// Set when the workflow budget elapsed and stragglers were aborted.
    #[serde(default)]
    pub timed_out: bool,
}

/// Workflow-level verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Pass,
    Warning,
    Fail,
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallStatus::Pass => write!(f, "pass"),
            OverallStatus::Warning => write!(f, "warning"),
            OverallStatus::Fail => write!(f, "fail"),
        }
    }
}

impl OverallStatus {
    pub fn emoji(&self) -> &'static str {
        match self {
            OverallStatus::Pass => "✅",
            OverallStatus::Warning => "⚠️",
            OverallStatus::Fail => "❌",
        }
    }
}

/// Per-checker entry of the aggregate report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReport {
    pub status: AnalysisStatus,
    pub compliance: Option<bool>,
    pub details: Map<String, Value>,
    pub errors: Vec<String>,
}

/// Counts of the three-way classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub warnings: usize,
}

/// Combined verdict for one workflow session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub generated_at: DateTime<Utc>,
    pub agents: BTreeMap<String, AgentReport>,
    pub summary: ReportSummary,
    pub overall_status: OverallStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Warning < Severity::Critical);
        assert_eq!(Severity::Critical.emoji(), "🔴");
    }

    #[test]
    fn test_summary_from_outcomes() {
        let summary = ComplianceSummary::from_outcomes(vec![
            RuleCheckOutcome::pass("A", "ok"),
            RuleCheckOutcome::fail("B", "bad"),
            RuleCheckOutcome::pass("C", "ok"),
        ]);

        assert_eq!(summary.total_checks, 3);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.passed + summary.failed, summary.total_checks);
        assert!((summary.compliance_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_summary_rate_is_zero() {
        let summary = ComplianceSummary::from_outcomes(Vec::new());
        assert_eq!(summary.total_checks, 0);
        assert_eq!(summary.compliance_rate, 0.0);
    }

    #[test]
    fn test_issue_serializes_flat() {
        let issue = Issue::new("thickness", Severity::Critical)
            .with("wall_id", "w1")
            .with("actual", 90.0);

        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(value["type"], "thickness");
        assert_eq!(value["severity"], "critical");
        assert_eq!(value["wall_id"], "w1");
    }

    #[test]
    fn test_failure_outcome_accessors() {
        let outcome = CheckerOutcome::Errored(FailureRecord::new("wall_agent", "boom"));
        assert!(outcome.is_failed());
        assert_eq!(outcome.is_compliant(), None);
        assert_eq!(outcome.errors(), vec!["boom".to_string()]);

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value, json!({"status": "failed", "error": "boom", "agent": "wall_agent"}));
    }

    #[test]
    fn test_enriched_result_keys_do_not_collide() {
        let result = EnrichedResult {
            result: AnalysisResult {
                status: AnalysisStatus::Completed,
                is_compliant: Some(true),
                summary: ComplianceSummary::default(),
                details: Map::new(),
                timestamp: Utc::now(),
            },
            enrichment: Enrichment::failed("offline"),
            session_id: Some("p1_20260101000000".to_string()),
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["is_compliant"], true);
        assert_eq!(value["ai_enhanced"], false);
        assert_eq!(value["ai_error"], "offline");
        assert_eq!(value["using_fallback"], false);
        assert_eq!(value["session_id"], "p1_20260101000000");
        assert!(value["summary"].is_object());

        let back: EnrichedResult = serde_json::from_value(value).unwrap();
        assert_eq!(back, result);
    }
}
