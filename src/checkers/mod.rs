//! Compliance checkers.
//!
//! Each checker owns a static rule table and evaluates a fixed subset of the
//! free-form project data against numeric thresholds. Checkers are stateless
//! per call; statistics live in the execution wrapper.

pub mod area;
pub mod council;
pub mod dimension;
pub mod energy;
pub mod formatter;
pub mod input;
pub mod wall;
pub mod window_door;

use crate::error::CheckerError;
use crate::models::{AnalysisResult, AnalysisStatus, ComplianceSummary, Issue, RuleCheckOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

pub use area::AreaChecker;
pub use council::CouncilChecker;
pub use dimension::DimensionChecker;
pub use energy::EnergyChecker;
pub use formatter::ComplianceFormatter;
pub use wall::WallChecker;
pub use window_door::WindowDoorChecker;

pub const WALL: &str = "wall_agent";
pub const DIMENSION: &str = "dimension_agent";
pub const WINDOW_DOOR: &str = "window_door_agent";
pub const AREA: &str = "area_agent";
pub const ENERGY: &str = "energy_agent";
pub const COUNCIL: &str = "council_agent";
pub const FORMATTER: &str = "compliance_formatter_agent";

/// Only this many issues are surfaced in `details.issues`; all still count.
pub const MAX_REPORTED_ISSUES: usize = 10;

/// Jurisdictions every built-in checker covers.
pub const DEFAULT_JURISDICTIONS: [&str; 2] = ["Johannesburg", "National"];

/// A single entry of a checker's rule table. Read-only reference data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub category: String,
    pub jurisdiction: String,
    pub code_reference: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl Rule {
    pub fn new(
        id: &str,
        name: &str,
        category: &str,
        jurisdiction: &str,
        code_reference: &str,
        description: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            jurisdiction: jurisdiction.to_string(),
            code_reference: code_reference.to_string(),
            description: description.to_string(),
            parameters: Map::new(),
        }
    }

    /// Add a threshold parameter.
    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }
}

/// Identity and rule table of a checker. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckerDescriptor {
    pub name: String,
    pub description: String,
    pub jurisdictions: BTreeSet<String>,
    pub rules: Vec<Rule>,
}

impl CheckerDescriptor {
    pub fn new(name: &str, description: &str, rules: Vec<Rule>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            jurisdictions: DEFAULT_JURISDICTIONS.iter().map(|j| j.to_string()).collect(),
            rules,
        }
    }
}

/// Short compliance verdict for one checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceCheck {
    pub agent: String,
    pub is_compliant: bool,
    pub timestamp: DateTime<Utc>,
}

/// A compliance rule evaluator for one architectural concern.
#[async_trait]
pub trait Checker: Send + Sync {
    /// Identity and rule table.
    fn descriptor(&self) -> &CheckerDescriptor;

    /// Stable unique name, used as the registry key.
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Evaluate the project data. Missing keys never raise.
    async fn analyze(&self, project: &Value) -> Result<AnalysisResult, CheckerError>;

    /// Whether the project passes this checker. Indeterminate counts as `false`.
    async fn validate(&self, project: &Value) -> Result<bool, CheckerError> {
        Ok(self.analyze(project).await?.is_compliant.unwrap_or(false))
    }

    async fn check_compliance(&self, project: &Value) -> Result<ComplianceCheck, CheckerError> {
        let is_compliant = self.validate(project).await?;
        Ok(ComplianceCheck {
            agent: self.name().to_string(),
            is_compliant,
            timestamp: Utc::now(),
        })
    }
}

/// Outcomes and issues collected by a checker's sub-checks.
#[derive(Debug, Default)]
pub struct Findings {
    outcomes: Vec<RuleCheckOutcome>,
    issues: Vec<Issue>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a passing outcome.
    pub fn pass(&mut self, rule: &str, details: impl Into<String>) {
        self.outcomes.push(RuleCheckOutcome::pass(rule, details));
    }

    /// Record a failing outcome and the issue that explains it.
    pub fn fail(&mut self, rule: &str, details: impl Into<String>, issue: Issue) {
        self.outcomes.push(RuleCheckOutcome::fail(rule, details));
        self.issues.push(issue);
    }

    pub fn outcome(&mut self, outcome: RuleCheckOutcome) {
        self.outcomes.push(outcome);
    }

    /// Record an issue that has no outcome of its own.
    pub fn issue(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    /// Fold into an [`AnalysisResult`], appending `issues_found` and the
    /// truncated `issues` list to the checker-specific details.
    pub fn into_result(self, mut details: Map<String, Value>) -> AnalysisResult {
        let summary = ComplianceSummary::from_outcomes(self.outcomes);
        let issues_found = self.issues.len();
        let reported: Vec<Value> = self
            .issues
            .into_iter()
            .take(MAX_REPORTED_ISSUES)
            .filter_map(|i| serde_json::to_value(i).ok())
            .collect();

        details.insert("issues_found".to_string(), Value::from(issues_found));
        details.insert("issues".to_string(), Value::Array(reported));

        AnalysisResult {
            status: AnalysisStatus::Completed,
            is_compliant: Some(summary.failed == 0),
            summary,
            details,
            timestamp: Utc::now(),
        }
    }
}

/// Build a details map from key/value pairs.
pub fn details<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// The seven built-in checkers, in default workflow order.
pub fn default_checkers() -> Vec<Arc<dyn Checker>> {
    vec![
        Arc::new(WallChecker::new()),
        Arc::new(DimensionChecker::new()),
        Arc::new(WindowDoorChecker::new()),
        Arc::new(AreaChecker::new()),
        Arc::new(EnergyChecker::new()),
        Arc::new(CouncilChecker::new()),
        Arc::new(ComplianceFormatter::new()),
    ]
}
