//! Council submission readiness: required documents, north arrow and
//! upstream checker completeness.

use super::input::{flag, items, text};
use super::{
    details, Checker, CheckerDescriptor, Findings, Rule, AREA, COUNCIL, DIMENSION, ENERGY, WALL,
    WINDOW_DOOR,
};
use crate::error::CheckerError;
use crate::models::{AnalysisResult, Issue, Severity};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

/// Document kind (matched against file name/type) and its display name.
pub const REQUIRED_DOCUMENTS: [(&str, &str); 5] = [
    ("site_plan", "Site Plan"),
    ("sewer_layout", "Sewer Layout"),
    ("title_deed", "Title Deed Annotations"),
    ("zoning_certificate", "Zoning Certificate"),
    ("drainage_layout", "Drainage Layout"),
];

/// Checkers whose results must be present before a submission is ready.
pub const REQUIRED_CHECKERS: [&str; 5] = [WALL, DIMENSION, WINDOW_DOOR, AREA, ENERGY];

const DOCUMENTS: &str = "Required Documents";
const NORTH_ARROW: &str = "North Arrow";
const COMPLIANCE_CHECKS: &str = "Compliance Checks";

/// Checks that a council submission package is complete.
pub struct CouncilChecker {
    descriptor: CheckerDescriptor,
}

impl CouncilChecker {
    pub fn new() -> Self {
        let rules = vec![
            Rule::new(
                "council_001",
                "Site Plan",
                "documentation",
                "Johannesburg",
                "JHB Building Regulations",
                "Site plan must be included in submission",
            ),
            Rule::new(
                "council_002",
                "Sewer Layout",
                "documentation",
                "Johannesburg",
                "JHB Building Regulations",
                "Sewer layout must be included in submission",
            ),
            Rule::new(
                "council_003",
                "Title Deed Annotations",
                "documentation",
                "National",
                "National Building Regulations",
                "Title deed annotations must be included if applicable",
            ),
            Rule::new(
                "council_004",
                NORTH_ARROW,
                "drafting",
                "National",
                "SANS 10400-2011",
                "Drawings must include north arrow",
            ),
            Rule::new(
                "council_005",
                "Zoning Certificate",
                "documentation",
                "Johannesburg",
                "JHB Zoning Regulations",
                "Zoning certificate must be included in submission",
            ),
            Rule::new(
                "council_006",
                "Drainage Layout",
                "documentation",
                "Johannesburg",
                "JHB Building Regulations",
                "Drainage layout must be included in submission",
            ),
        ];

        Self {
            descriptor: CheckerDescriptor::new(
                COUNCIL,
                "Aggregates all agent outputs and checks for missing council submission items",
                rules,
            ),
        }
    }

    fn check_required_documents(&self, files: &[Value], findings: &mut Findings) {
        let missing: Vec<&str> = REQUIRED_DOCUMENTS
            .iter()
            .filter(|(kind, _)| !files.iter().any(|f| file_matches(f, kind)))
            .map(|(_, name)| *name)
            .collect();

        if missing.is_empty() {
            findings.pass(DOCUMENTS, "All required documents are present");
            return;
        }

        findings.fail(
            DOCUMENTS,
            format!("Missing documents: {}", missing.join(", ")),
            Issue::new("missing_documents", Severity::Critical).with("missing", json!(missing)),
        );
    }

    fn check_drawings(&self, drawings: &[Value], findings: &mut Findings) {
        if drawings.iter().any(|d| flag(d, "has_north_arrow", false)) {
            findings.pass(NORTH_ARROW, "North arrow present on drawings");
        } else {
            findings.fail(
                NORTH_ARROW,
                "North arrow missing from drawings",
                Issue::new("north_arrow", Severity::Warning),
            );
        }
    }

    fn check_compliance_results(&self, results: &Map<String, Value>, findings: &mut Findings) {
        let missing: Vec<&str> = REQUIRED_CHECKERS
            .iter()
            .copied()
            .filter(|name| !results.contains_key(*name))
            .collect();

        if missing.is_empty() {
            findings.pass(COMPLIANCE_CHECKS, "All required compliance checks are present");
        } else {
            findings.fail(
                COMPLIANCE_CHECKS,
                format!("Missing compliance results from: {}", missing.join(", ")),
                Issue::new("missing_compliance", Severity::Warning)
                    .with("missing_agents", json!(missing)),
            );
        }

        // Raised without an outcome of its own: upstream failures do not
        // count against this checker's summary.
        let failing: Vec<&str> = results
            .iter()
            .filter(|(_, result)| upstream_failed(result))
            .map(|(name, _)| name.as_str())
            .collect();

        if !failing.is_empty() {
            findings.issue(
                Issue::new("critical_compliance_issues", Severity::Critical)
                    .with("agents_with_issues", json!(failing)),
            );
        }
    }
}

/// Case-insensitive substring match on the file's `name` or `type`.
fn file_matches(file: &Value, kind: &str) -> bool {
    text(file, "name", "").to_lowercase().contains(kind)
        || text(file, "type", "").to_lowercase().contains(kind)
}

/// An upstream result that failed outright or was explicitly non-compliant.
pub(crate) fn upstream_failed(result: &Value) -> bool {
    result.get("status").and_then(Value::as_str) == Some("failed")
        || result.get("is_compliant").and_then(Value::as_bool) == Some(false)
}

impl Default for CouncilChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Checker for CouncilChecker {
    fn descriptor(&self) -> &CheckerDescriptor {
        &self.descriptor
    }

    async fn analyze(&self, project: &Value) -> Result<AnalysisResult, CheckerError> {
        let files = items(project, "files");
        let drawings = items(project, "drawings");
        let empty = Map::new();
        let compliance_results = project
            .get("compliance_results")
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        let mut findings = Findings::new();
        self.check_required_documents(files, &mut findings);
        self.check_drawings(drawings, &mut findings);
        self.check_compliance_results(compliance_results, &mut findings);

        Ok(findings.into_result(details([
            ("files_reviewed", Value::from(files.len())),
            ("drawings_reviewed", Value::from(drawings.len())),
            ("compliance_checks", Value::from(compliance_results.len())),
        ])))
    }
}
