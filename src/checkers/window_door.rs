//! Window and door schedule, size and bedroom egress checks.

use super::input::{flag, id, items, number, text};
use super::{details, Checker, CheckerDescriptor, Findings, Rule, MAX_REPORTED_ISSUES, WINDOW_DOOR};
use crate::error::CheckerError;
use crate::models::{AnalysisResult, Issue, Severity};
use async_trait::async_trait;
use serde_json::{json, Value};

pub const MIN_WIDTH_MM: f64 = 600.0;
pub const MIN_HEIGHT_MM: f64 = 1800.0;
pub const MIN_EGRESS_AREA_SQM: f64 = 0.33;
pub const MIN_EGRESS_WIDTH_MM: f64 = 450.0;
pub const MIN_EGRESS_HEIGHT_MM: f64 = 450.0;
pub const MAX_EGRESS_SILL_HEIGHT_MM: f64 = 1100.0;

const SCHEDULES: &str = "Window/Door Schedules";
const SIZES: &str = "Size Compliance";
const EGRESS: &str = "Emergency Egress";

/// Checks window/door schedules, sizes and bedroom emergency egress.
pub struct WindowDoorChecker {
    descriptor: CheckerDescriptor,
}

impl WindowDoorChecker {
    pub fn new() -> Self {
        let rules = vec![
            Rule::new(
                "wd_001",
                SCHEDULES,
                "documentation",
                "National",
                "SANS 10400-2011",
                "All windows and doors must have proper schedules",
            ),
            Rule::new(
                "wd_002",
                SIZES,
                "dimensions",
                "National",
                "SANS 10400-2011",
                "Window and door sizes must comply with standards",
            )
            .param("minimum_width_mm", MIN_WIDTH_MM)
            .param("minimum_height_mm", MIN_HEIGHT_MM),
            Rule::new(
                "wd_003",
                EGRESS,
                "safety",
                "National",
                "SANS 10400-XB-2011",
                "Bedrooms must have emergency egress windows",
            )
            .param("minimum_opening_area_sqm", MIN_EGRESS_AREA_SQM)
            .param("minimum_opening_width_mm", MIN_EGRESS_WIDTH_MM)
            .param("minimum_opening_height_mm", MIN_EGRESS_HEIGHT_MM)
            .param("maximum_sill_height_mm", MAX_EGRESS_SILL_HEIGHT_MM),
            Rule::new(
                "wd_004",
                "Fire Rating",
                "safety",
                "National",
                "SANS 10400-XB-2011",
                "Doors in fire-rated assemblies must have proper fire rating",
            ),
        ];

        Self {
            descriptor: CheckerDescriptor::new(
                WINDOW_DOOR,
                "Checks windows and doors for compliance with schedules, sizes, and egress requirements",
                rules,
            ),
        }
    }

    fn check_schedules(&self, windows: &[Value], doors: &[Value], findings: &mut Findings) {
        let missing: Vec<String> = windows
            .iter()
            .chain(doors)
            .filter(|item| !flag(item, "schedule", false))
            .map(id)
            .collect();

        if missing.is_empty() {
            findings.pass(SCHEDULES, "All windows and doors have proper schedules");
            return;
        }

        let shown: Vec<&str> = missing.iter().take(5).map(String::as_str).collect();
        findings.fail(
            SCHEDULES,
            format!("Missing schedules for: {}", shown.join(", ")),
            Issue::new("schedule", Severity::Warning).with(
                "missing_items",
                json!(missing.iter().take(MAX_REPORTED_ISSUES).collect::<Vec<_>>()),
            ),
        );
    }

    fn check_sizes(&self, windows: &[Value], doors: &[Value], findings: &mut Findings) {
        let tagged = windows
            .iter()
            .map(|w| ("window", w))
            .chain(doors.iter().map(|d| ("door", d)));

        let undersized: Vec<Value> = tagged
            .filter_map(|(kind, item)| {
                let width = number(item, "width_mm");
                let height = number(item, "height_mm");
                (width < MIN_WIDTH_MM || height < MIN_HEIGHT_MM).then(|| {
                    json!({
                        "type": kind,
                        "id": id(item),
                        "width": width,
                        "height": height,
                        "minimum_width": MIN_WIDTH_MM,
                        "minimum_height": MIN_HEIGHT_MM,
                    })
                })
            })
            .collect();

        if undersized.is_empty() {
            findings.pass(SIZES, "All windows and doors meet size requirements");
            return;
        }

        findings.fail(
            SIZES,
            format!("{} items below minimum size requirements", undersized.len()),
            Issue::new("size", Severity::Warning).with(
                "issues",
                Value::Array(undersized.into_iter().take(MAX_REPORTED_ISSUES).collect()),
            ),
        );
    }

    fn check_emergency_egress(&self, rooms: &[Value], findings: &mut Findings) {
        let mut egress_issues: Vec<Value> = Vec::new();

        for room in rooms.iter().filter(|r| text(r, "type", "") == "bedroom") {
            let egress = room.get("egress").unwrap_or(&Value::Null);

            if !flag(egress, "exists", false) {
                egress_issues.push(json!({
                    "type": "missing_egress",
                    "room_id": id(room),
                    "severity": Severity::Critical,
                }));
                continue;
            }

            let opening = egress.get("opening").cloned().unwrap_or_else(|| json!({}));
            if !egress_opening_compliant(&opening) {
                egress_issues.push(json!({
                    "type": "egress_not_compliant",
                    "room_id": id(room),
                    "opening": opening,
                    "severity": Severity::Critical,
                }));
            }
        }

        if egress_issues.is_empty() {
            findings.pass(EGRESS, "All bedrooms have compliant emergency egress");
            return;
        }

        findings.fail(
            EGRESS,
            format!(
                "{} bedrooms lack compliant emergency egress",
                egress_issues.len()
            ),
            Issue::new("egress", Severity::Critical).with(
                "issues",
                Value::Array(egress_issues.into_iter().take(MAX_REPORTED_ISSUES).collect()),
            ),
        );
    }
}

fn egress_opening_compliant(opening: &Value) -> bool {
    number(opening, "area_sqm") >= MIN_EGRESS_AREA_SQM
        && number(opening, "width_mm") >= MIN_EGRESS_WIDTH_MM
        && number(opening, "height_mm") >= MIN_EGRESS_HEIGHT_MM
        && number(opening, "sill_height_mm") <= MAX_EGRESS_SILL_HEIGHT_MM
}

impl Default for WindowDoorChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Checker for WindowDoorChecker {
    fn descriptor(&self) -> &CheckerDescriptor {
        &self.descriptor
    }

    async fn analyze(&self, project: &Value) -> Result<AnalysisResult, CheckerError> {
        let windows = items(project, "windows");
        let doors = items(project, "doors");
        let rooms = items(project, "rooms");

        let mut findings = Findings::new();
        self.check_schedules(windows, doors, &mut findings);
        self.check_sizes(windows, doors, &mut findings);
        self.check_emergency_egress(rooms, &mut findings);

        Ok(findings.into_result(details([
            ("windows_analyzed", Value::from(windows.len())),
            ("doors_analyzed", Value::from(doors.len())),
            ("rooms_checked", Value::from(rooms.len())),
        ])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(project: Value) -> AnalysisResult {
        tokio_test::block_on(WindowDoorChecker::new().analyze(&project)).unwrap()
    }

    fn passed(result: &AnalysisResult, rule: &str) -> bool {
        result
            .summary
            .details
            .iter()
            .find(|o| o.rule == rule)
            .map(|o| o.passed)
            .unwrap()
    }

    #[test]
    fn test_missing_egress_is_critical() {
        let result = analyze(json!({
            "rooms": [{"id": "bed1", "type": "bedroom", "egress": {"exists": false}}]
        }));

        assert_eq!(result.is_compliant, Some(false));
        assert!(!passed(&result, EGRESS));
        let issue = &result.details["issues"][0];
        assert_eq!(issue["type"], "egress");
        assert_eq!(issue["severity"], "critical");
        assert_eq!(issue["issues"][0]["type"], "missing_egress");
        assert_eq!(issue["issues"][0]["room_id"], "bed1");
    }

    #[test]
    fn test_compliant_egress_opening() {
        let result = analyze(json!({
            "rooms": [{
                "id": "bed1",
                "type": "bedroom",
                "egress": {"exists": true, "opening": {
                    "area_sqm": 0.5, "width_mm": 500, "height_mm": 500, "sill_height_mm": 900
                }}
            }]
        }));
        assert!(passed(&result, EGRESS));
        assert_eq!(result.is_compliant, Some(true));
    }

    #[test]
    fn test_high_sill_fails_egress() {
        let result = analyze(json!({
            "rooms": [{
                "type": "bedroom",
                "egress": {"exists": true, "opening": {
                    "area_sqm": 0.5, "width_mm": 500, "height_mm": 500, "sill_height_mm": 1200
                }}
            }]
        }));
        assert!(!passed(&result, EGRESS));
        assert_eq!(
            result.details["issues"][0]["issues"][0]["type"],
            "egress_not_compliant"
        );
    }

    #[test]
    fn test_non_bedrooms_skip_egress() {
        let result = analyze(json!({"rooms": [{"type": "kitchen"}]}));
        assert!(passed(&result, EGRESS));
    }

    #[test]
    fn test_schedules_and_sizes() {
        let result = analyze(json!({
            "windows": [{"id": "win1", "schedule": true, "width_mm": 1200, "height_mm": 1500}],
            "doors": [{"id": "door1", "width_mm": 900, "height_mm": 2100}]
        }));

        assert!(!passed(&result, SCHEDULES));
        assert!(!passed(&result, SIZES));
        let schedule = result
            .summary
            .details
            .iter()
            .find(|o| o.rule == SCHEDULES)
            .unwrap();
        assert_eq!(schedule.details, "Missing schedules for: door1");
        assert_eq!(result.details["issues"][1]["issues"][0]["id"], "win1");
    }

    #[test]
    fn test_empty_project_passes_all_three_rules() {
        let result = analyze(json!({}));
        assert_eq!(result.summary.total_checks, 3);
        assert_eq!(result.summary.passed, 3);
    }
}
