//! Drawing dimension checks: scale consistency, room sizes and legibility.

use super::input::{fmt_num, flag, id, items, number, text};
use super::{details, Checker, CheckerDescriptor, Findings, Rule, DIMENSION};
use crate::error::CheckerError;
use crate::models::{AnalysisResult, Issue, Severity};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeSet;

/// Minimum room sizes in square meters. Types not listed always pass.
pub const MINIMUM_ROOM_SIZES: [(&str, f64); 5] = [
    ("bedroom", 8.0),
    ("living_room", 12.0),
    ("kitchen", 4.0),
    ("bathroom", 2.5),
    ("office", 6.0),
];

const SCALE: &str = "Scale Consistency";
const PLACEMENT: &str = "Dimension Placement";

/// Checks drawing dimensions and minimum room sizes.
pub struct DimensionChecker {
    descriptor: CheckerDescriptor,
}

impl DimensionChecker {
    pub fn new() -> Self {
        let minimum_sizes: serde_json::Map<String, Value> = MINIMUM_ROOM_SIZES
            .iter()
            .map(|(t, a)| (t.to_string(), Value::from(*a)))
            .collect();

        let rules = vec![
            Rule::new(
                "dim_001",
                SCALE,
                "drafting",
                "National",
                "SANS 10400-2011",
                "All dimensions must use consistent scale",
            ),
            Rule::new(
                "dim_002",
                "Minimum Room Size",
                "space",
                "National",
                "SANS 10400-2011",
                "Rooms must meet minimum size requirements",
            )
            .param("minimum_sizes", Value::Object(minimum_sizes)),
            Rule::new(
                "dim_003",
                PLACEMENT,
                "drafting",
                "National",
                "SANS 10400-2011",
                "Dimensions must be placed legibly and correctly",
            ),
            Rule::new(
                "dim_004",
                "Dimension Accuracy",
                "accuracy",
                "National",
                "SANS 10400-2011",
                "Dimensions must be accurate within tolerance",
            )
            .param("tolerance_mm", 5),
        ];

        Self {
            descriptor: CheckerDescriptor::new(
                DIMENSION,
                "Checks dimensions for scale consistency, minimum room sizes, and placement",
                rules,
            ),
        }
    }

    fn check_scale(&self, dimensions: &[Value], findings: &mut Findings) {
        if dimensions.is_empty() {
            findings.pass(SCALE, "No dimensions to check");
            return;
        }

        let scales: BTreeSet<String> = dimensions.iter().map(scale_of).collect();

        if scales.len() > 1 {
            let found: Vec<&str> = scales.iter().map(String::as_str).collect();
            findings.fail(
                SCALE,
                format!("Inconsistent scales found: {}", found.join(", ")),
                Issue::new("scale", Severity::Critical).with("scales_found", json!(found)),
            );
        } else {
            let scale = scales.into_iter().next().unwrap_or_default();
            findings.pass(
                SCALE,
                format!("All dimensions use consistent scale: {}", scale),
            );
        }
    }

    fn check_room_sizes(&self, rooms: &[Value], findings: &mut Findings) {
        for room in rooms {
            let room_type = text(room, "type", "unknown");
            let area = number(room, "area_sqm");
            let rule = format!("Minimum {} Size", title_case(room_type));

            match minimum_size(room_type) {
                Some(minimum) if area < minimum => findings.fail(
                    &rule,
                    format!(
                        "Room area {}m² is below minimum {}m²",
                        fmt_num(area),
                        fmt_num(minimum)
                    ),
                    Issue::new("room_size", Severity::Warning)
                        .with("room_id", id(room))
                        .with("room_type", room_type)
                        .with("actual", area)
                        .with("minimum", minimum),
                ),
                _ => findings.pass(
                    &rule,
                    format!("Room area {}m² meets minimum requirement", fmt_num(area)),
                ),
            }
        }
    }

    fn check_placement(&self, dimensions: &[Value], findings: &mut Findings) {
        let legible = dimensions
            .iter()
            .filter(|d| flag(d, "legible", true))
            .count();

        if legible < dimensions.len() {
            findings.fail(
                PLACEMENT,
                format!("{} dimensions are not legible", dimensions.len() - legible),
                Issue::new("placement", Severity::Warning)
                    .with("total_dimensions", dimensions.len())
                    .with("legible_dimensions", legible),
            );
        } else {
            findings.pass(PLACEMENT, "All dimensions are legible and properly placed");
        }
    }
}

impl Default for DimensionChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Checker for DimensionChecker {
    fn descriptor(&self) -> &CheckerDescriptor {
        &self.descriptor
    }

    async fn analyze(&self, project: &Value) -> Result<AnalysisResult, CheckerError> {
        let dimensions = items(project, "dimensions");
        let rooms = items(project, "rooms");

        let mut findings = Findings::new();
        self.check_scale(dimensions, &mut findings);
        self.check_room_sizes(rooms, &mut findings);
        self.check_placement(dimensions, &mut findings);

        Ok(findings.into_result(details([
            ("dimensions_analyzed", Value::from(dimensions.len())),
            ("rooms_checked", Value::from(rooms.len())),
        ])))
    }
}

fn minimum_size(room_type: &str) -> Option<f64> {
    MINIMUM_ROOM_SIZES
        .iter()
        .find(|(t, _)| *t == room_type)
        .map(|(_, a)| *a)
}

/// Scale values may be strings ("1:100") or numbers.
fn scale_of(dimension: &Value) -> String {
    match dimension.get("scale") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "unknown".to_string(),
        Some(other) => other.to_string(),
    }
}

/// `living_room` -> `Living Room`.
fn title_case(s: &str) -> String {
    s.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(project: Value) -> AnalysisResult {
        tokio_test::block_on(DimensionChecker::new().analyze(&project)).unwrap()
    }

    #[test]
    fn test_compliant_dimensions() {
        let result = analyze(json!({
            "dimensions": [{"id": "d1", "scale": "1:100", "legible": true}],
            "rooms": [{"id": "r1", "type": "bedroom", "area_sqm": 12.0}]
        }));
        assert_eq!(result.is_compliant, Some(true));
        assert_eq!(result.summary.total_checks, 3);
    }

    #[test]
    fn test_mixed_scales_fail() {
        let result = analyze(json!({
            "dimensions": [{"scale": "1:100"}, {"scale": "1:50"}]
        }));
        let scale = &result.summary.details[0];
        assert_eq!(scale.rule, SCALE);
        assert!(!scale.passed);
        assert_eq!(result.details["issues"][0]["severity"], "critical");
    }

    #[test]
    fn test_room_size_rule_named_per_type() {
        let result = analyze(json!({
            "rooms": [
                {"id": "r1", "type": "living_room", "area_sqm": 11.9},
                {"id": "r2", "type": "garage", "area_sqm": 1.0}
            ]
        }));

        let living = result
            .summary
            .details
            .iter()
            .find(|o| o.rule == "Minimum Living Room Size")
            .unwrap();
        assert!(!living.passed);

        let garage = result
            .summary
            .details
            .iter()
            .find(|o| o.rule == "Minimum Garage Size")
            .unwrap();
        assert!(garage.passed);
    }

    #[test]
    fn test_illegible_dimension_fails_placement() {
        let result = analyze(json!({
            "dimensions": [{"scale": "1:100"}, {"scale": "1:100", "legible": false}]
        }));
        let placement = result
            .summary
            .details
            .iter()
            .find(|o| o.rule == PLACEMENT)
            .unwrap();
        assert!(!placement.passed);
        assert_eq!(placement.details, "1 dimensions are not legible");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("living_room"), "Living Room");
        assert_eq!(title_case("unknown"), "Unknown");
    }
}
