//! Wall thickness, material, reinforcement and continuity checks.

use super::input::{fmt_num, flag, id, items, number, text};
use super::{details, Checker, CheckerDescriptor, Findings, Rule, WALL};
use crate::error::CheckerError;
use crate::models::{AnalysisResult, Issue, Severity};
use async_trait::async_trait;
use serde_json::{json, Value};

pub const MIN_THICKNESS_MM: f64 = 100.0;
pub const ALLOWED_MATERIALS: [&str; 6] = ["concrete", "brick", "block", "steel", "timber", "composite"];
pub const MIN_REINFORCEMENT_RATIO: f64 = 0.006;
pub const MAX_GAP_MM: f64 = 50.0;

const THICKNESS: &str = "Minimum Wall Thickness";
const MATERIAL: &str = "Material Specification";
const REINFORCEMENT: &str = "Reinforcement Requirements";
const CONTINUITY: &str = "Wall Continuity";

/// Checks walls against SANS 10400 and municipal wall requirements.
pub struct WallChecker {
    descriptor: CheckerDescriptor,
}

impl WallChecker {
    pub fn new() -> Self {
        let rules = vec![
            Rule::new(
                "wall_001",
                THICKNESS,
                "structural",
                "National",
                "SANS 10400-2011",
                "Walls must meet minimum thickness requirements based on height and material",
            )
            .param("min_thickness_mm", MIN_THICKNESS_MM)
            .param("max_height_mm", 3000),
            Rule::new(
                "wall_002",
                MATERIAL,
                "material",
                "National",
                "SANS 10400-2011",
                "Wall materials must meet specified standards",
            )
            .param("allowed_materials", json!(ALLOWED_MATERIALS)),
            Rule::new(
                "wall_003",
                REINFORCEMENT,
                "structural",
                "National",
                "SANS 10400-2011",
                "Reinforced concrete walls must meet reinforcement standards",
            )
            .param("min_reinforcement_ratio", MIN_REINFORCEMENT_RATIO)
            .param("max_spacing_mm", 400),
            Rule::new(
                "wall_004",
                CONTINUITY,
                "structural",
                "Johannesburg",
                "JHB Building Regulations",
                "Walls must be continuous without unexpected gaps",
            )
            .param("allowable_gap_mm", MAX_GAP_MM),
            Rule::new(
                "wall_005",
                "Fire Resistance Rating",
                "safety",
                "National",
                "SANS 10400-XB-2011",
                "Walls must meet fire resistance requirements based on building type",
            )
            .param("frr_minutes", 60),
        ];

        Self {
            descriptor: CheckerDescriptor::new(
                WALL,
                "Checks walls for compliance with SANS 10400, thickness, material, and reinforcement requirements",
                rules,
            ),
        }
    }

    fn check_wall(&self, wall: &Value, findings: &mut Findings) {
        let wall_id = id(wall);

        let thickness = number(wall, "thickness_mm");
        if thickness < MIN_THICKNESS_MM {
            findings.fail(
                THICKNESS,
                format!(
                    "Wall thickness {}mm is below minimum {}mm",
                    fmt_num(thickness),
                    fmt_num(MIN_THICKNESS_MM)
                ),
                Issue::new("thickness", Severity::Critical)
                    .with("wall_id", wall_id.clone())
                    .with("actual", thickness)
                    .with("minimum", MIN_THICKNESS_MM),
            );
        } else {
            findings.pass(
                THICKNESS,
                format!("Wall thickness {}mm meets minimum requirement", fmt_num(thickness)),
            );
        }

        let material = text(wall, "material", "unknown");
        if ALLOWED_MATERIALS.contains(&material) {
            findings.pass(MATERIAL, format!("Material '{}' is approved", material));
        } else {
            findings.fail(
                MATERIAL,
                format!("Material '{}' is not in allowed list", material),
                Issue::new("material", Severity::Warning)
                    .with("wall_id", wall_id.clone())
                    .with("actual", material)
                    .with("allowed", json!(ALLOWED_MATERIALS)),
            );
        }

        if material == "concrete" && flag(wall, "is_reinforced", false) {
            let ratio = number(wall, "reinforcement_ratio");
            if ratio < MIN_REINFORCEMENT_RATIO {
                findings.fail(
                    REINFORCEMENT,
                    format!(
                        "Reinforcement ratio {} is below minimum {}",
                        ratio, MIN_REINFORCEMENT_RATIO
                    ),
                    Issue::new("reinforcement", Severity::Critical)
                        .with("wall_id", wall_id.clone())
                        .with("actual", ratio)
                        .with("minimum", MIN_REINFORCEMENT_RATIO),
                );
            } else {
                findings.pass(
                    REINFORCEMENT,
                    format!("Reinforcement ratio {} meets requirements", ratio),
                );
            }
        }

        let gap = number(wall, "gap_mm");
        if gap > MAX_GAP_MM {
            findings.fail(
                CONTINUITY,
                format!(
                    "Wall gap {}mm exceeds maximum {}mm",
                    fmt_num(gap),
                    fmt_num(MAX_GAP_MM)
                ),
                Issue::new("continuity", Severity::Warning)
                    .with("wall_id", wall_id)
                    .with("actual", gap)
                    .with("maximum", MAX_GAP_MM),
            );
        } else {
            findings.pass(CONTINUITY, format!("Wall gap {}mm is acceptable", fmt_num(gap)));
        }
    }
}

impl Default for WallChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Checker for WallChecker {
    fn descriptor(&self) -> &CheckerDescriptor {
        &self.descriptor
    }

    async fn analyze(&self, project: &Value) -> Result<AnalysisResult, CheckerError> {
        let walls = items(project, "walls");
        let building_type = text(project, "building_type", "residential");

        let mut findings = Findings::new();
        for wall in walls {
            self.check_wall(wall, &mut findings);
        }

        Ok(findings.into_result(details([
            ("walls_analyzed", Value::from(walls.len())),
            ("building_type", Value::from(building_type)),
        ])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(project: Value) -> AnalysisResult {
        tokio_test::block_on(WallChecker::new().analyze(&project)).unwrap()
    }

    fn outcome_passed(result: &AnalysisResult, rule: &str) -> bool {
        result
            .summary
            .details
            .iter()
            .find(|o| o.rule == rule)
            .map(|o| o.passed)
            .unwrap()
    }

    #[test]
    fn test_compliant_reinforced_concrete_wall() {
        let result = analyze(json!({
            "walls": [{
                "id": "w1",
                "thickness_mm": 200,
                "material": "concrete",
                "is_reinforced": true,
                "reinforcement_ratio": 0.01,
                "gap_mm": 10
            }]
        }));

        assert_eq!(result.is_compliant, Some(true));
        assert_eq!(result.summary.failed, 0);
        assert_eq!(result.summary.total_checks, 4);
        assert_eq!(result.details["walls_analyzed"], 1);
    }

    #[test]
    fn test_thickness_boundary_is_inclusive() {
        let thin = analyze(json!({"walls": [{"thickness_mm": 99, "material": "brick"}]}));
        assert!(!outcome_passed(&thin, THICKNESS));
        assert_eq!(thin.is_compliant, Some(false));
        assert_eq!(thin.details["issues"][0]["type"], "thickness");
        assert_eq!(thin.details["issues"][0]["severity"], "critical");

        let exact = analyze(json!({"walls": [{"thickness_mm": 100, "material": "brick"}]}));
        assert!(outcome_passed(&exact, THICKNESS));
        assert_eq!(exact.is_compliant, Some(true));
    }

    #[test]
    fn test_unknown_material_fails() {
        let result = analyze(json!({"walls": [{"id": "w2", "thickness_mm": 150, "material": "straw"}]}));
        assert!(!outcome_passed(&result, MATERIAL));
        assert_eq!(result.details["issues"][0]["wall_id"], "w2");
        assert_eq!(result.details["issues"][0]["severity"], "warning");
    }

    #[test]
    fn test_reinforcement_only_checked_for_reinforced_concrete() {
        let unreinforced = analyze(json!({"walls": [{"thickness_mm": 150, "material": "concrete"}]}));
        assert!(unreinforced
            .summary
            .details
            .iter()
            .all(|o| o.rule != REINFORCEMENT));

        let weak = analyze(json!({"walls": [{
            "thickness_mm": 150, "material": "concrete", "is_reinforced": true, "reinforcement_ratio": 0.004
        }]}));
        assert!(!outcome_passed(&weak, REINFORCEMENT));
    }

    #[test]
    fn test_gap_above_limit_fails() {
        let result = analyze(json!({"walls": [{"thickness_mm": 150, "material": "block", "gap_mm": 51}]}));
        assert!(!outcome_passed(&result, CONTINUITY));

        let ok = analyze(json!({"walls": [{"thickness_mm": 150, "material": "block", "gap_mm": 50}]}));
        assert!(outcome_passed(&ok, CONTINUITY));
    }

    #[test]
    fn test_no_walls_is_vacuously_compliant() {
        let result = analyze(json!({}));
        assert_eq!(result.summary.total_checks, 0);
        assert_eq!(result.summary.compliance_rate, 0.0);
        assert_eq!(result.is_compliant, Some(true));
    }
}
