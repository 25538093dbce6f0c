//! SANS 10400-XA energy checks: glazing ratio, insulation and orientation.

use super::input::{field, id, items, number, text};
use super::{details, Checker, CheckerDescriptor, Findings, Rule, ENERGY, MAX_REPORTED_ISSUES};
use crate::error::CheckerError;
use crate::models::{AnalysisResult, Issue, RuleCheckOutcome, Severity};
use async_trait::async_trait;
use serde_json::{json, Value};

pub const MAX_GLAZING_RATIO: f64 = 0.2;
pub const MIN_WALL_R_VALUE: f64 = 1.5;
pub const MIN_ROOF_R_VALUE: f64 = 3.5;
pub const OPTIMAL_ORIENTATIONS: [&str; 3] = ["north", "northeast", "northwest"];

const GLAZING: &str = "Glazing Ratio";
const WALL_INSULATION: &str = "Wall Insulation";
const ROOF_INSULATION: &str = "Roof Insulation";
const ORIENTATION: &str = "Orientation";

/// Evaluates glazing, insulation and orientation for energy efficiency.
pub struct EnergyChecker {
    descriptor: CheckerDescriptor,
}

impl EnergyChecker {
    pub fn new() -> Self {
        let rules = vec![
            Rule::new(
                "energy_001",
                GLAZING,
                "energy",
                "National",
                "SANS 10400-XA-2011",
                "Glazing area must not exceed maximum ratio of wall area",
            )
            .param("max_glazing_ratio", MAX_GLAZING_RATIO),
            Rule::new(
                "energy_002",
                WALL_INSULATION,
                "insulation",
                "National",
                "SANS 10400-XA-2011",
                "Walls must meet minimum R-value requirements",
            )
            .param("min_r_value", MIN_WALL_R_VALUE),
            Rule::new(
                "energy_003",
                ROOF_INSULATION,
                "insulation",
                "National",
                "SANS 10400-XA-2011",
                "Roofs must meet minimum R-value requirements",
            )
            .param("min_r_value", MIN_ROOF_R_VALUE),
            Rule::new(
                "energy_004",
                ORIENTATION,
                "design",
                "National",
                "SANS 10400-XA-2011",
                "Building orientation should optimize solar gain",
            ),
        ];

        Self {
            descriptor: CheckerDescriptor::new(
                ENERGY,
                "Evaluates glazing ratios, wall/roof insulation, and orientation for SANS 10400-XA compliance",
                rules,
            ),
        }
    }

    fn check_glazing_ratio(&self, windows: &[Value], walls: &[Value], findings: &mut Findings) {
        let wall_area: f64 = walls.iter().map(|w| number(w, "area_sqm")).sum();
        let glazing_area: f64 = windows.iter().map(|w| number(w, "area_sqm")).sum();

        if wall_area <= 0.0 {
            findings.pass(
                GLAZING,
                "No wall area specified, glazing ratio calculation skipped",
            );
            return;
        }

        let ratio = glazing_area / wall_area;
        if ratio > MAX_GLAZING_RATIO {
            findings.fail(
                GLAZING,
                format!(
                    "Glazing ratio {:.2} exceeds maximum {}",
                    ratio, MAX_GLAZING_RATIO
                ),
                Issue::new("glazing_ratio", Severity::Warning)
                    .with("actual", ratio)
                    .with("maximum", MAX_GLAZING_RATIO),
            );
        } else {
            findings.pass(
                GLAZING,
                format!(
                    "Glazing ratio {:.2} is within limit {}",
                    ratio, MAX_GLAZING_RATIO
                ),
            );
        }
    }

    /// Shared by the wall and roof insulation rules.
    fn check_insulation(
        &self,
        rule: &str,
        element: &str,
        items: &[Value],
        min_r_value: f64,
        findings: &mut Findings,
    ) {
        let kind = format!("{}_insulation", element);
        let below: Vec<Value> = items
            .iter()
            .filter_map(|item| {
                let r_value = number(item, "r_value");
                (r_value < min_r_value).then(|| {
                    json!({
                        "type": kind,
                        format!("{}_id", element): id(item),
                        "actual_r_value": r_value,
                        "minimum_r_value": min_r_value,
                        "severity": Severity::Warning,
                    })
                })
            })
            .collect();

        if below.is_empty() {
            findings.pass(
                rule,
                format!("All {}s meet minimum R-value {}", element, min_r_value),
            );
            return;
        }

        findings.fail(
            rule,
            format!(
                "{} {}s below minimum R-value {}",
                below.len(),
                element,
                min_r_value
            ),
            Issue::new(kind, Severity::Warning).with(
                "issues",
                Value::Array(below.into_iter().take(MAX_REPORTED_ISSUES).collect()),
            ),
        );
    }

    /// Always passes; a non-northern facing only attaches an advisory.
    fn check_orientation(&self, orientation: &Value, findings: &mut Findings) {
        let specified = orientation.as_object().is_some_and(|o| !o.is_empty());
        if !specified {
            findings.pass(ORIENTATION, "Orientation not specified, assumed compliant");
            return;
        }

        let facing = text(orientation, "main_facing", "north");
        if OPTIMAL_ORIENTATIONS.contains(&facing.to_lowercase().as_str()) {
            findings.pass(
                ORIENTATION,
                format!("Building faces {}, optimal for solar gain", facing),
            );
        } else {
            findings.outcome(
                RuleCheckOutcome::pass(
                    ORIENTATION,
                    format!(
                        "Building faces {}, consider optimization for solar gain",
                        facing
                    ),
                )
                .with_warning("Non-optimal orientation for passive solar heating"),
            );
        }
    }
}

impl Default for EnergyChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Checker for EnergyChecker {
    fn descriptor(&self) -> &CheckerDescriptor {
        &self.descriptor
    }

    async fn analyze(&self, project: &Value) -> Result<AnalysisResult, CheckerError> {
        let walls = items(project, "walls");
        let roofs = items(project, "roofs");
        let windows = items(project, "windows");
        let orientation = field(field(project, "building"), "orientation");

        let mut findings = Findings::new();
        self.check_glazing_ratio(windows, walls, &mut findings);
        self.check_insulation(WALL_INSULATION, "wall", walls, MIN_WALL_R_VALUE, &mut findings);
        self.check_insulation(ROOF_INSULATION, "roof", roofs, MIN_ROOF_R_VALUE, &mut findings);
        self.check_orientation(orientation, &mut findings);

        Ok(findings.into_result(details([
            ("walls_analyzed", Value::from(walls.len())),
            ("roofs_analyzed", Value::from(roofs.len())),
            ("windows_analyzed", Value::from(windows.len())),
        ])))
    }
}
