//! Room area computation, minimum areas and floor area ratio.

use super::input::{field, fmt_num, id, items, number, number_or, text};
use super::{details, Checker, CheckerDescriptor, Findings, Rule, AREA, MAX_REPORTED_ISSUES};
use crate::error::CheckerError;
use crate::models::{AnalysisResult, Issue, Severity};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Minimum room areas in square meters. Types not listed always pass.
pub const MINIMUM_AREAS: [(&str, f64); 6] = [
    ("bedroom", 8.0),
    ("living_room", 12.0),
    ("kitchen", 4.0),
    ("bathroom", 2.5),
    ("office", 6.0),
    ("dining_room", 10.0),
];

pub const DEFAULT_MAX_FAR: f64 = 0.5;

const AREA_CALCULATION: &str = "Room Area Calculation";
const MINIMUM_ROOM_AREAS: &str = "Minimum Room Areas";
const FAR: &str = "Floor Area Ratio (FAR)";

/// Computes room areas and validates them against minimums and zoning FAR.
pub struct AreaChecker {
    descriptor: CheckerDescriptor,
}

/// A room with its effective area resolved.
struct MeasuredRoom<'a> {
    id: String,
    room_type: &'a str,
    area: f64,
}

impl AreaChecker {
    pub fn new() -> Self {
        let minimum_areas: serde_json::Map<String, Value> = MINIMUM_AREAS
            .iter()
            .map(|(t, a)| (t.to_string(), Value::from(*a)))
            .collect();

        let rules = vec![
            Rule::new(
                "area_001",
                MINIMUM_ROOM_AREAS,
                "space",
                "National",
                "SANS 10400-2011",
                "Rooms must meet minimum area requirements",
            )
            .param("minimum_areas", Value::Object(minimum_areas)),
            Rule::new(
                "area_002",
                FAR,
                "zoning",
                "Johannesburg",
                "JHB Zoning Regulations",
                "Building floor area must comply with FAR limits",
            )
            .param("max_far", DEFAULT_MAX_FAR),
            Rule::new(
                "area_003",
                "Gross Floor Area",
                "calculation",
                "National",
                "SANS 10400-2011",
                "Gross floor area must be calculated correctly",
            ),
            Rule::new(
                "area_004",
                "Usable Area",
                "calculation",
                "National",
                "SANS 10400-2011",
                "Usable area must exclude non-habitable spaces",
            ),
        ];

        Self {
            descriptor: CheckerDescriptor::new(
                AREA,
                "Computes room areas and validates against municipal and SANS minimum areas and zoning overlays",
                rules,
            ),
        }
    }

    fn check_room_areas(&self, rooms: &[MeasuredRoom<'_>], findings: &mut Findings) {
        for room in rooms {
            if room.area <= 0.0 {
                findings.fail(
                    AREA_CALCULATION,
                    format!("Room {} has invalid area: {}m²", room.id, fmt_num(room.area)),
                    Issue::new("area_calculation", Severity::Critical)
                        .with("room_id", room.id.clone())
                        .with("area", room.area),
                );
            } else {
                findings.pass(
                    AREA_CALCULATION,
                    format!("Room {}: {}m²", room.id, fmt_num(room.area)),
                );
            }
        }
    }

    fn check_minimum_areas(&self, rooms: &[MeasuredRoom<'_>], findings: &mut Findings) {
        let violations: Vec<Value> = rooms
            .iter()
            .filter_map(|room| {
                let minimum = minimum_area(room.room_type)?;
                (room.area < minimum).then(|| {
                    json!({
                        "type": "minimum_area",
                        "room_id": room.id,
                        "room_type": room.room_type,
                        "actual": room.area,
                        "minimum": minimum,
                        "severity": Severity::Warning,
                    })
                })
            })
            .collect();

        if violations.is_empty() {
            findings.pass(MINIMUM_ROOM_AREAS, "All rooms meet minimum area requirements");
            return;
        }

        findings.fail(
            MINIMUM_ROOM_AREAS,
            format!(
                "{} rooms below minimum area requirements",
                violations.len()
            ),
            Issue::new("minimum_area", Severity::Warning).with(
                "violations",
                Value::Array(violations.into_iter().take(MAX_REPORTED_ISSUES).collect()),
            ),
        );
    }

    fn check_far(&self, project: &Value, findings: &mut Findings) {
        let building = field(project, "building");
        let zoning = field(project, "zoning");

        let gross_floor_area = number(building, "gross_floor_area_sqm");
        let lot_area = number(zoning, "lot_area_sqm");
        let max_far = number_or(zoning, "max_far", DEFAULT_MAX_FAR);

        if lot_area <= 0.0 {
            findings.pass(FAR, "No lot area specified, FAR calculation skipped");
            return;
        }

        let actual_far = gross_floor_area / lot_area;
        if actual_far > max_far {
            findings.fail(
                FAR,
                format!("FAR {:.2} exceeds maximum {}", actual_far, max_far),
                Issue::new("far", Severity::Critical)
                    .with("actual", actual_far)
                    .with("maximum", max_far),
            );
        } else {
            findings.pass(
                FAR,
                format!("FAR {:.2} is within limit {}", actual_far, max_far),
            );
        }
    }
}

impl Default for AreaChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Checker for AreaChecker {
    fn descriptor(&self) -> &CheckerDescriptor {
        &self.descriptor
    }

    async fn analyze(&self, project: &Value) -> Result<AnalysisResult, CheckerError> {
        let rooms: Vec<MeasuredRoom<'_>> = items(project, "rooms").iter().map(measure).collect();
        let total_area: f64 = rooms.iter().map(|r| r.area).sum();

        let mut findings = Findings::new();
        self.check_room_areas(&rooms, &mut findings);
        self.check_minimum_areas(&rooms, &mut findings);
        self.check_far(project, &mut findings);

        Ok(findings.into_result(details([
            ("rooms_analyzed", Value::from(rooms.len())),
            ("total_area_sqm", Value::from(total_area)),
        ])))
    }
}

/// Use `area_sqm` when present, otherwise `length_m * width_m`.
fn measure(room: &Value) -> MeasuredRoom<'_> {
    let area = match room.get("area_sqm") {
        Some(v) => v.as_f64().unwrap_or(0.0),
        None => number(room, "length_m") * number(room, "width_m"),
    };

    MeasuredRoom {
        id: id(room),
        room_type: text(room, "type", "unknown"),
        area,
    }
}

fn minimum_area(room_type: &str) -> Option<f64> {
    MINIMUM_AREAS
        .iter()
        .find(|(t, _)| *t == room_type)
        .map(|(_, a)| *a)
}
