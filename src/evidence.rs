// src/evidence.rs
//
// Evidence model shared by every detector that feeds the review pipeline.
//
// An EvidenceRecord is the objective observation of one image or one case,
// however it was produced (mock heuristic, segmentation model, or a vision
// model's parsed JSON). The rule engine never reads detector output
// directly; it only sees this shape.
//
// Tri-state convention: absence of information is always explicit
// (`not_visible`) and evaluates differently from confirmed absence (`no`).
// Nothing in this module silently defaults a tri-state to `no`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ENUMS
// ============================================================================

/// Tri-state observation for windshield items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriState {
    Yes,
    No,
    NotVisible,
}

impl TriState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriState::Yes => "yes",
            TriState::No => "no",
            TriState::NotVisible => "not_visible",
        }
    }
}

impl Default for TriState {
    fn default() -> Self {
        TriState::NotVisible
    }
}

/// Recognized RVV sign codes on the observed sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignCode {
    E1,
    E2,
    E3,
    E4,
    E4Electric,
    E5,
    E6,
    E7,
    E8,
    E9,
    E10,
    G7,
    Other,
    None,
}

impl SignCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignCode::E1 => "E1",
            SignCode::E2 => "E2",
            SignCode::E3 => "E3",
            SignCode::E4 => "E4",
            SignCode::E4Electric => "E4_ELECTRIC",
            SignCode::E5 => "E5",
            SignCode::E6 => "E6",
            SignCode::E7 => "E7",
            SignCode::E8 => "E8",
            SignCode::E9 => "E9",
            SignCode::E10 => "E10",
            SignCode::G7 => "G7",
            SignCode::Other => "OTHER",
            SignCode::None => "NONE",
        }
    }

    /// Parse a raw detector string, tolerating case and whitespace variants.
    pub fn parse(raw: &str) -> Option<SignCode> {
        match raw.trim().to_uppercase().as_str() {
            "E1" => Some(SignCode::E1),
            "E2" => Some(SignCode::E2),
            "E3" => Some(SignCode::E3),
            "E4" => Some(SignCode::E4),
            "E4_ELECTRIC" => Some(SignCode::E4Electric),
            "E5" => Some(SignCode::E5),
            "E6" => Some(SignCode::E6),
            "E7" => Some(SignCode::E7),
            "E8" => Some(SignCode::E8),
            "E9" => Some(SignCode::E9),
            "E10" => Some(SignCode::E10),
            "G7" => Some(SignCode::G7),
            "OTHER" => Some(SignCode::Other),
            "NONE" => Some(SignCode::None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlateVisibility {
    Full,
    Partial,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YellowLineType {
    Continuous,
    Dashed,
    None,
}

// ============================================================================
// RECORD SECTIONS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicensePlate {
    pub value: Option<String>,
    pub visibility: PlateVisibility,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleInfo {
    #[serde(rename = "type")]
    pub vehicle_type: Option<String>,
    pub color: Option<String>,
    pub license_plate: Option<LicensePlate>,
    pub position: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficSignInfo {
    pub detected: bool,
    pub sign_code: Option<SignCode>,
    pub sub_sign_text: Option<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindshieldItems {
    #[serde(default)]
    pub disability_card: TriState,
    #[serde(default)]
    pub permit: TriState,
    #[serde(default)]
    pub parking_disc: TriState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadMarkings {
    pub yellow_line: bool,
    pub yellow_line_type: YellowLineType,
    pub vehicle_alongside_yellow: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Environment {
    pub driver_present: Option<bool>,
    pub loading_activity: Option<bool>,
    pub other_people_present: Option<bool>,
    pub charging_connected: Option<bool>,
    pub lighting: Option<String>,
    pub image_quality: Option<String>,
}

/// One case's objective observations. Any section a detector could not
/// produce is simply absent; the rule engine treats every missing path as
/// unverifiable evidence, never as a confirmed value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub vehicle: Option<VehicleInfo>,
    pub traffic_sign: Option<TrafficSignInfo>,
    pub windshield_items: Option<WindshieldItems>,
    pub road_markings: Option<RoadMarkings>,
    pub environment: Option<Environment>,
}

impl EvidenceRecord {
    /// Parse a detector's JSON payload. Validation happens here, once, so
    /// rule evaluation never deals with raw strings again.
    pub fn from_json(payload: &str) -> Result<Self> {
        let record: EvidenceRecord = serde_json::from_str(payload)?;
        Ok(record)
    }
}

// ============================================================================
// FIELD PATHS
// ============================================================================

/// The finite set of evidence paths the decision trees reference.
///
/// The legacy payload was a loosely-typed nested mapping traversed with
/// dot-separated strings; every path actually used is known up front, so
/// the lookup is an enum instead of a generic traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldPath {
    VehicleLicensePlateValue,
    TrafficSignDetected,
    TrafficSignSignCode,
    TrafficSignSubSignText,
    WindshieldDisabilityCard,
    WindshieldPermit,
    WindshieldParkingDisc,
    RoadMarkingsYellowLine,
    RoadMarkingsVehicleAlongsideYellow,
    EnvironmentDriverPresent,
    EnvironmentLoadingActivity,
    EnvironmentChargingConnected,
}

impl FieldPath {
    /// Dot-path spelling, kept for reports and serialized results.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldPath::VehicleLicensePlateValue => "vehicle.license_plate.value",
            FieldPath::TrafficSignDetected => "traffic_sign.detected",
            FieldPath::TrafficSignSignCode => "traffic_sign.sign_code",
            FieldPath::TrafficSignSubSignText => "traffic_sign.sub_sign_text",
            FieldPath::WindshieldDisabilityCard => "windshield_items.disability_card",
            FieldPath::WindshieldPermit => "windshield_items.permit",
            FieldPath::WindshieldParkingDisc => "windshield_items.parking_disc",
            FieldPath::RoadMarkingsYellowLine => "road_markings.yellow_line",
            FieldPath::RoadMarkingsVehicleAlongsideYellow => {
                "road_markings.vehicle_alongside_yellow"
            }
            FieldPath::EnvironmentDriverPresent => "environment.driver_present",
            FieldPath::EnvironmentLoadingActivity => "environment.loading_activity",
            FieldPath::EnvironmentChargingConnected => "environment.charging_connected",
        }
    }

    /// Resolve the path against a record. Returns None when any segment is
    /// absent, which downstream always maps to "unverifiable".
    pub fn resolve(&self, evidence: &EvidenceRecord) -> Option<FieldValue> {
        match self {
            FieldPath::VehicleLicensePlateValue => evidence
                .vehicle
                .as_ref()?
                .license_plate
                .as_ref()?
                .value
                .clone()
                .map(FieldValue::Text),
            FieldPath::TrafficSignDetected => evidence
                .traffic_sign
                .as_ref()
                .map(|s| FieldValue::Bool(s.detected)),
            FieldPath::TrafficSignSignCode => evidence
                .traffic_sign
                .as_ref()?
                .sign_code
                .map(|c| FieldValue::Text(c.as_str().to_string())),
            FieldPath::TrafficSignSubSignText => evidence
                .traffic_sign
                .as_ref()?
                .sub_sign_text
                .clone()
                .map(FieldValue::Text),
            FieldPath::WindshieldDisabilityCard => evidence
                .windshield_items
                .as_ref()
                .map(|w| FieldValue::Text(w.disability_card.as_str().to_string())),
            FieldPath::WindshieldPermit => evidence
                .windshield_items
                .as_ref()
                .map(|w| FieldValue::Text(w.permit.as_str().to_string())),
            FieldPath::WindshieldParkingDisc => evidence
                .windshield_items
                .as_ref()
                .map(|w| FieldValue::Text(w.parking_disc.as_str().to_string())),
            FieldPath::RoadMarkingsYellowLine => evidence
                .road_markings
                .as_ref()
                .map(|r| FieldValue::Bool(r.yellow_line)),
            FieldPath::RoadMarkingsVehicleAlongsideYellow => evidence
                .road_markings
                .as_ref()
                .map(|r| FieldValue::Bool(r.vehicle_alongside_yellow)),
            FieldPath::EnvironmentDriverPresent => evidence
                .environment
                .as_ref()?
                .driver_present
                .map(FieldValue::Bool),
            FieldPath::EnvironmentLoadingActivity => evidence
                .environment
                .as_ref()?
                .loading_activity
                .map(FieldValue::Bool),
            FieldPath::EnvironmentChargingConnected => evidence
                .environment
                .as_ref()?
                .charging_connected
                .map(FieldValue::Bool),
        }
    }
}

// ============================================================================
// FIELD VALUES
// ============================================================================

/// A resolved evidence value as the rule engine sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
}

impl FieldValue {
    /// Normalize for comparison: strings are case-folded and trimmed, and
    /// textual booleans ("yes"/"true"/"no"/"false") collapse to Bool.
    pub fn normalize(&self) -> FieldValue {
        match self {
            FieldValue::Bool(b) => FieldValue::Bool(*b),
            FieldValue::Text(s) => {
                let lower = s.trim().to_lowercase();
                match lower.as_str() {
                    "true" | "yes" => FieldValue::Bool(true),
                    "false" | "no" => FieldValue::Bool(false),
                    _ => FieldValue::Text(lower),
                }
            }
        }
    }

    /// An explicit "we could not see this" marker from a detector.
    pub fn is_unobserved(&self) -> bool {
        match self.normalize() {
            FieldValue::Text(s) => matches!(s.as_str(), "not_visible" | "unknown" | "not visible"),
            FieldValue::Bool(_) => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
