// src/confidence_merger.rs
//
// Cross-validation merge of two detector outputs: a segmentation model
// (objective visual evidence) and a vision-language model (semantic
// interpretation). The merge is asymmetric on purpose: when segmentation
// scores higher it wins outright, otherwise the two are averaged.
//
// Absence-based categories invert for display. Not finding a driver or a
// permit supports the violation case, so 0% detection renders as 100%
// absence confidence.

use crate::legal::rule_engine::CheckStatus;
use crate::types::Language;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

// ============================================================================
// CATEGORY CLASSIFICATIONS
// ============================================================================

// Not finding these supports the violation case. Display confidence is
// inverted for them.
const ABSENCE_BASED_CATEGORIES: &[&str] = &[
    "person",
    "driver",
    "driver_present",
    "driver_in_vehicle",
    "parking_permit",
    "permit",
    "disability_card",
    "loading_activity",
];

const DISPLAY_LABELS: &[(&str, &str)] = &[
    ("vehicle", "Vehicle"),
    ("van", "Van"),
    ("truck", "Truck"),
    ("motorcycle", "Motorcycle"),
    ("license_plate", "License Plate"),
    ("traffic_sign", "Traffic Sign"),
    ("traffic_sign_e1", "Sign E1 (No Parking)"),
    ("traffic_sign_e2", "Sign E2 (No Stopping)"),
    ("traffic_sign_e4", "Sign E4 (Parking)"),
    ("traffic_sign_e4_electric", "Sign E4 (Electric)"),
    ("traffic_sign_e5", "Sign E5 (Taxi)"),
    ("traffic_sign_e6", "Sign E6 (Disabled)"),
    ("traffic_sign_e7", "Sign E7 (Loading)"),
    ("traffic_sign_e8", "Sign E8 (Carpool)"),
    ("traffic_sign_e9", "Sign E9 (Permit)"),
    ("traffic_sign_g7", "Sign G7 (Pedestrian)"),
    ("yellow_line", "Yellow Line Marking"),
    ("windshield", "Windshield"),
    ("charging_cable", "Charging Cable"),
    ("charging_station", "Charging Station"),
    ("charging_connected", "Charging Connected"),
    ("parking_disc", "Parking Disc"),
    ("person", "Driver/Person"),
    ("driver", "Driver"),
    ("driver_present", "Driver Present"),
    ("driver_in_vehicle", "Driver in Vehicle"),
    ("parking_permit", "Parking Permit"),
    ("permit", "Permit"),
    ("disability_card", "Disability Card"),
    ("loading_activity", "Loading Activity"),
];

// Labels shown when absence is confirmed.
const ABSENCE_LABELS: &[(&str, &str)] = &[
    ("person", "No Driver Present"),
    ("driver", "No Driver"),
    ("driver_present", "No Driver Present"),
    ("driver_in_vehicle", "No Driver in Vehicle"),
    ("parking_permit", "No Valid Permit"),
    ("permit", "No Valid Permit"),
    ("disability_card", "No Disability Card"),
    ("loading_activity", "No Loading Activity"),
];

/// Per-category source weights. Retained for tuning and diagnostics; the
/// current merge rule is weight-free.
pub const CATEGORY_WEIGHTS: &[(&str, f64, f64)] = &[
    ("vehicle", 0.70, 0.30),
    ("van", 0.70, 0.30),
    ("truck", 0.70, 0.30),
    ("motorcycle", 0.70, 0.30),
    ("license_plate", 0.60, 0.40),
    ("traffic_sign", 0.65, 0.35),
    ("traffic_sign_e1", 0.65, 0.35),
    ("traffic_sign_e2", 0.65, 0.35),
    ("traffic_sign_e4", 0.65, 0.35),
    ("traffic_sign_e4_electric", 0.65, 0.35),
    ("traffic_sign_e5", 0.65, 0.35),
    ("traffic_sign_e6", 0.65, 0.35),
    ("traffic_sign_e7", 0.65, 0.35),
    ("traffic_sign_e8", 0.65, 0.35),
    ("traffic_sign_e9", 0.65, 0.35),
    ("traffic_sign_g7", 0.65, 0.35),
    ("yellow_line", 0.70, 0.30),
    ("parking_permit", 0.50, 0.50),
    ("disability_card", 0.55, 0.45),
    ("parking_disc", 0.55, 0.45),
    ("charging_cable", 0.70, 0.30),
    ("charging_station", 0.70, 0.30),
    ("charging_connected", 0.60, 0.40),
    ("person", 0.75, 0.25),
    ("driver_in_vehicle", 0.60, 0.40),
    ("driver_present", 0.75, 0.25),
    ("loading_activity", 0.50, 0.50),
    ("windshield", 0.80, 0.20),
];

// ============================================================================
// THRESHOLDS
// ============================================================================

pub const HIGH_CONFIDENCE: f64 = 0.70;
pub const LOW_CONFIDENCE: f64 = 0.35;
/// Reserved for a stricter hallucination gate. Not wired into the current
/// merge rule.
pub const HALLUCINATION_THRESHOLD: f64 = 0.40;

// ============================================================================
// HELPERS
// ============================================================================

pub fn is_absence_based(category: &str) -> bool {
    let lower = category.to_lowercase();
    ABSENCE_BASED_CATEGORIES.contains(&lower.as_str())
}

fn title_case(category: &str) -> String {
    category
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Human-readable label for a category. With `show_absence` set, absence-based
/// categories render their "No X" form.
pub fn get_display_label(category: &str, show_absence: bool) -> String {
    let lower = category.to_lowercase();

    if show_absence {
        if let Some((_, label)) = ABSENCE_LABELS.iter().find(|(k, _)| *k == lower) {
            return (*label).to_string();
        }
    }

    DISPLAY_LABELS
        .iter()
        .find(|(k, _)| *k == lower)
        .map(|(_, label)| (*label).to_string())
        .unwrap_or_else(|| title_case(category))
}

pub fn invert_confidence(confidence: f64) -> f64 {
    1.0 - confidence
}

fn to_percent(confidence: f64) -> u32 {
    (confidence * 100.0).round().clamp(0.0, 100.0) as u32
}

// ============================================================================
// MERGE TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceSource {
    Sam3,
    Openai,
    Merged,
    Hallucination,
    Absence,
}

impl ConfidenceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceSource::Sam3 => "sam3",
            ConfidenceSource::Openai => "openai",
            ConfidenceSource::Merged => "merged",
            ConfidenceSource::Hallucination => "hallucination",
            ConfidenceSource::Absence => "absence",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedConfidence {
    pub category: String,
    pub sam3_confidence: f64,
    pub openai_confidence: f64,
    pub merged_confidence: f64,
    pub agreement_score: f64,
    pub source_used: ConfidenceSource,
    pub is_hallucination_risk: bool,
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FinalScores {
    pub object_detection: f64,
    pub text_recognition: f64,
    pub legal_reasoning: f64,
}

/// One entry in the detected items panel. Confidences are 0-100 display
/// percentages, already inverted for absence-based categories. The
/// `original_*` fields keep the un-inverted values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiDetectionItem {
    pub category: String,
    pub label: String,
    pub detected: bool,
    pub confidence: u32,
    pub sam3_confidence: u32,
    pub openai_confidence: u32,
    pub agreement: u32,
    pub source: ConfidenceSource,
    pub is_hallucination_risk: bool,
    pub is_absence_based: bool,
    pub reasoning: String,
    pub original_sam3: u32,
    pub original_openai: u32,
    pub original_merged: u32,
}

// ============================================================================
// MERGER
// ============================================================================

/// Merges the two detectors' per-category confidences with cross-validation.
///
/// Merge rule: segmentation higher wins outright, otherwise average. A
/// semantic claim the segmenter cannot back is flagged as hallucination risk,
/// except on absence-based categories where a low segmentation score is the
/// expected signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceMerger;

impl ConfidenceMerger {
    pub fn new() -> Self {
        Self
    }

    /// Merge both sources over the union of their categories.
    pub fn merge(
        &self,
        sam3_confidences: &BTreeMap<String, f64>,
        openai_confidences: &BTreeMap<String, f64>,
    ) -> BTreeMap<String, MergedConfidence> {
        let mut merged_results = BTreeMap::new();

        for category in sam3_confidences.keys().chain(openai_confidences.keys()) {
            if merged_results.contains_key(category) {
                continue;
            }
            let sam3_conf = sam3_confidences.get(category).copied().unwrap_or(0.0);
            let openai_conf = openai_confidences.get(category).copied().unwrap_or(0.0);
            merged_results.insert(
                category.clone(),
                self.merge_single(category, sam3_conf, openai_conf),
            );
        }

        merged_results
    }

    fn merge_single(&self, category: &str, sam3_conf: f64, openai_conf: f64) -> MergedConfidence {
        let agreement = 1.0 - (sam3_conf - openai_conf).abs();
        let is_absence = is_absence_based(category);

        let (merged, mut source, mut reasoning) = if sam3_conf > openai_conf {
            (
                sam3_conf,
                ConfidenceSource::Sam3,
                "SAM3 confidence higher - using SAM3 value directly",
            )
        } else {
            (
                (sam3_conf + openai_conf) / 2.0,
                ConfidenceSource::Merged,
                "SAM3 <= OpenAI - using average of both",
            )
        };

        let mut is_hallucination = false;
        if !is_absence && sam3_conf < LOW_CONFIDENCE && openai_conf >= HIGH_CONFIDENCE {
            is_hallucination = true;
            reasoning = "HALLUCINATION RISK: OpenAI claims detection but SAM3 cannot segment";
            source = ConfidenceSource::Hallucination;
            warn!("hallucination risk on '{}': sam3={:.2} openai={:.2}", category, sam3_conf, openai_conf);
        }

        if is_absence {
            if sam3_conf < LOW_CONFIDENCE && openai_conf < LOW_CONFIDENCE {
                source = ConfidenceSource::Absence;
                reasoning = "ABSENCE CONFIRMED: Both sources agree item is not present";
            } else if sam3_conf < LOW_CONFIDENCE {
                // Segmentation confirms absence even when the semantic model
                // claims otherwise.
                source = ConfidenceSource::Absence;
                reasoning = "ABSENCE CONFIRMED: SAM3 confirms absence (supports violation)";
                is_hallucination = false;
            }
        }

        MergedConfidence {
            category: category.to_string(),
            sam3_confidence: sam3_conf,
            openai_confidence: openai_conf,
            merged_confidence: merged,
            agreement_score: agreement,
            source_used: source,
            is_hallucination_risk: is_hallucination,
            reasoning: reasoning.to_string(),
        }
    }

    /// Final UI scores aggregated across categories.
    pub fn calculate_final_scores(
        &self,
        merged_results: &BTreeMap<String, MergedConfidence>,
    ) -> FinalScores {
        let obj_categories = [
            "vehicle",
            "van",
            "truck",
            "motorcycle",
            "traffic_sign",
            "traffic_sign_e1",
            "traffic_sign_e2",
            "traffic_sign_e4",
            "traffic_sign_e5",
            "traffic_sign_e6",
            "traffic_sign_e7",
            "traffic_sign_e8",
            "traffic_sign_e9",
            "traffic_sign_g7",
            "yellow_line",
            "parking_permit",
            "disability_card",
            "parking_disc",
            "charging_cable",
            "charging_station",
            "person",
            "windshield",
        ];

        let obj_scores: Vec<f64> = obj_categories
            .iter()
            .filter_map(|cat| merged_results.get(*cat))
            .map(|m| m.merged_confidence)
            .filter(|c| *c > 0.0)
            .collect();
        let object_detection = if obj_scores.is_empty() {
            0.0
        } else {
            obj_scores.iter().sum::<f64>() / obj_scores.len() as f64
        };

        let text_recognition = merged_results
            .get("license_plate")
            .map(|m| m.merged_confidence)
            .unwrap_or(0.0);

        let legal_reasoning = self.calculate_legal_score(merged_results);

        debug!(
            "final scores: object={:.2} text={:.2} legal={:.2}",
            object_detection, text_recognition, legal_reasoning
        );

        FinalScores {
            object_detection,
            text_recognition,
            legal_reasoning,
        }
    }

    fn calculate_legal_score(&self, merged_results: &BTreeMap<String, MergedConfidence>) -> f64 {
        let conf = |category: &str| -> f64 {
            merged_results
                .get(category)
                .map(|m| m.merged_confidence)
                .unwrap_or(0.0)
        };

        let vehicle_conf = ["vehicle", "van", "truck", "motorcycle"]
            .iter()
            .map(|c| conf(c))
            .fold(0.0, f64::max);

        let mut sign_conf = ["e1", "e2", "e4", "e5", "e6", "e7", "e8", "e9", "g7"]
            .iter()
            .map(|code| conf(&format!("traffic_sign_{}", code)))
            .fold(0.0, f64::max);
        sign_conf = sign_conf.max(conf("traffic_sign")).max(conf("yellow_line"));

        // Absence of permit and driver support the case, so those invert.
        let no_permit_score = invert_confidence(conf("parking_permit"));
        let no_driver_score = invert_confidence(conf("person"));

        let legal_score = vehicle_conf * 0.35
            + sign_conf * 0.30
            + no_permit_score * 0.20
            + no_driver_score * 0.05
            + 0.10;

        legal_score.min(1.0)
    }

    pub fn get_hallucination_warnings(
        &self,
        merged_results: &BTreeMap<String, MergedConfidence>,
    ) -> Vec<String> {
        merged_results
            .values()
            .filter(|m| m.is_hallucination_risk)
            .map(|m| format!("{}: {}", get_display_label(&m.category, false), m.reasoning))
            .collect()
    }

    /// Build the detected items panel. Absence-based categories are inverted
    /// to 0-100 display percentages, duplicate concepts (driver aliases,
    /// permit aliases) collapse to the first seen, and items sort detected
    /// first then confidence descending.
    pub fn format_for_ui(
        &self,
        merged_results: &BTreeMap<String, MergedConfidence>,
    ) -> Vec<UiDetectionItem> {
        const DUPLICATE_GROUPS: &[(&str, &str)] = &[
            ("person", "driver"),
            ("driver_present", "driver"),
            ("driver_in_vehicle", "driver"),
            ("driver", "driver"),
            ("parking_permit", "permit"),
            ("permit", "permit"),
        ];

        let mut items = Vec::new();
        let mut processed_concepts: Vec<&str> = Vec::new();

        for (category, data) in merged_results {
            if let Some((_, concept)) = DUPLICATE_GROUPS
                .iter()
                .find(|(k, _)| *k == category.as_str())
            {
                if processed_concepts.contains(concept) {
                    continue;
                }
                processed_concepts.push(concept);
            }

            let is_absence = is_absence_based(category);

            if is_absence {
                // Inverted on the integer scale so display pairs sum to 100.
                let display_sam3 = 100 - to_percent(data.sam3_confidence);
                let display_openai = 100 - to_percent(data.openai_confidence);
                let display_final = 100 - to_percent(data.merged_confidence);

                // High inverted confidence means the item is absent.
                let is_detected = display_final >= 70;
                let label = get_display_label(category, is_detected);

                let reasoning = if is_detected {
                    format!(
                        "No {} detected - supports violation case",
                        get_display_label(category, false)
                    )
                } else {
                    format!(
                        "Possible {} present - manual verification needed",
                        get_display_label(category, false)
                    )
                };

                items.push(UiDetectionItem {
                    category: category.clone(),
                    label,
                    detected: is_detected,
                    confidence: display_final,
                    sam3_confidence: display_sam3,
                    openai_confidence: display_openai,
                    agreement: to_percent(data.agreement_score),
                    source: data.source_used,
                    is_hallucination_risk: false,
                    is_absence_based: true,
                    reasoning,
                    original_sam3: to_percent(data.sam3_confidence),
                    original_openai: to_percent(data.openai_confidence),
                    original_merged: to_percent(data.merged_confidence),
                });
            } else {
                let display_sam3 = to_percent(data.sam3_confidence);
                let display_openai = to_percent(data.openai_confidence);
                let display_final = to_percent(data.merged_confidence);

                items.push(UiDetectionItem {
                    category: category.clone(),
                    label: get_display_label(category, false),
                    detected: display_final >= 50,
                    confidence: display_final,
                    sam3_confidence: display_sam3,
                    openai_confidence: display_openai,
                    agreement: to_percent(data.agreement_score),
                    source: data.source_used,
                    is_hallucination_risk: data.is_hallucination_risk,
                    is_absence_based: false,
                    reasoning: data.reasoning.clone(),
                    original_sam3: display_sam3,
                    original_openai: display_openai,
                    original_merged: display_final,
                });
            }
        }

        items.sort_by(|a, b| {
            (b.detected, b.confidence).cmp(&(a.detected, a.confidence))
        });

        items
    }
}

// ============================================================================
// EVIDENCE CHECKLIST
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct ChecklistCheck {
    pub label: &'static str,
    pub label_nl: &'static str,
    pub category: &'static str,
    pub absence: bool,
    pub reference: &'static str,
}

const fn check(
    label: &'static str,
    label_nl: &'static str,
    category: &'static str,
    absence: bool,
    reference: &'static str,
) -> ChecklistCheck {
    ChecklistCheck {
        label,
        label_nl,
        category,
        absence,
        reference,
    }
}

const E1_CHECKS: &[ChecklistCheck] = &[
    check("Sign E1 visible", "Bord E1 zichtbaar", "traffic_sign_e1", false, "RVV 1990 Bijlage 1, Bord E1"),
    check("Vehicle identified", "Voertuig geïdentificeerd", "vehicle", false, "Art. 5 Wahv"),
    check("License plate visible", "Kenteken zichtbaar", "license_plate", false, "Art. 5 Wahv"),
    check("No valid exemption visible", "Geen geldige ontheffing zichtbaar", "parking_permit", true, "RVV 1990 Art. 87"),
    check("No driver present", "Geen bestuurder aanwezig", "person", true, "RVV 1990 Art. 1 (definitie parkeren)"),
];

const E2_CHECKS: &[ChecklistCheck] = &[
    check("Sign E2 visible", "Bord E2 zichtbaar", "traffic_sign_e2", false, "RVV 1990 Bijlage 1, Bord E2"),
    check("Vehicle identified", "Voertuig geïdentificeerd", "vehicle", false, "Art. 5 Wahv"),
    check("License plate visible", "Kenteken zichtbaar", "license_plate", false, "Art. 5 Wahv"),
    check("No valid exemption visible", "Geen geldige ontheffing zichtbaar", "parking_permit", true, "RVV 1990 Art. 87"),
];

const E4_CHECKS: &[ChecklistCheck] = &[
    check("Sign E4 visible", "Bord E4 zichtbaar", "traffic_sign_e4", false, "RVV 1990 Bijlage 1, Bord E4"),
    check("Vehicle identified", "Voertuig geïdentificeerd", "vehicle", false, "Art. 5 Wahv"),
    check("License plate visible", "Kenteken zichtbaar", "license_plate", false, "Art. 5 Wahv"),
    check("No driver present", "Geen bestuurder aanwezig", "person", true, "RVV 1990 Art. 1 (definitie parkeren)"),
];

const E5_CHECKS: &[ChecklistCheck] = &[
    check("Sign E5 visible", "Bord E5 zichtbaar", "traffic_sign_e5", false, "RVV 1990 Bijlage 1, Bord E5"),
    check("Vehicle identified", "Voertuig geïdentificeerd", "vehicle", false, "Art. 5 Wahv"),
    check("License plate visible", "Kenteken zichtbaar", "license_plate", false, "Art. 5 Wahv"),
    check("No driver present", "Geen bestuurder aanwezig", "person", true, "RVV 1990 Art. 1 (definitie parkeren)"),
];

const E6_CHECKS: &[ChecklistCheck] = &[
    check("Sign E6 visible", "Bord E6 zichtbaar", "traffic_sign_e6", false, "RVV 1990 Bijlage 1, Bord E6"),
    check("Vehicle identified", "Voertuig geïdentificeerd", "vehicle", false, "Art. 5 Wahv"),
    check("License plate visible", "Kenteken zichtbaar", "license_plate", false, "Art. 5 Wahv"),
    check("No disability card visible", "Geen gehandicaptenkaart zichtbaar", "disability_card", true, "RVV 1990 Art. 26"),
    check("No driver present", "Geen bestuurder aanwezig", "person", true, "RVV 1990 Art. 1 (definitie parkeren)"),
];

const E7_CHECKS: &[ChecklistCheck] = &[
    check("Sign E7 visible", "Bord E7 zichtbaar", "traffic_sign_e7", false, "RVV 1990 Bijlage 1, Bord E7"),
    check("Vehicle identified", "Voertuig geïdentificeerd", "vehicle", false, "Art. 5 Wahv"),
    check("License plate visible", "Kenteken zichtbaar", "license_plate", false, "Art. 5 Wahv"),
    check("No loading/unloading activity", "Geen laad/los activiteit", "loading_activity", true, "RVV 1990 Art. 24"),
    check("No valid exemption visible", "Geen geldige ontheffing zichtbaar", "parking_permit", true, "RVV 1990 Art. 24 lid 1c"),
    check("No driver present", "Geen bestuurder aanwezig", "person", true, "RVV 1990 Art. 1"),
];

const E8_CHECKS: &[ChecklistCheck] = &[
    check("Sign E8 visible", "Bord E8 zichtbaar", "traffic_sign_e8", false, "RVV 1990 Bijlage 1, Bord E8"),
    check("Vehicle identified", "Voertuig geïdentificeerd", "vehicle", false, "Art. 5 Wahv"),
    check("License plate visible", "Kenteken zichtbaar", "license_plate", false, "Art. 5 Wahv"),
    check("No driver present", "Geen bestuurder aanwezig", "person", true, "RVV 1990 Art. 1 (definitie parkeren)"),
];

const E9_CHECKS: &[ChecklistCheck] = &[
    check("Sign E9 visible", "Bord E9 zichtbaar", "traffic_sign_e9", false, "RVV 1990 Bijlage 1, Bord E9"),
    check("Vehicle identified", "Voertuig geïdentificeerd", "vehicle", false, "Art. 5 Wahv"),
    check("License plate visible", "Kenteken zichtbaar", "license_plate", false, "Art. 5 Wahv"),
    check("No valid permit visible", "Geen geldige vergunning zichtbaar", "parking_permit", true, "RVV 1990 Art. 24 lid 1g"),
    check("No driver present", "Geen bestuurder aanwezig", "person", true, "RVV 1990 Art. 1 (definitie parkeren)"),
];

const G7_CHECKS: &[ChecklistCheck] = &[
    check("Sign G7 visible", "Bord G7 zichtbaar", "traffic_sign_g7", false, "RVV 1990 Bijlage 1, Bord G7"),
    check("Vehicle identified", "Voertuig geïdentificeerd", "vehicle", false, "Art. 5 Wahv"),
    check("License plate visible", "Kenteken zichtbaar", "license_plate", false, "Art. 5 Wahv"),
    check("No valid exemption visible", "Geen geldige ontheffing zichtbaar", "parking_permit", true, "RVV 1990 Art. 24"),
];

const YELLOW_LINE_CHECKS: &[ChecklistCheck] = &[
    check("Yellow line visible", "Gele streep zichtbaar", "yellow_line", false, "RVV 1990 Art. 24 lid 1 sub e"),
    check("Vehicle identified", "Voertuig geïdentificeerd", "vehicle", false, "Art. 5 Wahv"),
    check("License plate visible", "Kenteken zichtbaar", "license_plate", false, "Art. 5 Wahv"),
    check("No driver present", "Geen bestuurder aanwezig", "person", true, "RVV 1990 Art. 1 (definitie parkeren)"),
];

/// Checklist template per violation type. Unknown types fall back to E9, the
/// most common permit-zone case.
pub fn violation_checks(violation_type: &str) -> &'static [ChecklistCheck] {
    match violation_type.to_uppercase().as_str() {
        "E1" => E1_CHECKS,
        "E2" => E2_CHECKS,
        "E4" => E4_CHECKS,
        "E5" => E5_CHECKS,
        "E6" => E6_CHECKS,
        "E7" => E7_CHECKS,
        "E8" => E8_CHECKS,
        "E9" => E9_CHECKS,
        "G7" => G7_CHECKS,
        "YELLOW_LINE" | "R396I" => YELLOW_LINE_CHECKS,
        _ => E9_CHECKS,
    }
}

/// Checklist status from a UI detection item. For absence items the
/// confidence is already inverted, so `detected` uniformly means the check
/// passed.
pub fn determine_checklist_status(
    detection: Option<&UiDetectionItem>,
    _is_absence_check: bool,
) -> CheckStatus {
    let detection = match detection {
        Some(d) => d,
        None => return CheckStatus::Unverifiable,
    };

    if detection.detected && detection.confidence >= 70 && !detection.is_hallucination_risk {
        CheckStatus::Passed
    } else if detection.confidence >= 40 || detection.is_hallucination_risk {
        CheckStatus::Unverifiable
    } else {
        CheckStatus::Failed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub description: String,
    pub status: CheckStatus,
    pub legal_reference: String,
    /// 0.0-1.0, already inverted for absence items.
    pub confidence: f64,
    pub category: String,
    pub is_absence_based: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceChecklist {
    pub items: Vec<ChecklistItem>,
    pub verified_percentage: u32,
    pub confirmed_count: usize,
    pub total_count: usize,
}

/// Build the evidence checklist from the detected items panel, keeping the
/// two visually consistent.
pub fn generate_evidence_checklist(
    detected_items_ui: &[UiDetectionItem],
    violation_type: &str,
    language: Language,
) -> EvidenceChecklist {
    let checks = violation_checks(violation_type);

    let lookup = |category: &str| -> Option<&UiDetectionItem> {
        detected_items_ui.iter().find(|item| item.category == category)
    };

    let mut items = Vec::with_capacity(checks.len());

    for check in checks {
        let mut detection = lookup(check.category);

        // Alias categories cover detectors that report the same concept under
        // a different key.
        if detection.is_none() {
            let alternatives: &[&str] = match check.category {
                "person" => &["driver_present", "driver_in_vehicle", "driver"],
                "driver_present" => &["person", "driver_in_vehicle", "driver"],
                "parking_permit" => &["permit"],
                _ => &[],
            };
            for alt in alternatives {
                if let Some(found) = lookup(alt) {
                    detection = Some(found);
                    break;
                }
            }
        }

        let status = determine_checklist_status(detection, check.absence);
        let confidence = detection.map(|d| d.confidence as f64 / 100.0).unwrap_or(0.0);

        let description = match language {
            Language::Nl => check.label_nl,
            Language::En => check.label,
        };

        items.push(ChecklistItem {
            description: description.to_string(),
            status,
            legal_reference: check.reference.to_string(),
            confidence,
            category: check.category.to_string(),
            is_absence_based: check.absence,
        });
    }

    let confirmed_count = items.iter().filter(|i| i.status == CheckStatus::Passed).count();
    let total_count = items.len();
    let verified_percentage = if total_count > 0 {
        ((confirmed_count as f64 / total_count as f64) * 100.0).round() as u32
    } else {
        0
    };

    EvidenceChecklist {
        items,
        verified_percentage,
        confirmed_count,
        total_count,
    }
}

// ============================================================================
// CONVENIENCE
// ============================================================================

/// One-call merge returning everything downstream needs.
pub fn merge_confidences(
    sam3_confidences: &BTreeMap<String, f64>,
    openai_confidences: &BTreeMap<String, f64>,
) -> (
    BTreeMap<String, MergedConfidence>,
    FinalScores,
    Vec<String>,
    Vec<UiDetectionItem>,
) {
    let merger = ConfidenceMerger::new();

    let merged_results = merger.merge(sam3_confidences, openai_confidences);
    let final_scores = merger.calculate_final_scores(&merged_results);
    let hallucination_warnings = merger.get_hallucination_warnings(&merged_results);
    let ui_items = merger.format_for_ui(&merged_results);

    (merged_results, final_scores, hallucination_warnings, ui_items)
}

/// Split UI items into shown items and labels of items neither source saw.
pub fn prepare_detected_items_for_display(
    ui_items: Vec<UiDetectionItem>,
    include_zero_detection: bool,
) -> (Vec<UiDetectionItem>, Vec<String>) {
    if include_zero_detection {
        return (ui_items, Vec::new());
    }

    let mut shown_items = Vec::new();
    let mut not_detected_labels = Vec::new();

    for item in ui_items {
        if item.original_sam3 > 0 || item.original_openai > 0 {
            shown_items.push(item);
        } else {
            not_detected_labels.push(item.label);
        }
    }

    (shown_items, not_detected_labels)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_sam3_higher_wins_outright() {
        let merger = ConfidenceMerger::new();
        let merged = merger.merge(
            &scores(&[("vehicle", 0.9)]),
            &scores(&[("vehicle", 0.2)]),
        );
        let result = &merged["vehicle"];
        assert_eq!(result.merged_confidence, 0.9);
        assert_eq!(result.source_used, ConfidenceSource::Sam3);
        assert!(!result.is_hallucination_risk);
    }

    #[test]
    fn test_sam3_lower_or_equal_averages() {
        let merger = ConfidenceMerger::new();
        let merged = merger.merge(
            &scores(&[("vehicle", 0.6)]),
            &scores(&[("vehicle", 0.8)]),
        );
        let result = &merged["vehicle"];
        assert!((result.merged_confidence - 0.7).abs() < 1e-9);
        assert_eq!(result.source_used, ConfidenceSource::Merged);
    }

    #[test]
    fn test_presence_hallucination_flag() {
        let merger = ConfidenceMerger::new();
        let merged = merger.merge(
            &scores(&[("traffic_sign_e9", 0.1)]),
            &scores(&[("traffic_sign_e9", 0.9)]),
        );
        let result = &merged["traffic_sign_e9"];
        assert!(result.is_hallucination_risk);
        assert_eq!(result.source_used, ConfidenceSource::Hallucination);

        let warnings = merger.get_hallucination_warnings(&merged);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("Sign E9 (Permit):"));
    }

    #[test]
    fn test_absence_category_never_hallucinates() {
        // Same scores as the hallucination case, but on an absence category.
        let merger = ConfidenceMerger::new();
        let merged = merger.merge(
            &scores(&[("person", 0.1)]),
            &scores(&[("person", 0.9)]),
        );
        let result = &merged["person"];
        assert!(!result.is_hallucination_risk);
        assert_eq!(result.source_used, ConfidenceSource::Absence);
    }

    #[test]
    fn test_absence_confirmed_when_both_low() {
        let merger = ConfidenceMerger::new();
        let merged = merger.merge(
            &scores(&[("parking_permit", 0.05)]),
            &scores(&[("parking_permit", 0.1)]),
        );
        let result = &merged["parking_permit"];
        assert_eq!(result.source_used, ConfidenceSource::Absence);
        assert!(result.reasoning.contains("Both sources agree"));
    }

    #[test]
    fn test_union_of_categories() {
        let merger = ConfidenceMerger::new();
        let merged = merger.merge(
            &scores(&[("vehicle", 0.8)]),
            &scores(&[("license_plate", 0.7)]),
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["vehicle"].openai_confidence, 0.0);
        assert_eq!(merged["license_plate"].sam3_confidence, 0.0);
    }

    #[test]
    fn test_ui_inversion_for_absence() {
        let merger = ConfidenceMerger::new();
        let merged = merger.merge(
            &scores(&[("person", 0.05)]),
            &scores(&[("person", 0.05)]),
        );
        let items = merger.format_for_ui(&merged);
        let item = &items[0];
        assert!(item.is_absence_based);
        assert_eq!(item.confidence, 95);
        assert!(item.detected);
        assert_eq!(item.label, "No Driver Present");
        assert_eq!(item.original_merged, 5);
    }

    #[test]
    fn test_ui_detection_thresholds() {
        let merger = ConfidenceMerger::new();

        // Absence item right at the boundary: merged 0.30 inverts to 70.
        let merged = merger.merge(&scores(&[("person", 0.30)]), &scores(&[("person", 0.30)]));
        assert!(merger.format_for_ui(&merged)[0].detected);
        let merged = merger.merge(&scores(&[("person", 0.31)]), &scores(&[("person", 0.31)]));
        assert!(!merger.format_for_ui(&merged)[0].detected);

        // Presence item detected from 50 up.
        let merged = merger.merge(&scores(&[("vehicle", 0.5)]), &scores(&[("vehicle", 0.5)]));
        assert!(merger.format_for_ui(&merged)[0].detected);
        let merged = merger.merge(&scores(&[("vehicle", 0.49)]), &scores(&[("vehicle", 0.49)]));
        assert!(!merger.format_for_ui(&merged)[0].detected);
    }

    #[test]
    fn test_ui_deduplicates_driver_aliases() {
        let merger = ConfidenceMerger::new();
        let merged = merger.merge(
            &scores(&[("person", 0.1), ("driver_present", 0.1), ("parking_permit", 0.1), ("permit", 0.1)]),
            &scores(&[]),
        );
        let items = merger.format_for_ui(&merged);
        let driver_items = items.iter().filter(|i| {
            ["person", "driver", "driver_present", "driver_in_vehicle"].contains(&i.category.as_str())
        });
        assert_eq!(driver_items.count(), 1);
        let permit_items = items
            .iter()
            .filter(|i| ["parking_permit", "permit"].contains(&i.category.as_str()));
        assert_eq!(permit_items.count(), 1);
    }

    #[test]
    fn test_ui_sorted_detected_then_confidence() {
        let merger = ConfidenceMerger::new();
        let merged = merger.merge(
            &scores(&[("vehicle", 0.9), ("license_plate", 0.6), ("traffic_sign", 0.2)]),
            &scores(&[]),
        );
        let items = merger.format_for_ui(&merged);
        assert_eq!(items[0].category, "vehicle");
        assert_eq!(items[1].category, "license_plate");
        assert_eq!(items[2].category, "traffic_sign");
        assert!(items[0].detected && items[1].detected && !items[2].detected);
    }

    #[test]
    fn test_legal_score_formula() {
        let merger = ConfidenceMerger::new();
        let merged = merger.merge(
            &scores(&[("vehicle", 0.9), ("traffic_sign_e9", 0.8)]),
            &scores(&[]),
        );
        // permit and person absent from inputs: both invert to 1.0.
        let legal = merger.calculate_final_scores(&merged).legal_reasoning;
        let expected = 0.9 * 0.35 + 0.8 * 0.30 + 1.0 * 0.20 + 1.0 * 0.05 + 0.10;
        assert!((legal - expected).abs() < 1e-9);
    }

    #[test]
    fn test_legal_score_capped_at_one() {
        let merger = ConfidenceMerger::new();
        let merged = merger.merge(
            &scores(&[("vehicle", 1.0), ("traffic_sign_e9", 1.0), ("yellow_line", 1.0)]),
            &scores(&[]),
        );
        assert_eq!(merger.calculate_final_scores(&merged).legal_reasoning, 1.0);
    }

    #[test]
    fn test_final_scores_skip_zero_and_excluded_categories() {
        let merger = ConfidenceMerger::new();
        let merged = merger.merge(
            &scores(&[("vehicle", 0.8), ("traffic_sign_e4_electric", 0.9), ("charging_connected", 0.9)]),
            &scores(&[]),
        );
        // Only 'vehicle' counts toward object detection; the electric sign
        // and connector categories sit outside the aggregate list.
        let final_scores = merger.calculate_final_scores(&merged);
        assert!((final_scores.object_detection - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_checklist_status_rules() {
        let mut item = UiDetectionItem {
            category: "vehicle".to_string(),
            label: "Vehicle".to_string(),
            detected: true,
            confidence: 85,
            sam3_confidence: 85,
            openai_confidence: 85,
            agreement: 100,
            source: ConfidenceSource::Sam3,
            is_hallucination_risk: false,
            is_absence_based: false,
            reasoning: String::new(),
            original_sam3: 85,
            original_openai: 85,
            original_merged: 85,
        };
        assert_eq!(determine_checklist_status(Some(&item), false), CheckStatus::Passed);

        item.is_hallucination_risk = true;
        assert_eq!(determine_checklist_status(Some(&item), false), CheckStatus::Unverifiable);

        item.is_hallucination_risk = false;
        item.detected = false;
        item.confidence = 45;
        assert_eq!(determine_checklist_status(Some(&item), false), CheckStatus::Unverifiable);

        item.confidence = 20;
        assert_eq!(determine_checklist_status(Some(&item), false), CheckStatus::Failed);

        assert_eq!(determine_checklist_status(None, false), CheckStatus::Unverifiable);
    }

    #[test]
    fn test_checklist_uses_alias_categories() {
        let merger = ConfidenceMerger::new();
        // Detector reports 'driver_present' but the E9 template asks for 'person'.
        let merged = merger.merge(
            &scores(&[
                ("traffic_sign_e9", 0.9),
                ("vehicle", 0.9),
                ("license_plate", 0.9),
                ("parking_permit", 0.05),
                ("driver_present", 0.05),
            ]),
            &scores(&[]),
        );
        let ui_items = merger.format_for_ui(&merged);
        let checklist = generate_evidence_checklist(&ui_items, "E9", Language::En);
        assert_eq!(checklist.total_count, 5);
        assert_eq!(checklist.confirmed_count, 5);
        assert_eq!(checklist.verified_percentage, 100);
    }

    #[test]
    fn test_checklist_unknown_type_falls_back() {
        let checklist = generate_evidence_checklist(&[], "UNKNOWN", Language::En);
        assert_eq!(checklist.total_count, E9_CHECKS.len());
        assert!(checklist.items.iter().all(|i| i.status == CheckStatus::Unverifiable));
        assert_eq!(checklist.verified_percentage, 0);
    }

    #[test]
    fn test_checklist_dutch_labels() {
        let checklist = generate_evidence_checklist(&[], "E6", Language::Nl);
        assert_eq!(checklist.items[0].description, "Bord E6 zichtbaar");
    }

    #[test]
    fn test_display_label_fallback_title_case() {
        assert_eq!(get_display_label("some_new_thing", false), "Some New Thing");
        assert_eq!(get_display_label("person", true), "No Driver Present");
        assert_eq!(get_display_label("person", false), "Driver/Person");
    }

    #[test]
    fn test_prepare_display_filters_zero_detections() {
        let merger = ConfidenceMerger::new();
        let merged = merger.merge(
            &scores(&[("vehicle", 0.9), ("traffic_sign", 0.0)]),
            &scores(&[("traffic_sign", 0.0)]),
        );
        let items = merger.format_for_ui(&merged);
        let (shown, hidden) = prepare_detected_items_for_display(items, false);
        assert_eq!(shown.len(), 1);
        assert_eq!(hidden, vec!["Traffic Sign".to_string()]);
    }
}
