// src/legal/decision_trees.rs
//
// Deterministic decision trees for each violation type, mapping observed
// evidence fields to legal requirements with article references.
//
// Legal sources:
//   RVV 1990 (BWBR0004825)        - traffic rules, sign definitions
//   Besluit wegslepen (BWBR0012649) - towing authority
//   Wegenverkeerswet 1994 (BWBR0006622) - parent law
//
// The registry is built once at startup and read-only afterwards. Trees are
// declarative content; the evaluation logic lives in rule_engine.

use crate::evidence::{FieldPath, FieldValue};

// ============================================================================
// TYPES
// ============================================================================

/// How a required check decides: either against a fixed expected value, or
/// by comparing two evidence fields. The two modes are mutually exclusive
/// by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckMode {
    Expect(FieldValue),
    Compare {
        other: FieldPath,
        expected: CompareOutcome,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOutcome {
    Match,
    Mismatch,
}

#[derive(Debug, Clone)]
pub struct RequiredCheck {
    pub check_id: &'static str,
    pub description: &'static str,
    pub description_nl: &'static str,
    pub source_field: FieldPath,
    pub mode: CheckMode,
    pub legal_reference: &'static str,
    pub legal_url: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
    pub code: &'static str,
    pub name: &'static str,
    pub name_en: &'static str,
    pub required_checks: Vec<RequiredCheck>,
    pub violation_article: &'static str,
    pub violation_article_url: Option<&'static str>,
    pub violation_text_nl: &'static str,
    pub violation_text_en: &'static str,
    /// Towing authority basis ("wegslepen" decree article).
    pub towing_basis: &'static str,
    pub towing_basis_url: Option<&'static str>,
    /// Official offense registration code (feitcode).
    pub feit_code: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct LegalSource {
    pub key: &'static str,
    pub name: &'static str,
    pub name_en: &'static str,
    pub code: &'static str,
    pub url: &'static str,
}

/// Reference catalog of the statutes the trees cite.
pub const LEGAL_SOURCES: [LegalSource; 3] = [
    LegalSource {
        key: "RVV_1990",
        name: "Reglement verkeersregels en verkeerstekens 1990",
        name_en: "Traffic Rules and Traffic Signs Regulation 1990",
        code: "BWBR0004825",
        url: "https://wetten.overheid.nl/BWBR0004825",
    },
    LegalSource {
        key: "BESLUIT_WEGSLEPEN",
        name: "Besluit wegslepen van voertuigen",
        name_en: "Vehicle Towing Decree",
        code: "BWBR0012649",
        url: "https://wetten.overheid.nl/BWBR0012649",
    },
    LegalSource {
        key: "WVW_1994",
        name: "Wegenverkeerswet 1994",
        name_en: "Road Traffic Act 1994",
        code: "BWBR0006622",
        url: "https://wetten.overheid.nl/BWBR0006622",
    },
];

// ============================================================================
// REGISTRY
// ============================================================================

/// All decision trees plus the sign-code → violation-code mapping.
///
/// Lookup by violation code is a linear scan; the table has six entries and
/// declaration order doubles as the stable output order.
#[derive(Debug, Clone)]
pub struct DecisionTreeRegistry {
    trees: Vec<DecisionTree>,
    sign_map: Vec<(&'static str, &'static str)>,
}

impl DecisionTreeRegistry {
    pub fn new() -> Self {
        Self {
            trees: build_trees(),
            sign_map: vec![
                ("E6", "E6"),
                ("E7", "E7"),
                ("E9", "E9"),
                ("G7", "G7"),
                ("E4", "ELECTRIC_CHARGING"),
                ("E4_ELECTRIC", "ELECTRIC_CHARGING"),
            ],
        }
    }

    pub fn get_decision_tree(&self, violation_code: &str) -> Option<&DecisionTree> {
        self.trees.iter().find(|t| t.code == violation_code)
    }

    /// Map a detected sign code to its violation type. Raw spellings are
    /// case-normalized first; the mapping is many-to-one.
    pub fn get_violation_from_sign(&self, sign_code: &str) -> Option<&'static str> {
        let normalized = sign_code.trim().to_uppercase();
        self.sign_map
            .iter()
            .find(|(sign, _)| *sign == normalized)
            .map(|(_, violation)| *violation)
    }

    /// All supported violation codes, in declaration order.
    pub fn get_all_violation_codes(&self) -> Vec<&'static str> {
        self.trees.iter().map(|t| t.code).collect()
    }
}

impl Default for DecisionTreeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TREE DEFINITIONS
// ============================================================================

fn expect_text(value: &str) -> CheckMode {
    CheckMode::Expect(FieldValue::Text(value.to_string()))
}

fn expect_bool(value: bool) -> CheckMode {
    CheckMode::Expect(FieldValue::Bool(value))
}

fn build_trees() -> Vec<DecisionTree> {
    vec![
        DecisionTree {
            code: "E6",
            name: "Gehandicaptenparkeerplaats",
            name_en: "Disabled parking space",
            required_checks: vec![
                RequiredCheck {
                    check_id: "E6_SIGN",
                    description: "Sign E6 present and visible",
                    description_nl: "Bord E6 aanwezig en zichtbaar",
                    source_field: FieldPath::TrafficSignSignCode,
                    mode: expect_text("E6"),
                    legal_reference: "RVV 1990 Bijlage 1, Bord E6",
                    legal_url: Some("https://wetten.overheid.nl/BWBR0004825#Bijlage1"),
                },
                RequiredCheck {
                    check_id: "E6_NO_CARD",
                    description: "No valid disability parking card",
                    description_nl: "Geen geldige gehandicaptenparkeerkaart",
                    source_field: FieldPath::WindshieldDisabilityCard,
                    mode: expect_text("no"),
                    legal_reference: "RVV 1990 Article 26 paragraph 1b",
                    legal_url: Some("https://wetten.overheid.nl/BWBR0004825#Artikel26"),
                },
                RequiredCheck {
                    check_id: "E6_NO_DRIVER",
                    description: "No driver present (parking, not loading/unloading)",
                    description_nl: "Geen bestuurder aanwezig (parkeren, niet laden/lossen)",
                    source_field: FieldPath::EnvironmentDriverPresent,
                    mode: expect_bool(false),
                    legal_reference: "RVV 1990 Article 1 (definition of parking)",
                    legal_url: Some("https://wetten.overheid.nl/BWBR0004825#Artikel1"),
                },
            ],
            violation_article: "RVV 1990 Article 26",
            violation_article_url: Some("https://wetten.overheid.nl/BWBR0004825#Artikel26"),
            violation_text_nl: "De bestuurder mag zijn voertuig niet parkeren op een gehandicaptenparkeerplaats, aangeduid door verkeersbord E6, indien hij niet in het bezit is van een geldige gehandicaptenparkeerkaart.",
            violation_text_en: "The driver may not park their vehicle in a disabled parking space, indicated by traffic sign E6, if they do not possess a valid disability parking card.",
            towing_basis: "Besluit wegslepen Article 2e",
            towing_basis_url: Some("https://wetten.overheid.nl/BWBR0012649#Artikel2"),
            feit_code: "R402C",
        },
        DecisionTree {
            code: "E6_RESERVED",
            name: "Gereserveerde gehandicaptenparkeerplaats",
            name_en: "Reserved disability parking space",
            required_checks: vec![
                RequiredCheck {
                    check_id: "E6R_SIGN",
                    description: "Sign E6 with license plate sub-sign present",
                    description_nl: "Bord E6 met kenteken-onderbord aanwezig",
                    source_field: FieldPath::TrafficSignSignCode,
                    mode: expect_text("E6"),
                    legal_reference: "RVV 1990 Bijlage 1, Bord E6 with sub-sign",
                    legal_url: Some("https://wetten.overheid.nl/BWBR0004825#Bijlage1"),
                },
                RequiredCheck {
                    check_id: "E6R_WRONG_PLATE",
                    description: "Vehicle license plate does not match sub-sign",
                    description_nl: "Voertuigkenteken komt niet overeen met onderbord",
                    source_field: FieldPath::VehicleLicensePlateValue,
                    mode: CheckMode::Compare {
                        other: FieldPath::TrafficSignSubSignText,
                        expected: CompareOutcome::Mismatch,
                    },
                    legal_reference: "RVV 1990 Article 26 paragraph 1c",
                    legal_url: Some("https://wetten.overheid.nl/BWBR0004825#Artikel26"),
                },
            ],
            violation_article: "RVV 1990 Article 26 paragraph 1c",
            violation_article_url: Some("https://wetten.overheid.nl/BWBR0004825#Artikel26"),
            violation_text_nl: "De bestuurder mag zijn voertuig niet parkeren op een gereserveerde gehandicaptenparkeerplaats indien het kenteken van zijn voertuig niet overeenkomt met het kenteken op het onderbord.",
            violation_text_en: "The driver may not park their vehicle in a reserved disability parking space if their vehicle's license plate does not match the license plate on the sub-sign.",
            towing_basis: "Besluit wegslepen Article 2e",
            towing_basis_url: Some("https://wetten.overheid.nl/BWBR0012649#Artikel2"),
            feit_code: "R402C",
        },
        DecisionTree {
            code: "E7",
            name: "Laden en lossen",
            name_en: "Loading and unloading zone",
            required_checks: vec![
                RequiredCheck {
                    check_id: "E7_SIGN",
                    description: "Sign E7 present and visible",
                    description_nl: "Bord E7 aanwezig en zichtbaar",
                    source_field: FieldPath::TrafficSignSignCode,
                    mode: expect_text("E7"),
                    legal_reference: "RVV 1990 Bijlage 1, Bord E7",
                    legal_url: Some("https://wetten.overheid.nl/BWBR0004825#Bijlage1"),
                },
                RequiredCheck {
                    check_id: "E7_NO_PERMIT",
                    description: "No valid exemption visible",
                    description_nl: "Geen geldige ontheffing zichtbaar",
                    source_field: FieldPath::WindshieldPermit,
                    mode: expect_text("no"),
                    legal_reference: "RVV 1990 Article 87",
                    legal_url: Some("https://wetten.overheid.nl/BWBR0004825#Artikel87"),
                },
                RequiredCheck {
                    check_id: "E7_NO_ACTIVITY",
                    description: "No loading/unloading activity observed",
                    description_nl: "Geen laad/los activiteit waargenomen",
                    source_field: FieldPath::EnvironmentLoadingActivity,
                    mode: expect_bool(false),
                    legal_reference: "RVV 1990 Article 24 paragraph 1f",
                    legal_url: Some("https://wetten.overheid.nl/BWBR0004825#Artikel24"),
                },
                RequiredCheck {
                    check_id: "E7_NO_DRIVER",
                    description: "No driver present",
                    description_nl: "Geen bestuurder aanwezig",
                    source_field: FieldPath::EnvironmentDriverPresent,
                    mode: expect_bool(false),
                    legal_reference: "RVV 1990 Article 1 (definition of parking)",
                    legal_url: Some("https://wetten.overheid.nl/BWBR0004825#Artikel1"),
                },
            ],
            violation_article: "RVV 1990 Article 24 paragraph 1f",
            violation_article_url: Some("https://wetten.overheid.nl/BWBR0004825#Artikel24"),
            violation_text_nl: "Het is verboden een voertuig te parkeren op een gelegenheid bestemd voor het onmiddellijk laden en lossen van goederen.",
            violation_text_en: "It is prohibited to park a vehicle in an area designated for immediate loading and unloading of goods.",
            towing_basis: "Besluit wegslepen Article 2f",
            towing_basis_url: Some("https://wetten.overheid.nl/BWBR0012649#Artikel2"),
            feit_code: "R397H",
        },
        DecisionTree {
            code: "E9",
            name: "Vergunninghouders",
            name_en: "Permit holders parking space",
            required_checks: vec![
                RequiredCheck {
                    check_id: "E9_SIGN",
                    description: "Sign E9 present and visible",
                    description_nl: "Bord E9 aanwezig en zichtbaar",
                    source_field: FieldPath::TrafficSignSignCode,
                    mode: expect_text("E9"),
                    legal_reference: "RVV 1990 Bijlage 1, Bord E9",
                    legal_url: Some("https://wetten.overheid.nl/BWBR0004825#Bijlage1"),
                },
                RequiredCheck {
                    check_id: "E9_NO_PERMIT",
                    description: "No valid permit visible",
                    description_nl: "Geen geldige vergunning zichtbaar",
                    source_field: FieldPath::WindshieldPermit,
                    mode: expect_text("no"),
                    legal_reference: "RVV 1990 Article 24 paragraph 1g",
                    legal_url: Some("https://wetten.overheid.nl/BWBR0004825#Artikel24"),
                },
                RequiredCheck {
                    check_id: "E9_NO_DRIVER",
                    description: "No driver present",
                    description_nl: "Geen bestuurder aanwezig",
                    source_field: FieldPath::EnvironmentDriverPresent,
                    mode: expect_bool(false),
                    legal_reference: "RVV 1990 Article 1 (definition of parking)",
                    legal_url: Some("https://wetten.overheid.nl/BWBR0004825#Artikel1"),
                },
            ],
            violation_article: "RVV 1990 Article 24 paragraph 1g",
            violation_article_url: Some("https://wetten.overheid.nl/BWBR0004825#Artikel24"),
            violation_text_nl: "De bestuurder mag zijn voertuig niet parkeren op een parkeerplaats voor vergunninghouders, aangeduid door verkeersbord E9, indien voor zijn voertuig geen vergunning tot parkeren op die plaats is verleend.",
            violation_text_en: "The driver may not park their vehicle in a permit holders parking space, indicated by traffic sign E9, if no parking permit has been granted for that vehicle at that location.",
            towing_basis: "Besluit wegslepen Article 2h",
            towing_basis_url: Some("https://wetten.overheid.nl/BWBR0012649#Artikel2"),
            feit_code: "R397i",
        },
        DecisionTree {
            code: "G7",
            name: "Voetgangersgebied",
            name_en: "Pedestrian area",
            required_checks: vec![
                RequiredCheck {
                    check_id: "G7_SIGN",
                    description: "Sign G7 present",
                    description_nl: "Bord G7 aanwezig",
                    source_field: FieldPath::TrafficSignSignCode,
                    mode: expect_text("G7"),
                    legal_reference: "RVV 1990 Bijlage 1, Bord G7",
                    legal_url: Some("https://wetten.overheid.nl/BWBR0004825#Bijlage1"),
                },
                RequiredCheck {
                    check_id: "G7_NO_PERMIT",
                    description: "No valid exemption for pedestrian area",
                    description_nl: "Geen geldige ontheffing voor voetgangersgebied",
                    source_field: FieldPath::WindshieldPermit,
                    mode: expect_text("no"),
                    legal_reference: "RVV 1990 Article 87",
                    legal_url: Some("https://wetten.overheid.nl/BWBR0004825#Artikel87"),
                },
            ],
            violation_article: "RVV 1990 Article 87",
            violation_article_url: Some("https://wetten.overheid.nl/BWBR0004825#Artikel87"),
            violation_text_nl: "Het is verboden een voertuig te parkeren in een voetgangersgebied zonder geldige ontheffing.",
            violation_text_en: "It is prohibited to park a vehicle in a pedestrian area without a valid exemption.",
            towing_basis: "Besluit wegslepen Article 2i",
            towing_basis_url: Some("https://wetten.overheid.nl/BWBR0012649#Artikel2"),
            feit_code: "R584",
        },
        DecisionTree {
            code: "ELECTRIC_CHARGING",
            name: "Elektrisch oplaadpunt",
            name_en: "Electric charging point",
            required_checks: vec![
                RequiredCheck {
                    check_id: "EC_SIGN",
                    description: "Electric charging sign present",
                    description_nl: "Elektrisch oplaadpunt bord aanwezig",
                    source_field: FieldPath::TrafficSignSignCode,
                    mode: expect_text("E4_ELECTRIC"),
                    legal_reference: "RVV 1990 Bijlage 1, Bord E4 with charging symbol",
                    legal_url: Some("https://wetten.overheid.nl/BWBR0004825#Bijlage1"),
                },
                RequiredCheck {
                    check_id: "EC_NOT_CONNECTED",
                    description: "Vehicle not connected to charging point",
                    description_nl: "Voertuig niet aangesloten op oplaadpunt",
                    source_field: FieldPath::EnvironmentChargingConnected,
                    mode: expect_bool(false),
                    legal_reference: "RVV 1990 Article 24 paragraph 1d",
                    legal_url: Some("https://wetten.overheid.nl/BWBR0004825#Artikel24"),
                },
            ],
            violation_article: "RVV 1990 Article 24 paragraph 1d",
            violation_article_url: Some("https://wetten.overheid.nl/BWBR0004825#Artikel24"),
            violation_text_nl: "Het is verboden een voertuig te parkeren op een oplaadpunt voor elektrische voertuigen zonder daarvan gebruik te maken.",
            violation_text_en: "It is prohibited to park a vehicle at an electric vehicle charging point without using it.",
            towing_basis: "Municipal ordinance",
            towing_basis_url: None,
            feit_code: "R397",
        },
    ]
}

// ============================================================================
// TESTS
// ============================================================================
