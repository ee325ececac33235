// src/legal/templates.rs
//
// Bilingual statement templates for officer reports. Placeholder filling is
// total: an unknown code or a missing context key renders as a marked error
// string instead of failing the whole report.

use crate::evidence::{EvidenceRecord, TriState};
use crate::types::Language;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type TemplateContext = BTreeMap<String, String>;

// ============================================================================
// STATEMENT TEMPLATES
// ============================================================================

struct TemplateData {
    template_nl: &'static str,
    template_en: &'static str,
    defaults: &'static [(&'static str, &'static str)],
}

const E6_TEMPLATE: TemplateData = TemplateData {
    template_nl: "Ik zag dat het voertuig geparkeerd stond op een door bord E6 RVV 1990 aangeduide gehandicaptenparkeerplaats. {sub_sign_clause} Ik heb geen geldige gehandicaptenparkeerkaart waargenomen achter de voorruit van het voertuig{card_reason}. Bij het constateren van het feit werd vastgesteld dat er gedurende een tijd van ongeveer {observation_time} minuten geen activiteit met betrekking tot het voertuig plaats vond, zodat er geen sprake was van onmiddellijk laden of lossen van goederen, dan wel het in of uit laten stappen van personen.",
    template_en: "I observed that the vehicle was parked in a disabled parking space indicated by sign E6 RVV 1990. {sub_sign_clause} No valid disability parking card was observed behind the windshield of the vehicle{card_reason}. When establishing the violation, it was determined that for a period of approximately {observation_time} minutes no activity related to the vehicle took place, meaning there was no immediate loading or unloading of goods, nor persons getting in or out.",
    defaults: &[
        ("observation_time", "5"),
        ("sub_sign_clause", ""),
        ("card_reason", ""),
    ],
};

const E6_RESERVED_TEMPLATE: TemplateData = TemplateData {
    template_nl: "Ik zag dat het voertuig met kenteken {vehicle_plate} geparkeerd stond op een door bord E6 RVV 1990 aangeduide gereserveerde gehandicaptenparkeerplaats. Blijkens het onderbord is het gebruik van deze parkeerplaats voorbehouden aan het voertuig met kenteken {reserved_plate}. Het kenteken van het geparkeerde voertuig komt niet overeen met het kenteken op het onderbord. Bij het constateren van het feit werd vastgesteld dat er gedurende een tijd van ongeveer {observation_time} minuten geen activiteit met betrekking tot het voertuig plaats vond.",
    template_en: "I observed that the vehicle with license plate {vehicle_plate} was parked in a reserved disabled parking space indicated by sign E6 RVV 1990. According to the sub-sign, the use of this parking space is reserved for the vehicle with license plate {reserved_plate}. The license plate of the parked vehicle does not match the license plate on the sub-sign. When establishing the violation, it was determined that for a period of approximately {observation_time} minutes no activity related to the vehicle took place.",
    defaults: &[
        ("observation_time", "5"),
        ("vehicle_plate", "[KENTEKEN]"),
        ("reserved_plate", "[ONDERBORD KENTEKEN]"),
    ],
};

const E7_TEMPLATE: TemplateData = TemplateData {
    template_nl: "Ik zag dat het voertuig geparkeerd stond in strijd met bord E7 RVV 1990 (gelegenheid bestemd voor het onmiddellijk laden en lossen van goederen). Ik zag geen geldige ontheffing zichtbaar aanwezig in het voertuig. Ik zag geen laad/los activiteiten rondom het voertuig. Ik zag geen bestuurder in of rondom het voertuig. {time_restriction_clause}",
    template_en: "I observed that the vehicle was parked in violation of sign E7 RVV 1990 (area designated for immediate loading and unloading of goods). No valid exemption was visible in the vehicle. No loading/unloading activities were observed around the vehicle. No driver was present in or around the vehicle. {time_restriction_clause}",
    defaults: &[
        ("observation_time", "5"),
        ("time_restriction_clause", ""),
    ],
};

const E9_TEMPLATE: TemplateData = TemplateData {
    template_nl: "Ik zag dat het voertuig geparkeerd stond op een parkeergelegenheid bestemd voor vergunninghouders, aangeduid door bord E9 RVV 1990{sub_sign_clause}. Ik zag geen geldige vergunning zichtbaar aanwezig in of aan het voertuig. Ik zag geen laad/los activiteiten rondom het voertuig. Tevens zag ik geen bestuurder in of rondom het voertuig.",
    template_en: "I observed that the vehicle was parked in a parking area designated for permit holders, indicated by sign E9 RVV 1990{sub_sign_clause}. No valid permit was visible in or on the vehicle. No loading/unloading activities were observed around the vehicle. Additionally, no driver was present in or around the vehicle.",
    defaults: &[("sub_sign_clause", ""), ("sub_sign_text", "")],
};

const G7_TEMPLATE: TemplateData = TemplateData {
    template_nl: "Het voertuig stond geparkeerd in een door bord G7 RVV 1990 aangeduid voetgangersgebied. Ik heb geen voor dat gebied geldige ontheffing waargenomen. {time_restriction_clause}",
    template_en: "The vehicle was parked in a pedestrian area indicated by sign G7 RVV 1990. No valid exemption for that area was observed. {time_restriction_clause}",
    defaults: &[("time_restriction_clause", "")],
};

const ELECTRIC_CHARGING_TEMPLATE: TemplateData = TemplateData {
    template_nl: "Ik zag dat het voertuig geparkeerd stond op een oplaadpunt voor elektrische voertuigen, aangeduid door bord E4 met oplaadsymbool. Het voertuig was niet aangesloten op het oplaadpunt. Derhalve is sprake van parkeren op een oplaadpunt zonder daarvan gebruik te maken.",
    template_en: "I observed that the vehicle was parked at an electric vehicle charging point, indicated by sign E4 with charging symbol. The vehicle was not connected to the charging point. Therefore, this constitutes parking at a charging point without using it.",
    defaults: &[],
};

fn template_for(violation_code: &str) -> Option<&'static TemplateData> {
    match violation_code {
        "E6" => Some(&E6_TEMPLATE),
        "E6_RESERVED" => Some(&E6_RESERVED_TEMPLATE),
        "E7" => Some(&E7_TEMPLATE),
        "E9" => Some(&E9_TEMPLATE),
        "G7" => Some(&G7_TEMPLATE),
        "ELECTRIC_CHARGING" => Some(&ELECTRIC_CHARGING_TEMPLATE),
        _ => None,
    }
}

pub fn get_available_templates() -> Vec<&'static str> {
    vec!["E6", "E6_RESERVED", "E7", "E9", "G7", "ELECTRIC_CHARGING"]
}

// ============================================================================
// LEGAL CONCLUSIONS
// ============================================================================

/// Formal conclusion appended after the observation statement.
pub fn get_legal_conclusion(violation_code: &str, language: Language) -> Option<&'static str> {
    let (nl, en) = match violation_code {
        "E6" => (
            "Derhalve is sprake van een overtreding van artikel 26 van het RVV 1990. Op grond van artikel 2, onder e, van het Besluit wegslepen van voertuigen is verwijdering van het voertuig gerechtvaardigd.",
            "Therefore, this constitutes a violation of Article 26 of RVV 1990. Under Article 2, under e, of the Vehicle Towing Decree, removal of the vehicle is justified.",
        ),
        "E6_RESERVED" => (
            "Derhalve is sprake van een overtreding van artikel 26, eerste lid, onder c, van het RVV 1990. Op grond van artikel 2, onder e, van het Besluit wegslepen van voertuigen is verwijdering van het voertuig gerechtvaardigd.",
            "Therefore, this constitutes a violation of Article 26, paragraph 1, under c, of RVV 1990. Under Article 2, under e, of the Vehicle Towing Decree, removal of the vehicle is justified.",
        ),
        "E7" => (
            "Derhalve is sprake van een overtreding van artikel 24, eerste lid, onder f, van het RVV 1990. Op grond van artikel 2, onder f, van het Besluit wegslepen van voertuigen is verwijdering van het voertuig gerechtvaardigd.",
            "Therefore, this constitutes a violation of Article 24, paragraph 1, under f, of RVV 1990. Under Article 2, under f, of the Vehicle Towing Decree, removal of the vehicle is justified.",
        ),
        "E9" => (
            "Derhalve is sprake van een overtreding van artikel 24, eerste lid, onder g, van het RVV 1990. Op grond van artikel 2, onder h, van het Besluit wegslepen van voertuigen is verwijdering van het voertuig noodzakelijk in verband met het vrijhouden van aangewezen weggedeelten.",
            "Therefore, this constitutes a violation of Article 24, paragraph 1, under g, of RVV 1990. Under Article 2, under h, of the Vehicle Towing Decree, removal of the vehicle is necessary to keep designated road sections clear.",
        ),
        "G7" => (
            "Derhalve is sprake van een overtreding van artikel 87 van het RVV 1990. Op grond van artikel 2, onder i, van het Besluit wegslepen van voertuigen is verwijdering van het voertuig gerechtvaardigd.",
            "Therefore, this constitutes a violation of Article 87 of RVV 1990. Under Article 2, under i, of the Vehicle Towing Decree, removal of the vehicle is justified.",
        ),
        "ELECTRIC_CHARGING" => (
            "Derhalve is sprake van een overtreding van artikel 24, eerste lid, onder d, van het RVV 1990. Op grond van de gemeentelijke verordening is verwijdering van het voertuig gerechtvaardigd.",
            "Therefore, this constitutes a violation of Article 24, paragraph 1, under d, of RVV 1990. Under the municipal ordinance, removal of the vehicle is justified.",
        ),
        _ => return None,
    };

    Some(match language {
        Language::Nl => nl,
        Language::En => en,
    })
}

// ============================================================================
// TEMPLATE FILLING
// ============================================================================

/// Fill `{key}` placeholders from context. Returns the missing key on error.
fn fill_template(template: &str, context: &TemplateContext) -> Result<String, String> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        match after_open.find('}') {
            Some(close) => {
                let key = &after_open[..close];
                match context.get(key) {
                    Some(value) => output.push_str(value),
                    None => return Err(key.to_string()),
                }
                rest = &after_open[close + 1..];
            }
            None => {
                // Unterminated brace, emit literally.
                output.push('{');
                rest = after_open;
            }
        }
    }
    output.push_str(rest);

    Ok(output)
}

fn template_error(key: &str) -> String {
    format!("[Template error: missing key '{}']", key)
}

fn has(context: &TemplateContext, key: &str) -> bool {
    context.get(key).map(|v| !v.is_empty()).unwrap_or(false)
}

/// Select and fill the conditional clauses for a violation type.
fn process_sub_clauses(
    violation_code: &str,
    context: &mut TemplateContext,
    language: Language,
) -> Result<(), String> {
    match violation_code {
        "E6" => {
            let sub_sign_clause = if has(context, "reserved_plate") {
                let clause = match language {
                    Language::Nl => "Blijkens het onderbord is het gebruik van deze gehandicaptenparkeerplaats voorbehouden aan het voertuig met kenteken {reserved_plate}.",
                    Language::En => "According to the sub-sign, the use of this disabled parking space is reserved for the vehicle with license plate {reserved_plate}.",
                };
                fill_template(clause, context)?
            } else {
                match language {
                    Language::Nl => "Het bord was duidelijk zichtbaar aanwezig.",
                    Language::En => "The sign was clearly visible.",
                }
                .to_string()
            };
            context.insert("sub_sign_clause".to_string(), sub_sign_clause);

            let card_status = context
                .get("card_status")
                .cloned()
                .unwrap_or_else(|| "no_card".to_string());
            let card_reason = match (card_status.as_str(), language) {
                ("no_card", Language::Nl) => ", want er was geen kaart aanwezig",
                ("no_card", Language::En) => " because no card was present",
                ("invalid_card", Language::Nl) => ", want de aanwezige kaart was verlopen/ongeldig",
                ("invalid_card", Language::En) => " because the card present was expired/invalid",
                ("wrong_vehicle", Language::Nl) => ", want de kaart behoorde niet bij dit voertuig",
                ("wrong_vehicle", Language::En) => " because the card did not belong to this vehicle",
                _ => "",
            };
            context.insert("card_reason".to_string(), card_reason.to_string());
        }
        "E7" => {
            let clause = if has(context, "time_window") {
                match language {
                    Language::Nl => "Waarnemingstijd {observation_time} minuten. Het bord was voorzien van onderbord met tijdvenster {time_window}.",
                    Language::En => "Observation time {observation_time} minutes. The sign included a sub-sign with time window {time_window}.",
                }
            } else {
                match language {
                    Language::Nl => "Waarnemingstijd {observation_time} minuten.",
                    Language::En => "Observation time {observation_time} minutes.",
                }
            };
            let filled = fill_template(clause, context)?;
            context.insert("time_restriction_clause".to_string(), filled);
        }
        "E9" => {
            let sub_sign_clause = if has(context, "sub_sign_text") {
                let clause = match language {
                    Language::Nl => " met onderbord \"{sub_sign_text}\"",
                    Language::En => " with sub-sign \"{sub_sign_text}\"",
                };
                fill_template(clause, context)?
            } else {
                String::new()
            };
            context.insert("sub_sign_clause".to_string(), sub_sign_clause);
        }
        "G7" => {
            let clause = if has(context, "time_window") {
                let clause = match language {
                    Language::Nl => "Het verbod geldt {time_window}.",
                    Language::En => "The prohibition applies {time_window}.",
                };
                fill_template(clause, context)?
            } else {
                String::new()
            };
            context.insert("time_restriction_clause".to_string(), clause);
        }
        _ => {}
    }

    Ok(())
}

// ============================================================================
// STATEMENT GENERATION
// ============================================================================

/// Generate the observation statement for a violation type.
///
/// Error cases render in-band so the surrounding report still assembles.
pub fn generate_legal_statement(
    violation_code: &str,
    context: &TemplateContext,
    language: Language,
    include_conclusion: bool,
) -> String {
    let template_data = match template_for(violation_code) {
        Some(data) => data,
        None => return format!("[Unknown violation code: {}]", violation_code),
    };

    let template = match language {
        Language::Nl => template_data.template_nl,
        Language::En => template_data.template_en,
    };

    let mut merged_context: TemplateContext = template_data
        .defaults
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    for (key, value) in context {
        merged_context.insert(key.clone(), value.clone());
    }

    let mut statement = match process_sub_clauses(violation_code, &mut merged_context, language)
        .and_then(|_| fill_template(template, &merged_context))
    {
        Ok(statement) => statement,
        Err(key) => template_error(&key),
    };

    if include_conclusion {
        if let Some(conclusion) = get_legal_conclusion(violation_code, language) {
            statement = format!("{}\n\n{}", statement, conclusion);
        }
    }

    statement.trim().to_string()
}

/// Full bilingual statement output for one case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegalOutput {
    pub nl: String,
    pub en: String,
    pub violation_code: String,
    pub context_used: TemplateContext,
    pub based_on_officer_observation: bool,
}

pub fn generate_full_legal_output(
    violation_code: &str,
    evidence: &EvidenceRecord,
    officer_observation: Option<&str>,
) -> LegalOutput {
    let context = extract_context(evidence);

    let nl = generate_legal_statement(violation_code, &context, Language::Nl, true);
    let en = generate_legal_statement(violation_code, &context, Language::En, true);

    LegalOutput {
        nl,
        en,
        violation_code: violation_code.to_string(),
        context_used: context,
        based_on_officer_observation: officer_observation.is_some(),
    }
}

// ============================================================================
// CONTEXT EXTRACTION
// ============================================================================

/// Pull template context values out of the evidence record.
pub fn extract_context(evidence: &EvidenceRecord) -> TemplateContext {
    let mut context = TemplateContext::new();
    context.insert("observation_time".to_string(), "5".to_string());

    if let Some(vehicle) = &evidence.vehicle {
        if let Some(plate) = &vehicle.license_plate {
            let value = plate
                .value
                .clone()
                .unwrap_or_else(|| "[KENTEKEN]".to_string());
            context.insert("vehicle_plate".to_string(), value);
        }
    }

    if let Some(sign) = &evidence.traffic_sign {
        if let Some(sub_sign_text) = &sign.sub_sign_text {
            if !sub_sign_text.is_empty() {
                context.insert("sub_sign_text".to_string(), sub_sign_text.clone());
                // A sub-sign with digits and a dash reads as a reserved plate.
                let upper = sub_sign_text.to_uppercase();
                if upper.chars().any(|c| c.is_ascii_digit()) && upper.contains('-') {
                    context.insert("reserved_plate".to_string(), sub_sign_text.clone());
                }
            }
        }
    }

    let disability_card = evidence
        .windshield_items
        .as_ref()
        .map(|w| w.disability_card)
        .unwrap_or_default();
    let card_status = match disability_card {
        TriState::No => "no_card",
        TriState::NotVisible => "not_visible",
        TriState::Yes => "no_card",
    };
    context.insert("card_status".to_string(), card_status.to_string());

    context
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{LicensePlate, PlateVisibility, SignCode, TrafficSignInfo, VehicleInfo, WindshieldItems};

    fn ctx(pairs: &[(&str, &str)]) -> TemplateContext {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_e9_statement_with_subsign() {
        let statement = generate_legal_statement(
            "E9",
            &ctx(&[("sub_sign_text", "autodate GreenWheels")]),
            Language::Nl,
            false,
        );
        assert!(statement.contains("bord E9 RVV 1990 met onderbord \"autodate GreenWheels\"."));
        assert!(!statement.contains("Derhalve"));
    }

    #[test]
    fn test_e9_statement_without_subsign() {
        let statement = generate_legal_statement("E9", &TemplateContext::new(), Language::Nl, true);
        assert!(statement.contains("bord E9 RVV 1990. Ik zag geen geldige vergunning"));
        assert!(statement.contains("Derhalve is sprake van een overtreding van artikel 24, eerste lid, onder g"));
    }

    #[test]
    fn test_e6_card_reason_clauses() {
        let no_card = generate_legal_statement(
            "E6",
            &ctx(&[("card_status", "no_card")]),
            Language::Nl,
            false,
        );
        assert!(no_card.contains("voertuig, want er was geen kaart aanwezig."));

        // Card not visible: no reason clause at all.
        let not_visible = generate_legal_statement(
            "E6",
            &ctx(&[("card_status", "not_visible")]),
            Language::Nl,
            false,
        );
        assert!(not_visible.contains("voertuig. Bij het constateren"));
    }

    #[test]
    fn test_e6_reserved_plate_clause() {
        let statement = generate_legal_statement(
            "E6",
            &ctx(&[("reserved_plate", "AB-12-CD")]),
            Language::En,
            false,
        );
        assert!(statement.contains("reserved for the vehicle with license plate AB-12-CD."));
    }

    #[test]
    fn test_e7_time_window_clause() {
        let with_window = generate_legal_statement(
            "E7",
            &ctx(&[("time_window", "ma-vr 08:00-18:00"), ("observation_time", "10")]),
            Language::Nl,
            false,
        );
        assert!(with_window.contains("Waarnemingstijd 10 minuten."));
        assert!(with_window.contains("tijdvenster ma-vr 08:00-18:00."));

        let without = generate_legal_statement("E7", &TemplateContext::new(), Language::Nl, false);
        assert!(without.contains("Waarnemingstijd 5 minuten."));
        assert!(!without.contains("tijdvenster"));
    }

    #[test]
    fn test_g7_time_window_clause() {
        let with_window = generate_legal_statement(
            "G7",
            &ctx(&[("time_window", "ma-za 09:00-21:00")]),
            Language::Nl,
            false,
        );
        assert!(with_window.contains("Het verbod geldt ma-za 09:00-21:00."));

        let in_english = generate_legal_statement(
            "G7",
            &ctx(&[("time_window", "ma-za 09:00-21:00")]),
            Language::En,
            false,
        );
        assert!(in_english.contains("The prohibition applies ma-za 09:00-21:00."));

        // Without a window the clause is omitted entirely.
        let without = generate_legal_statement("G7", &TemplateContext::new(), Language::Nl, false);
        assert!(!without.contains("Het verbod geldt"));
        assert!(without.ends_with("waargenomen."));
    }

    #[test]
    fn test_unknown_code_marker() {
        let statement =
            generate_legal_statement("X1", &TemplateContext::new(), Language::Nl, true);
        assert_eq!(statement, "[Unknown violation code: X1]");
    }

    #[test]
    fn test_missing_key_marker() {
        // E6_RESERVED has defaults for every key, so strip one explicitly.
        let statement = fill_template("plate {vehicle_plate}", &TemplateContext::new());
        assert_eq!(statement, Err("vehicle_plate".to_string()));
        assert_eq!(
            template_error("vehicle_plate"),
            "[Template error: missing key 'vehicle_plate']"
        );
    }

    #[test]
    fn test_e6_reserved_defaults_fill_placeholders() {
        let statement =
            generate_legal_statement("E6_RESERVED", &TemplateContext::new(), Language::Nl, false);
        assert!(statement.contains("kenteken [KENTEKEN]"));
        assert!(statement.contains("kenteken [ONDERBORD KENTEKEN]"));
    }

    #[test]
    fn test_both_languages_differ() {
        let context = ctx(&[("sub_sign_text", "vergunninghouders sector 3")]);
        let nl = generate_legal_statement("E9", &context, Language::Nl, true);
        let en = generate_legal_statement("E9", &context, Language::En, true);
        assert!(nl.starts_with("Ik zag dat"));
        assert!(en.starts_with("I observed that"));
        assert_ne!(nl, en);
    }

    #[test]
    fn test_extract_context_reserved_plate_heuristic() {
        let evidence = EvidenceRecord {
            vehicle: Some(VehicleInfo {
                license_plate: Some(LicensePlate {
                    value: Some("XX-11-YY".to_string()),
                    visibility: PlateVisibility::Full,
                    confidence: 0.9,
                }),
                ..Default::default()
            }),
            traffic_sign: Some(TrafficSignInfo {
                detected: true,
                sign_code: Some(SignCode::E6),
                sub_sign_text: Some("AB-12-CD".to_string()),
                confidence: 0.9,
            }),
            ..Default::default()
        };
        let context = extract_context(&evidence);
        assert_eq!(context.get("vehicle_plate").unwrap(), "XX-11-YY");
        assert_eq!(context.get("reserved_plate").unwrap(), "AB-12-CD");
        assert_eq!(context.get("observation_time").unwrap(), "5");

        // Plain text sub-sign: not a plate.
        let evidence = EvidenceRecord {
            traffic_sign: Some(TrafficSignInfo {
                detected: true,
                sign_code: Some(SignCode::E9),
                sub_sign_text: Some("vergunninghouders".to_string()),
                confidence: 0.9,
            }),
            ..Default::default()
        };
        assert!(!extract_context(&evidence).contains_key("reserved_plate"));
    }

    #[test]
    fn test_extract_context_card_status() {
        let evidence = EvidenceRecord {
            windshield_items: Some(WindshieldItems {
                disability_card: TriState::No,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(extract_context(&evidence).get("card_status").unwrap(), "no_card");

        assert_eq!(
            extract_context(&EvidenceRecord::default()).get("card_status").unwrap(),
            "not_visible"
        );
    }

    #[test]
    fn test_full_output_is_bilingual() {
        let output = generate_full_legal_output("E9", &EvidenceRecord::default(), Some("obs"));
        assert!(output.nl.starts_with("Ik zag dat"));
        assert!(output.en.starts_with("I observed that"));
        assert_eq!(output.violation_code, "E9");
        assert!(output.based_on_officer_observation);
    }

    #[test]
    fn test_available_templates() {
        let codes = get_available_templates();
        assert_eq!(codes.len(), 6);
        assert!(codes.contains(&"ELECTRIC_CHARGING"));
        for code in codes {
            assert!(get_legal_conclusion(code, Language::Nl).is_some());
        }
    }
}
