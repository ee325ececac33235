// src/review.rs
//
// Case review orchestrator. Wires the full pass over one case:
// rule engine evaluation, detector confidence merge, evidence checklist,
// score aggregation, action recommendation, statement generation.

use crate::confidence_merger::{
    generate_evidence_checklist, ConfidenceMerger, EvidenceChecklist, FinalScores,
    MergedConfidence, UiDetectionItem,
};
use crate::evidence::EvidenceRecord;
use crate::legal::decision_trees::DecisionTreeRegistry;
use crate::legal::rule_engine::{
    evaluate_with_auto_detection, format_evidence_checklist, CheckDisplayItem, EvaluationResult,
};
use crate::legal::templates::{extract_context, generate_legal_statement, LegalOutput};
use crate::legal::thresholds::{
    calculate_overall_confidence, determine_action, format_action_for_ui, get_confidence_color,
    get_confidence_label, validate_score, ActionDisplay, ActionRecommendation,
};
use crate::types::{Language, ReviewConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

// ============================================================================
// INPUT / OUTPUT
// ============================================================================

/// Everything known about one case before review.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseReviewInput {
    pub evidence: EvidenceRecord,
    /// Per-category confidences from the segmentation detector, 0.0-1.0.
    #[serde(default)]
    pub sam3_confidences: BTreeMap<String, f64>,
    /// Per-category confidences from the vision-language detector, 0.0-1.0.
    #[serde(default)]
    pub openai_confidences: BTreeMap<String, f64>,
    /// Explicit violation code. Used only when sign-based detection fails.
    pub fallback_violation_code: Option<String>,
    /// Original officer observation text, if any.
    pub officer_observation: Option<String>,
    /// Agreement between detections and the officer observation, 0.0-1.0.
    pub observation_match: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseReviewResult {
    pub evaluation: EvaluationResult,
    pub legal_checks: Vec<CheckDisplayItem>,
    pub merged_results: BTreeMap<String, MergedConfidence>,
    pub final_scores: FinalScores,
    pub hallucination_warnings: Vec<String>,
    pub detected_items: Vec<UiDetectionItem>,
    pub evidence_checklist: EvidenceChecklist,
    pub overall_confidence: f64,
    pub confidence_label: &'static str,
    pub confidence_color: &'static str,
    pub recommendation: ActionRecommendation,
    pub action_display: ActionDisplay,
    pub legal_statements: Option<LegalOutput>,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

pub struct CaseReview {
    registry: DecisionTreeRegistry,
    merger: ConfidenceMerger,
    config: ReviewConfig,
}

impl CaseReview {
    pub fn new(config: ReviewConfig) -> Self {
        Self {
            registry: DecisionTreeRegistry::new(),
            merger: ConfidenceMerger::new(),
            config,
        }
    }

    pub fn registry(&self) -> &DecisionTreeRegistry {
        &self.registry
    }

    /// Run the full review pass over one case.
    pub fn process(&self, input: &CaseReviewInput) -> CaseReviewResult {
        let language = self.config.language;

        // 1. Legal compliance against the decision tree.
        let evaluation = evaluate_with_auto_detection(
            &self.registry,
            &input.evidence,
            input.fallback_violation_code.as_deref(),
        );
        let legal_checks = format_evidence_checklist(&evaluation, language);

        // 2. Cross-validated detector merge.
        let merged_results = self
            .merger
            .merge(&input.sam3_confidences, &input.openai_confidences);
        let final_scores = self.merger.calculate_final_scores(&merged_results);
        let hallucination_warnings = self.merger.get_hallucination_warnings(&merged_results);
        let detected_items = self.merger.format_for_ui(&merged_results);

        // 3. Evidence checklist for the resolved violation type. Without a
        //    resolved code the permit-zone template applies.
        let checklist_code = evaluation.violation_code.as_deref().unwrap_or("E9");
        let evidence_checklist =
            generate_evidence_checklist(&detected_items, checklist_code, language);

        // 4. Aggregate confidence.
        let observation_match = input
            .observation_match
            .unwrap_or(self.config.default_observation_match);
        let overall_confidence = calculate_overall_confidence(
            validate_score(final_scores.object_detection),
            validate_score(final_scores.text_recognition),
            validate_score(final_scores.legal_reasoning),
            validate_score(observation_match),
        );

        // 5. Action recommendation from the checklist alone.
        let recommendation = determine_action(
            &evidence_checklist,
            overall_confidence,
            evaluation.verification_score,
        );
        let action_display = format_action_for_ui(&recommendation, language);

        // 6. Statements, only when the violation type is known.
        let legal_statements = evaluation.violation_code.as_deref().map(|code| {
            let context = extract_context(&input.evidence);
            let include_conclusion = self.config.include_legal_conclusion;
            LegalOutput {
                nl: generate_legal_statement(code, &context, Language::Nl, include_conclusion),
                en: generate_legal_statement(code, &context, Language::En, include_conclusion),
                violation_code: code.to_string(),
                context_used: context,
                based_on_officer_observation: input.officer_observation.is_some(),
            }
        });

        debug!(
            "review: code={:?} verification={:.2} overall={:.2}",
            evaluation.violation_code, evaluation.verification_score, overall_confidence
        );
        info!(
            "case reviewed: action={} confidence={} ({:.2})",
            recommendation.action.as_str(),
            get_confidence_label(overall_confidence),
            overall_confidence
        );

        CaseReviewResult {
            evaluation,
            legal_checks,
            merged_results,
            final_scores,
            hallucination_warnings,
            detected_items,
            evidence_checklist,
            overall_confidence,
            confidence_label: get_confidence_label(overall_confidence),
            confidence_color: get_confidence_color(overall_confidence),
            recommendation,
            action_display,
            legal_statements,
        }
    }
}

impl Default for CaseReview {
    fn default() -> Self {
        Self::new(ReviewConfig::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{Environment, SignCode, TrafficSignInfo, TriState, WindshieldItems};
    use crate::legal::thresholds::Action;

    fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("parking_review=debug")
            .with_test_writer()
            .try_init();
    }

    fn scores(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn e9_case() -> CaseReviewInput {
        CaseReviewInput {
            evidence: EvidenceRecord {
                traffic_sign: Some(TrafficSignInfo {
                    detected: true,
                    sign_code: Some(SignCode::E9),
                    sub_sign_text: None,
                    confidence: 0.92,
                }),
                windshield_items: Some(WindshieldItems {
                    permit: TriState::No,
                    ..Default::default()
                }),
                environment: Some(Environment {
                    driver_present: Some(false),
                    loading_activity: Some(false),
                    ..Default::default()
                }),
                ..Default::default()
            },
            sam3_confidences: scores(&[
                ("traffic_sign_e9", 0.92),
                ("vehicle", 0.95),
                ("license_plate", 0.88),
                ("parking_permit", 0.05),
                ("person", 0.05),
            ]),
            openai_confidences: scores(&[
                ("traffic_sign_e9", 0.90),
                ("vehicle", 0.93),
                ("license_plate", 0.85),
                ("parking_permit", 0.08),
                ("person", 0.02),
            ]),
            fallback_violation_code: None,
            officer_observation: Some("voertuig zonder vergunning op E9 plaats".to_string()),
            observation_match: Some(0.9),
        }
    }

    #[test]
    fn test_clean_e9_case_approves() {
        init_logging();
        let review = CaseReview::default();
        let result = review.process(&e9_case());

        assert!(result.evaluation.violation_auto_detected);
        assert_eq!(result.evaluation.verification_score, 1.0);
        assert_eq!(result.evidence_checklist.confirmed_count, 5);
        assert_eq!(result.recommendation.action, Action::Approve);
        assert!(!result.recommendation.requires_manual_review);
        assert!(result.hallucination_warnings.is_empty());

        let statements = result.legal_statements.unwrap();
        assert!(statements.nl.starts_with("Ik zag dat"));
        assert!(statements.nl.contains("Derhalve"));
        assert!(statements.based_on_officer_observation);
    }

    #[test]
    fn test_hallucinated_sign_forces_manual_review() {
        let mut input = e9_case();
        // Semantic model invents the sign the segmenter cannot find.
        input
            .sam3_confidences
            .insert("traffic_sign_e9".to_string(), 0.1);
        input
            .openai_confidences
            .insert("traffic_sign_e9".to_string(), 0.9);

        init_logging();
        let result = CaseReview::default().process(&input);
        assert_eq!(result.hallucination_warnings.len(), 1);
        assert_eq!(result.recommendation.action, Action::ManualReview);
        assert!(result
            .recommendation
            .review_points
            .iter()
            .any(|p| p.starts_with("Needs verification:")));
    }

    #[test]
    fn test_missing_required_evidence_rejects() {
        let mut input = e9_case();
        // Neither detector finds a vehicle.
        input.sam3_confidences.insert("vehicle".to_string(), 0.1);
        input.openai_confidences.insert("vehicle".to_string(), 0.1);

        let result = CaseReview::default().process(&input);
        assert_eq!(result.recommendation.action, Action::Reject);
        assert!(result
            .recommendation
            .review_points
            .iter()
            .any(|p| p.starts_with("Not detected:")));
    }

    #[test]
    fn test_no_sign_no_fallback_yields_error_without_statements() {
        let input = CaseReviewInput::default();
        let result = CaseReview::default().process(&input);

        assert!(result.evaluation.error.is_some());
        assert!(result.legal_statements.is_none());
        // No detections at all: every checklist item is unverifiable.
        assert_eq!(result.recommendation.action, Action::ManualReview);
        assert!(result.recommendation.requires_manual_review);
    }

    #[test]
    fn test_fallback_code_drives_checklist_and_statement() {
        let mut input = e9_case();
        input.evidence.traffic_sign = None;
        input.fallback_violation_code = Some("E7".to_string());

        let result = CaseReview::default().process(&input);
        assert!(result.evaluation.fallback_used);
        assert_eq!(result.evaluation.violation_code.as_deref(), Some("E7"));
        assert_eq!(
            result.evidence_checklist.total_count,
            6,
            "E7 template has six checks"
        );
        let statements = result.legal_statements.unwrap();
        assert!(statements.nl.contains("bord E7 RVV 1990"));
    }

    #[test]
    fn test_observation_match_defaults_from_config() {
        let mut input = e9_case();
        input.observation_match = None;

        let review = CaseReview::new(ReviewConfig {
            default_observation_match: 0.0,
            ..Default::default()
        });
        let with_default = review.process(&input);

        input.observation_match = Some(1.0);
        let with_match = review.process(&input);

        // Observation match carries 0.20 of the overall confidence.
        assert!(with_match.overall_confidence > with_default.overall_confidence);
        assert!(
            (with_match.overall_confidence - with_default.overall_confidence - 0.20).abs() < 0.011
        );
    }

    #[test]
    fn test_conclusion_toggle() {
        let review = CaseReview::new(ReviewConfig {
            include_legal_conclusion: false,
            ..Default::default()
        });
        let result = review.process(&e9_case());
        let statements = result.legal_statements.unwrap();
        assert!(!statements.nl.contains("Derhalve"));
    }

    #[test]
    fn test_language_config_switches_display_text() {
        let review = CaseReview::new(ReviewConfig {
            language: Language::En,
            ..Default::default()
        });
        let result = review.process(&e9_case());
        assert_eq!(result.action_display.label, "Evidence Verified");
        assert_eq!(result.evidence_checklist.items[0].description, "Sign E9 visible");
        assert_eq!(result.legal_checks[0].description, "Sign E9 present and visible");
    }
}
