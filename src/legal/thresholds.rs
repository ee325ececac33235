// src/legal/thresholds.rs
//
// Action recommendation from the evidence checklist. Strict priority:
// any failed item rejects, any unverifiable item goes to manual review,
// only a fully passed non-empty checklist approves.

use crate::confidence_merger::EvidenceChecklist;
use crate::legal::rule_engine::CheckStatus;
use crate::types::Language;
use serde::{Deserialize, Serialize};
use tracing::info;

// ============================================================================
// THRESHOLDS
// ============================================================================

/// Weights for the overall confidence aggregate.
pub const WEIGHT_OBJECT_DETECTION: f64 = 0.30;
pub const WEIGHT_TEXT_RECOGNITION: f64 = 0.25;
pub const WEIGHT_LEGAL_REASONING: f64 = 0.25;
pub const WEIGHT_OBSERVATION_MATCH: f64 = 0.20;

/// Minimum-score band for a validation tier. Reference data for
/// documentation and tuning; `determine_action` decides from checklist
/// statuses only and never reads these.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ThresholdBand {
    pub overall_confidence: f64,
    pub observation_match_score: f64,
    pub max_unverifiable_checks: usize,
    pub max_minor_discrepancies: usize,
    pub max_major_discrepancies: usize,
    pub min_verification_score: f64,
}

pub const AUTO_APPROVE_THRESHOLDS: ThresholdBand = ThresholdBand {
    overall_confidence: 0.85,
    observation_match_score: 0.90,
    max_unverifiable_checks: 0,
    max_minor_discrepancies: 1,
    max_major_discrepancies: 0,
    min_verification_score: 0.85,
};

pub const MANUAL_REVIEW_THRESHOLDS: ThresholdBand = ThresholdBand {
    overall_confidence: 0.70,
    observation_match_score: 0.75,
    max_unverifiable_checks: 2,
    max_minor_discrepancies: 2,
    max_major_discrepancies: 1,
    min_verification_score: 0.60,
};

/// Ceilings below which a case is flagged for rejection.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RejectBand {
    pub overall_confidence_below: f64,
    pub observation_match_score_below: f64,
    pub min_verification_score_below: f64,
}

pub const AUTO_REJECT_THRESHOLDS: RejectBand = RejectBand {
    overall_confidence_below: 0.50,
    observation_match_score_below: 0.50,
    min_verification_score_below: 0.40,
};

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Approve,
    ManualReview,
    Reject,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Approve => "approve",
            Action::ManualReview => "manual_review",
            Action::Reject => "reject",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
        }
    }
}

/// Score summary attached to every recommendation for display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub overall_confidence: f64,
    pub verification_score: f64,
    pub passed: usize,
    pub unverifiable: usize,
    pub failed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecommendation {
    pub action: Action,
    pub reason: String,
    pub requires_manual_review: bool,
    pub review_points: Vec<String>,
    pub confidence_level: ConfidenceLevel,
    pub scores: ScoreSnapshot,
}

// ============================================================================
// DECISION LOGIC
// ============================================================================

/// Determine the recommended action from checklist statuses.
///
/// The scores are carried for display only; they never influence the
/// decision.
pub fn determine_action(
    checklist: &EvidenceChecklist,
    overall_confidence: f64,
    verification_score: f64,
) -> ActionRecommendation {
    let mut passed_count = 0;
    let mut unverifiable_count = 0;
    let mut failed_count = 0;
    let mut failed_items = Vec::new();
    let mut unverifiable_items = Vec::new();

    for item in &checklist.items {
        match item.status {
            CheckStatus::Passed => passed_count += 1,
            CheckStatus::Unverifiable => {
                unverifiable_count += 1;
                unverifiable_items.push(item.description.clone());
            }
            CheckStatus::Failed => {
                failed_count += 1;
                failed_items.push(item.description.clone());
            }
        }
    }

    let total_count = checklist.items.len();
    let scores = ScoreSnapshot {
        overall_confidence,
        verification_score,
        passed: passed_count,
        unverifiable: unverifiable_count,
        failed: failed_count,
        total: total_count,
    };

    let recommendation = if failed_count > 0 {
        ActionRecommendation {
            action: Action::Reject,
            reason: format!(
                "{} required evidence item(s) could not be verified",
                failed_count
            ),
            requires_manual_review: true,
            review_points: failed_items
                .iter()
                .map(|item| format!("Not detected: {}", item))
                .collect(),
            confidence_level: ConfidenceLevel::Low,
            scores,
        }
    } else if unverifiable_count > 0 {
        ActionRecommendation {
            action: Action::ManualReview,
            reason: format!("{} item(s) require manual verification", unverifiable_count),
            requires_manual_review: true,
            review_points: unverifiable_items
                .iter()
                .map(|item| format!("Needs verification: {}", item))
                .collect(),
            confidence_level: ConfidenceLevel::Medium,
            scores,
        }
    } else if passed_count == total_count && total_count > 0 {
        ActionRecommendation {
            action: Action::Approve,
            reason: "All evidence items verified by both detection systems".to_string(),
            requires_manual_review: false,
            review_points: Vec::new(),
            confidence_level: ConfidenceLevel::High,
            scores,
        }
    } else {
        // Empty checklist. Never auto-decide without evidence.
        ActionRecommendation {
            action: Action::ManualReview,
            reason: "No evidence checklist available for evaluation".to_string(),
            requires_manual_review: true,
            review_points: vec!["Evidence checklist is empty or missing".to_string()],
            confidence_level: ConfidenceLevel::Low,
            scores: ScoreSnapshot {
                overall_confidence,
                verification_score,
                passed: 0,
                unverifiable: 0,
                failed: 0,
                total: 0,
            },
        }
    };

    info!(
        "action={} passed={} unverifiable={} failed={}",
        recommendation.action.as_str(),
        passed_count,
        unverifiable_count,
        failed_count
    );

    recommendation
}

// ============================================================================
// SCORE AGGREGATION
// ============================================================================

/// Weighted overall confidence, rounded to two decimals.
pub fn calculate_overall_confidence(
    object_detection: f64,
    text_recognition: f64,
    legal_reasoning: f64,
    observation_match: f64,
) -> f64 {
    let weighted_sum = object_detection * WEIGHT_OBJECT_DETECTION
        + text_recognition * WEIGHT_TEXT_RECOGNITION
        + legal_reasoning * WEIGHT_LEGAL_REASONING
        + observation_match * WEIGHT_OBSERVATION_MATCH;

    (weighted_sum * 100.0).round() / 100.0
}

pub fn get_confidence_label(confidence: f64) -> &'static str {
    if confidence >= 0.90 {
        "Very High"
    } else if confidence >= 0.80 {
        "High"
    } else if confidence >= 0.70 {
        "Medium"
    } else if confidence >= 0.50 {
        "Low"
    } else {
        "Very Low"
    }
}

pub fn get_confidence_color(confidence: f64) -> &'static str {
    if confidence >= 0.85 {
        "success"
    } else if confidence >= 0.70 {
        "warning"
    } else {
        "danger"
    }
}

/// Clamp a raw score into 0.0-1.0. NaN maps to 0.0.
pub fn validate_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// ============================================================================
// UI FORMATTING
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ActionDisplay {
    pub action: Action,
    pub label: String,
    pub icon: &'static str,
    pub color: &'static str,
    pub description: String,
    pub reason: String,
    pub review_points: Vec<String>,
    pub confidence_level: ConfidenceLevel,
    pub scores: ScoreSnapshot,
}

/// Render a recommendation for the UI in the requested language.
pub fn format_action_for_ui(
    recommendation: &ActionRecommendation,
    language: Language,
) -> ActionDisplay {
    let (label_en, label_nl, icon, color, description_en, description_nl) =
        match recommendation.action {
            Action::Approve => (
                "Evidence Verified",
                "Bewijs Geverifieerd",
                "check-circle",
                "success",
                "Evidence meets validation criteria - ready for officer review",
                "Bewijs voldoet aan validatiecriteria - klaar voor beoordeling",
            ),
            Action::ManualReview => (
                "Manual Review Required",
                "Handmatige beoordeling vereist",
                "eye",
                "warning",
                "Case requires human verification",
                "Zaak vereist menselijke verificatie",
            ),
            Action::Reject => (
                "Rejected",
                "Afgewezen",
                "x-circle",
                "danger",
                "Case does not meet minimum criteria",
                "Zaak voldoet niet aan minimale criteria",
            ),
        };

    let (label, description) = match language {
        Language::Nl => (label_nl, description_nl),
        Language::En => (label_en, description_en),
    };

    ActionDisplay {
        action: recommendation.action,
        label: label.to_string(),
        icon,
        color,
        description: description.to_string(),
        reason: recommendation.reason.clone(),
        review_points: recommendation.review_points.clone(),
        confidence_level: recommendation.confidence_level,
        scores: recommendation.scores,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence_merger::ChecklistItem;

    fn checklist(statuses: &[CheckStatus]) -> EvidenceChecklist {
        let items: Vec<ChecklistItem> = statuses
            .iter()
            .enumerate()
            .map(|(i, status)| ChecklistItem {
                description: format!("check {}", i),
                status: *status,
                legal_reference: "RVV 1990".to_string(),
                confidence: 0.9,
                category: "vehicle".to_string(),
                is_absence_based: false,
            })
            .collect();
        let confirmed_count = items.iter().filter(|i| i.status == CheckStatus::Passed).count();
        let total_count = items.len();
        EvidenceChecklist {
            items,
            verified_percentage: 0,
            confirmed_count,
            total_count,
        }
    }

    #[test]
    fn test_single_failure_rejects_despite_high_scores() {
        let mut statuses = vec![CheckStatus::Passed; 9];
        statuses.push(CheckStatus::Failed);
        let result = determine_action(&checklist(&statuses), 0.95, 0.95);
        assert_eq!(result.action, Action::Reject);
        assert!(result.requires_manual_review);
        assert_eq!(result.confidence_level, ConfidenceLevel::Low);
        assert_eq!(result.review_points, vec!["Not detected: check 9"]);
        assert_eq!(result.scores.passed, 9);
        assert_eq!(result.scores.failed, 1);
    }

    #[test]
    fn test_unverifiable_forces_manual_review() {
        let statuses = vec![
            CheckStatus::Passed,
            CheckStatus::Unverifiable,
            CheckStatus::Passed,
        ];
        let result = determine_action(&checklist(&statuses), 0.9, 0.9);
        assert_eq!(result.action, Action::ManualReview);
        assert_eq!(result.confidence_level, ConfidenceLevel::Medium);
        assert_eq!(result.review_points, vec!["Needs verification: check 1"]);
    }

    #[test]
    fn test_all_passed_approves() {
        let result = determine_action(&checklist(&[CheckStatus::Passed; 5]), 0.9, 1.0);
        assert_eq!(result.action, Action::Approve);
        assert!(!result.requires_manual_review);
        assert_eq!(result.confidence_level, ConfidenceLevel::High);
        assert!(result.review_points.is_empty());
    }

    #[test]
    fn test_empty_checklist_never_approves() {
        let result = determine_action(&checklist(&[]), 0.99, 0.99);
        assert_eq!(result.action, Action::ManualReview);
        assert_eq!(result.confidence_level, ConfidenceLevel::Low);
        assert_eq!(result.scores.total, 0);
    }

    #[test]
    fn test_threshold_bands_do_not_drive_decisions() {
        // Scores far below every reference band: the checklist still rules.
        assert!(0.2 < AUTO_REJECT_THRESHOLDS.overall_confidence_below);
        let result = determine_action(&checklist(&[CheckStatus::Passed; 3]), 0.2, 0.2);
        assert_eq!(result.action, Action::Approve);

        // And far above the approve band, one failure still rejects.
        assert!(0.99 > AUTO_APPROVE_THRESHOLDS.overall_confidence);
        let result = determine_action(&checklist(&[CheckStatus::Failed]), 0.99, 0.99);
        assert_eq!(result.action, Action::Reject);

        assert_eq!(AUTO_APPROVE_THRESHOLDS.max_unverifiable_checks, 0);
        assert_eq!(MANUAL_REVIEW_THRESHOLDS.max_unverifiable_checks, 2);
    }

    #[test]
    fn test_overall_confidence_weights() {
        let confidence = calculate_overall_confidence(0.8, 0.6, 0.9, 0.7);
        let expected = 0.8 * 0.30 + 0.6 * 0.25 + 0.9 * 0.25 + 0.7 * 0.20;
        assert_eq!(confidence, (expected * 100.0_f64).round() / 100.0);

        assert_eq!(calculate_overall_confidence(1.0, 1.0, 1.0, 1.0), 1.0);
        assert_eq!(calculate_overall_confidence(0.0, 0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_confidence_label_bands() {
        assert_eq!(get_confidence_label(0.95), "Very High");
        assert_eq!(get_confidence_label(0.90), "Very High");
        assert_eq!(get_confidence_label(0.85), "High");
        assert_eq!(get_confidence_label(0.75), "Medium");
        assert_eq!(get_confidence_label(0.60), "Low");
        assert_eq!(get_confidence_label(0.30), "Very Low");
    }

    #[test]
    fn test_confidence_color_bands() {
        assert_eq!(get_confidence_color(0.90), "success");
        assert_eq!(get_confidence_color(0.75), "warning");
        assert_eq!(get_confidence_color(0.50), "danger");
    }

    #[test]
    fn test_validate_score_clamps() {
        assert_eq!(validate_score(1.5), 1.0);
        assert_eq!(validate_score(-0.2), 0.0);
        assert_eq!(validate_score(0.42), 0.42);
        assert_eq!(validate_score(f64::NAN), 0.0);
    }

    #[test]
    fn test_format_action_languages() {
        let result = determine_action(&checklist(&[CheckStatus::Passed]), 0.9, 1.0);
        let nl = format_action_for_ui(&result, Language::Nl);
        assert_eq!(nl.label, "Bewijs Geverifieerd");
        assert_eq!(nl.icon, "check-circle");
        assert_eq!(nl.color, "success");
        let en = format_action_for_ui(&result, Language::En);
        assert_eq!(en.label, "Evidence Verified");
    }
}
