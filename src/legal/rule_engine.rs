// src/legal/rule_engine.rs
//
// Deterministic evaluation of an evidence record against the legal
// requirements of one violation's decision tree.
//
// Conservative by design: any field that is missing, malformed, or marked
// not-visible evaluates to `unverifiable` and forces manual review. The
// engine never raises across its boundary; every outcome is a structured
// result the action determiner can consume.

use crate::evidence::{EvidenceRecord, FieldPath, FieldValue};
use crate::legal::decision_trees::{
    CheckMode, CompareOutcome, DecisionTree, DecisionTreeRegistry, RequiredCheck,
};
use crate::types::Language;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed,
    Unverifiable,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Passed => "passed",
            CheckStatus::Failed => "failed",
            CheckStatus::Unverifiable => "unverifiable",
        }
    }
}

/// Outcome of evaluating one required check. Created fresh per evaluation
/// call, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub check_id: String,
    pub description: String,
    pub description_nl: String,
    pub legal_reference: String,
    pub legal_url: Option<String>,
    pub status: CheckStatus,
    pub actual_value: Option<FieldValue>,
    pub expected_value: Option<FieldValue>,
    pub compare_value: Option<FieldValue>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegalReferences {
    pub violation_article: String,
    pub violation_article_url: Option<String>,
    pub violation_text_nl: String,
    pub violation_text_en: String,
    pub towing_basis: String,
    pub towing_basis_url: Option<String>,
    pub feit_code: String,
}

impl LegalReferences {
    fn from_tree(tree: &DecisionTree) -> Self {
        Self {
            violation_article: tree.violation_article.to_string(),
            violation_article_url: tree.violation_article_url.map(str::to_string),
            violation_text_nl: tree.violation_text_nl.to_string(),
            violation_text_en: tree.violation_text_en.to_string(),
            towing_basis: tree.towing_basis.to_string(),
            towing_basis_url: tree.towing_basis_url.map(str::to_string),
            feit_code: tree.feit_code.to_string(),
        }
    }
}

/// Aggregate of all check results for one (evidence, violation code) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub violation_code: Option<String>,
    pub violation_name: Option<String>,
    pub violation_name_en: Option<String>,
    pub checks: Vec<CheckResult>,
    pub all_checks_passed: bool,
    pub passed_checks: Vec<String>,
    pub failed_checks: Vec<String>,
    pub unverifiable_checks: Vec<String>,
    pub verification_score: f64,
    pub requires_manual_review: bool,
    pub legal_references: Option<LegalReferences>,
    pub violation_auto_detected: bool,
    pub detected_from_sign: Option<String>,
    pub fallback_used: bool,
    /// Set when evaluation could not run at all (unknown code, no sign).
    pub error: Option<String>,
}

impl EvaluationResult {
    fn error_result(violation_code: Option<&str>, error: String) -> Self {
        Self {
            violation_code: violation_code.map(str::to_string),
            violation_name: None,
            violation_name_en: None,
            checks: Vec::new(),
            all_checks_passed: false,
            passed_checks: Vec::new(),
            failed_checks: Vec::new(),
            unverifiable_checks: Vec::new(),
            verification_score: 0.0,
            requires_manual_review: true,
            legal_references: None,
            violation_auto_detected: false,
            detected_from_sign: None,
            fallback_used: false,
            error: Some(error),
        }
    }
}

/// Supporting article reference for report generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleReference {
    pub reference_type: String,
    pub article: String,
    pub url: Option<String>,
    pub text_nl: Option<String>,
    pub text_en: Option<String>,
    pub check_id: Option<String>,
}

// ============================================================================
// SINGLE CHECK EVALUATION
// ============================================================================

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Evaluate one required check against the evidence record.
///
/// Priority: an unresolved or not-visible source field is `unverifiable`
/// regardless of the expected value.
pub fn evaluate_check(check: &RequiredCheck, evidence: &EvidenceRecord) -> CheckResult {
    let actual_value = check.source_field.resolve(evidence);

    let mut result = CheckResult {
        check_id: check.check_id.to_string(),
        description: check.description.to_string(),
        description_nl: check.description_nl.to_string(),
        legal_reference: check.legal_reference.to_string(),
        legal_url: check.legal_url.map(str::to_string),
        status: CheckStatus::Unverifiable,
        actual_value: actual_value.clone(),
        expected_value: match &check.mode {
            CheckMode::Expect(expected) => Some(expected.clone()),
            CheckMode::Compare { .. } => None,
        },
        compare_value: None,
        reason: String::new(),
    };

    let actual = match actual_value {
        Some(value) if !value.is_unobserved() => value,
        _ => {
            result.reason = "Not visible in image material".to_string();
            return result;
        }
    };

    match &check.mode {
        CheckMode::Compare { other, expected } => {
            let compare_value = other.resolve(evidence);
            result.compare_value = compare_value.clone();

            let compare = match compare_value {
                Some(value) => value,
                None => {
                    result.reason = "Comparison value not available".to_string();
                    return result;
                }
            };

            let equal = actual.normalize() == compare.normalize();
            match expected {
                CompareOutcome::Mismatch => {
                    if !equal {
                        result.status = CheckStatus::Passed;
                        result.reason =
                            format!("Values differ as expected: '{}' vs '{}'", actual, compare);
                    } else {
                        result.status = CheckStatus::Failed;
                        result.reason = format!("Values match but should differ: '{}'", actual);
                    }
                }
                CompareOutcome::Match => {
                    if equal {
                        result.status = CheckStatus::Passed;
                        result.reason = format!("Values match: '{}'", actual);
                    } else {
                        result.status = CheckStatus::Failed;
                        result.reason = format!("Values differ: '{}' vs '{}'", actual, compare);
                    }
                }
            }
        }
        CheckMode::Expect(expected) => {
            if actual.normalize() == expected.normalize() {
                result.status = CheckStatus::Passed;
                result.reason = format!("Value matches expected: {}", actual);
            } else {
                result.status = CheckStatus::Failed;
                result.reason = format!("Expected '{}', got '{}'", expected, actual);
            }
        }
    }

    result
}

// ============================================================================
// COMPLIANCE EVALUATION
// ============================================================================

/// Evaluate every required check of one violation's decision tree, in the
/// tree's declared order.
pub fn evaluate_legal_compliance(
    registry: &DecisionTreeRegistry,
    evidence: &EvidenceRecord,
    violation_code: &str,
) -> EvaluationResult {
    let tree = match registry.get_decision_tree(violation_code) {
        Some(tree) => tree,
        None => {
            return EvaluationResult::error_result(
                Some(violation_code),
                format!("Unknown violation code: {}", violation_code),
            );
        }
    };

    let mut result = EvaluationResult {
        violation_code: Some(violation_code.to_string()),
        violation_name: Some(tree.name.to_string()),
        violation_name_en: Some(tree.name_en.to_string()),
        checks: Vec::with_capacity(tree.required_checks.len()),
        all_checks_passed: true,
        passed_checks: Vec::new(),
        failed_checks: Vec::new(),
        unverifiable_checks: Vec::new(),
        verification_score: 0.0,
        requires_manual_review: false,
        legal_references: Some(LegalReferences::from_tree(tree)),
        violation_auto_detected: false,
        detected_from_sign: None,
        fallback_used: false,
        error: None,
    };

    for check in &tree.required_checks {
        let check_result = evaluate_check(check, evidence);
        match check_result.status {
            CheckStatus::Passed => result.passed_checks.push(check_result.check_id.clone()),
            CheckStatus::Failed => {
                result.failed_checks.push(check_result.check_id.clone());
                result.all_checks_passed = false;
            }
            CheckStatus::Unverifiable => {
                result.unverifiable_checks.push(check_result.check_id.clone())
            }
        }
        result.checks.push(check_result);
    }

    let total = result.checks.len();
    if total > 0 {
        // Passed checks contribute fully, unverifiable contribute half.
        let score = (result.passed_checks.len() as f64
            + result.unverifiable_checks.len() as f64 * 0.5)
            / total as f64;
        result.verification_score = round2(score);
    }

    result.requires_manual_review =
        !result.unverifiable_checks.is_empty() || !result.all_checks_passed;

    debug!(
        "{}: {}/{} passed, {} unverifiable, score={:.2}",
        violation_code,
        result.passed_checks.len(),
        total,
        result.unverifiable_checks.len(),
        result.verification_score
    );

    result
}

// ============================================================================
// AUTO-DETECTION
// ============================================================================

/// Detect the violation type from the observed traffic sign, if any.
pub fn auto_detect_violation(
    registry: &DecisionTreeRegistry,
    evidence: &EvidenceRecord,
) -> Option<&'static str> {
    let sign = FieldPath::TrafficSignSignCode.resolve(evidence)?;
    let sign_code = match sign {
        FieldValue::Text(s) => s,
        FieldValue::Bool(_) => return None,
    };
    registry.get_violation_from_sign(&sign_code)
}

/// Evaluate with sign-based auto-detection, falling back to a caller-provided
/// code when detection fails. With neither, the result is an explicit error;
/// this never guesses a default violation type.
pub fn evaluate_with_auto_detection(
    registry: &DecisionTreeRegistry,
    evidence: &EvidenceRecord,
    fallback_code: Option<&str>,
) -> EvaluationResult {
    if let Some(detected_code) = auto_detect_violation(registry, evidence) {
        let mut result = evaluate_legal_compliance(registry, evidence, detected_code);
        result.violation_auto_detected = true;
        result.detected_from_sign = FieldPath::TrafficSignSignCode
            .resolve(evidence)
            .map(|v| v.to_string());
        return result;
    }

    if let Some(code) = fallback_code {
        let mut result = evaluate_legal_compliance(registry, evidence, code);
        result.fallback_used = true;
        return result;
    }

    // No sign observed and no fallback code given.
    EvaluationResult::error_result(None, "Could not determine violation type".to_string())
}

// ============================================================================
// REPORT PROJECTIONS
// ============================================================================

/// All supporting legal articles for a violation type, primary first.
pub fn get_supporting_articles(
    registry: &DecisionTreeRegistry,
    violation_code: &str,
) -> Vec<ArticleReference> {
    let tree = match registry.get_decision_tree(violation_code) {
        Some(tree) => tree,
        None => return Vec::new(),
    };

    let mut articles = vec![
        ArticleReference {
            reference_type: "primary".to_string(),
            article: tree.violation_article.to_string(),
            url: tree.violation_article_url.map(str::to_string),
            text_nl: Some(tree.violation_text_nl.to_string()),
            text_en: Some(tree.violation_text_en.to_string()),
            check_id: None,
        },
        ArticleReference {
            reference_type: "towing".to_string(),
            article: tree.towing_basis.to_string(),
            url: tree.towing_basis_url.map(str::to_string),
            text_nl: None,
            text_en: None,
            check_id: None,
        },
    ];

    for check in &tree.required_checks {
        articles.push(ArticleReference {
            reference_type: "supporting".to_string(),
            article: check.legal_reference.to_string(),
            url: check.legal_url.map(str::to_string),
            text_nl: None,
            text_en: None,
            check_id: Some(check.check_id.to_string()),
        });
    }

    articles
}

/// UI projection of one evaluated check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckDisplayItem {
    pub id: String,
    pub description: String,
    pub status: CheckStatus,
    pub legal_reference: String,
    pub legal_url: Option<String>,
    pub icon: &'static str,
    pub style: &'static str,
}

/// Format evaluated checks as a display checklist in the requested language.
pub fn format_evidence_checklist(
    evaluation: &EvaluationResult,
    language: Language,
) -> Vec<CheckDisplayItem> {
    evaluation
        .checks
        .iter()
        .map(|check| {
            let (icon, style) = match check.status {
                CheckStatus::Passed => ("check", "success"),
                CheckStatus::Failed => ("x", "error"),
                CheckStatus::Unverifiable => ("question", "warning"),
            };
            let description = match language {
                Language::Nl => check.description_nl.clone(),
                Language::En => check.description.clone(),
            };
            CheckDisplayItem {
                id: check.check_id.clone(),
                description,
                status: check.status,
                legal_reference: check.legal_reference.clone(),
                legal_url: check.legal_url.clone(),
                icon,
                style,
            }
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
