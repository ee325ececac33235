// src/legal/mod.rs
//
// Legal reasoning modules.
//
// Signal flow:
//   EvidenceRecord → rule_engine (decision_trees) → EvaluationResult ─┐
//   EvidenceChecklist ─────────────────────────────→ thresholds ──────┼→ ActionRecommendation
//   EvidenceRecord → templates ────────────────────→ LegalOutput ─────┘
//
// Orchestrated by review::CaseReview.

pub mod decision_trees;
pub mod rule_engine;
pub mod templates;
pub mod thresholds;

// Re-exports for ergonomic access from the crate root
pub use decision_trees::{
    CheckMode, CompareOutcome, DecisionTree, DecisionTreeRegistry, LegalSource, RequiredCheck,
    LEGAL_SOURCES,
};
pub use rule_engine::{
    auto_detect_violation, evaluate_check, evaluate_legal_compliance, evaluate_with_auto_detection,
    format_evidence_checklist, get_supporting_articles, ArticleReference, CheckDisplayItem,
    CheckResult, CheckStatus, EvaluationResult, LegalReferences,
};
pub use templates::{
    extract_context, generate_full_legal_output, generate_legal_statement, get_available_templates,
    get_legal_conclusion, LegalOutput, TemplateContext,
};
pub use thresholds::{
    calculate_overall_confidence, determine_action, format_action_for_ui, get_confidence_color,
    get_confidence_label, validate_score, Action, ActionDisplay, ActionRecommendation,
    ConfidenceLevel, ScoreSnapshot,
};
