// src/lib.rs
//
// Parking enforcement evidence review.
//
// Data flow:
//   EvidenceRecord ─→ legal::rule_engine ──→ EvaluationResult ─┐
//   Detector scores ─→ confidence_merger ──→ EvidenceChecklist ┼→ review::CaseReview
//   EvidenceRecord ─→ legal::templates ───→ LegalOutput ───────┘
//
// `review::CaseReview::process` runs the whole pass over one case.

pub mod config;
pub mod confidence_merger;
pub mod evidence;
pub mod legal;
pub mod review;
pub mod types;

pub use confidence_merger::{
    merge_confidences, prepare_detected_items_for_display, ConfidenceMerger, ConfidenceSource,
    EvidenceChecklist, FinalScores, MergedConfidence, UiDetectionItem,
};
pub use evidence::{EvidenceRecord, FieldPath, FieldValue, SignCode, TriState};
pub use legal::{
    Action, ActionRecommendation, DecisionTreeRegistry, EvaluationResult, LegalOutput,
};
pub use review::{CaseReview, CaseReviewInput, CaseReviewResult};
pub use types::{Config, Language, ReviewConfig};
