//! Candidate findings as they move through the pipeline

use crate::evidence::{insert_evidence, Evidence};
use premortem_catalog::PatternId;
use serde::{Deserialize, Serialize};

/// Verdict on one trigger condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    /// Document supports the condition
    Confirmed,
    /// Document contradicts the condition
    Refuted,
    /// Document is silent
    Unknown,
}

/// A trigger condition with its verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerAssessment {
    /// Condition text from the catalog
    pub condition: String,
    /// Verdict
    pub status: TriggerStatus,
}

/// Why no semantic score is available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unresolved {
    /// Backend unavailable or timed out after retries
    ServiceFailure,
    /// The request deadline fired first
    DeadlineExceeded,
}

/// Semantic augmentation state
#[derive(Debug, Clone, PartialEq)]
pub enum SemanticState {
    /// Not yet augmented
    Pending,
    /// Augmented successfully
    Resolved {
        /// Calibrated score in `[0, 1]`
        score: f64,
        /// Per-condition verdicts, catalog order
        triggers: Vec<TriggerAssessment>,
    },
    /// Augmentation did not produce a score
    Unresolved(Unresolved),
}

/// A pattern that survived lexical matching
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Pattern id
    pub pattern_id: PatternId,
    /// Lexical score in `[0, 1]`
    pub lexical_score: f64,
    /// Signal phrases found in the document
    pub matched_signals: Vec<String>,
    /// Verbatim evidence, offset order
    pub evidence: Vec<Evidence>,
    /// Augmentation state
    pub semantic: SemanticState,
}

impl Candidate {
    /// Create a candidate awaiting augmentation
    #[must_use]
    pub fn new(pattern_id: PatternId, lexical_score: f64, matched_signals: Vec<String>, evidence: Vec<Evidence>) -> Self {
        Self {
            pattern_id,
            lexical_score,
            matched_signals,
            evidence,
            semantic: SemanticState::Pending,
        }
    }

    /// Resolved semantic score
    #[inline]
    #[must_use]
    pub fn semantic_score(&self) -> Option<f64> {
        match self.semantic {
            SemanticState::Resolved { score, .. } => Some(score),
            _ => None,
        }
    }

    /// Trigger verdicts, empty unless resolved
    #[must_use]
    pub fn triggers(&self) -> &[TriggerAssessment] {
        match &self.semantic {
            SemanticState::Resolved { triggers, .. } => triggers,
            _ => &[],
        }
    }

    /// Add evidence, ignoring exact duplicates
    pub fn add_evidence(&mut self, evidence: Evidence) {
        insert_evidence(&mut self.evidence, evidence);
    }
}
