//! The analysis report
//!
//! A [`Report`] is the single output of an analysis. It is plain data,
//! serializable to JSON, and carries its own [`VersionStamp`] and diagnostics.

use crate::candidate::{TriggerAssessment, TriggerStatus};
use crate::detectors::RuledOutRisk;
use crate::error::Diagnostic;
use crate::evidence::Evidence;
use crate::scoring::{ConfidenceTier, ScoreBasis, ScoredCandidate};
use crate::versioning::VersionStamp;
use premortem_catalog::{FailurePattern, PatternCategory, PatternId};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// A reported failure mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Pattern id
    pub pattern_id: PatternId,
    /// Pattern name
    pub name: String,
    /// Pattern category
    pub category: PatternCategory,
    /// Confidence tier
    pub confidence: ConfidenceTier,
    /// Merged score
    pub score: f64,
    /// Lexical score
    pub lexical_score: f64,
    /// Semantic score, absent for lexical-only findings
    pub semantic_score: Option<f64>,
    /// How `score` was computed
    pub basis: ScoreBasis,
    /// Verbatim supporting text
    pub evidence: Vec<Evidence>,
    /// Matched signal phrases
    pub matched_signals: Vec<String>,
    /// Every trigger condition with its verdict
    pub trigger_conditions: Vec<TriggerAssessment>,
    /// Why reviewers tend to miss it
    pub why_subtle: String,
    /// What breaks
    pub impact_surface: String,
    /// Questions for the design review
    pub discussion_questions: Vec<String>,
}

impl Finding {
    /// Build from a ranked candidate and its catalog pattern
    #[must_use]
    pub fn new(scored: ScoredCandidate, pattern: &FailurePattern) -> Self {
        let triggers = scored.candidate.triggers();
        let trigger_conditions = if triggers.is_empty() {
            pattern
                .trigger_conditions
                .iter()
                .map(|condition| TriggerAssessment {
                    condition: condition.clone(),
                    status: TriggerStatus::Unknown,
                })
                .collect()
        } else {
            triggers.to_vec()
        };
        let semantic_score = scored.candidate.semantic_score();

        Self {
            pattern_id: scored.candidate.pattern_id,
            name: pattern.name.clone(),
            category: pattern.category,
            confidence: scored.tier,
            score: scored.merged_score,
            lexical_score: scored.candidate.lexical_score,
            semantic_score,
            basis: scored.basis,
            evidence: scored.candidate.evidence,
            matched_signals: scored.candidate.matched_signals,
            trigger_conditions,
            why_subtle: pattern.why_subtle.clone(),
            impact_surface: pattern.impact_surface.clone(),
            discussion_questions: pattern.discussion_questions.clone(),
        }
    }

    /// Trigger conditions the document confirms
    pub fn confirmed_triggers(&self) -> impl Iterator<Item = &str> {
        self.trigger_conditions
            .iter()
            .filter(|t| t.status == TriggerStatus::Confirmed)
            .map(|t| t.condition.as_str())
    }

    /// True when scored without a semantic verdict
    #[inline]
    #[must_use]
    pub fn is_lexical_only(&self) -> bool {
        self.basis == ScoreBasis::LexicalOnly
    }
}

/// Overall risk of the reviewed design
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallRisk {
    /// No failure modes reported
    Minimal,
    /// Only low-confidence findings
    Low,
    /// At least one medium-confidence finding
    Medium,
    /// One high-confidence finding
    High,
    /// Several high-confidence findings
    Critical,
}

impl OverallRisk {
    /// Derive from ranked findings
    #[must_use]
    pub fn from_findings(findings: &[Finding]) -> Self {
        let high = findings
            .iter()
            .filter(|f| f.confidence == ConfidenceTier::High)
            .count();
        match (high, findings.iter().map(|f| f.confidence).max()) {
            (2.., _) => Self::Critical,
            (1, _) => Self::High,
            (_, Some(ConfidenceTier::Medium)) => Self::Medium,
            (_, Some(_)) => Self::Low,
            (_, None) => Self::Minimal,
        }
    }

    /// Lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for OverallRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Analysis id
    pub analysis_id: Ulid,
    /// Short synthesized overview
    pub overview: String,
    /// Overall risk
    pub overall_risk: OverallRisk,
    /// Name of the top-ranked failure mode
    pub primary_concern: Option<String>,
    /// Ranked failure modes
    pub failure_modes: Vec<Finding>,
    /// Implicit assumptions
    pub assumptions: Vec<String>,
    /// Missing information
    pub unknowns: Vec<String>,
    /// Patterns the document mitigates
    pub ruled_out: Vec<RuledOutRisk>,
    /// True if any pass did not complete
    pub partial: bool,
    /// Non-fatal events
    pub diagnostics: Vec<Diagnostic>,
    /// Catalog, model and prompt versions
    pub version: VersionStamp,
}

impl Report {
    /// Failure mode by pattern id
    #[must_use]
    pub fn finding(&self, id: &str) -> Option<&Finding> {
        self.failure_modes.iter().find(|f| f.pattern_id.as_str() == id)
    }

    /// True when `id` was ruled out
    #[must_use]
    pub fn is_ruled_out(&self, id: &str) -> bool {
        self.ruled_out.iter().any(|r| r.pattern_id.as_str() == id)
    }

    /// Every evidence item in the report
    pub fn all_evidence(&self) -> impl Iterator<Item = &Evidence> {
        self.failure_modes
            .iter()
            .flat_map(|f| f.evidence.iter())
            .chain(self.ruled_out.iter().flat_map(|r| r.evidence.iter()))
    }

    /// Pretty JSON
    ///
    /// # Errors
    /// Serialization failure.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
