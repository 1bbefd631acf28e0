//! Confidence scoring
//!
//! `merged = lexical_weight × lexical + semantic_weight × semantic`, then
//! mapped to a tier. Candidates with no semantic score follow the configured
//! [`MissingSemanticPolicy`]; candidates under the acceptance threshold are
//! excluded without a diagnostic.

use crate::candidate::{Candidate, SemanticState};
use crate::config::{MissingSemanticPolicy, ScoringConfig};
use crate::error::{Diagnostic, DiagnosticKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    /// Below medium, at or above acceptance
    Low,
    /// At or above the medium threshold
    Medium,
    /// At or above the high threshold
    High,
}

impl ConfidenceTier {
    /// Lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the merged score was computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBasis {
    /// Lexical and semantic scores combined
    Merged,
    /// Discounted lexical score only
    LexicalOnly,
}

/// A candidate with its final score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    /// Candidate
    pub candidate: Candidate,
    /// Merged score in `[0, 1]`
    pub merged_score: f64,
    /// Tier
    pub tier: ConfidenceTier,
    /// Score basis
    pub basis: ScoreBasis,
}

/// Merged score and basis; `None` when the policy drops the candidate
#[must_use]
pub fn merge(candidate: &Candidate, config: &ScoringConfig) -> Option<(f64, ScoreBasis)> {
    match candidate.semantic_score() {
        Some(semantic) => {
            let merged = config.lexical_weight * candidate.lexical_score + config.semantic_weight * semantic;
            Some((merged.clamp(0.0, 1.0), ScoreBasis::Merged))
        }
        None => match config.missing_semantic {
            MissingSemanticPolicy::LexicalOnly => Some((
                (candidate.lexical_score * config.lexical_only_discount).clamp(0.0, 1.0),
                ScoreBasis::LexicalOnly,
            )),
            MissingSemanticPolicy::Drop => None,
        },
    }
}

/// Tier for `score`; `None` below acceptance
#[must_use]
pub fn tier_for(score: f64, config: &ScoringConfig) -> Option<ConfidenceTier> {
    if score >= config.high_threshold {
        Some(ConfidenceTier::High)
    } else if score >= config.medium_threshold {
        Some(ConfidenceTier::Medium)
    } else if score >= config.acceptance_threshold {
        Some(ConfidenceTier::Low)
    } else {
        None
    }
}

/// Score every candidate, keeping those at or above acceptance
#[must_use]
pub fn score_candidates(candidates: Vec<Candidate>, config: &ScoringConfig) -> (Vec<ScoredCandidate>, Vec<Diagnostic>) {
    let mut scored = Vec::with_capacity(candidates.len());
    let mut diagnostics = Vec::new();

    for candidate in candidates {
        debug_assert!(candidate.semantic != SemanticState::Pending);
        let Some((merged_score, basis)) = merge(&candidate, config) else {
            tracing::debug!(pattern = %candidate.pattern_id, "dropping unscored candidate");
            diagnostics.push(Diagnostic::pattern(
                DiagnosticKind::ServiceUnavailable,
                candidate.pattern_id.as_str(),
                "dropped: no semantic score",
            ));
            continue;
        };
        let Some(mut tier) = tier_for(merged_score, config) else {
            continue;
        };
        if basis == ScoreBasis::LexicalOnly {
            tier = tier.min(ConfidenceTier::Medium);
        }
        scored.push(ScoredCandidate {
            candidate,
            merged_score,
            tier,
            basis,
        });
    }
    (scored, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Unresolved;
    use premortem_catalog::PatternId;

    fn candidate(lexical: f64, semantic: Option<f64>) -> Candidate {
        let mut c = Candidate::new(PatternId::parse("p").unwrap(), lexical, vec![], vec![]);
        c.semantic = match semantic {
            Some(score) => SemanticState::Resolved { score, triggers: vec![] },
            None => SemanticState::Unresolved(Unresolved::ServiceFailure),
        };
        c
    }

    #[test]
    fn merge_weights_semantic_higher() {
        let config = ScoringConfig::default();
        let (score, basis) = merge(&candidate(1.0, Some(0.0)), &config).unwrap();
        assert!((score - 0.35).abs() < 1e-9);
        assert_eq!(basis, ScoreBasis::Merged);
        let (score, _) = merge(&candidate(0.0, Some(1.0)), &config).unwrap();
        assert!((score - 0.65).abs() < 1e-9);
    }

    #[test]
    fn tiers_follow_thresholds() {
        let config = ScoringConfig::default();
        assert_eq!(tier_for(0.60, &config), Some(ConfidenceTier::High));
        assert_eq!(tier_for(0.59, &config), Some(ConfidenceTier::Medium));
        assert_eq!(tier_for(0.40, &config), Some(ConfidenceTier::Medium));
        assert_eq!(tier_for(0.25, &config), Some(ConfidenceTier::Low));
        assert_eq!(tier_for(0.24, &config), None);
    }

    #[test]
    fn lexical_only_is_discounted_and_capped() {
        let config = ScoringConfig::default();
        let (scored, diags) = score_candidates(vec![candidate(1.0, None)], &config);
        assert!(diags.is_empty());
        assert_eq!(scored[0].basis, ScoreBasis::LexicalOnly);
        assert!((scored[0].merged_score - 0.6).abs() < 1e-9);
        assert_eq!(scored[0].tier, ConfidenceTier::Medium);
    }

    #[test]
    fn drop_policy_drops_with_diagnostic() {
        let config = ScoringConfig {
            missing_semantic: MissingSemanticPolicy::Drop,
            ..ScoringConfig::default()
        };
        let (scored, diags) = score_candidates(vec![candidate(1.0, None)], &config);
        assert!(scored.is_empty());
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn below_acceptance_is_silent() {
        let (scored, diags) = score_candidates(vec![candidate(0.1, Some(0.1))], &ScoringConfig::default());
        assert!(scored.is_empty());
        assert!(diags.is_empty());
    }
}
