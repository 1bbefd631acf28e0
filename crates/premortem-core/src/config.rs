//! Analysis configuration
//!
//! Every tunable the engine consults lives here and is passed explicitly
//! into each analysis. Nothing is read from process-wide state.
//!
//! All sections deserialize with `#[serde(default)]` so a TOML file may set
//! only the keys it cares about.

use crate::error::AnalysisError;
use premortem_llm::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default maximum document length in chars
pub const DEFAULT_MAX_DOCUMENT_CHARS: usize = 50_000;

/// What to do with a candidate whose semantic score never resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSemanticPolicy {
    /// Score on the discounted lexical score alone, capped at medium confidence
    #[default]
    LexicalOnly,
    /// Drop the candidate
    Drop,
}

/// Lexical candidate generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalConfig {
    /// Candidates scoring below this are never sent for augmentation
    pub low_cut: f64,
    /// Fraction of a pattern's total signal weight that saturates the score
    pub saturation: f64,
    /// Seed evidence sentences kept per candidate
    pub max_seed_evidence: usize,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            low_cut: 0.1,
            saturation: 0.5,
            max_seed_evidence: 3,
        }
    }
}

/// Semantic augmentation and completion calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    /// Size of the analyzer-wide admission semaphore
    ///
    /// Read once when the analyzer is built; later per-request changes do not
    /// resize the shared limit.
    pub max_concurrency: usize,
    /// Timeout for a single completion attempt
    pub call_timeout_ms: u64,
    /// Wall-clock budget for the whole request
    pub request_deadline_ms: u64,
    /// Retry policy for transient completion failures
    pub retry: RetryPolicy,
    /// Chars of context shown on each side of a signal hit
    pub excerpt_window_chars: usize,
    /// Upper bound on a candidate excerpt
    pub max_excerpt_chars: usize,
    /// Score ceiling when the model confirms no trigger condition
    pub unconfirmed_score_cap: f64,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            call_timeout_ms: 30_000,
            request_deadline_ms: 120_000,
            retry: RetryPolicy::default(),
            excerpt_window_chars: 300,
            max_excerpt_chars: 2_000,
            unconfirmed_score_cap: 0.5,
        }
    }
}

impl SemanticConfig {
    /// Per-attempt timeout
    #[inline]
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Request deadline
    #[inline]
    #[must_use]
    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }
}

/// Score merging and confidence tiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weight of the lexical score in the merge
    pub lexical_weight: f64,
    /// Weight of the semantic score in the merge
    pub semantic_weight: f64,
    /// Merged score at or above which a finding is high confidence
    pub high_threshold: f64,
    /// Merged score at or above which a finding is medium confidence
    pub medium_threshold: f64,
    /// Merged score below which a candidate is not reported
    pub acceptance_threshold: f64,
    /// Handling of unscored candidates
    pub missing_semantic: MissingSemanticPolicy,
    /// Multiplier applied to the lexical score under [`MissingSemanticPolicy::LexicalOnly`]
    pub lexical_only_discount: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            lexical_weight: 0.35,
            semantic_weight: 0.65,
            high_threshold: 0.60,
            medium_threshold: 0.40,
            acceptance_threshold: 0.25,
            missing_semantic: MissingSemanticPolicy::LexicalOnly,
            lexical_only_discount: 0.6,
        }
    }
}

/// Ranking and deduplication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Maximum number of reported failure modes
    pub max_findings: usize,
    /// Evidence overlap above which the lower-scored candidate is suppressed
    pub overlap_threshold: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            max_findings: 10,
            overlap_threshold: 0.8,
        }
    }
}

/// Assumption, unknown and ruled-out passes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Cap on reported assumptions
    pub max_assumptions: usize,
    /// Cap on reported unknowns
    pub max_unknowns: usize,
    /// Chars of the document included in detector prompts
    pub max_prompt_document_chars: usize,
    /// Documents longer than this always get an assumption pass
    pub assumption_min_chars: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_assumptions: 5,
            max_unknowns: 10,
            max_prompt_document_chars: 6_000,
            assumption_min_chars: 200,
        }
    }
}

/// Complete per-request configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Maximum document length in chars
    pub max_document_chars: usize,
    /// Candidate generation
    pub lexical: LexicalConfig,
    /// Augmentation and completion calls
    pub semantic: SemanticConfig,
    /// Score merging and tiers
    pub scoring: ScoringConfig,
    /// Ranking
    pub ranking: RankingConfig,
    /// Detector passes
    pub detectors: DetectorConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_document_chars: DEFAULT_MAX_DOCUMENT_CHARS,
            lexical: LexicalConfig::default(),
            semantic: SemanticConfig::default(),
            scoring: ScoringConfig::default(),
            ranking: RankingConfig::default(),
            detectors: DetectorConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With maximum findings
    #[inline]
    #[must_use]
    pub fn with_max_findings(mut self, max: usize) -> Self {
        self.ranking.max_findings = max;
        self
    }

    /// With acceptance threshold
    #[inline]
    #[must_use]
    pub fn with_acceptance_threshold(mut self, threshold: f64) -> Self {
        self.scoring.acceptance_threshold = threshold;
        self
    }

    /// With handling of unscored candidates
    #[inline]
    #[must_use]
    pub fn with_missing_semantic(mut self, policy: MissingSemanticPolicy) -> Self {
        self.scoring.missing_semantic = policy;
        self
    }

    /// With admission limit for completion calls
    #[inline]
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.semantic.max_concurrency = max;
        self
    }

    /// With per-attempt timeout
    #[inline]
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.semantic.call_timeout_ms = duration_ms(timeout);
        self
    }

    /// With request deadline
    #[inline]
    #[must_use]
    pub fn with_request_deadline(mut self, deadline: Duration) -> Self {
        self.semantic.request_deadline_ms = duration_ms(deadline);
        self
    }

    /// With retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.semantic.retry = retry;
        self
    }

    /// Check internal consistency
    ///
    /// # Errors
    /// [`AnalysisError::Config`] naming the first violated constraint.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let s = &self.scoring;
        let unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);

        if self.max_document_chars == 0 {
            return Err(config_err("max_document_chars must be positive"));
        }
        if !unit(self.lexical.low_cut) {
            return Err(config_err("lexical.low_cut must lie in [0, 1]"));
        }
        if !(self.lexical.saturation.is_finite() && self.lexical.saturation > 0.0 && self.lexical.saturation <= 1.0) {
            return Err(config_err("lexical.saturation must lie in (0, 1]"));
        }
        if !unit(s.lexical_weight) || !unit(s.semantic_weight) {
            return Err(config_err("scoring weights must lie in [0, 1]"));
        }
        if (s.lexical_weight + s.semantic_weight - 1.0).abs() > 1e-6 {
            return Err(config_err("scoring weights must sum to 1"));
        }
        if !unit(s.acceptance_threshold) || !unit(s.medium_threshold) || !unit(s.high_threshold) {
            return Err(config_err("thresholds must lie in [0, 1]"));
        }
        if !(s.acceptance_threshold <= s.medium_threshold && s.medium_threshold <= s.high_threshold) {
            return Err(config_err(
                "thresholds must satisfy acceptance <= medium <= high",
            ));
        }
        if !unit(s.lexical_only_discount) {
            return Err(config_err("scoring.lexical_only_discount must lie in [0, 1]"));
        }
        if !unit(self.semantic.unconfirmed_score_cap) {
            return Err(config_err("semantic.unconfirmed_score_cap must lie in [0, 1]"));
        }
        if self.semantic.max_concurrency == 0 {
            return Err(config_err("semantic.max_concurrency must be positive"));
        }
        if self.semantic.call_timeout_ms == 0 || self.semantic.request_deadline_ms == 0 {
            return Err(config_err("timeouts must be positive"));
        }
        if self.ranking.max_findings == 0 {
            return Err(config_err("ranking.max_findings must be positive"));
        }
        let overlap = self.ranking.overlap_threshold;
        if !(overlap.is_finite() && overlap > 0.0 && overlap <= 1.0) {
            return Err(config_err("ranking.overlap_threshold must lie in (0, 1]"));
        }
        Ok(())
    }
}

fn config_err(message: &str) -> AnalysisError {
    AnalysisError::Config(message.to_string())
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
