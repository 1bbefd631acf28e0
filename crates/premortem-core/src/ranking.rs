//! Ranking and deduplication
//!
//! Candidates are sorted by merged score (descending), ties broken by pattern
//! id. Walking that order, a candidate whose evidence overlaps an already
//! kept one beyond the configured fraction is suppressed. The survivors are
//! truncated to the findings cap. The result depends only on the input set.

use crate::config::RankingConfig;
use crate::error::{Diagnostic, DiagnosticKind};
use crate::evidence::overlap_fraction;
use crate::scoring::ScoredCandidate;
use std::cmp::Ordering;

/// Canonical order: score descending, then id ascending
#[must_use]
pub fn compare(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.merged_score
        .total_cmp(&a.merged_score)
        .then_with(|| a.candidate.pattern_id.cmp(&b.candidate.pattern_id))
}

/// Sort, deduplicate and truncate
#[must_use]
pub fn rank(mut scored: Vec<ScoredCandidate>, config: &RankingConfig) -> (Vec<ScoredCandidate>, Vec<Diagnostic>) {
    scored.sort_by(compare);

    let mut kept: Vec<ScoredCandidate> = Vec::with_capacity(scored.len().min(config.max_findings));
    let mut diagnostics = Vec::new();

    for item in scored {
        let id = item.candidate.pattern_id.clone();
        if kept.iter().any(|k| k.candidate.pattern_id == id) {
            continue;
        }
        let shadow = kept.iter().find(|k| {
            overlap_fraction(&k.candidate.evidence, &item.candidate.evidence) > config.overlap_threshold
        });
        if let Some(winner) = shadow {
            tracing::debug!(pattern = %id, kept = %winner.candidate.pattern_id, "suppressing overlapping candidate");
            diagnostics.push(Diagnostic::pattern(
                DiagnosticKind::DuplicateSuppressed,
                id.as_str(),
                format!("evidence overlaps higher-scoring {}", winner.candidate.pattern_id),
            ));
            continue;
        }
        kept.push(item);
    }

    if kept.len() > config.max_findings {
        for cut in kept.drain(config.max_findings..) {
            diagnostics.push(Diagnostic::pattern(
                DiagnosticKind::Truncated,
                cut.candidate.pattern_id.as_str(),
                format!("beyond the {} finding cap", config.max_findings),
            ));
        }
    }

    (kept, diagnostics)
}
