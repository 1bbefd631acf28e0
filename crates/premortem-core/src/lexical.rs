//! Lexical candidate generation
//!
//! Every catalog pattern is scored against the normalized document:
//! - a signal counts once, however often it occurs
//! - each signal carries the catalog-wide rarity weight assigned at load
//! - the score saturates at `saturation` of the pattern's total weight
//!
//! The pass is synchronous and deterministic. Patterns with any hit are kept
//! as plausible (the ruled-out and unknown detectors use them); patterns at or
//! above the low-cut become candidates for augmentation.

use crate::candidate::Candidate;
use crate::config::LexicalConfig;
use crate::document::Document;
use crate::evidence::{insert_evidence, Evidence, EvidenceSource};
use premortem_catalog::{PatternEntry, PatternId, PatternRegistry};

/// A pattern with at least one signal hit
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    /// Pattern id
    pub pattern_id: PatternId,
    /// Score in `(0, 1]`
    pub score: f64,
    /// Matched signal phrases, catalog order
    pub matched_signals: Vec<String>,
    /// Sentences around the first hit of each signal
    pub evidence: Vec<Evidence>,
}

/// Result of scanning one document
#[derive(Debug, Clone, Default)]
pub struct LexicalScan {
    hits: Vec<LexicalHit>,
    low_cut: f64,
}

impl LexicalScan {
    /// Every pattern with a nonzero score, id order
    #[inline]
    #[must_use]
    pub fn plausible(&self) -> &[LexicalHit] {
        &self.hits
    }

    /// Hit for `id`, if any
    #[must_use]
    pub fn hit(&self, id: &str) -> Option<&LexicalHit> {
        self.hits.iter().find(|h| h.pattern_id.as_str() == id)
    }

    /// Hits at or above the low-cut, as fresh candidates
    #[must_use]
    pub fn candidates(&self) -> Vec<Candidate> {
        self.hits
            .iter()
            .filter(|h| h.score >= self.low_cut)
            .map(|h| Candidate::new(h.pattern_id.clone(), h.score, h.matched_signals.clone(), h.evidence.clone()))
            .collect()
    }
}

/// Signal-phrase matcher over a registry
#[derive(Debug, Clone, Copy)]
pub struct LexicalMatcher<'a> {
    registry: &'a PatternRegistry,
    config: &'a LexicalConfig,
}

impl<'a> LexicalMatcher<'a> {
    /// Create matcher
    #[inline]
    #[must_use]
    pub fn new(registry: &'a PatternRegistry, config: &'a LexicalConfig) -> Self {
        Self { registry, config }
    }

    /// Score every pattern
    #[must_use]
    pub fn scan(&self, document: &Document) -> LexicalScan {
        let hits: Vec<LexicalHit> = self
            .registry
            .entries()
            .filter_map(|entry| self.score_entry(entry, document))
            .collect();

        tracing::debug!(
            plausible = hits.len(),
            candidates = hits.iter().filter(|h| h.score >= self.config.low_cut).count(),
            "lexical scan complete"
        );

        LexicalScan {
            hits,
            low_cut: self.config.low_cut,
        }
    }

    /// Score one pattern; `None` when no signal matches
    #[must_use]
    pub fn score_entry(&self, entry: &PatternEntry, document: &Document) -> Option<LexicalHit> {
        let total = entry.total_signal_weight();
        if total <= 0.0 {
            return None;
        }

        let text = document.normalized();
        let mut matched_weight = 0.0;
        let mut matched_signals = Vec::new();
        let mut evidence = Vec::new();

        for signal in entry.signals() {
            let ranges = signal.find_ranges(text);
            let Some(first) = ranges.first() else {
                continue;
            };
            matched_weight += signal.weight();
            matched_signals.push(signal.phrase().to_string());

            if evidence.len() < self.config.max_seed_evidence {
                if let Some(raw) = document.raw_range(first) {
                    let sentence = document.sentence_around(&raw);
                    if let Some(item) = Evidence::from_range(document, sentence, EvidenceSource::Signal) {
                        insert_evidence(&mut evidence, item);
                    }
                }
            }
        }

        if matched_signals.is_empty() {
            return None;
        }

        let score = (matched_weight / (self.config.saturation * total)).min(1.0);
        Some(LexicalHit {
            pattern_id: entry.pattern().id.clone(),
            score,
            matched_signals,
            evidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentContext;
    use serde_json::json;

    fn registry() -> PatternRegistry {
        PatternRegistry::from_records(vec![
            json!({
                "id": "hidden_sync_dependency",
                "name": "Hidden Synchronous Dependency",
                "category": "dependency",
                "signals": ["synchronously call", "blocking call", "user service", "rpc"],
                "trigger_conditions": ["callee slows down"],
            }),
            json!({
                "id": "retry_storm",
                "name": "Retry Storm",
                "category": "load",
                "signals": ["retry", "backoff"],
                "trigger_conditions": ["downstream degrades"],
            }),
            json!({
                "id": "thundering_herd",
                "name": "Thundering Herd",
                "category": "load",
                "signals": ["cache expiry", "cold start"],
                "trigger_conditions": ["many clients wake together"],
            }),
        ])
        .unwrap()
    }

    fn doc(text: &str) -> Document {
        Document::new(text, DocumentContext::default(), 10_000).unwrap()
    }

    #[test]
    fn scores_are_bounded_and_ordered_by_id() {
        let registry = registry();
        let config = LexicalConfig::default();
        let scan = LexicalMatcher::new(&registry, &config).scan(&doc(
            "Workers will synchronously call the User Service. Clients retry 3 times.",
        ));

        let ids: Vec<&str> = scan.plausible().iter().map(|h| h.pattern_id.as_str()).collect();
        assert_eq!(ids, vec!["hidden_sync_dependency", "retry_storm"]);
        for hit in scan.plausible() {
            assert!(hit.score > 0.0 && hit.score <= 1.0);
        }
        assert!(scan.hit("thundering_herd").is_none());
    }

    #[test]
    fn saturation_caps_score() {
        let registry = registry();
        let config = LexicalConfig::default();
        let scan = LexicalMatcher::new(&registry, &config).scan(&doc("We retry with exponential backoff."));
        let hit = scan.hit("retry_storm").unwrap();
        assert_eq!(hit.score, 1.0);
        assert_eq!(hit.matched_signals, vec!["retry".to_string(), "backoff".to_string()]);
    }

    #[test]
    fn seed_evidence_is_the_enclosing_sentence() {
        let registry = registry();
        let config = LexicalConfig::default();
        let d = doc("Intro line.\nWorkers will synchronously call the User Service. Then more.");
        let scan = LexicalMatcher::new(&registry, &config).scan(&d);
        let hit = scan.hit("hidden_sync_dependency").unwrap();
        assert_eq!(hit.evidence.len(), 1);
        assert_eq!(hit.evidence[0].text, "Workers will synchronously call the User Service.");
        assert_eq!(&d.raw()[hit.evidence[0].range()], hit.evidence[0].text);
    }

    #[test]
    fn low_cut_filters_candidates_but_not_plausible() {
        let registry = registry();
        let config = LexicalConfig {
            low_cut: 0.99,
            ..LexicalConfig::default()
        };
        let scan = LexicalMatcher::new(&registry, &config).scan(&doc("An rpc here."));
        assert_eq!(scan.plausible().len(), 1);
        assert!(scan.candidates().is_empty());
    }

    #[test]
    fn repeated_scans_are_identical() {
        let registry = registry();
        let config = LexicalConfig::default();
        let d = doc("retry, retry, synchronously call, cold start");
        let a = LexicalMatcher::new(&registry, &config).scan(&d);
        let b = LexicalMatcher::new(&registry, &config).scan(&d);
        assert_eq!(a.plausible(), b.plausible());
    }
}
