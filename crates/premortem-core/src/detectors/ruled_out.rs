//! Ruled-out risk detection
//!
//! A lexically plausible pattern is ruled out only when:
//! - the document mentions one of its safety signals without negating it
//!   ("no circuit breakers" is not a mitigation), and
//! - the completion service confirms the mention actually mitigates it.
//!
//! Without the service nothing is ruled out: a pattern that cannot be
//! confirmed as mitigated stays a candidate.

use super::{DetectorContext, DetectorKind, DetectorOutcome};
use crate::document::Document;
use crate::error::{Diagnostic, DiagnosticKind};
use crate::evidence::{insert_evidence, Evidence, EvidenceSource};
use crate::prompts::{self, MitigationClaim};
use once_cell::sync::Lazy;
use premortem_catalog::{PatternEntry, PatternId};
use premortem_llm::parse_json;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Tokens inspected before a safety signal for a negation cue
const NEGATION_LOOKBEHIND_TOKENS: usize = 6;
/// Tokens inspected after a safety signal, up to the next clause break
const NEGATION_LOOKAHEAD_TOKENS: usize = 4;

static NEGATION_BEFORE: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| {
    Regex::new(r"(\b(no|not|without|lack of|lacks|lacking|missing|none|never|absent|neither|nor)\b|n't\b)")
});

static NEGATION_AFTER: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^(not|none|missing|absent|never|tbd|todo|n/a)$|n't$"));

/// A pattern the document explicitly mitigates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuledOutRisk {
    /// Pattern id
    pub pattern_id: PatternId,
    /// Pattern name
    pub name: String,
    /// Why the mitigation applies
    pub reason: String,
    /// Verbatim mitigating sentences
    pub evidence: Vec<Evidence>,
}

#[derive(Debug, Deserialize)]
struct RuledOutEntry {
    pattern_id: String,
    reason: String,
    #[serde(default)]
    evidence: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RuledOutReply {
    ruled_out: Vec<RuledOutEntry>,
}

fn words(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// True when the mention at raw `span` is negated within its sentence
#[must_use]
pub fn is_negated(document: &Document, span: &std::ops::Range<usize>) -> bool {
    let raw = document.raw();
    let sentence = document.sentence_around(span);

    let before = words(&raw[sentence.start..span.start]);
    let window = before[before.len().saturating_sub(NEGATION_LOOKBEHIND_TOKENS)..].join(" ");
    if NEGATION_BEFORE.as_ref().is_ok_and(|re| re.is_match(&window)) {
        return true;
    }

    let Ok(after_re) = NEGATION_AFTER.as_ref() else {
        return false;
    };
    for token in words(&raw[span.end..sentence.end])
        .into_iter()
        .take(NEGATION_LOOKAHEAD_TOKENS)
    {
        let bare = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'' && c != '/');
        if after_re.is_match(bare) {
            return true;
        }
        if token.ends_with([',', ';']) || matches!(bare, "and" | "but" | "while" | "except") {
            break;
        }
    }
    false
}

/// Sentences mentioning a safety signal of `entry` without negation
#[must_use]
pub fn mitigation_mentions(document: &Document, entry: &PatternEntry) -> Vec<Evidence> {
    let mut out = Vec::new();
    for signal in entry.safety_signals() {
        for range in signal.find_ranges(document.normalized()) {
            let Some(raw) = document.raw_range(&range) else {
                continue;
            };
            if is_negated(document, &raw) {
                continue;
            }
            let sentence = document.sentence_around(&raw);
            if let Some(item) = Evidence::from_range(document, sentence, EvidenceSource::Mitigation) {
                insert_evidence(&mut out, item);
            }
        }
    }
    out
}

/// Find plausible patterns the document mitigates
pub async fn detect_ruled_out(ctx: DetectorContext<'_>) -> DetectorOutcome<RuledOutRisk> {
    let document = ctx.document;

    let mut mentions: Vec<(&PatternEntry, Vec<Evidence>)> = Vec::new();
    for hit in ctx.plausible {
        let Some(entry) = ctx.registry.entry(hit.pattern_id.as_str()) else {
            continue;
        };
        let found = mitigation_mentions(document, entry);
        if !found.is_empty() {
            mentions.push((entry, found));
        }
    }
    if mentions.is_empty() {
        return DetectorOutcome::ok(Vec::new());
    }

    let claims: Vec<MitigationClaim<'_>> = mentions
        .iter()
        .map(|(entry, found)| MitigationClaim {
            pattern: entry.pattern(),
            sentences: found.iter().map(|e| e.text.clone()).collect(),
        })
        .collect();
    let prompt = prompts::ruled_out_prompt(&claims, document.raw(), ctx.config.detectors.max_prompt_document_chars);

    let reply = match ctx.complete(prompt).await {
        Ok(text) => parse_json::<RuledOutReply>(&text),
        Err(err) => Err(err),
    };
    let reply = match reply {
        Ok(reply) => reply,
        Err(err) => return DetectorOutcome::failed(DetectorKind::RuledOut, Vec::new(), &err),
    };

    let mut diagnostics = Vec::new();
    let mut risks: Vec<RuledOutRisk> = Vec::new();
    for item in reply.ruled_out {
        let Some((entry, found)) = mentions
            .iter()
            .find(|(entry, _)| entry.pattern().id.as_str() == item.pattern_id.trim())
        else {
            tracing::debug!(pattern = %item.pattern_id, "ignoring ruled-out claim without a stated mitigation");
            continue;
        };
        let reason = item.reason.trim();
        if reason.is_empty() || risks.iter().any(|r| r.pattern_id == entry.pattern().id) {
            continue;
        }

        let mut evidence = found.clone();
        for quote in item.evidence {
            match document
                .locate(&quote)
                .and_then(|range| Evidence::from_range(document, range, EvidenceSource::Mitigation))
            {
                Some(e) => insert_evidence(&mut evidence, e),
                None => diagnostics.push(Diagnostic::pattern(
                    DiagnosticKind::EvidenceRejected,
                    entry.pattern().id.as_str(),
                    format!("quote not found in document: {quote:?}"),
                )),
            }
        }

        risks.push(RuledOutRisk {
            pattern_id: entry.pattern().id.clone(),
            name: entry.pattern().name.clone(),
            reason: reason.to_string(),
            evidence,
        });
    }
    risks.sort_by(|a, b| a.pattern_id.cmp(&b.pattern_id));

    DetectorOutcome {
        items: risks,
        failed: false,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentContext;
    use premortem_catalog::PatternRegistry;
    use serde_json::json;

    fn registry() -> PatternRegistry {
        PatternRegistry::from_records(vec![json!({
            "id": "load_shedding_blindspot",
            "name": "Load Shedding Blind Spot",
            "category": "load",
            "signals": ["no circuit breaker", "queue"],
            "trigger_conditions": ["demand exceeds capacity"],
            "safety_signals": ["circuit breaker", "load shedding", "rate limiting"],
        })])
        .unwrap()
    }

    fn doc(text: &str) -> Document {
        Document::new(text, DocumentContext::default(), 10_000).unwrap()
    }

    fn negated(text: &str, needle: &str) -> bool {
        let d = doc(text);
        let at = d.raw().find(needle).unwrap();
        is_negated(&d, &(at..at + needle.len()))
    }

    #[test]
    fn negation_before_mention() {
        assert!(negated("There are No Circuit Breakers between services.", "Circuit Breakers"));
        assert!(negated("We ship without rate limiting.", "rate limiting"));
        assert!(negated("We don't use circuit breakers.", "circuit breakers"));
        assert!(!negated("Every client uses circuit breakers.", "circuit breakers"));
    }

    #[test]
    fn negation_after_mention() {
        assert!(negated("Circuit breakers are not planned.", "Circuit breakers"));
        assert!(negated("Circuit breakers: none.", "Circuit breakers"));
        assert!(!negated("Circuit breakers wrap calls, and no retries are made.", "Circuit breakers"));
    }

    #[test]
    fn negation_does_not_cross_sentences() {
        assert!(!negated("No retries. Circuit breakers wrap every call.", "Circuit breakers"));
        assert!(!negated("Nothing is missing\n- circuit breakers on all calls", "circuit breakers"));
    }

    #[test]
    fn mitigation_mentions_skip_negated() {
        let registry = registry();
        let entry = registry.entry("load_shedding_blindspot").unwrap();

        let d = doc("No Circuit Breakers are planned. Jobs go to a queue.");
        assert!(mitigation_mentions(&d, entry).is_empty());

        let d = doc("Jobs go to a queue. The gateway applies rate limiting per tenant.");
        let found = mitigation_mentions(&d, entry);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "The gateway applies rate limiting per tenant.");
    }
}
