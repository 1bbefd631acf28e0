//! Known-unknown detection
//!
//! Deterministic gap checks run first and always succeed. The completion
//! service then adds document-specific gaps; if it fails the heuristic list
//! still stands and the pass is marked failed.

use super::{clean_statements, DetectorContext, DetectorKind, DetectorOutcome};
use crate::document::Document;
use crate::lexical::LexicalHit;
use crate::prompts;
use once_cell::sync::Lazy;
use premortem_catalog::{normalize_text, PatternRegistry};
use premortem_llm::parse_json;
use regex::Regex;
use serde::Deserialize;

const MIN_STATEMENT_CHARS: usize = 10;

/// `(terms that close the gap, statement when none appear)`
const GAP_CHECKS: &[(&str, &str)] = &[
    (
        r"\b(qps|rps|requests? per second|throughput|concurrent users|expected scale)\b",
        "Expected load is not stated (requests per second, concurrent users or peak throughput)",
    ),
    (
        r"\b(latency|p50|p95|p99|response times?|milliseconds?|\d+ ?ms)\b",
        "Latency targets are not stated",
    ),
    (
        r"\b(availability|uptime|slas?|nines)\b",
        "Availability target is not stated",
    ),
    (
        r"\b(regions?|multi-region|availability zones?|failover)\b",
        "Regional deployment and failover strategy are not described",
    ),
    (
        r"\b(monitoring|observability|metrics|alerting|alerts?|dashboards?)\b",
        "Monitoring and alerting are not described",
    ),
    (
        r"\b(load tests?|load testing|stress tests?|stress testing|capacity tests?|chaos|benchmarks?)\b",
        "No load, stress or failure testing is mentioned",
    ),
    (
        r"\b(depends on|dependency|dependencies|upstream|downstream|third[- ]party)\b",
        "Dependencies are not listed",
    ),
    (
        r"\b(traffic|spikes?|bursts?|bursty|peak|seasonal)\b",
        "Traffic patterns (peaks, bursts, seasonality) are not described",
    ),
    (
        r"\b(errors?|failures?|exceptions?|fallbacks?|degraded|degradation)\b",
        "Error handling and degraded-mode behavior are not described",
    ),
];

static CHECKS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    GAP_CHECKS
        .iter()
        .filter_map(|(terms, message)| match Regex::new(terms) {
            Ok(re) => Some((re, *message)),
            Err(err) => {
                tracing::error!("invalid gap check {terms:?}: {err}");
                None
            }
        })
        .collect()
});

#[derive(Debug, Deserialize)]
struct UnknownsReply {
    unknowns: Vec<String>,
}

/// Normalized document plus rendered context
fn haystack(document: &Document) -> String {
    let context = document.context().render();
    if context.is_empty() {
        document.normalized().to_string()
    } else {
        format!("{} {}", document.normalized(), normalize_text(&context))
    }
}

/// Gaps found without the completion service
///
/// Generic gap checks come first, then required context missing for each
/// plausible pattern, in id order.
#[must_use]
pub fn heuristic_unknowns(document: &Document, registry: &PatternRegistry, plausible: &[LexicalHit]) -> Vec<String> {
    let text = haystack(document);
    let mut out: Vec<String> = CHECKS
        .iter()
        .filter(|(re, _)| !re.is_match(&text))
        .map(|(_, message)| (*message).to_string())
        .collect();

    for hit in plausible {
        let Some(pattern) = registry.get(hit.pattern_id.as_str()) else {
            continue;
        };
        for needed in &pattern.required_context {
            let needle = normalize_text(needed);
            if needle.is_empty() || text.contains(&needle) {
                continue;
            }
            out.push(format!("{needed} is not stated (needed to assess {})", pattern.name));
        }
    }
    out
}

/// Detect missing information
pub async fn detect_unknowns(ctx: DetectorContext<'_>) -> DetectorOutcome<String> {
    let document = ctx.document;
    let cfg = &ctx.config.detectors;
    let heuristics = heuristic_unknowns(document, ctx.registry, ctx.plausible);

    let prompt = prompts::unknowns_prompt(document.raw(), document.context(), cfg.max_prompt_document_chars);
    let reply = match ctx.complete(prompt).await {
        Ok(text) => parse_json::<UnknownsReply>(&text),
        Err(err) => Err(err),
    };
    match reply {
        Ok(reply) => {
            let merged = heuristics.into_iter().chain(reply.unknowns);
            DetectorOutcome::ok(clean_statements(merged, MIN_STATEMENT_CHARS, cfg.max_unknowns))
        }
        Err(err) => DetectorOutcome::failed(
            DetectorKind::Unknowns,
            clean_statements(heuristics, MIN_STATEMENT_CHARS, cfg.max_unknowns),
            &err,
        ),
    }
}
