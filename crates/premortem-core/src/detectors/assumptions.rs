//! Implicit assumption extraction
//!
//! Short documents without modal or stability language skip the service call
//! and report no assumptions.

use super::{clean_statements, DetectorContext, DetectorKind, DetectorOutcome};
use crate::prompts;
use once_cell::sync::Lazy;
use premortem_llm::parse_json;
use regex::Regex;
use serde::Deserialize;

/// Statements this short (in chars) are discarded
const MIN_STATEMENT_CHARS: usize = 10;

static MODAL: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| {
    Regex::new(
        r"\b(will|should|must|always|never|assumes?|assumed|expects?|expected|guarantee[sd]?|reliabl[ey]|stable|consistent|instantly|immediately)\b",
    )
});

#[derive(Debug, Deserialize)]
struct AssumptionsReply {
    assumptions: Vec<String>,
}

/// True when `normalized` contains modal or stability language
#[must_use]
pub fn has_modal_language(normalized: &str) -> bool {
    MODAL.as_ref().is_ok_and(|re| re.is_match(normalized))
}

/// Extract implicit assumptions
pub async fn detect_assumptions(ctx: DetectorContext<'_>) -> DetectorOutcome<String> {
    let document = ctx.document;
    let cfg = &ctx.config.detectors;
    if !has_modal_language(document.normalized()) && document.char_len() <= cfg.assumption_min_chars {
        tracing::debug!("skipping assumption pass: short document without modal language");
        return DetectorOutcome::ok(Vec::new());
    }

    let prompt = prompts::assumptions_prompt(document.raw(), document.context(), cfg.max_prompt_document_chars);
    let reply = match ctx.complete(prompt).await {
        Ok(text) => parse_json::<AssumptionsReply>(&text),
        Err(err) => Err(err),
    };
    match reply {
        Ok(reply) => DetectorOutcome::ok(clean_statements(reply.assumptions, MIN_STATEMENT_CHARS, cfg.max_assumptions)),
        Err(err) => DetectorOutcome::failed(DetectorKind::Assumptions, Vec::new(), &err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modal_language_detection() {
        assert!(has_modal_language("the queue will always drain"));
        assert!(has_modal_language("we assume the cache is warm"));
        assert!(!has_modal_language("a queue and a cache"));
    }
}
