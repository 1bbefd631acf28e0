//! Assumption, unknown and ruled-out detectors
//!
//! Each detector is an independent pass over the whole document. A failed
//! pass yields whatever it could determine without the completion service,
//! marks itself failed and never aborts the analysis.

pub mod assumptions;
pub mod ruled_out;
pub mod unknowns;

use crate::config::AnalysisConfig;
use crate::document::Document;
use crate::error::{Diagnostic, Location};
use crate::lexical::LexicalHit;
use crate::semantic::admitted_call;
use premortem_catalog::PatternRegistry;
use premortem_llm::{CompletionError, CompletionService};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub use assumptions::detect_assumptions;
pub use ruled_out::{detect_ruled_out, mitigation_mentions, RuledOutRisk};
pub use unknowns::{detect_unknowns, heuristic_unknowns};

/// Detector identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectorKind {
    /// Implicit assumptions
    Assumptions,
    /// Missing information
    Unknowns,
    /// Mitigated patterns
    RuledOut,
}

impl DetectorKind {
    /// Stable name used in diagnostics and logs
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Assumptions => "assumptions",
            Self::Unknowns => "unknowns",
            Self::RuledOut => "ruled_out",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a detector pass produced
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorOutcome<T> {
    /// Extracted items
    pub items: Vec<T>,
    /// True if the pass could not complete
    pub failed: bool,
    /// Non-fatal events
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> DetectorOutcome<T> {
    /// Successful pass
    #[inline]
    #[must_use]
    pub fn ok(items: Vec<T>) -> Self {
        Self {
            items,
            failed: false,
            diagnostics: Vec::new(),
        }
    }

    /// Failed pass keeping `items`
    #[must_use]
    pub fn failed(kind: DetectorKind, items: Vec<T>, error: &CompletionError) -> Self {
        tracing::warn!(detector = %kind, "detector pass failed: {error}");
        Self {
            items,
            failed: true,
            diagnostics: vec![Diagnostic::from_completion(
                Location::Detector(kind.name().to_string()),
                error,
            )],
        }
    }
}

/// Everything a detector pass may read
#[derive(Clone, Copy)]
pub struct DetectorContext<'a> {
    /// Document under review
    pub document: &'a Document,
    /// Pattern catalog
    pub registry: &'a PatternRegistry,
    /// Patterns with nonzero lexical score
    pub plausible: &'a [LexicalHit],
    /// Completion backend
    pub service: &'a Arc<dyn CompletionService>,
    /// Analyzer-wide admission semaphore
    pub admission: &'a Arc<Semaphore>,
    /// Request configuration
    pub config: &'a AnalysisConfig,
}

impl DetectorContext<'_> {
    /// Call the service under the shared admission and retry rules
    pub(crate) async fn complete(&self, prompt: String) -> Result<String, CompletionError> {
        admitted_call(
            Arc::clone(self.service),
            Arc::clone(self.admission),
            prompt.into(),
            self.config.semantic.call_timeout(),
            self.config.semantic.retry,
        )
        .await
    }
}

/// Strip list markers, drop short lines and case-insensitive duplicates, cap
pub(crate) fn clean_statements(items: impl IntoIterator<Item = String>, min_chars: usize, cap: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        let text = strip_list_marker(item.trim()).trim();
        if text.chars().count() <= min_chars {
            continue;
        }
        if out.iter().any(|o| o.eq_ignore_ascii_case(text)) {
            continue;
        }
        out.push(text.to_string());
        if out.len() >= cap {
            break;
        }
    }
    out
}

fn strip_list_marker(text: &str) -> &str {
    let text = text.trim_start_matches(|c: char| matches!(c, '-' | '*' | '\u{2022}') || c.is_whitespace());
    let digits = text.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &text[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest;
        }
    }
    text
}
