//! Semantic augmentation
//!
//! Each lexical candidate gets one completion request asking the model to
//! judge the pattern's trigger conditions against a windowed excerpt, quote
//! supporting sentences and give a calibrated score.
//!
//! # Concurrency
//! - Every attempt holds a permit from the analyzer-wide semaphore, released
//!   on every exit path (success, error, timeout, cancellation)
//! - Requests run as tasks in a [`JoinSet`]; dropping the set (caller abort)
//!   aborts them all
//! - The request deadline bounds the whole fan-out; on expiry in-flight tasks
//!   are aborted and awaited, and unresolved candidates are marked as such
//! - Results are keyed by candidate index, so completion order never leaks
//!   into the outcome

use crate::candidate::{Candidate, SemanticState, TriggerAssessment, TriggerStatus, Unresolved};
use crate::config::SemanticConfig;
use crate::document::Document;
use crate::error::{Diagnostic, DiagnosticKind, Location};
use crate::evidence::{Evidence, EvidenceSource};
use crate::prompts;
use premortem_catalog::{FailurePattern, PatternRegistry};
use premortem_llm::{complete_bounded, parse_json, unit_score, with_retry, CompletionError, CompletionService, RetryPolicy};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::Instrument;

/// One completion call with admission control, per-attempt timeout and retry
///
/// Takes owned handles so the returned future is `'static` and can be spawned.
///
/// # Errors
/// The last [`CompletionError`] once retries are exhausted, or immediately
/// for parse failures.
pub async fn admitted_call(
    service: Arc<dyn CompletionService>,
    admission: Arc<Semaphore>,
    prompt: Arc<str>,
    timeout: Duration,
    retry: RetryPolicy,
) -> Result<String, CompletionError> {
    with_retry(&retry, |attempt| {
        let service = Arc::clone(&service);
        let admission = Arc::clone(&admission);
        let prompt = Arc::clone(&prompt);
        async move {
            let _permit = admission
                .acquire_owned()
                .await
                .map_err(|_| CompletionError::Unavailable("admission closed".to_string()))?;
            let started = Instant::now();
            let result = complete_bounded(service.as_ref(), &prompt, timeout).await;
            tracing::debug!(
                attempt,
                elapsed_ms = started.elapsed().as_millis() as u64,
                ok = result.is_ok(),
                "completion call finished"
            );
            result
        }
    })
    .await
}

#[derive(Debug, Deserialize)]
struct TriggerVerdict {
    index: usize,
    status: TriggerStatus,
}

#[derive(Debug, Deserialize)]
struct CandidateVerdict {
    trigger_conditions: Vec<TriggerVerdict>,
    evidence: Vec<String>,
    score: f64,
}

/// A validated model verdict for one candidate
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// Score after the no-confirmed-condition cap
    pub score: f64,
    /// One assessment per catalog trigger condition
    pub triggers: Vec<TriggerAssessment>,
    /// Quotes located in the document
    pub evidence: Vec<Evidence>,
    /// Quotes that could not be located
    pub rejected_quotes: Vec<String>,
}

/// Decode and validate a candidate completion
///
/// # Errors
/// [`CompletionError::Parse`] when the shape is wrong, the score is outside
/// `[0, 1]`, or a trigger index does not exist.
pub fn parse_verdict(
    text: &str,
    pattern: &FailurePattern,
    document: &Document,
    unconfirmed_cap: f64,
) -> Result<Verdict, CompletionError> {
    let raw: CandidateVerdict = parse_json(text)?;
    let mut score = unit_score(raw.score)?;

    let mut triggers: Vec<TriggerAssessment> = pattern
        .trigger_conditions
        .iter()
        .map(|condition| TriggerAssessment {
            condition: condition.clone(),
            status: TriggerStatus::Unknown,
        })
        .collect();
    for verdict in raw.trigger_conditions {
        let slot = verdict
            .index
            .checked_sub(1)
            .and_then(|i| triggers.get_mut(i))
            .ok_or_else(|| {
                CompletionError::Parse(format!(
                    "trigger index {} out of range 1..={}",
                    verdict.index,
                    pattern.trigger_conditions.len()
                ))
            })?;
        slot.status = verdict.status;
    }

    if !triggers.iter().any(|t| t.status == TriggerStatus::Confirmed) {
        score = score.min(unconfirmed_cap);
    }

    let mut evidence = Vec::new();
    let mut rejected_quotes = Vec::new();
    for quote in raw.evidence {
        match document
            .locate(&quote)
            .and_then(|range| Evidence::from_range(document, range, EvidenceSource::Quoted))
        {
            Some(item) => evidence.push(item),
            None => rejected_quotes.push(quote),
        }
    }

    Ok(Verdict {
        score,
        triggers,
        evidence,
        rejected_quotes,
    })
}

/// Result of augmenting a candidate set
#[derive(Debug, Default)]
pub struct AugmentOutcome {
    /// Surviving candidates, input order
    pub candidates: Vec<Candidate>,
    /// Non-fatal events
    pub diagnostics: Vec<Diagnostic>,
    /// True if the request deadline fired
    pub deadline_exceeded: bool,
}

impl AugmentOutcome {
    /// Candidates left without a semantic score
    #[must_use]
    pub fn unresolved(&self) -> usize {
        self.candidates
            .iter()
            .filter(|c| matches!(c.semantic, SemanticState::Unresolved(_)))
            .count()
    }
}

/// Fans candidate prompts out to the completion service
#[derive(Clone)]
pub struct Augmenter {
    service: Arc<dyn CompletionService>,
    admission: Arc<Semaphore>,
}

impl std::fmt::Debug for Augmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Augmenter")
            .field("model", &self.service.model_id())
            .field("available_permits", &self.admission.available_permits())
            .finish()
    }
}

impl Augmenter {
    /// Create augmenter sharing `admission` with the rest of the analyzer
    #[must_use]
    pub fn new(service: Arc<dyn CompletionService>, admission: Arc<Semaphore>) -> Self {
        Self { service, admission }
    }

    /// Augment `candidates` before `deadline`
    pub async fn augment(
        &self,
        document: &Document,
        registry: &PatternRegistry,
        mut candidates: Vec<Candidate>,
        config: &SemanticConfig,
        deadline: Instant,
    ) -> AugmentOutcome {
        let mut diagnostics = Vec::new();
        let mut tasks = JoinSet::new();

        for (index, candidate) in candidates.iter().enumerate() {
            let Some(pattern) = registry.get(candidate.pattern_id.as_str()) else {
                continue;
            };
            let spans: Vec<_> = candidate.evidence.iter().map(Evidence::range).collect();
            let excerpt = document.excerpt(&spans, config.excerpt_window_chars, config.max_excerpt_chars);
            let prompt: Arc<str> =
                prompts::candidate_prompt(pattern, &excerpt, document.context(), config.max_excerpt_chars).into();

            let call = admitted_call(
                Arc::clone(&self.service),
                Arc::clone(&self.admission),
                prompt,
                config.call_timeout(),
                config.retry,
            );
            let span = tracing::debug_span!("augment", pattern = %candidate.pattern_id);
            tasks.spawn(async move { (index, call.await) }.instrument(span));
        }

        let mut dropped = vec![false; candidates.len()];
        let mut deadline_exceeded = false;

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((index, result)))) => {
                    let Some(candidate) = candidates.get_mut(index) else {
                        continue;
                    };
                    let Some(pattern) = registry.get(candidate.pattern_id.as_str()) else {
                        continue;
                    };
                    if let Err(diagnostic) = apply(candidate, pattern, document, result, config, &mut diagnostics) {
                        dropped[index] = true;
                        diagnostics.push(diagnostic);
                    }
                }
                Ok(Some(Err(err))) => {
                    tracing::warn!("augmentation task failed: {err}");
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::TaskFailed,
                        Location::Request,
                        err.to_string(),
                    ));
                }
                Ok(None) => break,
                Err(_) => {
                    let in_flight = tasks.len();
                    tracing::warn!(in_flight, "request deadline exceeded, cancelling completion calls");
                    tasks.shutdown().await;
                    deadline_exceeded = true;
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::DeadlineExceeded,
                        Location::Request,
                        format!("{in_flight} augmentation call(s) cancelled"),
                    ));
                    break;
                }
            }
        }

        let reason = if deadline_exceeded {
            Unresolved::DeadlineExceeded
        } else {
            Unresolved::ServiceFailure
        };
        for candidate in &mut candidates {
            if candidate.semantic == SemanticState::Pending {
                candidate.semantic = SemanticState::Unresolved(reason);
            }
        }

        let mut flags = dropped.into_iter();
        candidates.retain(|_| !flags.next().unwrap_or(false));

        AugmentOutcome {
            candidates,
            diagnostics,
            deadline_exceeded,
        }
    }
}

/// Fold one completion result into its candidate
///
/// Returns `Err` with the diagnostic when the candidate must be dropped.
fn apply(
    candidate: &mut Candidate,
    pattern: &FailurePattern,
    document: &Document,
    result: Result<String, CompletionError>,
    config: &SemanticConfig,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(), Diagnostic> {
    let id = candidate.pattern_id.as_str().to_string();
    let location = Location::Pattern(id.clone());

    let verdict = result.and_then(|text| parse_verdict(&text, pattern, document, config.unconfirmed_score_cap));
    match verdict {
        Ok(verdict) => {
            for quote in verdict.rejected_quotes {
                tracing::debug!(pattern = %id, "quote not found in document");
                diagnostics.push(Diagnostic::pattern(
                    DiagnosticKind::EvidenceRejected,
                    id.clone(),
                    format!("quote not found in document: {quote:?}"),
                ));
            }
            for item in verdict.evidence {
                candidate.add_evidence(item);
            }
            candidate.semantic = SemanticState::Resolved {
                score: verdict.score,
                triggers: verdict.triggers,
            };
            Ok(())
        }
        Err(err @ CompletionError::Parse(_)) => {
            tracing::warn!(pattern = %id, "dropping candidate: {err}");
            Err(Diagnostic::from_completion(location, &err))
        }
        Err(err) => {
            tracing::warn!(pattern = %id, "no semantic score: {err}");
            candidate.semantic = SemanticState::Unresolved(Unresolved::ServiceFailure);
            diagnostics.push(Diagnostic::from_completion(location, &err));
            Ok(())
        }
    }
}
