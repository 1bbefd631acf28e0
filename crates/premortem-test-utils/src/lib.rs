//! Testing utilities for the premortem workspace
//!
//! Shared fakes, fixtures, and assertions:
//! - [`ScriptedService`]: an in-process completion service that answers by
//!   matching prompt fragments and records how it was called
//! - the sample pattern catalog and design documents under `fixtures/`
//! - [`assert_report_invariants`] for properties every report must hold

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use premortem_catalog::PatternRegistry;
use premortem_core::{AnalysisConfig, Analyzer, Report};
use premortem_llm::{CompletionError, CompletionService, RetryPolicy};
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const SAMPLE_CATALOG: &str = include_str!("../fixtures/failure_patterns.json");

/// Workers call a user service synchronously, retry, and have no breakers
pub const ORDER_PIPELINE: &str = include_str!("../fixtures/order_pipeline.md");

/// Unbounded queue behind a gateway that rate limits per tenant
pub const MITIGATED_GATEWAY: &str = include_str!("../fixtures/mitigated_gateway.md");

/// Retries stacked at every layer
pub const RETRY_HEAVY: &str = include_str!("../fixtures/retry_heavy.md");

pub const SCRIPTED_MODEL: &str = "scripted-model";

const CANDIDATE_MARKER: &str = "one specific failure pattern";
const ASSUMPTIONS_MARKER: &str = "List the implicit assumptions";
const UNKNOWNS_MARKER: &str = "List information missing";
const RULED_OUT_MARKER: &str = "CANDIDATE MITIGATIONS";

pub fn sample_registry() -> Arc<PatternRegistry> {
    Arc::new(PatternRegistry::from_json_str(SAMPLE_CATALOG).unwrap())
}

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(CompletionError),
}

#[derive(Debug, Clone)]
struct Rule {
    needles: Vec<String>,
    reply: Reply,
}

/// Completion service answering from a fixed script
///
/// The first rule whose needles all occur in the prompt wins; otherwise the
/// fallback applies (service unavailable unless overridden).
#[derive(Debug)]
pub struct ScriptedService {
    model: String,
    rules: Vec<Rule>,
    fallback: Reply,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl Default for ScriptedService {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedService {
    pub fn new() -> Self {
        Self {
            model: SCRIPTED_MODEL.to_string(),
            rules: Vec::new(),
            fallback: Reply::Fail(CompletionError::Unavailable("no scripted reply".into())),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Reply `text` to prompts containing every needle
    pub fn on(mut self, needles: &[&str], text: impl Into<String>) -> Self {
        self.rules.push(Rule {
            needles: needles.iter().map(|n| (*n).to_string()).collect(),
            reply: Reply::Text(text.into()),
        });
        self
    }

    /// Fail prompts containing every needle
    pub fn fail_on(mut self, needles: &[&str], error: CompletionError) -> Self {
        self.rules.push(Rule {
            needles: needles.iter().map(|n| (*n).to_string()).collect(),
            reply: Reply::Fail(error),
        });
        self
    }

    pub fn on_candidate(self, pattern_id: &str, text: impl Into<String>) -> Self {
        let header = format!("PATTERN: {pattern_id}\n");
        self.on(&[CANDIDATE_MARKER, &header], text)
    }

    pub fn on_assumptions(self, text: impl Into<String>) -> Self {
        self.on(&[ASSUMPTIONS_MARKER], text)
    }

    pub fn on_unknowns(self, text: impl Into<String>) -> Self {
        self.on(&[UNKNOWNS_MARKER], text)
    }

    pub fn on_ruled_out(self, text: impl Into<String>) -> Self {
        self.on(&[RULED_OUT_MARKER], text)
    }

    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Reply::Text(text.into());
        self
    }

    pub fn with_fallback_error(mut self, error: CompletionError) -> Self {
        self.fallback = Reply::Fail(error);
        self
    }

    /// Sleep this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Number of recorded prompts containing `needle`
    pub fn prompts_containing(&self, needle: &str) -> usize {
        self.prompts.lock().iter().filter(|p| p.contains(needle)).count()
    }

    pub fn candidate_calls(&self, pattern_id: &str) -> usize {
        let header = format!("PATTERN: {pattern_id}\n");
        self.prompts
            .lock()
            .iter()
            .filter(|p| p.contains(CANDIDATE_MARKER) && p.contains(&header))
            .count()
    }

    fn reply_for(&self, prompt: &str) -> Reply {
        self.rules
            .iter()
            .find(|rule| rule.needles.iter().all(|n| prompt.contains(n.as_str())))
            .map_or_else(|| self.fallback.clone(), |rule| rule.reply.clone())
    }
}

/// Decrements the in-flight counter even when the call is cancelled
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    async fn complete(&self, prompt: &str, _timeout: Duration) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(Arc::clone(&self.in_flight));
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }

        match self.reply_for(prompt) {
            Reply::Text(text) => Ok(text),
            Reply::Fail(err) => Err(err),
        }
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Candidate verdict JSON: `confirmed` holds 1-based trigger indexes
pub fn candidate_reply(score: f64, confirmed: &[usize], evidence: &[&str]) -> String {
    let triggers: Vec<_> = confirmed
        .iter()
        .map(|i| json!({"index": i, "status": "confirmed"}))
        .collect();
    json!({
        "trigger_conditions": triggers,
        "evidence": evidence,
        "score": score,
    })
    .to_string()
}

pub fn list_reply(key: &str, items: &[&str]) -> String {
    let mut reply = serde_json::Map::new();
    reply.insert(key.to_string(), json!(items));
    serde_json::Value::Object(reply).to_string()
}

/// Script for [`ORDER_PIPELINE`]
pub fn order_pipeline_service() -> ScriptedService {
    ScriptedService::new()
        .on_candidate(
            "hidden_sync_dependency",
            candidate_reply(0.92, &[1, 2], &["Workers will synchronously call the User Service"]),
        )
        .on_candidate(
            "load_shedding_blindspot",
            candidate_reply(0.55, &[1], &["No Circuit Breakers are planned for the first release."]),
        )
        .on_candidate(
            "retry_storm",
            candidate_reply(
                0.3,
                &[1],
                &["If the User Service returns an error, workers retry 3 times with 1-second delays before giving up."],
            ),
        )
        .on_assumptions(list_reply(
            "assumptions",
            &[
                "The User Service stays fast enough for synchronous validation at peak order volume",
                "Three retries with fixed delays are enough to ride out User Service failures",
            ],
        ))
        .on_unknowns(list_reply(
            "unknowns",
            &["Expected peak order volume is not stated"],
        ))
}

/// Script for [`MITIGATED_GATEWAY`]: the queue pattern is confirmed but mitigated
pub fn mitigated_gateway_service() -> ScriptedService {
    ScriptedService::new()
        .on_candidate(
            "load_shedding_blindspot",
            candidate_reply(0.8, &[1], &["appends them to an unbounded queue"]),
        )
        .on_ruled_out(
            json!({
                "ruled_out": [{
                    "pattern_id": "load_shedding_blindspot",
                    "reason": "Per-tenant rate limiting and queue-depth load shedding cap intake.",
                    "evidence": ["The gateway applies rate limiting per tenant"],
                }]
            })
            .to_string(),
        )
        .on_assumptions(list_reply("assumptions", &[]))
        .on_unknowns(list_reply("unknowns", &[]))
}

/// Every call fails as unavailable
pub fn failing_service() -> ScriptedService {
    ScriptedService::new().with_fallback_error(CompletionError::Unavailable("connection refused".into()))
}

/// [`order_pipeline_service`] with a delay on every call
pub fn slow_service(delay: Duration) -> ScriptedService {
    order_pipeline_service().with_delay(delay)
}

/// Default config without retry backoff
pub fn test_config() -> AnalysisConfig {
    AnalysisConfig::new().with_retry(RetryPolicy::none())
}

pub fn analyzer(service: Arc<ScriptedService>, config: AnalysisConfig) -> Analyzer {
    Analyzer::new(sample_registry(), service, config).unwrap()
}

/// Properties every report must satisfy for `document`
pub fn assert_report_invariants(report: &Report, document: &str, max_findings: usize) {
    assert!(report.failure_modes.len() <= max_findings, "findings cap exceeded");

    for evidence in report.all_evidence() {
        assert_eq!(
            document.get(evidence.start..evidence.end),
            Some(evidence.text.as_str()),
            "evidence is not verbatim"
        );
    }

    let mut seen = HashSet::new();
    for finding in &report.failure_modes {
        assert!(seen.insert(finding.pattern_id.clone()), "duplicate finding {}", finding.pattern_id);
        assert!(
            !report.is_ruled_out(finding.pattern_id.as_str()),
            "{} is both a finding and ruled out",
            finding.pattern_id
        );
        assert!((0.0..=1.0).contains(&finding.score));
        assert!(!finding.evidence.is_empty(), "{} has no evidence", finding.pattern_id);
    }

    for pair in report.failure_modes.windows(2) {
        assert!(pair[0].score >= pair[1].score, "findings out of order");
    }

    match report.failure_modes.first() {
        Some(top) => assert_eq!(report.primary_concern.as_deref(), Some(top.name.as_str())),
        None => assert_eq!(report.primary_concern, None),
    }
}
