//! Completion service outages
//!
//! A dead backend never fails the analysis: the report comes back partial,
//! built from lexical evidence alone, and every admission permit is returned.

use premortem_core::prelude::*;
use premortem_core::ScoreBasis;
use premortem_llm::CompletionError;
use premortem_test_utils::{
    analyzer, assert_report_invariants, candidate_reply, failing_service, test_config, ScriptedService,
    ORDER_PIPELINE, RETRY_HEAVY,
};
use std::sync::Arc;

#[tokio::test(start_paused = true)]
async fn total_outage_yields_partial_lexical_report() {
    let service = Arc::new(failing_service());
    let config = AnalysisConfig::new();
    let analyzer = analyzer(Arc::clone(&service), config.clone());

    let report = analyzer.analyze(AnalysisRequest::new(ORDER_PIPELINE)).await.unwrap();
    assert_report_invariants(&report, ORDER_PIPELINE, config.ranking.max_findings);

    assert!(report.partial);
    assert!(report.failure_modes.iter().all(Finding::is_lexical_only));
    assert!(report.failure_modes.iter().all(|f| f.confidence <= ConfidenceTier::Medium));
    assert!(report.assumptions.is_empty());
    assert!(report.ruled_out.is_empty());
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::ServiceUnavailable));
    assert!(report.overview.contains("may be incomplete"));

    // each candidate is attempted once plus the configured retries
    let attempts = 1 + config.semantic.retry.max_retries as usize;
    assert_eq!(service.candidate_calls("hidden_sync_dependency"), attempts);
    assert_eq!(analyzer.available_permits(), config.semantic.max_concurrency);
}

#[tokio::test(start_paused = true)]
async fn strong_lexical_match_survives_outage_capped_at_medium() {
    let service = Arc::new(failing_service());
    let analyzer = analyzer(service, AnalysisConfig::new());

    let report = analyzer.analyze(AnalysisRequest::new(RETRY_HEAVY)).await.unwrap();
    assert_report_invariants(&report, RETRY_HEAVY, 10);

    let retry = report.finding("retry_storm").expect("lexical-only retry storm");
    assert_eq!(retry.basis, ScoreBasis::LexicalOnly);
    assert_eq!(retry.semantic_score, None);
    assert_eq!(retry.confidence, ConfidenceTier::Medium);
    assert!((retry.lexical_score - 1.0).abs() < 1e-9);
    assert!(report.partial);
    assert_eq!(report.overall_risk, OverallRisk::Medium);
}

#[tokio::test(start_paused = true)]
async fn drop_policy_omits_unscored_candidates() {
    let service = Arc::new(failing_service());
    let config = AnalysisConfig::new().with_missing_semantic(MissingSemanticPolicy::Drop);
    let analyzer = analyzer(service, config);

    let report = analyzer.analyze(AnalysisRequest::new(RETRY_HEAVY)).await.unwrap();

    assert!(report.failure_modes.is_empty());
    assert!(report.partial);
    assert_eq!(report.overall_risk, OverallRisk::Minimal);
}

#[tokio::test]
async fn malformed_reply_drops_only_that_candidate() {
    let service = Arc::new(
        ScriptedService::new()
            .on_candidate("retry_storm", "certainly, this design has a retry storm")
            .on_candidate(
                "hidden_sync_dependency",
                candidate_reply(0.92, &[1], &["Workers will synchronously call the User Service"]),
            )
            .on_candidate("load_shedding_blindspot", candidate_reply(0.55, &[1], &[]))
            .on_assumptions(r#"{"assumptions": []}"#)
            .on_unknowns(r#"{"unknowns": []}"#),
    );
    let analyzer = analyzer(Arc::clone(&service), test_config());

    let report = analyzer.analyze(AnalysisRequest::new(ORDER_PIPELINE)).await.unwrap();

    assert!(report.finding("retry_storm").is_none());
    assert!(report.finding("hidden_sync_dependency").is_some());
    assert!(!report.partial, "a parse failure is not an outage");
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::ParseFailure));
    // parse failures are not retried
    assert_eq!(service.candidate_calls("retry_storm"), 1);
}

#[tokio::test(start_paused = true)]
async fn detector_failure_marks_report_partial() {
    let service = Arc::new(
        ScriptedService::new()
            .fail_on(&["List the implicit assumptions"], CompletionError::Timeout { after_ms: 30_000 })
            .with_fallback(r#"{"trigger_conditions": [], "evidence": [], "score": 0.1, "unknowns": []}"#),
    );
    let analyzer = analyzer(Arc::clone(&service), test_config());

    let report = analyzer.analyze(AnalysisRequest::new(ORDER_PIPELINE)).await.unwrap();

    assert!(report.partial);
    assert!(report.assumptions.is_empty());
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::ServiceTimeout));
}
