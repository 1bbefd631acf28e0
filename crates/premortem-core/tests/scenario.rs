//! End-to-end analysis of the sample designs against the sample catalog
//!
//! Run with: cargo test --package premortem-core --test scenario

use pretty_assertions::assert_eq;
use premortem_core::prelude::*;
use premortem_core::{DocumentContext, EvidenceSource, TriggerStatus};
use premortem_test_utils::{
    analyzer, assert_report_invariants, mitigated_gateway_service, order_pipeline_service, test_config,
    MITIGATED_GATEWAY, ORDER_PIPELINE, SCRIPTED_MODEL,
};
use std::sync::Arc;

#[tokio::test]
async fn order_pipeline_surfaces_hidden_sync_dependency_first() {
    let service = Arc::new(order_pipeline_service());
    let analyzer = analyzer(Arc::clone(&service), test_config());

    let report = analyzer.analyze(AnalysisRequest::new(ORDER_PIPELINE)).await.unwrap();
    assert_report_invariants(&report, ORDER_PIPELINE, 10);
    assert!(!report.partial, "diagnostics: {:?}", report.diagnostics);

    let top = &report.failure_modes[0];
    assert_eq!(top.pattern_id.as_str(), "hidden_sync_dependency");
    assert_eq!(top.confidence, ConfidenceTier::High);
    assert!(!top.is_lexical_only());
    assert!(top
        .evidence
        .iter()
        .any(|e| e.text.contains("synchronously call the User Service")));
    assert!(top.evidence.iter().any(|e| e.source == EvidenceSource::Quoted));
    assert_eq!(top.confirmed_triggers().count(), 2);
    assert_eq!(report.primary_concern.as_deref(), Some("Hidden Synchronous Dependency"));
    assert_eq!(report.overall_risk, OverallRisk::High);
}

#[tokio::test]
async fn negated_mitigation_keeps_load_shedding_in_play() {
    let service = Arc::new(order_pipeline_service());
    let analyzer = analyzer(Arc::clone(&service), test_config());

    let report = analyzer.analyze(AnalysisRequest::new(ORDER_PIPELINE)).await.unwrap();

    let load = report.finding("load_shedding_blindspot").expect("load shedding finding");
    assert_eq!(load.confidence, ConfidenceTier::Medium);
    assert!(!report.is_ruled_out("load_shedding_blindspot"));
    assert!(report.ruled_out.is_empty());
    // "No Circuit Breakers" is not a mitigation, so no ruled-out request is made
    assert_eq!(service.prompts_containing("CANDIDATE MITIGATIONS"), 0);
}

#[tokio::test]
async fn retry_storm_is_reported_at_lower_confidence() {
    let service = Arc::new(order_pipeline_service());
    let analyzer = analyzer(Arc::clone(&service), test_config());

    let report = analyzer.analyze(AnalysisRequest::new(ORDER_PIPELINE)).await.unwrap();

    let retry = report.finding("retry_storm").expect("retry storm finding");
    assert!(retry.confidence < ConfidenceTier::High);
    assert!(retry.score < report.failure_modes[0].score);
    assert_eq!(retry.matched_signals, vec!["retry".to_string()]);
    assert_eq!(
        retry.trigger_conditions[0].status,
        TriggerStatus::Confirmed,
        "{:?}",
        retry.trigger_conditions
    );
}

#[tokio::test]
async fn detectors_fill_assumptions_and_unknowns() {
    let service = Arc::new(order_pipeline_service());
    let analyzer = analyzer(Arc::clone(&service), test_config());

    let report = analyzer.analyze(AnalysisRequest::new(ORDER_PIPELINE)).await.unwrap();

    assert_eq!(report.assumptions.len(), 2);
    assert!(report.assumptions[0].contains("User Service stays fast"));
    assert!(!report.unknowns.is_empty());
    assert!(report.unknowns.len() <= test_config().detectors.max_unknowns);
    assert!(report.overview.contains("Hidden Synchronous Dependency"));
    assert!(report.overview.contains("2 implicit assumptions"));
}

#[tokio::test]
async fn one_request_per_candidate_plus_detectors() {
    let service = Arc::new(order_pipeline_service());
    let analyzer = analyzer(Arc::clone(&service), test_config());

    let report = analyzer.analyze(AnalysisRequest::new(ORDER_PIPELINE)).await.unwrap();

    for finding in &report.failure_modes {
        assert_eq!(service.candidate_calls(finding.pattern_id.as_str()), 1);
    }
    assert_eq!(service.prompts_containing("List the implicit assumptions"), 1);
    assert_eq!(service.prompts_containing("List information missing"), 1);
    assert_eq!(service.calls(), report.failure_modes.len() + 2);
    assert_eq!(analyzer.available_permits(), test_config().semantic.max_concurrency);
}

#[tokio::test]
async fn stated_mitigation_rules_pattern_out() {
    let service = Arc::new(mitigated_gateway_service());
    let analyzer = analyzer(Arc::clone(&service), test_config());

    let report = analyzer.analyze(AnalysisRequest::new(MITIGATED_GATEWAY)).await.unwrap();
    assert_report_invariants(&report, MITIGATED_GATEWAY, 10);
    assert!(!report.partial, "diagnostics: {:?}", report.diagnostics);

    assert!(report.finding("load_shedding_blindspot").is_none());
    assert_eq!(report.ruled_out.len(), 1);
    let ruled = &report.ruled_out[0];
    assert_eq!(ruled.pattern_id.as_str(), "load_shedding_blindspot");
    assert_eq!(ruled.name, "Load Shedding Blind Spot");
    assert!(ruled
        .evidence
        .iter()
        .any(|e| e.text.contains("rate limiting per tenant")));
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::RuledOut));
    assert!(report.overview.contains("Ruled out by stated mitigations: Load Shedding Blind Spot."));
}

#[tokio::test]
async fn context_reaches_prompts_and_version_stamp_is_filled() {
    let service = Arc::new(order_pipeline_service());
    let analyzer = analyzer(Arc::clone(&service), test_config());
    let context = DocumentContext {
        expected_scale: Some("2,000 orders per second at peak".into()),
        ..DocumentContext::default()
    };

    let report = analyzer
        .analyze(AnalysisRequest::new(ORDER_PIPELINE).with_context(context))
        .await
        .unwrap();

    assert!(service.prompts_containing("2,000 orders per second at peak") >= 1);
    assert_eq!(report.version.model_id, SCRIPTED_MODEL);
    assert_eq!(report.version.catalog_version.as_deref(), Some("2026.10"));
    assert_eq!(report.version.catalog_hash, analyzer.registry().hash());
    assert!(report.version.prompt_version.starts_with("v1-"));
}

#[tokio::test]
async fn report_serializes_to_json() {
    let service = Arc::new(order_pipeline_service());
    let analyzer = analyzer(service, test_config());

    let report = analyzer.analyze(AnalysisRequest::new(ORDER_PIPELINE)).await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();

    assert_eq!(json["failure_modes"][0]["pattern_id"], "hidden_sync_dependency");
    assert_eq!(json["failure_modes"][0]["confidence"], "high");
    assert_eq!(json["overall_risk"], "high");
    assert_eq!(json["partial"], false);
}
