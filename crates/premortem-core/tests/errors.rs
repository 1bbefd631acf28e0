//! Input and configuration errors
//!
//! These are the only failures `analyze` reports; none of them reach the
//! completion service.

use premortem_catalog::PatternRegistry;
use premortem_core::prelude::*;
use premortem_core::Location;
use premortem_test_utils::{analyzer, order_pipeline_service, sample_registry, test_config, ORDER_PIPELINE};
use std::io::Write;
use std::sync::Arc;

#[tokio::test]
async fn empty_document_is_rejected() {
    let service = Arc::new(order_pipeline_service());
    let analyzer = analyzer(Arc::clone(&service), test_config());

    for text in ["", "   \n\t  "] {
        let err = analyzer.analyze(AnalysisRequest::new(text)).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidDocument(_)), "{err}");
    }
    assert_eq!(service.calls(), 0);
}

#[tokio::test]
async fn oversized_document_is_rejected() {
    let service = Arc::new(order_pipeline_service());
    let mut config = test_config();
    config.max_document_chars = 100;
    let analyzer = analyzer(Arc::clone(&service), config);

    let err = analyzer.analyze(AnalysisRequest::new(ORDER_PIPELINE)).await.unwrap_err();
    match err {
        AnalysisError::DocumentTooLarge { len, max } => {
            assert_eq!(len, ORDER_PIPELINE.chars().count());
            assert_eq!(max, 100);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(service.calls(), 0);
}

#[tokio::test]
async fn per_request_config_is_validated() {
    let service = Arc::new(order_pipeline_service());
    let analyzer = analyzer(Arc::clone(&service), test_config());

    let bad = test_config().with_acceptance_threshold(0.9);
    let err = analyzer
        .analyze_with(AnalysisRequest::new(ORDER_PIPELINE), &bad)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Config(_)), "{err}");
    assert_eq!(service.calls(), 0);
}

#[test]
fn zero_concurrency_is_a_config_error() {
    let service = Arc::new(order_pipeline_service());
    let err = Analyzer::new(sample_registry(), service, test_config().with_max_concurrency(0)).unwrap_err();
    assert!(matches!(err, AnalysisError::Config(_)));
}

#[test]
fn duplicate_catalog_ids_fail_the_load() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    let record = r#"{"id": "retry_storm", "name": "Retry Storm", "category": "load",
        "signals": ["retry"], "trigger_conditions": ["downstream slows"]}"#;
    write!(file, "[{record}, {record}]").unwrap();

    let err = Analyzer::from_catalog_path(file.path(), Arc::new(order_pipeline_service()), test_config()).unwrap_err();
    assert!(matches!(err, AnalysisError::Catalog(_)), "{err}");
    assert!(err.to_string().contains("retry_storm"));
}

#[test]
fn catalog_from_path_loads_yaml() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        file,
        "version: \"1\"\npatterns:\n  - id: retry_storm\n    name: Retry Storm\n    category: load\n    signals: [retry]\n    trigger_conditions: [downstream slows]"
    )
    .unwrap();

    let analyzer = Analyzer::from_catalog_path(file.path(), Arc::new(order_pipeline_service()), test_config()).unwrap();
    assert_eq!(analyzer.registry().len(), 1);
    assert_eq!(analyzer.registry().version(), Some("1"));
}

#[tokio::test]
async fn skipped_catalog_records_reach_the_report() {
    let catalog = r#"[
        {"id": "retry_storm", "name": "Retry Storm", "category": "load",
         "signals": ["retry"], "trigger_conditions": ["downstream slows"]},
        {"id": "broken", "name": "Broken"}
    ]"#;
    let registry = Arc::new(PatternRegistry::from_json_str(catalog).unwrap());
    assert_eq!(registry.diagnostics().len(), 1);

    let analyzer = Analyzer::new(registry, Arc::new(order_pipeline_service()), test_config()).unwrap();
    let report = analyzer.analyze(AnalysisRequest::new(ORDER_PIPELINE)).await.unwrap();

    let skipped: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::CatalogRecordSkipped)
        .collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].location, Location::CatalogRecord(1));
    assert!(skipped[0].message.starts_with("broken"), "{}", skipped[0].message);
    assert!(!report.partial);
}
