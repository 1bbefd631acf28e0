//! Report invariants over generated designs
//!
//! For any document assembled from the sentence pool:
//! - evidence is always verbatim document text
//! - a pattern is never both a finding and ruled out
//! - findings respect the cap and come back in score order
//! - the same inputs give the same findings
//! - raising the acceptance threshold only removes findings

use premortem_core::prelude::*;
use premortem_test_utils::{analyzer, assert_report_invariants, test_config, ScriptedService};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

const POOL: &[&str] = &[
    "Workers will synchronously call the User Service.",
    "No circuit breakers are planned.",
    "Clients retry failed requests with exponential backoff.",
    "The gateway applies rate limiting per tenant.",
    "Events are appended to an unbounded queue.",
    "A connection pool of 20 connections is shared by all handlers.",
    "Sessions use a TTL calculation based on the local clock.",
    "We use leader election across a multi-region deployment.",
    "Messages from the message queue are processed in order.",
    "The service has a health check endpoint.",
    "Nothing else is planned for now.",
];

/// One reply that satisfies every prompt shape
const UNIVERSAL_REPLY: &str = r#"{
    "trigger_conditions": [{"index": 1, "status": "confirmed"}],
    "evidence": ["Workers will synchronously call the User Service."],
    "score": 0.7,
    "assumptions": ["Every dependency answers within its timeout"],
    "unknowns": ["Peak load is not stated"],
    "ruled_out": [{"pattern_id": "load_shedding_blindspot", "reason": "Tenants are rate limited.", "evidence": []}]
}"#;

fn document(picks: &[usize], newline: bool) -> String {
    let sep = if newline { "\n\n" } else { " " };
    picks.iter().map(|&i| POOL[i]).collect::<Vec<_>>().join(sep)
}

fn run(text: &str, config: AnalysisConfig) -> Report {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let service = Arc::new(ScriptedService::new().with_fallback(UNIVERSAL_REPLY));
    let analyzer = analyzer(service, config);
    runtime.block_on(analyzer.analyze(AnalysisRequest::new(text))).unwrap()
}

fn finding_ids(report: &Report) -> BTreeSet<String> {
    report
        .failure_modes
        .iter()
        .map(|f| f.pattern_id.as_str().to_string())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn reports_hold_invariants(
        picks in prop::collection::vec(0..POOL.len(), 1..8),
        newline in any::<bool>(),
        cap in 1usize..5,
    ) {
        let text = document(&picks, newline);
        let report = run(&text, test_config().with_max_findings(cap));
        assert_report_invariants(&report, &text, cap);
        prop_assert!(!report.partial);
    }

    #[test]
    fn analysis_is_deterministic(picks in prop::collection::vec(0..POOL.len(), 1..8)) {
        let text = document(&picks, false);
        let a = run(&text, test_config());
        let b = run(&text, test_config());
        prop_assert_eq!(&a.failure_modes, &b.failure_modes);
        prop_assert_eq!(&a.ruled_out, &b.ruled_out);
        prop_assert_eq!(&a.assumptions, &b.assumptions);
        prop_assert_eq!(&a.unknowns, &b.unknowns);
        prop_assert_eq!(&a.overview, &b.overview);
        prop_assert!(a.version.same_inputs(&b.version));
    }

    #[test]
    fn higher_threshold_only_removes_findings(
        picks in prop::collection::vec(0..POOL.len(), 1..8),
        low in 0.0f64..0.4,
        delta in 0.0f64..0.4,
    ) {
        let high = (low + delta).min(0.4);
        let text = document(&picks, true);
        let loose = finding_ids(&run(&text, test_config().with_acceptance_threshold(low)));
        let strict = finding_ids(&run(&text, test_config().with_acceptance_threshold(high)));
        prop_assert!(strict.is_subset(&loose), "{strict:?} not within {loose:?}");
    }
}

#[test]
fn stated_rate_limiting_excludes_load_shedding() {
    let text = document(&[4, 3], false);
    let report = run(&text, test_config());
    assert!(report.is_ruled_out("load_shedding_blindspot"));
    assert!(report.finding("load_shedding_blindspot").is_none());
    assert_report_invariants(&report, &text, 10);
}

#[test]
fn negated_breakers_do_not_rule_out() {
    let text = document(&[4, 1], false);
    let report = run(&text, test_config());
    assert!(!report.is_ruled_out("load_shedding_blindspot"));
    assert!(report.finding("load_shedding_blindspot").is_some());
}
