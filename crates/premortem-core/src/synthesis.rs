//! Overview synthesis
//!
//! The overview is assembled from the ranked findings, assumptions and
//! ruled-out risks only. It names nothing that is not already in the report.

use crate::detectors::RuledOutRisk;
use crate::report::{Finding, OverallRisk};
use crate::scoring::ConfidenceTier;

/// Names listed in a sentence before switching to "and N more"
const MAX_NAMED: usize = 3;

/// Synthesized summary fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesis {
    /// Overview text
    pub overview: String,
    /// Overall risk
    pub overall_risk: OverallRisk,
    /// Name of the top-ranked finding
    pub primary_concern: Option<String>,
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

fn name_list<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let names: Vec<&str> = names.collect();
    if names.len() <= MAX_NAMED {
        names.join(", ")
    } else {
        format!("{} and {} more", names[..MAX_NAMED].join(", "), names.len() - MAX_NAMED)
    }
}

/// Compose the overview
#[must_use]
pub fn synthesize(
    findings: &[Finding],
    assumptions: &[String],
    ruled_out: &[RuledOutRisk],
    partial: bool,
) -> Synthesis {
    let overall_risk = OverallRisk::from_findings(findings);
    let primary_concern = findings.first().map(|f| f.name.clone());
    let mut sentences: Vec<String> = Vec::new();

    if findings.is_empty() {
        sentences.push("No failure patterns met the acceptance threshold for this design.".to_string());
    } else {
        let by_tier = |tier: ConfidenceTier| findings.iter().filter(move |f| f.confidence == tier);
        let high = by_tier(ConfidenceTier::High).count();
        if high > 0 {
            sentences.push(format!(
                "Found {} likely to affect this design: {}.",
                plural(high, "high-confidence failure pattern", "high-confidence failure patterns"),
                name_list(by_tier(ConfidenceTier::High).map(|f| f.name.as_str())),
            ));
        }
        let medium = by_tier(ConfidenceTier::Medium).count();
        let low = by_tier(ConfidenceTier::Low).count();
        if medium + low > 0 {
            let lead = if high > 0 { "A further" } else { "Found" };
            sentences.push(format!(
                "{lead} {} worth discussing: {}.",
                plural(medium + low, "lower-confidence concern", "lower-confidence concerns"),
                name_list(
                    findings
                        .iter()
                        .filter(|f| f.confidence != ConfidenceTier::High)
                        .map(|f| f.name.as_str())
                ),
            ));
        }
        if let Some(top) = findings.first() {
            sentences.push(format!("Primary concern: {} ({} confidence).", top.name, top.confidence));
        }
    }

    if !assumptions.is_empty() {
        sentences.push(format!(
            "The design rests on {} that should be validated.",
            plural(assumptions.len(), "implicit assumption", "implicit assumptions"),
        ));
    }

    if !ruled_out.is_empty() {
        sentences.push(format!(
            "Ruled out by stated mitigations: {}.",
            name_list(ruled_out.iter().map(|r| r.name.as_str())),
        ));
    }

    if partial {
        sentences.push("Some analysis passes did not complete, so this report may be incomplete.".to_string());
    }

    Synthesis {
        overview: sentences.join(" "),
        overall_risk,
        primary_concern,
    }
}
