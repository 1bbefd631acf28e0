//! Premortem Core
//!
//! Reviews a free-text system design document against a catalog of failure
//! patterns and produces a ranked, evidence-backed [`Report`].
//!
//! # Pipeline
//! - [`lexical`]: deterministic signal matching generates candidates
//! - [`semantic`]: the completion service judges trigger conditions, quotes
//!   evidence and scores each candidate, under admission control and a deadline
//! - [`detectors`]: assumptions, known unknowns and ruled-out risks
//! - [`scoring`] / [`ranking`]: merge scores, tier, deduplicate, cap
//! - [`synthesis`] / [`versioning`]: overview and reproducibility stamp
//!
//! # Example
//! ```no_run
//! use premortem_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run(service: Arc<dyn premortem_llm::CompletionService>) -> Result<(), AnalysisError> {
//! let analyzer = Analyzer::from_catalog_path("failure_patterns.json", service, AnalysisConfig::default())?;
//! let report = analyzer
//!     .analyze(AnalysisRequest::new("Workers will synchronously call the User Service."))
//!     .await?;
//! println!("{}", report.overview);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod analyzer;
pub mod candidate;
pub mod config;
pub mod detectors;
pub mod document;
pub mod error;
pub mod evidence;
pub mod lexical;
pub mod prompts;
pub mod ranking;
pub mod report;
pub mod scoring;
pub mod semantic;
pub mod synthesis;
pub mod versioning;

pub use analyzer::{AnalysisRequest, Analyzer};
pub use candidate::{TriggerAssessment, TriggerStatus};
pub use config::{
    AnalysisConfig, DetectorConfig, LexicalConfig, MissingSemanticPolicy, RankingConfig, ScoringConfig,
    SemanticConfig,
};
pub use detectors::RuledOutRisk;
pub use document::{Document, DocumentContext};
pub use error::{AnalysisError, Diagnostic, DiagnosticKind, Location};
pub use evidence::{Evidence, EvidenceSource};
pub use report::{Finding, OverallRisk, Report};
pub use scoring::{ConfidenceTier, ScoreBasis};
pub use versioning::VersionStamp;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::analyzer::{AnalysisRequest, Analyzer};
    pub use crate::config::{AnalysisConfig, MissingSemanticPolicy};
    pub use crate::document::DocumentContext;
    pub use crate::error::{AnalysisError, Diagnostic, DiagnosticKind};
    pub use crate::report::{Finding, OverallRisk, Report};
    pub use crate::scoring::ConfidenceTier;
}
