//! Analysis orchestration
//!
//! One [`Analyzer`] serves every request in the process. It owns:
//! - the read-only [`PatternRegistry`]
//! - the [`CompletionService`] handle
//! - the admission semaphore shared by all completion calls
//!
//! Per request:
//! 1. Validate and normalize the document
//! 2. Lexical scan (synchronous)
//! 3. Augmentation and the three detector passes, concurrently, all under
//!    the request deadline
//! 4. Remove ruled-out patterns, score, rank, synthesize, stamp

use crate::candidate::Candidate;
use crate::config::AnalysisConfig;
use crate::detectors::{
    detect_assumptions, detect_ruled_out, detect_unknowns, DetectorContext, DetectorKind, DetectorOutcome,
    RuledOutRisk,
};
use crate::document::{Document, DocumentContext};
use crate::error::{AnalysisError, Diagnostic, DiagnosticKind, Location};
use crate::lexical::LexicalMatcher;
use crate::ranking::rank;
use crate::report::{Finding, Report};
use crate::scoring::score_candidates;
use crate::semantic::Augmenter;
use crate::synthesis::synthesize;
use crate::versioning::VersionStamp;
use premortem_catalog::{LoadDiagnostic, PatternRegistry};
use premortem_llm::CompletionService;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::Instrument;
use ulid::Ulid;

/// One document to analyze
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    /// Document text
    pub document: String,
    /// Optional context fields
    pub context: DocumentContext,
}

impl AnalysisRequest {
    /// Create request without context
    #[must_use]
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            context: DocumentContext::default(),
        }
    }

    /// With context fields
    #[inline]
    #[must_use]
    pub fn with_context(mut self, context: DocumentContext) -> Self {
        self.context = context;
        self
    }
}

/// Pre-mortem analysis engine
pub struct Analyzer {
    registry: Arc<PatternRegistry>,
    service: Arc<dyn CompletionService>,
    admission: Arc<Semaphore>,
    config: AnalysisConfig,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("patterns", &self.registry.len())
            .field("model", &self.service.model_id())
            .field("max_concurrency", &self.config.semantic.max_concurrency)
            .finish()
    }
}

impl Analyzer {
    /// Create analyzer
    ///
    /// `config` is the default per-request configuration; its
    /// `semantic.max_concurrency` sizes the shared admission semaphore.
    ///
    /// # Errors
    /// [`AnalysisError::Config`] if `config` is inconsistent.
    pub fn new(
        registry: Arc<PatternRegistry>,
        service: Arc<dyn CompletionService>,
        config: AnalysisConfig,
    ) -> Result<Self, AnalysisError> {
        config.validate()?;
        tracing::info!(
            patterns = registry.len(),
            catalog = %registry.hash().short(),
            model = service.model_id(),
            max_concurrency = config.semantic.max_concurrency,
            "analyzer ready"
        );
        Ok(Self {
            admission: Arc::new(Semaphore::new(config.semantic.max_concurrency)),
            registry,
            service,
            config,
        })
    }

    /// Load the catalog at `path` and create an analyzer
    ///
    /// # Errors
    /// - [`AnalysisError::Catalog`] if the catalog cannot be loaded
    /// - [`AnalysisError::Config`] if `config` is inconsistent
    pub fn from_catalog_path(
        path: impl AsRef<std::path::Path>,
        service: Arc<dyn CompletionService>,
        config: AnalysisConfig,
    ) -> Result<Self, AnalysisError> {
        let registry = PatternRegistry::from_path(path)?;
        Self::new(Arc::new(registry), service, config)
    }

    /// Pattern catalog
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    /// Default configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Free admission slots
    #[inline]
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.admission.available_permits()
    }

    /// Analyze with the default configuration
    ///
    /// # Errors
    /// See [`Analyzer::analyze_with`].
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<Report, AnalysisError> {
        self.analyze_with(request, &self.config).await
    }

    /// Analyze with an explicit configuration
    ///
    /// Dropping the returned future cancels every in-flight completion call.
    ///
    /// # Errors
    /// - [`AnalysisError::Config`] for an inconsistent `config`
    /// - [`AnalysisError::InvalidDocument`] / [`AnalysisError::DocumentTooLarge`]
    ///
    /// Completion failures never surface here; they mark the report partial.
    pub async fn analyze_with(
        &self,
        request: AnalysisRequest,
        config: &AnalysisConfig,
    ) -> Result<Report, AnalysisError> {
        config.validate()?;
        let analysis_id = Ulid::new();
        let span = tracing::info_span!("analysis", id = %analysis_id);
        self.run(analysis_id, request, config).instrument(span).await
    }

    async fn run(
        &self,
        analysis_id: Ulid,
        request: AnalysisRequest,
        config: &AnalysisConfig,
    ) -> Result<Report, AnalysisError> {
        let started = Instant::now();
        let deadline = started + config.semantic.request_deadline();

        let document = Document::new(request.document, request.context, config.max_document_chars)?;
        tracing::info!(chars = document.char_len(), "analysis started");

        let scan = LexicalMatcher::new(&self.registry, &config.lexical).scan(&document);
        let candidates = scan.candidates();

        let ctx = DetectorContext {
            document: &document,
            registry: &self.registry,
            plausible: scan.plausible(),
            service: &self.service,
            admission: &self.admission,
            config,
        };
        let augmenter = Augmenter::new(Arc::clone(&self.service), Arc::clone(&self.admission));

        let (augmented, assumptions, unknowns, ruled_out) = tokio::join!(
            augmenter.augment(&document, &self.registry, candidates, &config.semantic, deadline),
            bounded(DetectorKind::Assumptions, deadline, detect_assumptions(ctx)),
            bounded(DetectorKind::Unknowns, deadline, detect_unknowns(ctx)),
            bounded(DetectorKind::RuledOut, deadline, detect_ruled_out(ctx)),
        );

        let mut diagnostics: Vec<Diagnostic> = self.registry.diagnostics().iter().map(skipped_record).collect();
        let unresolved = augmented.unresolved();
        let mut partial = augmented.deadline_exceeded || unresolved > 0;
        diagnostics.extend(augmented.diagnostics);
        for failed in [assumptions.failed, unknowns.failed, ruled_out.failed] {
            partial |= failed;
        }
        diagnostics.extend(assumptions.diagnostics);
        diagnostics.extend(unknowns.diagnostics);
        diagnostics.extend(ruled_out.diagnostics);

        let candidates = exclude_ruled_out(augmented.candidates, &ruled_out.items, &mut diagnostics);
        let (scored, scoring_diagnostics) = score_candidates(candidates, &config.scoring);
        diagnostics.extend(scoring_diagnostics);
        let (ranked, ranking_diagnostics) = rank(scored, &config.ranking);
        diagnostics.extend(ranking_diagnostics);

        let failure_modes: Vec<Finding> = ranked
            .into_iter()
            .filter_map(|scored| {
                let pattern = self.registry.get(scored.candidate.pattern_id.as_str())?;
                Some(Finding::new(scored, pattern))
            })
            .collect();

        let synthesis = synthesize(&failure_modes, &assumptions.items, &ruled_out.items, partial);

        tracing::info!(
            findings = failure_modes.len(),
            ruled_out = ruled_out.items.len(),
            assumptions = assumptions.items.len(),
            unknowns = unknowns.items.len(),
            unresolved,
            partial,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysis finished"
        );

        Ok(Report {
            analysis_id,
            overview: synthesis.overview,
            overall_risk: synthesis.overall_risk,
            primary_concern: synthesis.primary_concern,
            failure_modes,
            assumptions: assumptions.items,
            unknowns: unknowns.items,
            ruled_out: ruled_out.items,
            partial,
            diagnostics,
            version: VersionStamp::capture(&self.registry, self.service.model_id()),
        })
    }
}

/// Run a detector pass under the request deadline
async fn bounded<T>(
    kind: DetectorKind,
    deadline: Instant,
    pass: impl Future<Output = DetectorOutcome<T>>,
) -> DetectorOutcome<T> {
    match tokio::time::timeout_at(deadline, pass).await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::warn!(detector = %kind, "detector pass cancelled at request deadline");
            DetectorOutcome {
                items: Vec::new(),
                failed: true,
                diagnostics: vec![Diagnostic::detector(
                    DiagnosticKind::DeadlineExceeded,
                    kind.name(),
                    "cancelled at request deadline",
                )],
            }
        }
    }
}

fn skipped_record(skipped: &LoadDiagnostic) -> Diagnostic {
    let message = match &skipped.pattern_id {
        Some(id) => format!("{id}: {}", skipped.reason),
        None => skipped.reason.clone(),
    };
    Diagnostic::new(DiagnosticKind::CatalogRecordSkipped, Location::CatalogRecord(skipped.index), message)
}

fn exclude_ruled_out(
    candidates: Vec<Candidate>,
    ruled_out: &[RuledOutRisk],
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|c| {
            let excluded = ruled_out.iter().any(|r| r.pattern_id == c.pattern_id);
            if excluded {
                diagnostics.push(Diagnostic::pattern(
                    DiagnosticKind::RuledOut,
                    c.pattern_id.as_str(),
                    "excluded: document states a mitigation",
                ));
            }
            !excluded
        })
        .collect()
}
