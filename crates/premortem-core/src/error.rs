//! Error types for the analysis engine
//!
//! Provides error handling for:
//! - Request-fatal failures (invalid document, bad configuration, catalog load)
//! - Non-fatal, per-candidate and per-detector failures, recorded as
//!   [`Diagnostic`] values on the report instead of aborting the analysis

use premortem_catalog::CatalogError;
use premortem_llm::CompletionError;
use serde::{Deserialize, Serialize};

/// Request-fatal analysis errors
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Document empty or otherwise unusable
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Document exceeds the configured size limit
    #[error("document too large: {len} chars (max {max})")]
    DocumentTooLarge {
        /// Submitted length in chars
        len: usize,
        /// Configured maximum
        max: usize,
    },

    /// Inconsistent analysis configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Catalog could not be loaded
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Diagnostic classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Catalog record skipped at load
    CatalogRecordSkipped,
    /// Completion backend unreachable after retries
    ServiceUnavailable,
    /// Completion call timed out after retries
    ServiceTimeout,
    /// Model output failed schema validation
    ParseFailure,
    /// Request deadline fired before work completed
    DeadlineExceeded,
    /// Candidate hidden behind a higher-scoring overlapping finding
    DuplicateSuppressed,
    /// Candidate removed by a stated mitigation
    RuledOut,
    /// Quoted text could not be located verbatim in the document
    EvidenceRejected,
    /// Candidate cut by the findings cap
    Truncated,
    /// Spawned task ended abnormally
    TaskFailed,
}

/// Where a diagnostic originated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum Location {
    /// A catalog record by position
    CatalogRecord(usize),
    /// A pattern / candidate
    Pattern(String),
    /// A detector pass
    Detector(String),
    /// The request as a whole
    Request,
}

/// A non-fatal event worth surfacing with the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Classification
    pub kind: DiagnosticKind,
    /// Origin
    pub location: Location,
    /// Human-readable detail
    pub message: String,
}

impl Diagnostic {
    /// Create new diagnostic
    #[inline]
    #[must_use]
    pub fn new(kind: DiagnosticKind, location: Location, message: impl Into<String>) -> Self {
        Self {
            kind,
            location,
            message: message.into(),
        }
    }

    /// Diagnostic for a pattern
    #[inline]
    #[must_use]
    pub fn pattern(kind: DiagnosticKind, id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(kind, Location::Pattern(id.into()), message)
    }

    /// Diagnostic for a detector pass
    #[inline]
    #[must_use]
    pub fn detector(kind: DiagnosticKind, name: &str, message: impl Into<String>) -> Self {
        Self::new(kind, Location::Detector(name.to_string()), message)
    }

    /// Diagnostic from a completion failure
    #[must_use]
    pub fn from_completion(location: Location, error: &CompletionError) -> Self {
        let kind = match error {
            CompletionError::Unavailable(_) => DiagnosticKind::ServiceUnavailable,
            CompletionError::Timeout { .. } => DiagnosticKind::ServiceTimeout,
            CompletionError::Parse(_) => DiagnosticKind::ParseFailure,
        };
        Self::new(kind, location, error.to_string())
    }
}
