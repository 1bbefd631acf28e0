//! Pattern registry
//!
//! Provides [`PatternRegistry`], the immutable, process-lifetime arena of
//! validated patterns. Built once at startup; afterwards it is only read, so
//! an `Arc<PatternRegistry>` can be shared by every concurrent analysis.
//!
//! # Load rules
//! - A record whose id collides with an earlier record aborts the load, even if
//!   either record is otherwise malformed.
//! - Any other invalid record is skipped and reported as a [`LoadDiagnostic`].
//! - A catalog with zero valid records is rejected.

use crate::error::{CatalogError, RecordError};
use crate::hash::CatalogHash;
use crate::pattern::{FailurePattern, PatternId, PatternRecord};
use crate::signal::SignalMatcher;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// A skipped catalog record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadDiagnostic {
    /// Position of the record in the source
    pub index: usize,
    /// Id if one could be read
    pub pattern_id: Option<String>,
    /// Why the record was rejected
    pub reason: String,
}

/// A pattern with its compiled matchers
#[derive(Debug, Clone)]
pub struct PatternEntry {
    pattern: FailurePattern,
    signals: Vec<SignalMatcher>,
    safety_signals: Vec<SignalMatcher>,
}

impl PatternEntry {
    /// The validated pattern
    #[inline]
    #[must_use]
    pub fn pattern(&self) -> &FailurePattern {
        &self.pattern
    }

    /// Compiled detection signals, weighted by catalog-wide rarity
    #[inline]
    #[must_use]
    pub fn signals(&self) -> &[SignalMatcher] {
        &self.signals
    }

    /// Compiled mitigation signals
    #[inline]
    #[must_use]
    pub fn safety_signals(&self) -> &[SignalMatcher] {
        &self.safety_signals
    }

    /// Sum of all signal weights
    #[must_use]
    pub fn total_signal_weight(&self) -> f64 {
        self.signals.iter().map(SignalMatcher::weight).sum()
    }
}

/// Immutable catalog keyed by pattern id (iteration in id order)
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    entries: IndexMap<PatternId, PatternEntry>,
    diagnostics: Vec<LoadDiagnostic>,
    hash: CatalogHash,
    version: Option<String>,
}

impl PatternRegistry {
    /// Build a registry from raw JSON records
    ///
    /// # Errors
    /// - [`CatalogError::DuplicateId`] on id collisions
    /// - [`CatalogError::Empty`] if nothing validates
    pub fn from_records(records: Vec<serde_json::Value>) -> Result<Self, CatalogError> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        for (index, record) in records.iter().enumerate() {
            if let Some(id) = record.get("id").and_then(serde_json::Value::as_str) {
                let id = id.trim().to_string();
                if let Some(&first) = seen.get(&id) {
                    return Err(CatalogError::DuplicateId {
                        id,
                        first,
                        second: index,
                    });
                }
                seen.insert(id, index);
            }
        }

        let mut diagnostics = Vec::new();
        let mut compiled = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            let raw_id = record
                .get("id")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string);
            match compile_record(record) {
                Ok(entry) => compiled.push(entry),
                Err(err) => {
                    tracing::warn!(index, id = ?raw_id, "skipping catalog record: {err}");
                    diagnostics.push(LoadDiagnostic {
                        index,
                        pattern_id: raw_id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        if compiled.is_empty() {
            return Err(CatalogError::Empty {
                skipped: diagnostics.len(),
            });
        }

        assign_weights(&mut compiled);
        compiled.sort_by(|a, b| a.pattern.id.cmp(&b.pattern.id));

        let patterns: Vec<&FailurePattern> = compiled.iter().map(|e| &e.pattern).collect();
        let hash = CatalogHash::compute_serializable(&patterns)?;

        let entries = compiled
            .into_iter()
            .map(|e| (e.pattern.id.clone(), e))
            .collect();

        Ok(Self {
            entries,
            diagnostics,
            hash,
            version: None,
        })
    }

    /// Decode a JSON catalog: either a top-level array of records or an object
    /// with a `patterns` array and optional `version`.
    ///
    /// # Errors
    /// See [`Self::from_records`]; undecodable input is [`CatalogError::Decode`].
    pub fn from_json_str(source: &str) -> Result<Self, CatalogError> {
        let value: serde_json::Value =
            serde_json::from_str(source).map_err(|e| CatalogError::Decode(e.to_string()))?;
        Self::from_document(value)
    }

    /// Decode a YAML catalog (same shapes as JSON)
    ///
    /// # Errors
    /// See [`Self::from_json_str`].
    pub fn from_yaml_str(source: &str) -> Result<Self, CatalogError> {
        let value: serde_json::Value =
            serde_yaml::from_str(source).map_err(|e| CatalogError::Decode(e.to_string()))?;
        Self::from_document(value)
    }

    /// Load a catalog file, choosing the decoder by extension
    ///
    /// # Errors
    /// IO failures, unsupported extensions, and everything [`Self::from_records`] rejects.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let source =
            std::fs::read_to_string(path).map_err(|e| CatalogError::io_error(path, e))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let registry = match ext.as_str() {
            "json" => Self::from_json_str(&source)?,
            "yaml" | "yml" => Self::from_yaml_str(&source)?,
            other => return Err(CatalogError::UnsupportedFormat(other.to_string())),
        };
        tracing::info!(
            path = %path.display(),
            patterns = registry.len(),
            skipped = registry.diagnostics.len(),
            hash = %registry.hash.short(),
            "pattern catalog loaded"
        );
        Ok(registry)
    }

    fn from_document(value: serde_json::Value) -> Result<Self, CatalogError> {
        match value {
            serde_json::Value::Array(records) => Self::from_records(records),
            serde_json::Value::Object(mut map) => {
                let version = map
                    .get("version")
                    .and_then(|v| v.as_str().map(str::to_string).or_else(|| Some(v.to_string())));
                let Some(serde_json::Value::Array(records)) = map.remove("patterns") else {
                    return Err(CatalogError::Decode(
                        "expected a 'patterns' array".to_string(),
                    ));
                };
                let mut registry = Self::from_records(records)?;
                registry.version = version;
                Ok(registry)
            }
            _ => Err(CatalogError::Decode(
                "expected an array or an object".to_string(),
            )),
        }
    }

    /// Lookup by id
    #[inline]
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&FailurePattern> {
        self.entries.get(id).map(PatternEntry::pattern)
    }

    /// Lookup entry (pattern plus compiled matchers) by id
    #[inline]
    #[must_use]
    pub fn entry(&self, id: &str) -> Option<&PatternEntry> {
        self.entries.get(id)
    }

    /// Check if id exists
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// All patterns in id order
    pub fn patterns(&self) -> impl Iterator<Item = &FailurePattern> {
        self.entries.values().map(PatternEntry::pattern)
    }

    /// All entries in id order
    pub fn entries(&self) -> impl Iterator<Item = &PatternEntry> {
        self.entries.values()
    }

    /// Number of valid patterns
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no pattern loaded (never the case for a built registry)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records skipped during load
    #[inline]
    #[must_use]
    pub fn diagnostics(&self) -> &[LoadDiagnostic] {
        &self.diagnostics
    }

    /// Content hash over the validated patterns
    #[inline]
    #[must_use]
    pub fn hash(&self) -> CatalogHash {
        self.hash
    }

    /// Declared catalog version, if the source carried one
    #[inline]
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

fn compile_record(value: serde_json::Value) -> Result<PatternEntry, RecordError> {
    let pattern = PatternRecord::from_value(value)?.validate()?;
    let signals = pattern
        .signals
        .iter()
        .map(|s| SignalMatcher::compile(s))
        .collect::<Result<Vec<_>, _>>()?;
    let safety_signals = pattern
        .safety_signals
        .iter()
        .map(|s| SignalMatcher::compile(s))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PatternEntry {
        pattern,
        signals,
        safety_signals,
    })
}

/// Inverse document frequency over the catalog: `ln(1 + N / df)`.
fn assign_weights(entries: &mut [PatternEntry]) {
    let n = entries.len() as f64;
    let mut df: HashMap<String, usize> = HashMap::new();
    for entry in entries.iter() {
        let mut phrases: Vec<&str> = entry.signals.iter().map(SignalMatcher::phrase).collect();
        phrases.sort_unstable();
        phrases.dedup();
        for phrase in phrases {
            *df.entry(phrase.to_string()).or_default() += 1;
        }
    }
    for entry in entries.iter_mut() {
        for signal in &mut entry.signals {
            let count = df.get(signal.phrase()).copied().unwrap_or(1).max(1) as f64;
            signal.set_weight((1.0 + n / count).ln());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, signals: &[&str]) -> serde_json::Value {
        json!({
            "id": id,
            "name": id.replace('_', " "),
            "category": "load",
            "signals": signals,
            "trigger_conditions": ["something happens"],
        })
    }

    #[test]
    fn registry_loads_and_orders_by_id() {
        let registry = PatternRegistry::from_records(vec![
            record("zeta", &["z"]),
            record("alpha", &["a"]),
        ])
        .unwrap();

        let ids: Vec<&str> = registry.patterns().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
        assert!(registry.contains("alpha"));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn duplicate_ids_are_fatal() {
        let err = PatternRegistry::from_records(vec![
            record("retry_storm", &["retry"]),
            record("hotspot", &["shard"]),
            json!({"id": "retry_storm"}),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::DuplicateId { first: 0, second: 2, .. }
        ));
    }

    #[test]
    fn malformed_records_are_skipped_with_diagnostics() {
        let registry = PatternRegistry::from_records(vec![
            record("ok", &["fine"]),
            json!({"id": "broken", "name": "Broken"}),
            json!(42),
        ])
        .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.diagnostics().len(), 2);
        assert_eq!(registry.diagnostics()[0].index, 1);
        assert_eq!(registry.diagnostics()[0].pattern_id.as_deref(), Some("broken"));
        assert_eq!(registry.diagnostics()[1].pattern_id, None);
    }

    #[test]
    fn empty_catalog_is_rejected() {
        let err = PatternRegistry::from_records(vec![json!({"id": "x"})]).unwrap_err();
        assert!(matches!(err, CatalogError::Empty { skipped: 1 }));
    }

    #[test]
    fn shared_signals_weigh_less_than_rare_ones() {
        let registry = PatternRegistry::from_records(vec![
            record("a", &["timeout", "leader election"]),
            record("b", &["timeout"]),
            record("c", &["timeout"]),
        ])
        .unwrap();

        let entry = registry.entry("a").unwrap();
        let common = entry.signals()[0].weight();
        let rare = entry.signals()[1].weight();
        assert!(rare > common);
        assert!((common - 2f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn hash_ignores_record_order() {
        let a = PatternRegistry::from_records(vec![record("x", &["p"]), record("y", &["q"])])
            .unwrap();
        let b = PatternRegistry::from_records(vec![record("y", &["q"]), record("x", &["p"])])
            .unwrap();
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn object_catalog_carries_version() {
        let source = json!({
            "version": "2024.06",
            "patterns": [record("x", &["p"])],
        })
        .to_string();
        let registry = PatternRegistry::from_json_str(&source).unwrap();
        assert_eq!(registry.version(), Some("2024.06"));
    }

    #[test]
    fn yaml_catalog_decodes() {
        let source = r#"
- id: retry_storm
  name: Retry Storm
  category: load
  signals: [retry, exponential backoff]
  trigger_conditions:
    - dependency slows down
"#;
        let registry = PatternRegistry::from_yaml_str(source).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.entry("retry_storm").unwrap().signals().len(), 2);
    }

    #[test]
    fn from_path_selects_decoder_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, json!([record("x", &["p"])]).to_string()).unwrap();
        assert_eq!(PatternRegistry::from_path(&path).unwrap().len(), 1);

        let txt = dir.path().join("catalog.txt");
        std::fs::write(&txt, "[]").unwrap();
        assert!(matches!(
            PatternRegistry::from_path(&txt),
            Err(CatalogError::UnsupportedFormat(_))
        ));
    }
}
