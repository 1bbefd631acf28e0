//! Failure pattern records
//!
//! Defines the validated [`FailurePattern`] and the lenient wire-level
//! [`PatternRecord`] it is checked from. Records are decoded field-by-field so
//! that one bad entry does not poison the rest of the catalog.

use crate::error::RecordError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable pattern identifier (`[a-z0-9_-]+`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternId(String);

impl PatternId {
    /// Validate and wrap an id
    ///
    /// # Errors
    /// Returns [`RecordError::InvalidId`] for empty ids or ids with characters
    /// outside lowercase ascii alphanumerics, `_` and `-`.
    pub fn parse(raw: &str) -> Result<Self, RecordError> {
        let id = raw.trim();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if valid {
            Ok(Self(id.to_string()))
        } else {
            Err(RecordError::InvalidId(raw.to_string()))
        }
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PatternId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for PatternId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Failure pattern categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternCategory {
    /// Load amplification, overload, shedding
    Load,
    /// Hidden or fragile dependencies
    Dependency,
    /// Data shape, growth, poison inputs
    Data,
    /// Timeouts, deadlines, clocks
    Timing,
    /// Pools, memory, descriptors
    Resource,
    /// Partitions, consensus, skew
    Distributed,
}

impl PatternCategory {
    /// All categories in declaration order
    pub const ALL: [Self; 6] = [
        Self::Load,
        Self::Dependency,
        Self::Data,
        Self::Timing,
        Self::Resource,
        Self::Distributed,
    ];

    /// Lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Dependency => "dependency",
            Self::Data => "data",
            Self::Timing => "timing",
            Self::Resource => "resource",
            Self::Distributed => "distributed",
        }
    }
}

impl FromStr for PatternCategory {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| RecordError::InvalidCategory(s.to_string()))
    }
}

impl fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, catalog-defined failure archetype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailurePattern {
    /// Unique stable id
    pub id: PatternId,
    /// Display name
    pub name: String,
    /// Category
    pub category: PatternCategory,
    /// Detection phrases (deduplicated, catalog order)
    pub signals: Vec<String>,
    /// Circumstances under which the failure manifests
    pub trigger_conditions: Vec<String>,
    /// Why reviewers tend to miss it
    pub why_subtle: String,
    /// What breaks when it fires
    pub impact_surface: String,
    /// Questions for the design review
    pub discussion_questions: Vec<String>,
    /// Facts needed to evaluate the pattern
    pub required_context: Vec<String>,
    /// Phrases indicating a mitigation is present
    pub safety_signals: Vec<String>,
}

/// Text given either as a string or a list of strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TextOrList {
    Text(String),
    List(Vec<String>),
}

impl TextOrList {
    fn into_text(self) -> String {
        match self {
            Self::Text(t) => t.trim().to_string(),
            Self::List(items) => items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

/// Wire-level catalog record, decoded leniently before validation
#[derive(Debug, Clone, Deserialize)]
pub struct PatternRecord {
    id: Option<String>,
    name: Option<String>,
    category: Option<String>,
    #[serde(default, alias = "indicators")]
    signals: Vec<String>,
    #[serde(default)]
    trigger_conditions: Vec<String>,
    #[serde(default, alias = "why_easy_to_miss")]
    why_subtle: Option<TextOrList>,
    #[serde(default)]
    impact_surface: Option<TextOrList>,
    #[serde(default)]
    discussion_questions: Vec<String>,
    #[serde(default)]
    required_context: Vec<String>,
    #[serde(default)]
    safety_signals: Vec<String>,
}

impl PatternRecord {
    /// Decode a record from a JSON value
    ///
    /// # Errors
    /// Returns [`RecordError::Malformed`] when fields have the wrong shape.
    pub fn from_value(value: serde_json::Value) -> Result<Self, RecordError> {
        serde_json::from_value(value).map_err(|e| RecordError::Malformed(e.to_string()))
    }

    /// Schema-check the record into a [`FailurePattern`]
    ///
    /// # Errors
    /// Returns the first violated rule.
    pub fn validate(self) -> Result<FailurePattern, RecordError> {
        let id = PatternId::parse(self.id.as_deref().ok_or(RecordError::MissingField("id"))?)?;
        let name = non_blank(self.name).ok_or(RecordError::MissingField("name"))?;
        let category: PatternCategory = self
            .category
            .as_deref()
            .ok_or(RecordError::MissingField("category"))?
            .parse()?;

        let signals = clean_list(self.signals, true);
        if signals.is_empty() {
            return Err(RecordError::NoSignals);
        }
        let trigger_conditions = clean_list(self.trigger_conditions, false);
        if trigger_conditions.is_empty() {
            return Err(RecordError::MissingField("trigger_conditions"));
        }

        Ok(FailurePattern {
            id,
            name,
            category,
            signals,
            trigger_conditions,
            why_subtle: self.why_subtle.map(TextOrList::into_text).unwrap_or_default(),
            impact_surface: self
                .impact_surface
                .map(TextOrList::into_text)
                .unwrap_or_default(),
            discussion_questions: clean_list(self.discussion_questions, false),
            required_context: clean_list(self.required_context, true),
            safety_signals: clean_list(self.safety_signals, true),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trim, drop blanks and (optionally) case-insensitive duplicates.
fn clean_list(items: Vec<String>, dedup: bool) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        if dedup && out.iter().any(|o| o.eq_ignore_ascii_case(item)) {
            continue;
        }
        out.push(item.to_string());
    }
    out
}
