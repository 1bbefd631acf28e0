//! Evidence spans
//!
//! Evidence is always a verbatim slice of the submitted document, carried
//! together with its byte offsets so overlap between findings can be measured.

use crate::document::Document;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// How a piece of evidence was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    /// Sentence around a signal phrase hit
    Signal,
    /// Sentence quoted by the completion service and located in the document
    Quoted,
    /// Sentence stating a mitigation
    Mitigation,
}

/// A verbatim excerpt of the document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Evidence {
    /// Verbatim document text
    pub text: String,
    /// Start byte offset in the raw document
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
    /// Origin
    pub source: EvidenceSource,
}

impl Evidence {
    /// Slice `range` out of `document`; `None` when the range is not valid
    #[must_use]
    pub fn from_range(document: &Document, range: Range<usize>, source: EvidenceSource) -> Option<Self> {
        let text = document.raw().get(range.clone())?;
        if text.trim().is_empty() {
            return None;
        }
        Some(Self {
            text: text.to_string(),
            start: range.start,
            end: range.end,
            source,
        })
    }

    /// Byte range in the raw document
    #[inline]
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Length in bytes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True for zero-length evidence
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Push `item` unless an identical span is already present; keeps offset order
pub fn insert_evidence(list: &mut Vec<Evidence>, item: Evidence) {
    if list.iter().any(|e| e.start == item.start && e.end == item.end) {
        return;
    }
    let at = list.partition_point(|e| (e.start, e.end) < (item.start, item.end));
    list.insert(at, item);
}

/// Collapse ranges into a sorted, non-overlapping cover
fn union(ranges: impl IntoIterator<Item = Range<usize>>) -> Vec<Range<usize>> {
    let mut ranges: Vec<Range<usize>> = ranges.into_iter().filter(|r| r.start < r.end).collect();
    ranges.sort_by_key(|r| r.start);
    let mut out: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
    for r in ranges {
        match out.last_mut() {
            Some(last) if r.start <= last.end => last.end = last.end.max(r.end),
            _ => out.push(r),
        }
    }
    out
}

fn covered(ranges: &[Range<usize>]) -> usize {
    ranges.iter().map(|r| r.end - r.start).sum()
}

/// Shared evidence bytes divided by the smaller side's evidence bytes
///
/// Returns 0 when either side has no evidence.
#[must_use]
pub fn overlap_fraction(a: &[Evidence], b: &[Evidence]) -> f64 {
    let a = union(a.iter().map(Evidence::range));
    let b = union(b.iter().map(Evidence::range));
    let smaller = covered(&a).min(covered(&b));
    if smaller == 0 {
        return 0.0;
    }

    let mut shared = 0usize;
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let lo = a[i].start.max(b[j].start);
        let hi = a[i].end.min(b[j].end);
        if lo < hi {
            shared += hi - lo;
        }
        if a[i].end <= b[j].end {
            i += 1;
        } else {
            j += 1;
        }
    }
    shared as f64 / smaller as f64
}
