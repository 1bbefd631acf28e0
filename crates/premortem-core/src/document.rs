//! Input documents
//!
//! A [`Document`] keeps the raw submitted text next to a normalized copy
//! (lowercased, whitespace collapsed) used for matching. Every byte of the
//! normalized text maps back to the raw char it came from, so spans found
//! during matching always resolve to verbatim document text.

use crate::error::AnalysisError;
use premortem_catalog::normalize_text;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Longest accepted context field value, in chars
pub const MAX_CONTEXT_FIELD_CHARS: usize = 500;

/// Sentences longer than this are windowed around the match
const MAX_SENTENCE_BYTES: usize = 400;
const SENTENCE_WINDOW_BYTES: usize = 160;

/// Optional facts supplied alongside the document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentContext {
    /// Expected scale, e.g. "5k QPS at peak"
    pub expected_scale: Option<String>,
    /// Expected data size
    pub expected_data_size: Option<String>,
    /// Latency SLO
    pub latency_slo: Option<String>,
    /// Availability SLO
    pub availability_slo: Option<String>,
    /// Known dependencies
    pub dependencies: Vec<String>,
}

impl DocumentContext {
    /// Trim every field, drop blanks and cap lengths
    #[must_use]
    pub fn cleaned(self) -> Self {
        let clean = |v: Option<String>| v.as_deref().and_then(clean_field);
        Self {
            expected_scale: clean(self.expected_scale),
            expected_data_size: clean(self.expected_data_size),
            latency_slo: clean(self.latency_slo),
            availability_slo: clean(self.availability_slo),
            dependencies: self
                .dependencies
                .iter()
                .map(String::as_str)
                .filter_map(clean_field)
                .collect(),
        }
    }

    /// True when no field is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Set fields as `(label, value)` pairs
    #[must_use]
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        let singles = [
            ("Expected scale", &self.expected_scale),
            ("Expected data size", &self.expected_data_size),
            ("Latency SLO", &self.latency_slo),
            ("Availability SLO", &self.availability_slo),
        ];
        for (label, value) in singles {
            if let Some(v) = value {
                fields.push((label, v.clone()));
            }
        }
        if !self.dependencies.is_empty() {
            fields.push(("Known dependencies", self.dependencies.join(", ")));
        }
        fields
    }

    /// Render as `Label: value` lines
    #[must_use]
    pub fn render(&self) -> String {
        self.fields()
            .iter()
            .map(|(label, value)| format!("{label}: {value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn clean_field(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.chars().take(MAX_CONTEXT_FIELD_CHARS).collect())
    }
}

/// A validated design document
#[derive(Debug, Clone)]
pub struct Document {
    raw: String,
    normalized: String,
    /// For each normalized byte, the raw byte range of the source char
    starts: Vec<usize>,
    ends: Vec<usize>,
    context: DocumentContext,
}

impl Document {
    /// Validate and normalize a document
    ///
    /// # Errors
    /// - [`AnalysisError::InvalidDocument`] for empty or whitespace-only text
    /// - [`AnalysisError::DocumentTooLarge`] above `max_chars`
    pub fn new(
        raw: impl Into<String>,
        context: DocumentContext,
        max_chars: usize,
    ) -> Result<Self, AnalysisError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(AnalysisError::InvalidDocument("document is empty".to_string()));
        }
        let len = raw.chars().count();
        if len > max_chars {
            return Err(AnalysisError::DocumentTooLarge { len, max: max_chars });
        }

        let (normalized, starts, ends) = normalize_with_offsets(&raw);
        debug_assert_eq!(normalized, normalize_text(&raw));

        Ok(Self {
            raw,
            normalized,
            starts,
            ends,
            context: context.cleaned(),
        })
    }

    /// Text as submitted
    #[inline]
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Lowercased, whitespace-collapsed text
    #[inline]
    #[must_use]
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Optional context fields
    #[inline]
    #[must_use]
    pub fn context(&self) -> &DocumentContext {
        &self.context
    }

    /// Length in chars
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.raw.chars().count()
    }

    /// Map a non-empty normalized byte range to the raw byte range it covers
    #[must_use]
    pub fn raw_range(&self, normalized: &Range<usize>) -> Option<Range<usize>> {
        if normalized.start >= normalized.end {
            return None;
        }
        let start = *self.starts.get(normalized.start)?;
        let end = *self.ends.get(normalized.end - 1)?;
        Some(start..end)
    }

    /// Raw range of the sentence (or line) enclosing `span`
    ///
    /// Sentences end at `.`, `!` or `?` followed by whitespace, at a blank
    /// line, or before a list item or heading. Hard-wrapped prose stays one
    /// sentence. Overlong sentences are windowed around the span.
    #[must_use]
    pub fn sentence_around(&self, span: &Range<usize>) -> Range<usize> {
        let raw = self.raw.as_str();

        let mut start = 0;
        for (i, ch) in raw[..span.start].char_indices().rev() {
            let ends_sentence = if ch == '\n' {
                is_block_break(raw, i)
            } else {
                is_terminator(ch) && raw[i + 1..].starts_with(char::is_whitespace)
            };
            if ends_sentence {
                start = i + 1;
                break;
            }
        }

        let mut end = raw.len();
        for (i, ch) in raw[span.end..].char_indices() {
            let at = span.end + i;
            if ch == '\n' && is_block_break(raw, at) {
                end = at;
                break;
            }
            if is_terminator(ch) {
                let rest = &raw[at + 1..];
                if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                    end = at + 1;
                    break;
                }
            }
        }

        let slice = &raw[start..end];
        let lead = slice.len() - slice.trim_start_matches(is_leading_noise).len();
        let trail = slice.len() - slice.trim_end().len();
        let mut start = (start + lead).min(span.start);
        let mut end = (end - trail).max(span.end);

        if end - start > MAX_SENTENCE_BYTES {
            start = floor_boundary(raw, span.start.saturating_sub(SENTENCE_WINDOW_BYTES).max(start));
            end = ceil_boundary(raw, (span.end + SENTENCE_WINDOW_BYTES).min(end));
        }
        start..end
    }

    /// Find `quote` in the document
    ///
    /// Exact matches win; otherwise the quote is matched case- and
    /// whitespace-insensitively and mapped back to the raw text. The returned
    /// range always slices verbatim document text.
    #[must_use]
    pub fn locate(&self, quote: &str) -> Option<Range<usize>> {
        let quote = quote
            .trim()
            .trim_matches(|c: char| matches!(c, '"' | '\u{201c}' | '\u{201d}'))
            .trim();
        if quote.is_empty() {
            return None;
        }
        if let Some(at) = self.raw.find(quote) {
            return Some(at..at + quote.len());
        }
        let needle = normalize_text(quote);
        if needle.is_empty() {
            return None;
        }
        let at = self.normalized.find(&needle)?;
        self.raw_range(&(at..at + needle.len()))
    }

    /// Excerpt around `spans`, windows merged, capped at `max_chars`
    ///
    /// With no spans, the start of the document is returned.
    #[must_use]
    pub fn excerpt(&self, spans: &[Range<usize>], window: usize, max_chars: usize) -> String {
        let raw = self.raw.as_str();
        if spans.is_empty() {
            return raw.chars().take(max_chars).collect();
        }

        let mut windows: Vec<Range<usize>> = spans
            .iter()
            .map(|s| {
                floor_boundary(raw, s.start.saturating_sub(window))
                    ..ceil_boundary(raw, (s.end + window).min(raw.len()))
            })
            .collect();
        windows.sort_by_key(|w| w.start);

        let mut merged: Vec<Range<usize>> = Vec::with_capacity(windows.len());
        for w in windows {
            match merged.last_mut() {
                Some(last) if w.start <= last.end => last.end = last.end.max(w.end),
                _ => merged.push(w),
            }
        }

        let text = merged
            .iter()
            .map(|w| raw[w.clone()].trim())
            .collect::<Vec<_>>()
            .join("\n...\n");
        text.chars().take(max_chars).collect()
    }
}

fn is_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?')
}

/// True when the newline at `at` separates blocks rather than wrapping prose
fn is_block_break(raw: &str, at: usize) -> bool {
    let next = raw[at + 1..].trim_start_matches([' ', '\t', '\r']);
    let prev_line = raw[..at].rsplit('\n').next().unwrap_or("").trim();
    next.is_empty()
        || next.starts_with(['\n', '-', '*', '#', '>', '|', '\u{2022}'])
        || is_numbered_item(next)
        || prev_line.is_empty()
        || prev_line.starts_with('#')
        || prev_line.ends_with(':')
}

fn is_numbered_item(line: &str) -> bool {
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    digits > 0 && line[digits..].starts_with(['.', ')'])
}

fn is_leading_noise(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '-' | '*' | '#' | '>' | '\u{2022}')
}

fn floor_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i.min(s.len())
}

/// Normalize like [`normalize_text`], recording each output byte's source char.
fn normalize_with_offsets(raw: &str) -> (String, Vec<usize>, Vec<usize>) {
    let mut out = String::with_capacity(raw.len());
    let mut starts = Vec::with_capacity(raw.len());
    let mut ends = Vec::with_capacity(raw.len());
    let mut gap: Option<(usize, usize)> = None;

    for (i, ch) in raw.char_indices() {
        let end = i + ch.len_utf8();
        if ch.is_whitespace() {
            if !out.is_empty() && gap.is_none() {
                gap = Some((i, end));
            }
            continue;
        }
        if let Some((gs, ge)) = gap.take() {
            out.push(' ');
            starts.push(gs);
            ends.push(ge);
        }
        for lower in ch.to_lowercase() {
            out.push(lower);
            for _ in 0..lower.len_utf8() {
                starts.push(i);
                ends.push(end);
            }
        }
    }
    (out, starts, ends)
}
