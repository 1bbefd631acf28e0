//! Compiled signal matchers
//!
//! A signal phrase matches on word boundaries in normalized text. Spaces and
//! hyphens inside a phrase are interchangeable, and the final token tolerates
//! simple plurals ("circuit breaker" matches "circuit breakers", "dependency"
//! matches "dependencies").

use crate::error::RecordError;
use regex::Regex;
use std::ops::Range;

/// Lowercase and collapse all whitespace runs to a single space.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.extend(word.chars().flat_map(char::to_lowercase));
    }
    out
}

/// A signal phrase compiled into a boundary-aware regex
#[derive(Debug, Clone)]
pub struct SignalMatcher {
    phrase: String,
    regex: Regex,
    weight: f64,
}

impl SignalMatcher {
    /// Compile a phrase. The phrase is normalized first.
    ///
    /// # Errors
    /// Returns [`RecordError::InvalidSignal`] for blank phrases or regex failures.
    pub fn compile(phrase: &str) -> Result<Self, RecordError> {
        let phrase = normalize_text(phrase);
        let tokens: Vec<&str> = phrase
            .split(|c: char| c == ' ' || c == '-')
            .filter(|t| !t.is_empty())
            .collect();
        let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
            return Err(RecordError::InvalidSignal {
                phrase,
                reason: "blank phrase".to_string(),
            });
        };

        let starts_word = first.chars().next().is_some_and(is_word_char);
        let ends_word = last.chars().last().is_some_and(is_word_char);

        let mut body: Vec<String> = tokens.iter().map(|t| regex::escape(t)).collect();
        if ends_word {
            if let Some(tail) = body.last_mut() {
                *tail = pluralize(last);
            }
        }

        let pattern = format!(
            "(?i){}{}{}",
            if starts_word { r"\b" } else { "" },
            body.join(r"[ \-]"),
            if ends_word { r"\b" } else { "" },
        );

        let regex = Regex::new(&pattern).map_err(|e| RecordError::InvalidSignal {
            phrase: phrase.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            phrase,
            regex,
            weight: 1.0,
        })
    }

    /// Normalized phrase
    #[inline]
    #[must_use]
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    /// Catalog-wide specificity weight (rarer signals weigh more)
    #[inline]
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.weight
    }

    #[inline]
    pub(crate) fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    /// Check whether the phrase occurs in `haystack`
    #[inline]
    #[must_use]
    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }

    /// Byte ranges of every occurrence in `haystack`
    pub fn find_ranges(&self, haystack: &str) -> Vec<Range<usize>> {
        self.regex.find_iter(haystack).map(|m| m.range()).collect()
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Escaped final token with plural tolerance.
fn pluralize(token: &str) -> String {
    let mut chars = token.chars().rev();
    let ends_consonant_y = matches!(
        (chars.next(), chars.next()),
        (Some('y'), Some(c)) if !"aeiou".contains(c)
    );
    if ends_consonant_y {
        let stem = &token[..token.len() - 1];
        format!("{}(?:y|ies)", regex::escape(stem))
    } else {
        format!("{}(?:e?s)?", regex::escape(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_and_lowercases() {
        assert_eq!(normalize_text("  No   Circuit\n\tBreakers "), "no circuit breakers");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn matches_on_word_boundaries() {
        let m = SignalMatcher::compile("retry").unwrap();
        assert!(m.is_match("we retry 3 times"));
        assert!(!m.is_match("the retrying client"));
        assert!(m.is_match("bounded retries"));
    }

    #[test]
    fn tolerates_plurals_and_hyphens() {
        let m = SignalMatcher::compile("Circuit Breaker").unwrap();
        assert!(m.is_match("no circuit breakers anywhere"));
        assert!(m.is_match("a circuit-breaker wraps calls"));

        let m = SignalMatcher::compile("client-side retry").unwrap();
        assert!(m.is_match("client side retry is enabled"));
    }

    #[test]
    fn find_ranges_reports_every_occurrence() {
        let m = SignalMatcher::compile("queue").unwrap();
        let text = "queue a, then queues b";
        let ranges = m.find_ranges(text);
        assert_eq!(ranges.len(), 2);
        assert_eq!(&text[ranges[0].clone()], "queue");
        assert_eq!(&text[ranges[1].clone()], "queues");
    }

    #[test]
    fn non_word_edges_do_not_require_boundaries() {
        let m = SignalMatcher::compile("99.9%").unwrap();
        assert!(m.is_match("targets 99.9% uptime"));
    }

    #[test]
    fn blank_phrase_is_rejected() {
        assert!(matches!(
            SignalMatcher::compile("   "),
            Err(RecordError::InvalidSignal { .. })
        ));
    }
}
