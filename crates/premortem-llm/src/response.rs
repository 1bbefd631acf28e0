//! Untrusted response handling
//!
//! Model output is treated as hostile input: markdown fences are unwrapped,
//! then the body must decode into the caller's schema type. Anything else is a
//! [`CompletionError::Parse`], which is never retried.

use crate::service::CompletionError;
use serde::de::DeserializeOwned;

/// Remove a surrounding markdown code fence (```` ```json ... ``` ````), if any.
#[must_use]
pub fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        body = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
        body = body.strip_suffix("```").unwrap_or(body);
    }
    body.trim()
}

/// Decode a completion into `T`
///
/// # Errors
/// [`CompletionError::Parse`] when the body is empty, not JSON, or not `T`.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, CompletionError> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(CompletionError::Parse("empty completion".to_string()));
    }
    serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(80).collect();
        CompletionError::Parse(format!("{e} (response starts: {preview:?})"))
    })
}

/// Check a model-provided score lies in `[0, 1]`
///
/// # Errors
/// [`CompletionError::Parse`] for NaN or out-of-range values.
pub fn unit_score(value: f64) -> Result<f64, CompletionError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(CompletionError::Parse(format!("score {value} outside [0, 1]")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Reply {
        score: f64,
    }

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n[]\n```"), "[]");
        assert_eq!(strip_code_fence("  {}  "), "{}");
    }

    #[test]
    fn parse_json_accepts_schema() {
        let reply: Reply = parse_json("```json\n{\"score\": 0.5}\n```").unwrap();
        assert_eq!(reply, Reply { score: 0.5 });
    }

    #[test]
    fn parse_json_rejects_wrong_shapes() {
        assert!(matches!(parse_json::<Reply>("I think 0.5"), Err(CompletionError::Parse(_))));
        assert!(matches!(parse_json::<Reply>("{\"score\": \"high\"}"), Err(CompletionError::Parse(_))));
        assert!(matches!(parse_json::<Reply>("   "), Err(CompletionError::Parse(_))));
    }

    #[test]
    fn unit_score_bounds() {
        assert_eq!(unit_score(0.0), Ok(0.0));
        assert_eq!(unit_score(1.0), Ok(1.0));
        assert!(unit_score(1.2).is_err());
        assert!(unit_score(f64::NAN).is_err());
    }
}
