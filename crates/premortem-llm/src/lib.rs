//! Premortem LLM
//!
//! Provider-agnostic access to a text-completion backend:
//! - [`CompletionService`]: the only capability the engine depends on
//! - [`RetryPolicy`] / [`with_retry`]: bounded exponential backoff for transient failures
//! - [`parse_json`]: strict decoding of untrusted model output
//! - [`OllamaClient`]: an HTTP backend for Ollama-compatible servers

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod ollama;
pub mod response;
pub mod retry;
pub mod service;

pub use ollama::{OllamaClient, OllamaConfig};
pub use response::{parse_json, strip_code_fence, unit_score};
pub use retry::{with_retry, RetryPolicy};
pub use service::{complete_bounded, CompletionError, CompletionService};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
