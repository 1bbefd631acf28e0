//! Completion service abstraction
//!
//! The analysis engine only needs `complete(prompt, timeout) -> text`. Any
//! backend (HTTP model server, in-process fake) implements
//! [`CompletionService`]; the engine never sees the concrete type.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Completion failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    /// Backend unreachable or returned a server-side error
    #[error("completion service unavailable: {0}")]
    Unavailable(String),

    /// Call exceeded its timeout
    #[error("completion timed out after {after_ms}ms")]
    Timeout {
        /// Timeout that elapsed
        after_ms: u64,
    },

    /// Response did not have the expected shape
    #[error("unparsable completion: {0}")]
    Parse(String),
}

impl CompletionError {
    /// Transient failures that another attempt may fix
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }

    /// Create timeout error from a duration
    #[inline]
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout {
            after_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// A generic text-completion capability
///
/// Implementations must be thread-safe (Send + Sync); one instance serves
/// every concurrent analysis.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Complete `prompt`, giving up after `timeout`
    ///
    /// # Errors
    /// - [`CompletionError::Unavailable`] if the backend cannot be reached
    /// - [`CompletionError::Timeout`] if the backend is too slow
    /// - [`CompletionError::Parse`] if the backend reply is not a completion
    async fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, CompletionError>;

    /// Identifier of the model behind this service (for version stamps)
    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: CompletionService + ?Sized> CompletionService for Arc<T> {
    async fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, CompletionError> {
        (**self).complete(prompt, timeout).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// Call `service` with a hard timeout, even if the backend ignores its own.
///
/// # Errors
/// Whatever the backend returns, or [`CompletionError::Timeout`].
pub async fn complete_bounded(
    service: &dyn CompletionService,
    prompt: &str,
    timeout: Duration,
) -> Result<String, CompletionError> {
    match tokio::time::timeout(timeout, service.complete(prompt, timeout)).await {
        Ok(result) => result,
        Err(_) => Err(CompletionError::timeout(timeout)),
    }
}
