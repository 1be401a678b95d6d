//! Provider error taxonomy.
//!
//! The turn loop decides session fate from these variants, so the
//! classification here is part of the runtime's behavior contract, not
//! provider trivia.

use thiserror::Error;

/// Errors from LLM providers.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network-level failure (connection reset, DNS, transport timeout).
    #[error("network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// HTTP 429.
    #[error("rate limited")]
    RateLimited,

    /// HTTP 5xx.
    #[error("server error: {0}")]
    Server(String),

    /// HTTP 401/403. Fatal to the session.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The conversation no longer fits the model's context window.
    /// Fatal to the session with termination-mode context-exhaustion.
    #[error("context window exhausted: {0}")]
    ContextOverflow(String),

    /// The provider's response could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Anything else.
    #[error("provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Whether retrying might succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.retry_budget() > 0
    }

    /// How many retries this error class is worth.
    #[must_use]
    pub fn retry_budget(&self) -> u32 {
        match self {
            Self::RateLimited => 5,
            Self::Server(_) | Self::Network(_) => 3,
            Self::InvalidResponse(_) | Self::Other(_) => 1,
            Self::Authentication(_) | Self::ContextOverflow(_) => 0,
        }
    }

    /// Whether this error is fatal because the context window is spent.
    #[must_use]
    pub fn is_context_overflow(&self) -> bool {
        matches!(self, Self::ContextOverflow(_))
    }
}

/// Whether an error body reads as a context-length failure.
///
/// Providers phrase this differently; the patterns here cover the
/// OpenAI-style code, the Anthropic-style prose, and the generic forms.
#[must_use]
pub fn is_context_overflow_body(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("context_length_exceeded")
        || lower.contains("context length")
        || lower.contains("too many tokens")
        || lower.contains("prompt is too long")
        || lower.contains("maximum context")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_budgets_follow_classification() {
        assert_eq!(ProviderError::RateLimited.retry_budget(), 5);
        assert_eq!(ProviderError::Server("500".into()).retry_budget(), 3);
        assert_eq!(
            ProviderError::Network("reset".to_string().into()).retry_budget(),
            3
        );
        assert_eq!(ProviderError::Other("??".into()).retry_budget(), 1);
        assert_eq!(ProviderError::Authentication("401".into()).retry_budget(), 0);
        assert_eq!(ProviderError::ContextOverflow("full".into()).retry_budget(), 0);
    }

    #[test]
    fn terminal_errors_are_not_retryable() {
        assert!(!ProviderError::Authentication("no".into()).is_retryable());
        assert!(!ProviderError::ContextOverflow("full".into()).is_retryable());
        assert!(ProviderError::RateLimited.is_retryable());
    }

    #[test]
    fn overflow_body_detection() {
        assert!(is_context_overflow_body(
            r#"{"error":{"code":"context_length_exceeded"}}"#
        ));
        assert!(is_context_overflow_body("Prompt is too long: 210000 tokens"));
        assert!(is_context_overflow_body("request exceeds maximum context"));
        assert!(is_context_overflow_body("too many tokens for this model"));
        assert!(!is_context_overflow_body("invalid api key"));
    }
}
