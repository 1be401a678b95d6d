//! Retry with exponential backoff and jitter.

use std::time::Duration;

use crate::error::ProviderError;
use crate::provider::Provider;
use crate::types::{Completion, ProviderRequest};

/// Backoff base in milliseconds; doubles per attempt.
const BACKOFF_BASE_MS: u64 = 500;

/// Delay before retry number `attempt` (0-based): `base * 2^attempt` plus
/// uniform jitter in `[0, base/2)`.
#[must_use]
pub fn backoff_delay(attempt: u32) -> Duration {
    let base = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.min(6));
    let jitter = rand::random::<u64>() % (base / 2).max(1);
    Duration::from_millis(base + jitter)
}

/// Run one inference, retrying per the error's retry budget.
///
/// The budget is taken from the first error's class; a request that keeps
/// failing with different classes is bounded by each class's own budget
/// as it goes.
pub async fn generate_with_retry<P: Provider>(
    provider: &P,
    request: ProviderRequest,
) -> Result<Completion, ProviderError> {
    let mut attempt: u32 = 0;
    loop {
        match provider.generate(request.clone()).await {
            Ok(completion) => return Ok(completion),
            Err(error) => {
                if attempt >= error.retry_budget() {
                    return Err(error);
                }
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "inference failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quine_tape::Message;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: "m".into(),
            messages: vec![Message::user("hi")],
            tools: vec![],
            max_tokens: 64,
        }
    }

    fn completion() -> Completion {
        Completion {
            message: Message::assistant("ok", vec![]),
            usage: crate::types::TokenUsage { input_tokens: 1, output_tokens: 1 },
        }
    }

    struct ScriptedProvider {
        errors: Mutex<Vec<ProviderError>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn failing_n_times(errors: Vec<ProviderError>) -> Self {
            Self {
                errors: Mutex::new(errors),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Provider for ScriptedProvider {
        fn generate(
            &self,
            _request: ProviderRequest,
        ) -> impl std::future::Future<Output = Result<Completion, ProviderError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.errors.lock().unwrap().pop();
            async move {
                match next {
                    Some(err) => Err(err),
                    None => Ok(completion()),
                }
            }
        }
    }

    #[test]
    fn backoff_grows_and_stays_bounded() {
        for attempt in 0..4 {
            let lo = Duration::from_millis(BACKOFF_BASE_MS << attempt);
            let hi = lo + Duration::from_millis((BACKOFF_BASE_MS << attempt) / 2);
            let d = backoff_delay(attempt);
            assert!(d >= lo, "attempt {attempt}: {d:?} < {lo:?}");
            assert!(d < hi, "attempt {attempt}: {d:?} >= {hi:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried() {
        let provider = ScriptedProvider::failing_n_times(vec![
            ProviderError::Server("502".into()),
            ProviderError::Server("503".into()),
        ]);
        let result = generate_with_retry(&provider, request()).await;
        assert!(result.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn auth_errors_fail_immediately() {
        let provider =
            ScriptedProvider::failing_n_times(vec![ProviderError::Authentication("401".into())]);
        let result = generate_with_retry(&provider, request()).await;
        assert!(matches!(result, Err(ProviderError::Authentication(_))));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn context_overflow_fails_immediately() {
        let provider =
            ScriptedProvider::failing_n_times(vec![ProviderError::ContextOverflow("full".into())]);
        let result = generate_with_retry(&provider, request()).await;
        assert!(matches!(result, Err(ProviderError::ContextOverflow(_))));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn opaque_errors_retry_once() {
        let provider = ScriptedProvider::failing_n_times(vec![
            ProviderError::Other("a".into()),
            ProviderError::Other("b".into()),
        ]);
        let result = generate_with_retry(&provider, request()).await;
        assert!(matches!(result, Err(ProviderError::Other(_))));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
