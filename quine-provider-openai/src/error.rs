//! HTTP-to-[`ProviderError`] mapping for the OpenAI dialect.

use quine_turn::ProviderError;
use quine_turn::error::is_context_overflow_body;

/// Map an HTTP status and error body to a [`ProviderError`].
///
/// The dialect reports context exhaustion as a 400 with code
/// `context_length_exceeded`, so the body is sniffed first.
pub(crate) fn map_http_status(status: reqwest::StatusCode, body: &str) -> ProviderError {
    if is_context_overflow_body(body) {
        return ProviderError::ContextOverflow(body.to_string());
    }
    match status.as_u16() {
        401 | 403 => ProviderError::Authentication(body.to_string()),
        429 => ProviderError::RateLimited,
        500..=599 => ProviderError::Server(format!("HTTP {status}: {body}")),
        _ => ProviderError::Other(format!("HTTP {status}: {body}")),
    }
}

/// Map a transport error to a [`ProviderError`].
pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ProviderError {
    ProviderError::Network(Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn context_length_code_detected_on_400() {
        let err = map_http_status(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"code":"context_length_exceeded","message":"..."}}"#,
        );
        assert!(matches!(err, ProviderError::ContextOverflow(_)));
    }

    #[test]
    fn status_classes() {
        assert!(matches!(
            map_http_status(StatusCode::UNAUTHORIZED, "x"),
            ProviderError::Authentication(_)
        ));
        assert!(matches!(
            map_http_status(StatusCode::TOO_MANY_REQUESTS, "x"),
            ProviderError::RateLimited
        ));
        assert!(matches!(
            map_http_status(StatusCode::BAD_GATEWAY, "x"),
            ProviderError::Server(_)
        ));
        assert!(matches!(
            map_http_status(StatusCode::NOT_FOUND, "x"),
            ProviderError::Other(_)
        ));
    }
}
