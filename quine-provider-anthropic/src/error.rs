//! HTTP-to-[`ProviderError`] mapping for the Anthropic dialect.

use quine_turn::ProviderError;
use quine_turn::error::is_context_overflow_body;

/// Map an HTTP status and error body to a [`ProviderError`].
///
/// Context-length failures arrive as 400s with explanatory prose, so the
/// body is sniffed before the status is consulted.
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
    fn auth_statuses() {
        assert!(matches!(
            map_http_status(StatusCode::UNAUTHORIZED, "bad key"),
            ProviderError::Authentication(_)
        ));
        assert!(matches!(
            map_http_status(StatusCode::FORBIDDEN, "no"),
            ProviderError::Authentication(_)
        ));
    }

    #[test]
    fn rate_limit_status() {
        assert!(matches!(
            map_http_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ProviderError::RateLimited
        ));
    }

    #[test]
    fn server_errors_cover_5xx() {
        for code in [500u16, 503, 529] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(matches!(
                map_http_status(status, "overloaded"),
                ProviderError::Server(_)
            ));
        }
    }

    #[test]
    fn overflow_body_wins_over_status() {
        let err = map_http_status(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"type":"invalid_request_error","message":"prompt is too long: 210000 tokens > 200000 maximum"}}"#,
        );
        assert!(matches!(err, ProviderError::ContextOverflow(_)));
    }

    #[test]
    fn other_4xx_is_opaque() {
        assert!(matches!(
            map_http_status(StatusCode::BAD_REQUEST, "malformed"),
            ProviderError::Other(_)
        ));
    }
}
