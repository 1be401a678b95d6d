//! Anthropic client struct and builder.

use std::future::Future;
use std::time::Duration;

use quine_turn::types::{Completion, ProviderRequest};
use quine_turn::{Provider, ProviderError};

use crate::error::{map_http_status, map_reqwest_error};
use crate::mapping::{from_api_response, to_api_request};

/// Default API base URL.
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Messages API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Transport timeout. Long inferences are normal; transport-level hangs
/// beyond this are classified as network errors and retried.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Client for the Anthropic Messages API.
pub struct Anthropic {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl Anthropic {
    /// Create a client with the given credential.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Override the API base URL (proxies, mock servers).
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

impl Provider for Anthropic {
    fn generate(
        &self,
        request: ProviderRequest,
    ) -> impl Future<Output = Result<Completion, ProviderError>> + Send {
        let url = self.messages_url();
        let api_key = self.api_key.clone();
        let http = self.client.clone();

        async move {
            let body = to_api_request(&request);
            tracing::debug!(url = %url, model = %request.model, "sending inference request");

            let response = http
                .post(&url)
                .header("x-api-key", &api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(map_reqwest_error)?;

            let status = response.status();
            let text = response.text().await.map_err(map_reqwest_error)?;

            if !status.is_success() {
                return Err(map_http_status(status, &text));
            }

            let json: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| ProviderError::InvalidResponse(format!("bad JSON: {e}")))?;
            from_api_response(&json)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_url() {
        let client = Anthropic::new("k");
        assert_eq!(client.messages_url(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn base_url_override_tolerates_trailing_slash() {
        let client = Anthropic::new("k").base_url("http://localhost:9999/");
        assert_eq!(client.messages_url(), "http://localhost:9999/v1/messages");
    }
}
