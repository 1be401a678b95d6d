//! OpenAI client struct and builder.

use std::future::Future;
use std::time::Duration;

use quine_turn::types::{Completion, ProviderRequest};
use quine_turn::{Provider, ProviderError};

use crate::error::{map_http_status, map_reqwest_error};
use crate::mapping::{from_api_response, to_api_request};

/// Default API base URL.
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Transport timeout, matching the Anthropic client.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Client for OpenAI-style chat completions endpoints.
pub struct OpenAi {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAi {
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

    /// Override the API base URL (proxies, compatible local servers).
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl Provider for OpenAi {
    fn generate(
        &self,
        request: ProviderRequest,
    ) -> impl Future<Output = Result<Completion, ProviderError>> + Send {
        let url = self.completions_url();
        let api_key = self.api_key.clone();
        let http = self.client.clone();

        async move {
            let body = to_api_request(&request);
            tracing::debug!(url = %url, model = %request.model, "sending inference request");

            let response = http
                .post(&url)
                .bearer_auth(&api_key)
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
    fn default_url() {
        let client = OpenAi::new("k");
        assert_eq!(
            client.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn base_url_override() {
        let client = OpenAi::new("k").base_url("http://127.0.0.1:8080/");
        assert_eq!(
            client.completions_url(),
            "http://127.0.0.1:8080/v1/chat/completions"
        );
    }
}
