use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::LookupError;

const USER_AGENT: &str = concat!("leadscout/", env!("CARGO_PKG_VERSION"));

/// Blocking JSON client shared by the HTTP-backed providers.
///
/// One call is one attempt: retries belong to `RetryPolicy`, which needs the
/// error classification done here. Transport failures, timeouts, 408, 429
/// and 5xx are `Unavailable`; any other non-success status or an unreadable
/// body is `Malformed`.
#[derive(Debug, Clone)]
pub struct JsonClient {
    http: Client,
    provider: String,
}

impl JsonClient {
    pub fn new(provider: &str, timeout: Duration) -> Result<Self, LookupError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| LookupError::unavailable(provider, e))?;
        Ok(Self {
            http,
            provider: provider.to_string(),
        })
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.http.get(url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.http.post(url)
    }

    pub fn send(&self, request: RequestBuilder) -> Result<Value, LookupError> {
        let response = request
            .send()
            .map_err(|e| LookupError::unavailable(&self.provider, e))?;

        let status = response.status();
        if matches!(status.as_u16(), 408 | 429) || status.is_server_error() {
            let body = response.text().unwrap_or_default();
            return Err(LookupError::unavailable(
                &self.provider,
                format!("HTTP {}: {}", status.as_u16(), snippet(&body)),
            ));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LookupError::malformed(
                &self.provider,
                format!("HTTP {}: {}", status.as_u16(), snippet(&body)),
            ));
        }

        let text = response
            .text()
            .map_err(|e| LookupError::unavailable(&self.provider, e))?;
        debug!(provider = %self.provider, bytes = text.len(), "provider response");
        serde_json::from_str(text.trim_start_matches('\u{feff}'))
            .map_err(|e| LookupError::malformed(&self.provider, format!("{e} (body: {})", snippet(&text))))
    }

    /// Decode a JSON body into the provider's response type.
    pub fn decode<T: DeserializeOwned>(&self, body: Value) -> Result<T, LookupError> {
        serde_json::from_value(body).map_err(|e| LookupError::malformed(&self.provider, e))
    }
}

fn snippet(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map(|(idx, _)| idx)
        .unwrap_or(body.len());
    &body[..end]
}
