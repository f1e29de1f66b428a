//! HTTP utilities for DigitalOcean REST API calls

use super::error::ErrorShape;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        format!(
            "{}... [truncated, {} bytes total]",
            &body[..MAX_LOG_BODY_LENGTH],
            body.len()
        )
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for DigitalOcean API calls
///
/// Every method returns `Result<Value, ErrorShape>`: the rest of the crate
/// never handles a raw `reqwest::Error` or an unnormalized error body.
#[derive(Clone)]
pub struct DoHttp {
    client: Client,
    token: String,
}

impl DoHttp {
    /// Create a new HTTP client with a fixed bearer token.
    pub fn new(
        token: &str,
        user_agent: &str,
        request_timeout: Duration,
    ) -> Result<Self, ErrorShape> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ErrorShape::transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            token: token.to_string(),
        })
    }

    /// Make a GET request
    pub async fn get(&self, url: &str) -> Result<Value, ErrorShape> {
        tracing::debug!("GET {}", url);
        self.execute(self.client.request(Method::GET, url)).await
    }

    /// Make a POST request with an optional JSON body
    pub async fn post(&self, url: &str, body: Option<&Value>) -> Result<Value, ErrorShape> {
        tracing::debug!("POST {}", url);
        let mut request = self.client.request(Method::POST, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.execute(request).await
    }

    /// Make a PUT request with a JSON body
    pub async fn put(&self, url: &str, body: &Value) -> Result<Value, ErrorShape> {
        tracing::debug!("PUT {}", url);
        self.execute(self.client.request(Method::PUT, url).json(body))
            .await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str) -> Result<Value, ErrorShape> {
        tracing::debug!("DELETE {}", url);
        self.execute(self.client.request(Method::DELETE, url)).await
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Value, ErrorShape> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(ErrorShape::from)?;

        let status = response.status();
        let body = response.text().await.map_err(ErrorShape::from)?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(ErrorShape::from_response(status.as_u16(), &body));
        }

        // 204 responses and action submissions can come back empty
        if body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body)
            .map_err(|e| ErrorShape::malformed(format!("failed to parse response JSON: {e}")))
    }
}
