//! Normalized API error shape
//!
//! Every failure that crosses the HTTP boundary is converted into one uniform
//! `{message, status code, reason}` value. Callers never see a raw transport
//! error or a raw response body.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Uniform error surfaced to module callers.
///
/// Serialized into reports under the keys `Message`, `Status Code`, `Reason`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorShape {
    #[serde(rename = "Message")]
    pub message: String,
    /// HTTP status code; 0 for failures that never got a response
    /// (connect/timeout/decode) and for locally-computed failures.
    #[serde(rename = "Status Code")]
    pub status_code: u16,
    #[serde(rename = "Reason")]
    pub reason: String,
}

impl ErrorShape {
    /// Normalize an HTTP error response.
    ///
    /// The DigitalOcean API returns `{"id": "...", "message": "..."}` bodies;
    /// the `id` becomes the reason when present, otherwise the canonical
    /// reason phrase for the status code is used.
    pub fn from_response(status_code: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();

        let message = parsed
            .as_ref()
            .and_then(|v| v.get("message"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    canonical_reason(status_code).to_string()
                } else {
                    body.trim().to_string()
                }
            });

        let reason = parsed
            .as_ref()
            .and_then(|v| v.get("id"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| canonical_reason(status_code).to_string());

        Self {
            message,
            status_code,
            reason,
        }
    }

    /// A failure that never produced an HTTP response.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: 0,
            reason: "client".to_string(),
        }
    }

    /// Parameter validation failure, raised before any network call.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: 0,
            reason: "invalid parameters".to_string(),
        }
    }

    /// Locally-computed ambiguous-match condition (not a backend error).
    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: 0,
            reason: "ambiguous match".to_string(),
        }
    }

    /// Poll deadline elapsed while the action was still non-terminal.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: 0,
            reason: "timeout".to_string(),
        }
    }

    /// The backend finished the action with status `errored`.
    pub fn action_errored(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: 0,
            reason: "action errored".to_string(),
        }
    }

    /// A response that parsed as JSON but did not carry the expected payload.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: 0,
            reason: "malformed response".to_string(),
        }
    }

    /// True for 422 responses, the only status the idempotent create rescue
    /// inspects.
    pub fn is_unprocessable(&self) -> bool {
        self.status_code == 422
    }
}

impl fmt::Display for ErrorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (status={}, reason={})",
            self.message, self.status_code, self.reason
        )
    }
}

impl std::error::Error for ErrorShape {}

impl From<reqwest::Error> for ErrorShape {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self {
                message: e.to_string(),
                status_code: status.as_u16(),
                reason: canonical_reason(status.as_u16()).to_string(),
            },
            None => Self::transport(e.to_string()),
        }
    }
}

/// Canonical reason phrase for common API status codes.
fn canonical_reason(status_code: u16) -> &'static str {
    match status_code {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "HTTP error",
    }
}
