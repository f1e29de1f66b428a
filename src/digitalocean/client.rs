//! DigitalOcean client
//!
//! Main client for interacting with the DigitalOcean v2 API, combining token
//! auth, the HTTP wrapper, URL building, pagination, and action polling.

use super::error::ErrorShape;
use super::http::DoHttp;
use crate::resource::poll::{await_terminal, ActionHandle, PollOutcome};
use crate::resource::page::paginate;
use serde_json::Value;
use std::time::Duration;

/// Public API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.digitalocean.com/v2";

/// Default page size for list requests. The API caps `per_page` at 200.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Constructed-client knobs, all overridable per invocation via
/// `client_override_options`.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub page_size: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: format!("dostate/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ClientOptions {
    /// Splice a `client_override_options` object into these options.
    ///
    /// Unknown keys are rejected so a typo does not silently fall through to
    /// the defaults.
    pub fn apply_overrides(&mut self, overrides: &Value) -> Result<(), ErrorShape> {
        let Some(map) = overrides.as_object() else {
            return Err(ErrorShape::invalid_params(
                "client_override_options must be an object",
            ));
        };

        for (key, value) in map {
            match key.as_str() {
                "base_url" => {
                    self.base_url = expect_str(key, value)?.to_string();
                }
                "user_agent" => {
                    self.user_agent = expect_str(key, value)?.to_string();
                }
                "request_timeout" => {
                    let secs = value.as_u64().ok_or_else(|| {
                        ErrorShape::invalid_params("request_timeout must be a number of seconds")
                    })?;
                    self.request_timeout = Duration::from_secs(secs);
                }
                "page_size" => {
                    let size = value.as_u64().filter(|s| (1..=200).contains(s)).ok_or_else(
                        || ErrorShape::invalid_params("page_size must be between 1 and 200"),
                    )?;
                    self.page_size = size as u32;
                }
                other => {
                    return Err(ErrorShape::invalid_params(format!(
                        "unknown client_override_options key: {other}"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn expect_str<'a>(key: &str, value: &'a Value) -> Result<&'a str, ErrorShape> {
    value
        .as_str()
        .ok_or_else(|| ErrorShape::invalid_params(format!("{key} must be a string")))
}

/// Main DigitalOcean client
#[derive(Clone)]
pub struct DoClient {
    http: DoHttp,
    opts: ClientOptions,
}

impl DoClient {
    pub fn new(token: &str, opts: ClientOptions) -> Result<Self, ErrorShape> {
        let http = DoHttp::new(token, &opts.user_agent, opts.request_timeout)?;
        Ok(Self { http, opts })
    }

    pub fn page_size(&self) -> u32 {
        self.opts.page_size
    }

    /// Build a full API URL for a resource path.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.opts.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub async fn get(&self, path: &str) -> Result<Value, ErrorShape> {
        self.http.get(&self.url(path)).await
    }

    pub async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value, ErrorShape> {
        self.http.post(&self.url(path), body).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, ErrorShape> {
        self.http.put(&self.url(path), body).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ErrorShape> {
        self.http.delete(&self.url(path)).await
    }

    /// Walk a list endpoint to completion (or to `limit` items), returning
    /// the records found under `result_key` across all pages in order.
    ///
    /// `query` pairs are forwarded verbatim on every page request.
    pub async fn get_paginated(
        &self,
        path: &str,
        result_key: &str,
        query: &[(&str, String)],
        limit: Option<usize>,
    ) -> Result<Vec<Value>, ErrorShape> {
        let mut extra = String::new();
        for (key, value) in query {
            extra.push_str(&format!("&{}={}", key, urlencoding::encode(value)));
        }

        paginate(
            |page| {
                let url = format!(
                    "{}?page={}&per_page={}{}",
                    self.url(path),
                    page,
                    self.opts.page_size,
                    extra
                );
                async move { self.http.get(&url).await }
            },
            result_key,
            limit,
        )
        .await
    }

    /// Re-fetch an action record by id.
    pub async fn fetch_action(&self, action_id: u64) -> Result<ActionHandle, ErrorShape> {
        let response = self.get(&format!("actions/{action_id}")).await?;
        ActionHandle::from_record(unwrap_key(&response, "action")?)
    }

    /// Submit a state-changing request that answers with an action record
    /// (e.g. `droplets/{id}/actions`).
    pub async fn submit_action(&self, path: &str, body: &Value) -> Result<ActionHandle, ErrorShape> {
        let response = self.post(path, Some(body)).await?;
        ActionHandle::from_record(unwrap_key(&response, "action")?)
    }

    /// Poll an already-submitted action until terminal status or deadline.
    pub async fn await_action(
        &self,
        initial: ActionHandle,
        timeout: Duration,
        interval: Duration,
    ) -> Result<PollOutcome, ErrorShape> {
        let action_id = initial.id;
        await_terminal(
            || self.fetch_action(action_id),
            initial,
            timeout,
            interval,
        )
        .await
    }
}

/// Pull a named record out of a response envelope.
pub fn unwrap_key<'a>(response: &'a Value, key: &str) -> Result<&'a Value, ErrorShape> {
    response
        .get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| ErrorShape::malformed(format!("response has no {key:?} payload")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_joins_without_duplicate_slashes() {
        let opts = ClientOptions {
            base_url: "https://api.example.com/v2/".to_string(),
            ..ClientOptions::default()
        };
        let client = DoClient::new("tok", opts).unwrap();
        assert_eq!(
            client.url("/droplets"),
            "https://api.example.com/v2/droplets"
        );
    }

    #[test]
    fn overrides_splice_into_options() {
        let mut opts = ClientOptions::default();
        opts.apply_overrides(&json!({
            "base_url": "http://localhost:4010",
            "page_size": 2,
            "request_timeout": 5,
        }))
        .unwrap();
        assert_eq!(opts.base_url, "http://localhost:4010");
        assert_eq!(opts.page_size, 2);
        assert_eq!(opts.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn unknown_override_key_is_rejected() {
        let mut opts = ClientOptions::default();
        let err = opts.apply_overrides(&json!({"bse_url": "x"})).unwrap_err();
        assert_eq!(err.reason, "invalid parameters");
    }

    #[test]
    fn unwrap_key_rejects_missing_payload() {
        let err = unwrap_key(&json!({"droplet": {}}), "action").unwrap_err();
        assert_eq!(err.reason, "malformed response");
    }
}
