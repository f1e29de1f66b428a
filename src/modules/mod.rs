//! Declarative modules
//!
//! Each module applies a present/absent intent to exactly one logical
//! resource: validate parameters, resolve the current state, issue at most
//! one mutation, poll its action when the backend executes asynchronously,
//! and produce a structured report.
//!
//! # Module Structure
//!
//! - [`droplet`] - Droplet present/absent with create-action polling
//! - [`droplet_action`] - one-shot Droplet actions (power, snapshot, resize)
//! - [`ssh_key`] - SSH key present/absent with the 422 idempotent-create rescue
//! - [`floating_ip`] - Floating IP present/absent and reassignment
//! - [`volume`] - block storage volume present/absent
//! - [`tag`] - tag present/absent
//! - [`domain`] - domain present/absent
//! - [`snapshot`] - snapshot deletion
//! - [`info`] - read-only listings (regions, sizes, images, actions)

pub mod domain;
pub mod droplet;
pub mod droplet_action;
pub mod floating_ip;
pub mod info;
pub mod snapshot;
pub mod ssh_key;
pub mod tag;
pub mod volume;

use crate::config::Config;
use crate::digitalocean::auth;
use crate::digitalocean::client::DoClient;
use crate::digitalocean::error::ErrorShape;
use crate::resource::resolve::{resolve, Intent, LookupFilter, MatchOutcome};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// Names of all runnable modules.
pub const MODULE_NAMES: &[&str] = &[
    "droplet",
    "droplet_action",
    "ssh_key",
    "floating_ip",
    "volume",
    "tag",
    "domain",
    "snapshot",
    "region_info",
    "size_info",
    "image_info",
    "action_info",
];

/// Parameters shared by every module, extracted from the same object the
/// module-specific fields live in.
#[derive(Debug, Deserialize)]
pub struct CommonParams {
    #[serde(default)]
    pub state: Intent,
    /// Action polling budget in seconds. Default 300.
    pub timeout: Option<u64>,
    /// Seconds between polls. Default 10.
    pub poll_interval: Option<u64>,
    pub token: Option<String>,
    pub client_override_options: Option<Value>,
    pub module_override_options: Option<Value>,
}

/// Everything a module needs for one invocation.
pub struct ModuleCtx {
    pub client: DoClient,
    pub state: Intent,
    pub check_mode: bool,
    pub timeout: Duration,
    pub poll_interval: Duration,
    overrides: Option<Value>,
}

impl ModuleCtx {
    /// Splice `module_override_options` into an outgoing request body.
    /// Applied last, so overrides win over module-built fields.
    pub fn splice_overrides(&self, body: &mut Value) -> Result<(), ErrorShape> {
        let Some(overrides) = &self.overrides else {
            return Ok(());
        };
        let Some(extra) = overrides.as_object() else {
            return Err(ErrorShape::invalid_params(
                "module_override_options must be an object",
            ));
        };
        let Some(target) = body.as_object_mut() else {
            return Err(ErrorShape::invalid_params(
                "module_override_options can only splice into an object body",
            ));
        };
        for (key, value) in extra {
            target.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    /// Fetch all candidates for a collection and classify them.
    pub async fn resolve_collection(
        &self,
        path: &str,
        result_key: &str,
        filter: &LookupFilter,
    ) -> Result<MatchOutcome, ErrorShape> {
        let candidates = self.client.get_paginated(path, result_key, &[], None).await?;
        Ok(resolve(&candidates, filter))
    }
}

/// Structured invocation result.
#[derive(Debug, Clone)]
pub struct Report {
    pub changed: bool,
    pub msg: String,
    payload: Option<(String, Value)>,
    error: Option<ErrorShape>,
}

impl Report {
    pub fn changed(msg: impl Into<String>) -> Self {
        Self {
            changed: true,
            msg: msg.into(),
            payload: None,
            error: None,
        }
    }

    pub fn unchanged(msg: impl Into<String>) -> Self {
        Self {
            changed: false,
            msg: msg.into(),
            payload: None,
            error: None,
        }
    }

    /// Attach the resource payload under its resource-specific key.
    pub fn with_payload(mut self, key: &str, value: Value) -> Self {
        self.payload = Some((key.to_string(), value));
        self
    }

    /// Failure before any mutation took effect.
    pub fn fail(error: ErrorShape) -> Self {
        Self {
            changed: false,
            msg: error.message.clone(),
            payload: None,
            error: Some(error),
        }
    }

    /// Failure after the mutating call was already accepted by the backend
    /// (poll timeout or errored action). Must never read as "nothing
    /// happened", hence `changed: true`.
    pub fn fail_after_mutation(error: ErrorShape) -> Self {
        Self {
            changed: true,
            msg: error.message.clone(),
            payload: None,
            error: Some(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// Serialize into the reporting contract:
    /// `{changed, msg, <resource_key>: payload, error: {Message, Status Code, Reason}}`.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("changed".to_string(), Value::Bool(self.changed));
        out.insert("msg".to_string(), Value::String(self.msg.clone()));
        if let Some((key, value)) = &self.payload {
            out.insert(key.clone(), value.clone());
        }
        if let Some(error) = &self.error {
            out.insert(
                "error".to_string(),
                serde_json::to_value(error).expect("error shape serializes"),
            );
        }
        Value::Object(out)
    }
}

/// Deserialize module-specific parameters out of the shared params object.
pub(crate) fn parse_params<T: DeserializeOwned>(params: &Value) -> Result<T, ErrorShape> {
    serde_json::from_value(params.clone())
        .map_err(|e| ErrorShape::invalid_params(format!("invalid module parameters: {e}")))
}

/// Run one module invocation end to end.
///
/// Builds the client from common parameters (token resolution, client
/// overrides), dispatches to the named module, and converts any error into a
/// failed report. Never panics on bad input; the report carries the failure.
pub async fn run_module(name: &str, params: &Value, check_mode: bool, config: &Config) -> Report {
    let common: CommonParams = match parse_params(params) {
        Ok(common) => common,
        Err(e) => return Report::fail(e),
    };

    let token = match auth::resolve_token(common.token.as_deref()) {
        Ok(token) => token,
        Err(e) => return Report::fail(e),
    };

    let mut opts = config.client_options();
    if let Some(overrides) = &common.client_override_options {
        if let Err(e) = opts.apply_overrides(overrides) {
            return Report::fail(e);
        }
    }

    let client = match DoClient::new(&token, opts) {
        Ok(client) => client,
        Err(e) => return Report::fail(e),
    };

    let ctx = ModuleCtx {
        client,
        state: common.state,
        check_mode,
        timeout: Duration::from_secs(common.timeout.unwrap_or_else(|| config.effective_timeout())),
        poll_interval: Duration::from_secs(
            common
                .poll_interval
                .unwrap_or_else(|| config.effective_poll_interval()),
        ),
        overrides: common.module_override_options.clone(),
    };

    tracing::info!("running module {} (check_mode={})", name, check_mode);

    let result = match name {
        "droplet" => droplet::run(&ctx, params).await,
        "droplet_action" => droplet_action::run(&ctx, params).await,
        "ssh_key" => ssh_key::run(&ctx, params).await,
        "floating_ip" => floating_ip::run(&ctx, params).await,
        "volume" => volume::run(&ctx, params).await,
        "tag" => tag::run(&ctx, params).await,
        "domain" => domain::run(&ctx, params).await,
        "snapshot" => snapshot::run(&ctx, params).await,
        "region_info" => info::run_regions(&ctx).await,
        "size_info" => info::run_sizes(&ctx).await,
        "image_info" => info::run_images(&ctx, params).await,
        "action_info" => info::run_actions(&ctx, params).await,
        other => Err(ErrorShape::invalid_params(format!(
            "unknown module: {other}"
        ))),
    };

    match result {
        Ok(report) => report,
        Err(e) => Report::fail(e),
    }
}
