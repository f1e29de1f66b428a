//! Read-only listing modules
//!
//! These never mutate anything and always report `changed: false`. Each one
//! walks its collection to completion, except `action_info` which can bound
//! the walk to the most recent N records.

use super::{parse_params, ModuleCtx, Report};
use crate::digitalocean::error::ErrorShape;
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::Value;

pub(crate) async fn run_regions(ctx: &ModuleCtx) -> Result<Report, ErrorShape> {
    let items = ctx
        .client
        .get_paginated("regions", "regions", &[], None)
        .await?;
    Ok(Report::unchanged(format!("{} regions", items.len()))
        .with_payload("regions", Value::Array(items)))
}

pub(crate) async fn run_sizes(ctx: &ModuleCtx) -> Result<Report, ErrorShape> {
    let items = ctx.client.get_paginated("sizes", "sizes", &[], None).await?;
    Ok(Report::unchanged(format!("{} sizes", items.len())).with_payload("sizes", Value::Array(items)))
}

#[derive(Debug, Deserialize)]
struct ImageParams {
    /// Server-side filter: "distribution" or "application".
    #[serde(rename = "type")]
    image_type: Option<String>,
    #[serde(default)]
    private: bool,
}

pub(crate) async fn run_images(ctx: &ModuleCtx, params: &Value) -> Result<Report, ErrorShape> {
    let p: ImageParams = parse_params(params)?;

    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(image_type) = &p.image_type {
        query.push(("type", image_type.clone()));
    }
    if p.private {
        query.push(("private", "true".to_string()));
    }

    let items = ctx
        .client
        .get_paginated("images", "images", &query, None)
        .await?;
    Ok(Report::unchanged(format!("{} images", items.len()))
        .with_payload("images", Value::Array(items)))
}

#[derive(Debug, Deserialize)]
struct ActionInfoParams {
    /// Bound the listing to the most recent N actions. Stops paginating as
    /// soon as the bound is satisfied instead of walking the full history.
    latest: Option<usize>,
}

pub(crate) async fn run_actions(ctx: &ModuleCtx, params: &Value) -> Result<Report, ErrorShape> {
    let p: ActionInfoParams = parse_params(params)?;

    let mut items = ctx
        .client
        .get_paginated("actions", "actions", &[], p.latest)
        .await?;

    // The API already lists newest-first; sort anyway so `latest` means what
    // it says even if the backend ordering drifts.
    items.sort_by_key(|action| std::cmp::Reverse(started_at(action)));

    Ok(Report::unchanged(format!("{} actions", items.len()))
        .with_payload("actions", Value::Array(items)))
}

fn started_at(action: &Value) -> Option<DateTime<FixedOffset>> {
    action
        .get("started_at")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn started_at_parses_rfc3339() {
        let action = json!({"started_at": "2026-03-01T12:00:00Z"});
        assert!(started_at(&action).is_some());
        assert!(started_at(&json!({})).is_none());
        assert!(started_at(&json!({"started_at": "yesterday"})).is_none());
    }
}
