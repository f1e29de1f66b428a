//! Droplet present/absent
//!
//! Creation is asynchronous on the backend: the create response links an
//! action record which is polled until the Droplet is ready. Deletion is
//! synchronous. Droplet reconfiguration (resize, rename, power) is not an
//! update here; those are one-shot operations in [`super::droplet_action`].

use super::{parse_params, ModuleCtx, Report};
use crate::digitalocean::client::unwrap_key;
use crate::digitalocean::error::ErrorShape;
use crate::resource::poll::{ActionHandle, PollOutcome};
use crate::resource::resolve::{
    decide, describe_ambiguous, resolve, Decision, LookupFilter, MatchOutcome,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct DropletParams {
    id: Option<u64>,
    name: Option<String>,
    region: Option<String>,
    size: Option<String>,
    /// Image slug or numeric id.
    image: Option<Value>,
    #[serde(default)]
    ssh_keys: Vec<Value>,
    #[serde(default)]
    tags: Vec<String>,
    user_data: Option<String>,
    #[serde(default)]
    backups: bool,
    #[serde(default)]
    monitoring: bool,
    #[serde(default)]
    ipv6: bool,
    vpc_uuid: Option<String>,
}

pub(crate) async fn run(ctx: &ModuleCtx, params: &Value) -> Result<Report, ErrorShape> {
    let p: DropletParams = parse_params(params)?;
    let (filter, descriptor) = lookup(p.id, p.name.as_deref(), p.region.as_deref())?;

    let candidates = ctx
        .client
        .get_paginated("droplets", "droplets", &[], None)
        .await?;
    let outcome = resolve(&candidates, &filter);

    match decide(ctx.state, outcome, |_| false) {
        Decision::Create => create(ctx, &p).await,
        Decision::NoOp(Some(record)) | Decision::Update(record) => Ok(Report::unchanged(
            format!("droplet {descriptor} already exists"),
        )
        .with_payload("droplet", record)),
        Decision::NoOp(None) => Ok(Report::unchanged(format!(
            "droplet {descriptor} is already absent"
        ))),
        Decision::Delete(record) => delete(ctx, &descriptor, record).await,
        Decision::Ambiguous(records) => Err(ErrorShape::ambiguous(describe_ambiguous(
            "Droplets",
            &descriptor,
            &records,
            "id",
        ))),
    }
}

/// Resolve a single Droplet by id or name+region, failing on zero or many.
/// Shared with the action module, which needs a concrete target.
pub(crate) async fn find_droplet(
    ctx: &ModuleCtx,
    id: Option<u64>,
    name: Option<&str>,
    region: Option<&str>,
) -> Result<Value, ErrorShape> {
    let (filter, descriptor) = lookup(id, name, region)?;
    let candidates = ctx
        .client
        .get_paginated("droplets", "droplets", &[], None)
        .await?;

    match resolve(&candidates, &filter) {
        MatchOutcome::Single(record) => Ok(record),
        MatchOutcome::None => Err(ErrorShape::invalid_params(format!(
            "no droplet {descriptor} found"
        ))),
        MatchOutcome::Ambiguous(records) => Err(ErrorShape::ambiguous(describe_ambiguous(
            "Droplets",
            &descriptor,
            &records,
            "id",
        ))),
    }
}

fn lookup(
    id: Option<u64>,
    name: Option<&str>,
    region: Option<&str>,
) -> Result<(LookupFilter, String), ErrorShape> {
    if let Some(id) = id {
        return Ok((LookupFilter::new().field("id", id), format!("with id {id}")));
    }
    match (name, region) {
        (Some(name), Some(region)) => Ok((
            LookupFilter::new()
                .field("name", name)
                .field("region.slug", region),
            format!("named {name} in {region}"),
        )),
        _ => Err(ErrorShape::invalid_params(
            "either id or both name and region are required",
        )),
    }
}

async fn create(ctx: &ModuleCtx, p: &DropletParams) -> Result<Report, ErrorShape> {
    let name = require(p.name.as_deref(), "name")?;
    let region = require(p.region.as_deref(), "region")?;
    let size = require(p.size.as_deref(), "size")?;
    let image = p
        .image
        .as_ref()
        .ok_or_else(|| ErrorShape::invalid_params("image is required to create a droplet"))?;

    if ctx.check_mode {
        return Ok(Report::changed(format!("droplet {name} would be created")));
    }

    let mut body = json!({
        "name": name,
        "region": region,
        "size": size,
        "image": image,
        "ssh_keys": p.ssh_keys,
        "tags": p.tags,
        "backups": p.backups,
        "monitoring": p.monitoring,
        "ipv6": p.ipv6,
    });
    if let Some(user_data) = &p.user_data {
        body["user_data"] = json!(user_data);
    }
    if let Some(vpc_uuid) = &p.vpc_uuid {
        body["vpc_uuid"] = json!(vpc_uuid);
    }
    ctx.splice_overrides(&mut body)?;

    let response = ctx.client.post("droplets", Some(&body)).await?;
    let droplet = unwrap_key(&response, "droplet")?.clone();
    let droplet_id = droplet
        .get("id")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| ErrorShape::malformed("created droplet has no numeric id"))?;

    // The create response links the provisioning action; without one there is
    // nothing to poll and the record is already final.
    let Some(action_id) = response
        .pointer("/links/actions/0/id")
        .and_then(|v| v.as_u64())
    else {
        return Ok(Report::changed(format!("droplet {name} created"))
            .with_payload("droplet", droplet));
    };

    let outcome = ctx
        .client
        .await_action(ActionHandle::pending(action_id), ctx.timeout, ctx.poll_interval)
        .await?;

    match outcome {
        PollOutcome::Completed(_) => {
            let refreshed = ctx.client.get(&format!("droplets/{droplet_id}")).await?;
            let droplet = unwrap_key(&refreshed, "droplet")?.clone();
            Ok(Report::changed(format!("droplet {name} created")).with_payload("droplet", droplet))
        }
        PollOutcome::Errored(action) => Ok(Report::fail_after_mutation(
            ErrorShape::action_errored(format!(
                "droplet {name} create action {} errored",
                action.id
            )),
        )
        .with_payload("droplet", droplet)),
        PollOutcome::TimedOut(action) => Ok(Report::fail_after_mutation(ErrorShape::timeout(
            format!(
                "droplet {name} create has not completed, status is {}",
                action.status
            ),
        ))
        .with_payload("droplet", droplet)),
    }
}

async fn delete(ctx: &ModuleCtx, descriptor: &str, record: Value) -> Result<Report, ErrorShape> {
    let id = record
        .get("id")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| ErrorShape::malformed("droplet record has no numeric id"))?;

    if ctx.check_mode {
        return Ok(
            Report::changed(format!("droplet {descriptor} would be deleted"))
                .with_payload("droplet", record),
        );
    }

    ctx.client.delete(&format!("droplets/{id}")).await?;
    Ok(Report::changed(format!("droplet {descriptor} deleted")).with_payload("droplet", record))
}

fn require<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ErrorShape> {
    value.ok_or_else(|| {
        ErrorShape::invalid_params(format!("{field} is required to create a droplet"))
    })
}
