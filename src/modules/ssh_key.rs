//! SSH key present/absent
//!
//! The public key is unique per account, so creation can race with an
//! already-registered key. A 422 "already in use" on create triggers exactly
//! one follow-up lookup by public key; when the pre-existing record matches,
//! the invocation resolves to an unchanged success instead of a failure. That
//! rescue is the only place a failure response is treated as a no-op.

use super::{parse_params, ModuleCtx, Report};
use crate::digitalocean::client::unwrap_key;
use crate::digitalocean::error::ErrorShape;
use crate::resource::resolve::{
    decide, describe_ambiguous, lookup_path, resolve, Decision, LookupFilter,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct SshKeyParams {
    id: Option<u64>,
    fingerprint: Option<String>,
    name: Option<String>,
    public_key: Option<String>,
}

pub(crate) async fn run(ctx: &ModuleCtx, params: &Value) -> Result<Report, ErrorShape> {
    let p: SshKeyParams = parse_params(params)?;
    let (filter, descriptor) = lookup(&p)?;

    let candidates = ctx
        .client
        .get_paginated("account/keys", "ssh_keys", &[], None)
        .await?;
    let outcome = resolve(&candidates, &filter);

    let decision = decide(ctx.state, outcome, |record| name_differs(&p, record));
    match decision {
        Decision::Create => create(ctx, &p).await,
        Decision::NoOp(Some(record)) => Ok(Report::unchanged(format!(
            "ssh key {descriptor} already exists"
        ))
        .with_payload("ssh_key", record)),
        Decision::NoOp(None) => Ok(Report::unchanged(format!(
            "ssh key {descriptor} is already absent"
        ))),
        Decision::Update(record) => rename(ctx, &p, record).await,
        Decision::Delete(record) => delete(ctx, &descriptor, record).await,
        Decision::Ambiguous(records) => Err(ErrorShape::ambiguous(describe_ambiguous(
            "SSH keys",
            &descriptor,
            &records,
            "id",
        ))),
    }
}

fn lookup(p: &SshKeyParams) -> Result<(LookupFilter, String), ErrorShape> {
    if let Some(id) = p.id {
        return Ok((LookupFilter::new().field("id", id), format!("with id {id}")));
    }
    if let Some(fingerprint) = &p.fingerprint {
        return Ok((
            LookupFilter::new().field("fingerprint", fingerprint.as_str()),
            format!("with fingerprint {fingerprint}"),
        ));
    }
    if let Some(name) = &p.name {
        return Ok((
            LookupFilter::new().field("name", name.as_str()),
            format!("named {name}"),
        ));
    }
    Err(ErrorShape::invalid_params(
        "one of id, fingerprint, or name is required",
    ))
}

/// The name is the only mutable field; it can differ when the key was looked
/// up by id or fingerprint.
fn name_differs(p: &SshKeyParams, record: &Value) -> bool {
    if p.id.is_none() && p.fingerprint.is_none() {
        return false;
    }
    match (&p.name, lookup_path(record, "name").and_then(|v| v.as_str())) {
        (Some(wanted), Some(current)) => wanted != current,
        _ => false,
    }
}

async fn create(ctx: &ModuleCtx, p: &SshKeyParams) -> Result<Report, ErrorShape> {
    let name = p
        .name
        .as_deref()
        .ok_or_else(|| ErrorShape::invalid_params("name is required to register an ssh key"))?;
    let public_key = p.public_key.as_deref().ok_or_else(|| {
        ErrorShape::invalid_params("public_key is required to register an ssh key")
    })?;

    if ctx.check_mode {
        return Ok(Report::changed(format!("ssh key {name} would be registered")));
    }

    let mut body = json!({"name": name, "public_key": public_key});
    ctx.splice_overrides(&mut body)?;

    match ctx.client.post("account/keys", Some(&body)).await {
        Ok(response) => {
            let record = unwrap_key(&response, "ssh_key")?.clone();
            Ok(Report::changed(format!("ssh key {name} registered")).with_payload("ssh_key", record))
        }
        Err(e) if e.is_unprocessable() && e.message.contains("already in use") => {
            rescue_existing(ctx, public_key, e).await
        }
        Err(e) => Err(e),
    }
}

/// The idempotent create rescue: one follow-up lookup, scoped to the
/// duplicate-unique-value case only.
async fn rescue_existing(
    ctx: &ModuleCtx,
    public_key: &str,
    original: ErrorShape,
) -> Result<Report, ErrorShape> {
    tracing::debug!("create returned 422 already-in-use, looking up existing key");

    let keys = ctx
        .client
        .get_paginated("account/keys", "ssh_keys", &[], None)
        .await?;
    let existing = keys.into_iter().find(|record| {
        lookup_path(record, "public_key").and_then(|v| v.as_str()) == Some(public_key)
    });

    match existing {
        Some(record) => Ok(Report::unchanged("ssh key is already registered")
            .with_payload("ssh_key", record)),
        None => Err(original),
    }
}

async fn rename(ctx: &ModuleCtx, p: &SshKeyParams, record: Value) -> Result<Report, ErrorShape> {
    let id = record
        .get("id")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| ErrorShape::malformed("ssh key record has no numeric id"))?;
    let name = p.name.as_deref().unwrap_or_default();

    if ctx.check_mode {
        return Ok(Report::changed(format!("ssh key {id} would be renamed to {name}"))
            .with_payload("ssh_key", record));
    }

    let mut body = json!({"name": name});
    ctx.splice_overrides(&mut body)?;

    let response = ctx.client.put(&format!("account/keys/{id}"), &body).await?;
    let record = unwrap_key(&response, "ssh_key")?.clone();
    Ok(Report::changed(format!("ssh key {id} renamed to {name}")).with_payload("ssh_key", record))
}

async fn delete(ctx: &ModuleCtx, descriptor: &str, record: Value) -> Result<Report, ErrorShape> {
    let id = record
        .get("id")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| ErrorShape::malformed("ssh key record has no numeric id"))?;

    if ctx.check_mode {
        return Ok(Report::changed(format!("ssh key {descriptor} would be removed"))
            .with_payload("ssh_key", record));
    }

    ctx.client.delete(&format!("account/keys/{id}")).await?;
    Ok(Report::changed(format!("ssh key {descriptor} removed")).with_payload("ssh_key", record))
}
