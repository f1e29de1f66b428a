//! Block storage volume present/absent
//!
//! Volume creation is synchronous. Attach/detach and resize go through the
//! volume actions endpoint and are out of scope for this module.

use super::{parse_params, ModuleCtx, Report};
use crate::digitalocean::client::unwrap_key;
use crate::digitalocean::error::ErrorShape;
use crate::resource::resolve::{decide, describe_ambiguous, Decision, LookupFilter};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct VolumeParams {
    id: Option<String>,
    name: Option<String>,
    region: Option<String>,
    size_gigabytes: Option<u64>,
    description: Option<String>,
    filesystem_type: Option<String>,
}

pub(crate) async fn run(ctx: &ModuleCtx, params: &Value) -> Result<Report, ErrorShape> {
    let p: VolumeParams = parse_params(params)?;
    let (filter, descriptor) = lookup(&p)?;

    let outcome = ctx.resolve_collection("volumes", "volumes", &filter).await?;

    match decide(ctx.state, outcome, |_| false) {
        Decision::Create => create(ctx, &p).await,
        Decision::NoOp(Some(record)) | Decision::Update(record) => Ok(Report::unchanged(
            format!("volume {descriptor} already exists"),
        )
        .with_payload("volume", record)),
        Decision::NoOp(None) => Ok(Report::unchanged(format!(
            "volume {descriptor} is already absent"
        ))),
        Decision::Delete(record) => delete(ctx, &descriptor, record).await,
        Decision::Ambiguous(records) => Err(ErrorShape::ambiguous(describe_ambiguous(
            "volumes",
            &descriptor,
            &records,
            "id",
        ))),
    }
}

fn lookup(p: &VolumeParams) -> Result<(LookupFilter, String), ErrorShape> {
    if let Some(id) = &p.id {
        if Uuid::parse_str(id).is_err() {
            return Err(ErrorShape::invalid_params(format!(
                "volume id {id:?} is not a valid UUID"
            )));
        }
        return Ok((
            LookupFilter::new().field("id", id.as_str()),
            format!("with id {id}"),
        ));
    }
    match (&p.name, &p.region) {
        (Some(name), Some(region)) => Ok((
            LookupFilter::new()
                .field("name", name.as_str())
                .field("region.slug", region.as_str()),
            format!("named {name} in {region}"),
        )),
        _ => Err(ErrorShape::invalid_params(
            "either id or both name and region are required",
        )),
    }
}

async fn create(ctx: &ModuleCtx, p: &VolumeParams) -> Result<Report, ErrorShape> {
    let name = p
        .name
        .as_deref()
        .ok_or_else(|| ErrorShape::invalid_params("name is required to create a volume"))?;
    let region = p
        .region
        .as_deref()
        .ok_or_else(|| ErrorShape::invalid_params("region is required to create a volume"))?;
    let size = p.size_gigabytes.ok_or_else(|| {
        ErrorShape::invalid_params("size_gigabytes is required to create a volume")
    })?;

    if ctx.check_mode {
        return Ok(Report::changed(format!("volume {name} would be created")));
    }

    let mut body = json!({
        "name": name,
        "region": region,
        "size_gigabytes": size,
    });
    if let Some(description) = &p.description {
        body["description"] = json!(description);
    }
    if let Some(filesystem_type) = &p.filesystem_type {
        body["filesystem_type"] = json!(filesystem_type);
    }
    ctx.splice_overrides(&mut body)?;

    let response = ctx.client.post("volumes", Some(&body)).await?;
    let record = unwrap_key(&response, "volume")?.clone();
    Ok(Report::changed(format!("volume {name} created")).with_payload("volume", record))
}

async fn delete(ctx: &ModuleCtx, descriptor: &str, record: Value) -> Result<Report, ErrorShape> {
    let id = record
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ErrorShape::malformed("volume record has no id"))?
        .to_string();

    if ctx.check_mode {
        return Ok(Report::changed(format!("volume {descriptor} would be deleted"))
            .with_payload("volume", record));
    }

    ctx.client.delete(&format!("volumes/{id}")).await?;
    Ok(Report::changed(format!("volume {descriptor} deleted")).with_payload("volume", record))
}
