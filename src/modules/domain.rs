//! Domain present/absent

use super::{parse_params, ModuleCtx, Report};
use crate::digitalocean::client::unwrap_key;
use crate::digitalocean::error::ErrorShape;
use crate::resource::resolve::{decide, describe_ambiguous, Decision, LookupFilter};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct DomainParams {
    name: Option<String>,
    /// Apex A record created alongside the zone.
    ip_address: Option<String>,
}

pub(crate) async fn run(ctx: &ModuleCtx, params: &Value) -> Result<Report, ErrorShape> {
    let p: DomainParams = parse_params(params)?;
    let name = p
        .name
        .clone()
        .ok_or_else(|| ErrorShape::invalid_params("name is required"))?;

    let filter = LookupFilter::new().field("name", name.as_str());
    let outcome = ctx.resolve_collection("domains", "domains", &filter).await?;

    match decide(ctx.state, outcome, |_| false) {
        Decision::Create => create(ctx, &p, &name).await,
        Decision::NoOp(Some(record)) | Decision::Update(record) => Ok(Report::unchanged(
            format!("domain {name} already exists"),
        )
        .with_payload("domain", record)),
        Decision::NoOp(None) => Ok(Report::unchanged(format!("domain {name} is already absent"))),
        Decision::Delete(record) => {
            if ctx.check_mode {
                return Ok(Report::changed(format!("domain {name} would be deleted"))
                    .with_payload("domain", record));
            }
            ctx.client.delete(&format!("domains/{name}")).await?;
            Ok(Report::changed(format!("domain {name} deleted")).with_payload("domain", record))
        }
        Decision::Ambiguous(records) => Err(ErrorShape::ambiguous(describe_ambiguous(
            "domains",
            &format!("named {name}"),
            &records,
            "name",
        ))),
    }
}

async fn create(ctx: &ModuleCtx, p: &DomainParams, name: &str) -> Result<Report, ErrorShape> {
    let ip_address = p
        .ip_address
        .as_deref()
        .ok_or_else(|| ErrorShape::invalid_params("ip_address is required to create a domain"))?;

    if ctx.check_mode {
        return Ok(Report::changed(format!("domain {name} would be created")));
    }

    let mut body = json!({"name": name, "ip_address": ip_address});
    ctx.splice_overrides(&mut body)?;

    let response = ctx.client.post("domains", Some(&body)).await?;
    let record = unwrap_key(&response, "domain")?.clone();
    Ok(Report::changed(format!("domain {name} created")).with_payload("domain", record))
}
