//! Floating IP present/absent
//!
//! Reserving a new IP is synchronous; moving one between Droplets goes
//! through the action endpoint and is polled like any other action.

use super::{parse_params, ModuleCtx, Report};
use crate::digitalocean::client::unwrap_key;
use crate::digitalocean::error::ErrorShape;
use crate::resource::poll::PollOutcome;
use crate::resource::resolve::{
    decide, describe_ambiguous, lookup_path, Decision, Intent, LookupFilter,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct FloatingIpParams {
    ip: Option<String>,
    region: Option<String>,
    droplet_id: Option<u64>,
}

pub(crate) async fn run(ctx: &ModuleCtx, params: &Value) -> Result<Report, ErrorShape> {
    let p: FloatingIpParams = parse_params(params)?;

    // Without an ip there is nothing to look up; present means "reserve one".
    let Some(ip) = p.ip.clone() else {
        return match ctx.state {
            Intent::Present => reserve(ctx, &p).await,
            Intent::Absent => Err(ErrorShape::invalid_params(
                "ip is required when state is absent",
            )),
        };
    };

    let filter = LookupFilter::new().field("ip", ip.as_str());
    let outcome = ctx
        .resolve_collection("floating_ips", "floating_ips", &filter)
        .await?;

    match decide(ctx.state, outcome, |record| assignment_differs(&p, record)) {
        Decision::Create => Err(ErrorShape::invalid_params(format!(
            "floating ip {ip} does not exist; omit ip to reserve a new one"
        ))),
        Decision::NoOp(Some(record)) => Ok(Report::unchanged(format!(
            "floating ip {ip} already satisfies the request"
        ))
        .with_payload("floating_ip", record)),
        Decision::NoOp(None) => Ok(Report::unchanged(format!(
            "floating ip {ip} is already absent"
        ))),
        Decision::Update(record) => reassign(ctx, &ip, &p, record).await,
        Decision::Delete(record) => release(ctx, &ip, record).await,
        Decision::Ambiguous(records) => Err(ErrorShape::ambiguous(describe_ambiguous(
            "Floating IPs",
            &ip,
            &records,
            "ip",
        ))),
    }
}

fn assignment_differs(p: &FloatingIpParams, record: &Value) -> bool {
    let Some(wanted) = p.droplet_id else {
        return false;
    };
    lookup_path(record, "droplet.id").and_then(|v| v.as_u64()) != Some(wanted)
}

async fn reserve(ctx: &ModuleCtx, p: &FloatingIpParams) -> Result<Report, ErrorShape> {
    let mut body = match (&p.region, p.droplet_id) {
        (Some(region), None) => json!({"region": region}),
        (None, Some(droplet_id)) => json!({"droplet_id": droplet_id}),
        _ => {
            return Err(ErrorShape::invalid_params(
                "exactly one of region or droplet_id is required to reserve a floating ip",
            ));
        }
    };

    if ctx.check_mode {
        return Ok(Report::changed("floating ip would be reserved"));
    }

    ctx.splice_overrides(&mut body)?;
    let response = ctx.client.post("floating_ips", Some(&body)).await?;
    let record = unwrap_key(&response, "floating_ip")?.clone();
    let ip = lookup_path(&record, "ip")
        .and_then(|v| v.as_str())
        .unwrap_or("?")
        .to_string();
    Ok(Report::changed(format!("floating ip {ip} reserved")).with_payload("floating_ip", record))
}

async fn reassign(
    ctx: &ModuleCtx,
    ip: &str,
    p: &FloatingIpParams,
    record: Value,
) -> Result<Report, ErrorShape> {
    let Some(droplet_id) = p.droplet_id else {
        return Err(ErrorShape::invalid_params(
            "droplet_id is required to reassign a floating ip",
        ));
    };

    if ctx.check_mode {
        return Ok(Report::changed(format!(
            "floating ip {ip} would be assigned to droplet {droplet_id}"
        ))
        .with_payload("floating_ip", record));
    }

    let mut body = json!({"type": "assign", "droplet_id": droplet_id});
    ctx.splice_overrides(&mut body)?;

    let submitted = ctx
        .client
        .submit_action(&format!("floating_ips/{ip}/actions"), &body)
        .await?;
    let outcome = ctx
        .client
        .await_action(submitted, ctx.timeout, ctx.poll_interval)
        .await?;

    match outcome {
        PollOutcome::Completed(action) => Ok(Report::changed(format!(
            "floating ip {ip} assigned to droplet {droplet_id}"
        ))
        .with_payload("action", action.raw)),
        PollOutcome::Errored(action) => Ok(Report::fail_after_mutation(
            ErrorShape::action_errored(format!(
                "assign action {} errored for floating ip {ip}",
                action.id
            )),
        )
        .with_payload("action", action.raw)),
        PollOutcome::TimedOut(action) => Ok(Report::fail_after_mutation(ErrorShape::timeout(
            format!(
                "assign of floating ip {ip} has not completed, status is {}",
                action.status
            ),
        ))
        .with_payload("action", action.raw)),
    }
}

async fn release(ctx: &ModuleCtx, ip: &str, record: Value) -> Result<Report, ErrorShape> {
    if ctx.check_mode {
        return Ok(Report::changed(format!("floating ip {ip} would be released"))
            .with_payload("floating_ip", record));
    }

    ctx.client.delete(&format!("floating_ips/{ip}")).await?;
    Ok(Report::changed(format!("floating ip {ip} released")).with_payload("floating_ip", record))
}
