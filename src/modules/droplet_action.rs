//! One-shot Droplet actions
//!
//! Submits an action to `/droplets/{id}/actions` and polls it to a terminal
//! status. There is no way to retract a submitted action; a timed-out poll is
//! reported as changed-but-unconfirmed.
//!
//! `shutdown` with `force_power_off: true` is a two-step fallback coded right
//! here: if the graceful shutdown errors or does not confirm in time, a hard
//! `power_off` is submitted and polled in its place.

use super::droplet::find_droplet;
use super::{parse_params, ModuleCtx, Report};
use crate::digitalocean::error::ErrorShape;
use crate::resource::poll::PollOutcome;
use serde::Deserialize;
use serde_json::{json, Value};

const ACTIONS: &[&str] = &[
    "power_on",
    "power_off",
    "shutdown",
    "power_cycle",
    "reboot",
    "enable_backups",
    "disable_backups",
    "enable_ipv6",
    "snapshot",
    "resize",
];

#[derive(Debug, Deserialize)]
struct ActionParams {
    action: String,
    id: Option<u64>,
    name: Option<String>,
    region: Option<String>,
    /// Fall back to a hard power_off when a graceful shutdown does not
    /// confirm within the timeout.
    #[serde(default)]
    force_power_off: bool,
    /// Name for the snapshot action.
    snapshot_name: Option<String>,
    /// Target size slug for the resize action.
    size: Option<String>,
    /// Whether resize also grows the disk (irreversible).
    #[serde(default)]
    disk: bool,
}

pub(crate) async fn run(ctx: &ModuleCtx, params: &Value) -> Result<Report, ErrorShape> {
    let p: ActionParams = parse_params(params)?;

    if !ACTIONS.contains(&p.action.as_str()) {
        return Err(ErrorShape::invalid_params(format!(
            "unknown action {:?}; expected one of: {}",
            p.action,
            ACTIONS.join(", ")
        )));
    }
    if p.force_power_off && p.action != "shutdown" {
        return Err(ErrorShape::invalid_params(
            "force_power_off is only valid with the shutdown action",
        ));
    }

    let body = action_body(&p, ctx)?;

    let droplet = find_droplet(ctx, p.id, p.name.as_deref(), p.region.as_deref()).await?;
    let droplet_id = droplet
        .get("id")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| ErrorShape::malformed("droplet record has no numeric id"))?;

    if ctx.check_mode {
        return Ok(Report::changed(format!(
            "{} would be submitted for droplet {droplet_id}",
            p.action
        )));
    }

    let submitted = ctx
        .client
        .submit_action(&format!("droplets/{droplet_id}/actions"), &body)
        .await?;
    let outcome = ctx
        .client
        .await_action(submitted, ctx.timeout, ctx.poll_interval)
        .await?;

    match outcome {
        PollOutcome::Completed(action) => Ok(Report::changed(format!(
            "{} completed for droplet {droplet_id}",
            p.action
        ))
        .with_payload("action", action.raw)),
        PollOutcome::Errored(action) if p.force_power_off => {
            tracing::warn!(
                "shutdown action {} errored, falling back to power_off",
                action.id
            );
            force_power_off(ctx, droplet_id).await
        }
        PollOutcome::TimedOut(action) if p.force_power_off => {
            tracing::warn!(
                "shutdown action {} unconfirmed at deadline, falling back to power_off",
                action.id
            );
            force_power_off(ctx, droplet_id).await
        }
        PollOutcome::Errored(action) => Ok(Report::fail_after_mutation(
            ErrorShape::action_errored(format!(
                "{} action {} errored for droplet {droplet_id}",
                p.action, action.id
            )),
        )
        .with_payload("action", action.raw)),
        PollOutcome::TimedOut(action) => Ok(Report::fail_after_mutation(ErrorShape::timeout(
            format!(
                "{} for droplet {droplet_id} has not completed, status is {}",
                p.action, action.status
            ),
        ))
        .with_payload("action", action.raw)),
    }
}

fn action_body(p: &ActionParams, ctx: &ModuleCtx) -> Result<Value, ErrorShape> {
    let mut body = match p.action.as_str() {
        "snapshot" => match &p.snapshot_name {
            Some(name) => json!({"type": "snapshot", "name": name}),
            None => json!({"type": "snapshot"}),
        },
        "resize" => {
            let size = p.size.as_deref().ok_or_else(|| {
                ErrorShape::invalid_params("size is required for the resize action")
            })?;
            json!({"type": "resize", "size": size, "disk": p.disk})
        }
        other => json!({"type": other}),
    };
    ctx.splice_overrides(&mut body)?;
    Ok(body)
}

async fn force_power_off(ctx: &ModuleCtx, droplet_id: u64) -> Result<Report, ErrorShape> {
    let submitted = ctx
        .client
        .submit_action(
            &format!("droplets/{droplet_id}/actions"),
            &json!({"type": "power_off"}),
        )
        .await?;
    let outcome = ctx
        .client
        .await_action(submitted, ctx.timeout, ctx.poll_interval)
        .await?;

    match outcome {
        PollOutcome::Completed(action) => Ok(Report::changed(format!(
            "shutdown forced via power_off for droplet {droplet_id}"
        ))
        .with_payload("action", action.raw)),
        PollOutcome::Errored(action) => Ok(Report::fail_after_mutation(
            ErrorShape::action_errored(format!(
                "forced power_off action {} errored for droplet {droplet_id}",
                action.id
            )),
        )
        .with_payload("action", action.raw)),
        PollOutcome::TimedOut(action) => Ok(Report::fail_after_mutation(ErrorShape::timeout(
            format!(
                "forced power_off for droplet {droplet_id} has not completed, status is {}",
                action.status
            ),
        ))
        .with_payload("action", action.raw)),
    }
}
