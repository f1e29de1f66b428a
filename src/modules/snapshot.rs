//! Snapshot deletion
//!
//! Snapshots are created through the `droplet_action` snapshot action; this
//! module only supports `state: absent`. Snapshot names are not unique, so a
//! name lookup can fail closed on multiple matches.

use super::{parse_params, ModuleCtx, Report};
use crate::digitalocean::error::ErrorShape;
use crate::resource::resolve::{describe_ambiguous, Intent, LookupFilter, MatchOutcome};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct SnapshotParams {
    snapshot_id: Option<String>,
    name: Option<String>,
}

pub(crate) async fn run(ctx: &ModuleCtx, params: &Value) -> Result<Report, ErrorShape> {
    if ctx.state == Intent::Present {
        return Err(ErrorShape::invalid_params(
            "snapshots are created via the droplet_action snapshot action; \
             only state absent is supported",
        ));
    }

    let p: SnapshotParams = parse_params(params)?;
    let (filter, descriptor) = lookup(&p)?;

    let outcome = ctx
        .resolve_collection("snapshots", "snapshots", &filter)
        .await?;

    match outcome {
        MatchOutcome::None => Ok(Report::unchanged(format!(
            "snapshot {descriptor} is already absent"
        ))),
        MatchOutcome::Single(record) => {
            let id = record
                .get("id")
                .map(value_as_id)
                .ok_or_else(|| ErrorShape::malformed("snapshot record has no id"))?;

            if ctx.check_mode {
                return Ok(Report::changed(format!(
                    "snapshot {descriptor} would be deleted"
                ))
                .with_payload("snapshot", record));
            }

            ctx.client.delete(&format!("snapshots/{id}")).await?;
            Ok(Report::changed(format!("snapshot {descriptor} deleted"))
                .with_payload("snapshot", record))
        }
        MatchOutcome::Ambiguous(records) => Err(ErrorShape::ambiguous(describe_ambiguous(
            "snapshots",
            &descriptor,
            &records,
            "id",
        ))),
    }
}

fn lookup(p: &SnapshotParams) -> Result<(LookupFilter, String), ErrorShape> {
    if let Some(id) = &p.snapshot_id {
        return Ok((
            LookupFilter::new().field("id", id.as_str()),
            format!("with id {id}"),
        ));
    }
    if let Some(name) = &p.name {
        return Ok((
            LookupFilter::new().field("name", name.as_str()),
            format!("named {name}"),
        ));
    }
    Err(ErrorShape::invalid_params(
        "either snapshot_id or name is required",
    ))
}

/// Droplet snapshot ids are strings of digits, volume snapshot ids are UUIDs;
/// both arrive as JSON strings but guard against a numeric id anyway.
fn value_as_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
