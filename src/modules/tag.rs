//! Tag present/absent

use super::{parse_params, ModuleCtx, Report};
use crate::digitalocean::client::unwrap_key;
use crate::digitalocean::error::ErrorShape;
use crate::resource::resolve::{decide, describe_ambiguous, Decision, LookupFilter};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct TagParams {
    name: Option<String>,
}

pub(crate) async fn run(ctx: &ModuleCtx, params: &Value) -> Result<Report, ErrorShape> {
    let p: TagParams = parse_params(params)?;
    let name = p
        .name
        .ok_or_else(|| ErrorShape::invalid_params("name is required"))?;

    let filter = LookupFilter::new().field("name", name.as_str());
    let outcome = ctx.resolve_collection("tags", "tags", &filter).await?;

    match decide(ctx.state, outcome, |_| false) {
        Decision::Create => {
            if ctx.check_mode {
                return Ok(Report::changed(format!("tag {name} would be created")));
            }
            let mut body = json!({"name": name});
            ctx.splice_overrides(&mut body)?;
            let response = ctx.client.post("tags", Some(&body)).await?;
            let record = unwrap_key(&response, "tag")?.clone();
            Ok(Report::changed(format!("tag {name} created")).with_payload("tag", record))
        }
        Decision::NoOp(Some(record)) | Decision::Update(record) => {
            Ok(Report::unchanged(format!("tag {name} already exists")).with_payload("tag", record))
        }
        Decision::NoOp(None) => Ok(Report::unchanged(format!("tag {name} is already absent"))),
        Decision::Delete(record) => {
            if ctx.check_mode {
                return Ok(Report::changed(format!("tag {name} would be deleted"))
                    .with_payload("tag", record));
            }
            ctx.client.delete(&format!("tags/{name}")).await?;
            Ok(Report::changed(format!("tag {name} deleted")).with_payload("tag", record))
        }
        Decision::Ambiguous(records) => Err(ErrorShape::ambiguous(describe_ambiguous(
            "tags",
            &format!("named {name}"),
            &records,
            "name",
        ))),
    }
}
