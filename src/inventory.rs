//! Dynamic inventory
//!
//! Walks the full droplet listing and emits an inventory document: one group
//! per region, tag, and status, plus a `_meta.hostvars` map carrying
//! connection and resource variables for each host. Read-only.

use crate::digitalocean::client::DoClient;
use crate::digitalocean::error::ErrorShape;
use crate::resource::resolve::lookup_path;
use serde_json::{json, Map, Value};

/// Fetch all droplets and build the inventory document.
pub async fn gather(client: &DoClient) -> Result<Value, ErrorShape> {
    let droplets = client.get_paginated("droplets", "droplets", &[], None).await?;
    Ok(build_inventory(&droplets))
}

/// Build the inventory document from a droplet listing.
///
/// Group names are sanitized to `[A-Za-z0-9_]` so they are safe as variable
/// identifiers downstream. Droplets without a name are skipped.
pub fn build_inventory(droplets: &[Value]) -> Value {
    let mut groups: Map<String, Value> = Map::new();
    let mut hostvars: Map<String, Value> = Map::new();

    for droplet in droplets {
        let Some(name) = droplet.get("name").and_then(|v| v.as_str()) else {
            tracing::warn!("skipping droplet without a name in inventory");
            continue;
        };

        if let Some(region) = lookup_path(droplet, "region.slug").and_then(|v| v.as_str()) {
            add_to_group(&mut groups, &group_name("region", region), name);
        }
        if let Some(status) = droplet.get("status").and_then(|v| v.as_str()) {
            add_to_group(&mut groups, &group_name("status", status), name);
        }
        if let Some(tags) = droplet.get("tags").and_then(|v| v.as_array()) {
            for tag in tags.iter().filter_map(|t| t.as_str()) {
                add_to_group(&mut groups, &group_name("tag", tag), name);
            }
        }

        hostvars.insert(name.to_string(), host_vars(droplet));
    }

    let mut inventory = groups;
    inventory.insert("_meta".to_string(), json!({"hostvars": hostvars}));
    Value::Object(inventory)
}

fn add_to_group(groups: &mut Map<String, Value>, group: &str, host: &str) {
    let entry = groups
        .entry(group.to_string())
        .or_insert_with(|| json!({"hosts": []}));
    if let Some(hosts) = entry.get_mut("hosts").and_then(|v| v.as_array_mut()) {
        hosts.push(Value::String(host.to_string()));
    }
}

fn host_vars(droplet: &Value) -> Value {
    let mut vars = Map::new();

    if let Some(ip) = public_ipv4(droplet) {
        vars.insert("ansible_host".to_string(), Value::String(ip));
    }
    if let Some(id) = droplet.get("id") {
        vars.insert("do_id".to_string(), id.clone());
    }
    if let Some(region) = lookup_path(droplet, "region.slug") {
        vars.insert("do_region".to_string(), region.clone());
    }
    if let Some(size) = droplet.get("size_slug") {
        vars.insert("do_size".to_string(), size.clone());
    }
    if let Some(image) = lookup_path(droplet, "image.slug").or_else(|| lookup_path(droplet, "image.id")) {
        vars.insert("do_image".to_string(), image.clone());
    }
    if let Some(tags) = droplet.get("tags") {
        vars.insert("do_tags".to_string(), tags.clone());
    }

    Value::Object(vars)
}

/// First public IPv4 address from the droplet's network list.
fn public_ipv4(droplet: &Value) -> Option<String> {
    droplet
        .pointer("/networks/v4")?
        .as_array()?
        .iter()
        .find(|net| net.get("type").and_then(|v| v.as_str()) == Some("public"))
        .and_then(|net| net.get("ip_address"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Build a group name like `region_nyc3`, keeping it identifier-safe.
pub fn group_name(prefix: &str, raw: &str) -> String {
    let sanitized: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{prefix}_{sanitized}")
}
