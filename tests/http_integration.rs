//! Integration tests against a mocked DigitalOcean API using wiremock
//!
//! These drive the real client, paginator, poller, and modules end to end,
//! verifying pagination semantics, idempotency decisions, action polling, and
//! the report contract against scripted endpoints.

use serde_json::{json, Value};
use wiremock::matchers::{bearer_token, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dostate::config::Config;
use dostate::digitalocean::client::{ClientOptions, DoClient};
use dostate::modules::run_module;

fn test_client(server: &MockServer, page_size: u32) -> DoClient {
    let opts = ClientOptions {
        base_url: server.uri(),
        page_size,
        ..ClientOptions::default()
    };
    DoClient::new("test-token", opts).expect("client builds")
}

/// Common params pointing a module at the mock server.
fn base_params(server: &MockServer) -> Value {
    json!({
        "token": "test-token",
        "client_override_options": {"base_url": server.uri(), "page_size": 2},
        "timeout": 5,
        "poll_interval": 0,
    })
}

fn with(mut base: Value, extra: Value) -> Value {
    let target = base.as_object_mut().unwrap();
    for (k, v) in extra.as_object().unwrap() {
        target.insert(k.clone(), v.clone());
    }
    base
}

fn droplet_record(id: u64, name: &str, region: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "status": "active",
        "size_slug": "s-1vcpu-1gb",
        "region": {"slug": region},
        "image": {"slug": "ubuntu-24-04-x64"},
        "tags": ["web"],
        "networks": {"v4": [{"type": "public", "ip_address": "203.0.113.10"}]},
    })
}

fn page_of(key: &str, items: Vec<Value>, next: Option<String>) -> Value {
    let mut body = json!({key: items});
    if let Some(next) = next {
        body["links"] = json!({"pages": {"next": next}});
    }
    body
}

mod pagination_tests {
    use super::*;

    #[tokio::test]
    async fn collects_all_pages_in_order() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/droplets"))
            .and(query_param("page", "1"))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_of(
                "droplets",
                vec![droplet_record(1, "a", "nyc3"), droplet_record(2, "b", "nyc3")],
                Some(format!("{}/droplets?page=2&per_page=2", server.uri())),
            )))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/droplets"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_of(
                "droplets",
                vec![droplet_record(3, "c", "nyc3"), droplet_record(4, "d", "nyc3")],
                Some(format!("{}/droplets?page=3&per_page=2", server.uri())),
            )))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/droplets"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_of(
                "droplets",
                vec![droplet_record(5, "e", "nyc3")],
                None,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server, 2);
        let items = client
            .get_paginated("droplets", "droplets", &[], None)
            .await
            .expect("pagination succeeds");

        let ids: Vec<u64> = items.iter().map(|d| d["id"].as_u64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn early_stop_bound_issues_minimum_requests() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/actions"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_of(
                "actions",
                vec![json!({"id": 1}), json!({"id": 2})],
                Some(format!("{}/actions?page=2&per_page=2", server.uri())),
            )))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/actions"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_of(
                "actions",
                vec![json!({"id": 3}), json!({"id": 4})],
                Some(format!("{}/actions?page=3&per_page=2", server.uri())),
            )))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/actions"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"actions": []})))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_client(&server, 2);
        let items = client
            .get_paginated("actions", "actions", &[], Some(3))
            .await
            .expect("pagination succeeds");

        assert_eq!(items.len(), 3);
        assert_eq!(items[2]["id"], 3);
    }

    #[tokio::test]
    async fn mid_walk_error_yields_no_partial_results() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/droplets"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_of(
                "droplets",
                vec![droplet_record(1, "a", "nyc3")],
                Some(format!("{}/droplets?page=2&per_page=2", server.uri())),
            )))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/droplets"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "id": "server_error",
                "message": "Unexpected server-side error"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server, 2);
        let err = client
            .get_paginated("droplets", "droplets", &[], None)
            .await
            .expect_err("walk must abort");

        assert_eq!(err.status_code, 500);
        assert_eq!(err.reason, "server_error");
    }

    #[tokio::test]
    async fn missing_result_key_is_an_empty_listing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/volumes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"meta": {"total": 0}})))
            .mount(&server)
            .await;

        let client = test_client(&server, 2);
        let items = client
            .get_paginated("volumes", "volumes", &[], None)
            .await
            .expect("empty listing is valid");
        assert!(items.is_empty());
    }
}

mod module_tests {
    use super::*;

    #[tokio::test]
    async fn droplet_present_creates_and_polls_to_completion() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/droplets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"droplets": []})))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/droplets"))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "droplet": {"id": 3164444, "name": "web-01", "status": "new"},
                "links": {"actions": [{"id": 36805096, "rel": "create", "href": "..."}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/actions/36805096"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "action": {"id": 36805096, "status": "completed", "resource_id": 3164444,
                           "resource_type": "droplet"}
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/droplets/3164444"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "droplet": droplet_record(3164444, "web-01", "nyc3")
            })))
            .expect(1)
            .mount(&server)
            .await;

        let params = with(
            base_params(&server),
            json!({
                "name": "web-01",
                "region": "nyc3",
                "size": "s-1vcpu-1gb",
                "image": "ubuntu-24-04-x64",
            }),
        );
        let report = run_module("droplet", &params, false, &Config::default()).await;
        let out = report.to_json();

        assert!(!report.is_failure(), "unexpected failure: {}", out["msg"]);
        assert_eq!(out["changed"], true);
        assert_eq!(out["droplet"]["id"], 3164444);
        assert_eq!(out["droplet"]["status"], "active");
    }

    #[tokio::test]
    async fn droplet_present_is_a_noop_when_already_there() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/droplets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "droplets": [droplet_record(3164444, "web-01", "nyc3")]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/droplets"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let params = with(
            base_params(&server),
            json!({"name": "web-01", "region": "nyc3"}),
        );
        let report = run_module("droplet", &params, false, &Config::default()).await;

        assert!(!report.is_failure());
        assert!(!report.changed);
    }

    #[tokio::test]
    async fn absent_with_duplicate_names_fails_closed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/droplets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "droplets": [
                    droplet_record(111, "web-01", "nyc3"),
                    droplet_record(222, "web-01", "nyc3"),
                ]
            })))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/droplets/111"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let params = with(
            base_params(&server),
            json!({"state": "absent", "name": "web-01", "region": "nyc3"}),
        );
        let report = run_module("droplet", &params, false, &Config::default()).await;
        let out = report.to_json();

        assert!(report.is_failure());
        assert_eq!(out["changed"], false);
        assert!(
            out["msg"]
                .as_str()
                .unwrap()
                .contains("There are currently 2 Droplets named web-01 in nyc3: 111, 222"),
            "unexpected msg: {}",
            out["msg"]
        );
        assert_eq!(out["error"]["Reason"], "ambiguous match");
    }

    #[tokio::test]
    async fn check_mode_issues_no_mutation() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/droplets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"droplets": []})))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/droplets"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let params = with(
            base_params(&server),
            json!({
                "name": "web-01",
                "region": "nyc3",
                "size": "s-1vcpu-1gb",
                "image": "ubuntu-24-04-x64",
            }),
        );
        let report = run_module("droplet", &params, true, &Config::default()).await;

        // Same changed value a real run would produce, with no request issued.
        assert!(!report.is_failure());
        assert!(report.changed);
        assert!(report.msg.contains("would be created"));
    }

    #[tokio::test]
    async fn ssh_key_duplicate_create_rescues_existing_record() {
        let server = MockServer::start().await;
        let public_key = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIGk example";

        // First listing: the resolver sees no key under this name.
        Mock::given(method("GET"))
            .and(path("/account/keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ssh_keys": []})))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        // Rescue listing: the key exists under a different name.
        Mock::given(method("GET"))
            .and(path("/account/keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ssh_keys": [{
                    "id": 512190,
                    "name": "registered-elsewhere",
                    "public_key": public_key,
                    "fingerprint": "3b:16:bf:e4:8b:00:8b:b8:59:8c:a9:d3:f0:19:45:fa",
                }]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/account/keys"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "id": "unprocessable_entity",
                "message": "SSH Key is already in use on your account"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let params = with(
            base_params(&server),
            json!({"name": "ci-key", "public_key": public_key}),
        );
        let report = run_module("ssh_key", &params, false, &Config::default()).await;
        let out = report.to_json();

        assert!(!report.is_failure(), "rescue must not fail: {}", out["msg"]);
        assert_eq!(out["changed"], false);
        assert_eq!(out["ssh_key"]["id"], 512190);
    }

    #[tokio::test]
    async fn ssh_key_duplicate_without_matching_record_stays_failed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/account/keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ssh_keys": []})))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/account/keys"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "id": "unprocessable_entity",
                "message": "SSH Key is already in use on your account"
            })))
            .mount(&server)
            .await;

        let params = with(
            base_params(&server),
            json!({"name": "ci-key", "public_key": "ssh-ed25519 AAAA nobody"}),
        );
        let report = run_module("ssh_key", &params, false, &Config::default()).await;
        let out = report.to_json();

        assert!(report.is_failure());
        assert_eq!(out["error"]["Status Code"], 422);
    }

    #[tokio::test]
    async fn action_timeout_reports_changed_but_unconfirmed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/droplets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "droplets": [droplet_record(111, "web-01", "nyc3")]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/droplets/111/actions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "action": {"id": 900, "status": "in-progress", "resource_id": 111,
                           "resource_type": "droplet"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        // Zero budget: the deadline passes before the first re-fetch.
        let params = with(
            base_params(&server),
            json!({
                "action": "power_off",
                "name": "web-01",
                "region": "nyc3",
                "timeout": 0,
            }),
        );
        let report = run_module("droplet_action", &params, false, &Config::default()).await;
        let out = report.to_json();

        assert!(report.is_failure());
        assert_eq!(out["changed"], true, "a submitted action must read as changed");
        assert!(
            out["msg"]
                .as_str()
                .unwrap()
                .contains("has not completed, status is in-progress"),
            "unexpected msg: {}",
            out["msg"]
        );
        assert_eq!(out["error"]["Reason"], "timeout");
    }

    #[tokio::test]
    async fn error_responses_surface_normalized() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/regions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "id": "unauthorized",
                "message": "Unable to authenticate you."
            })))
            .mount(&server)
            .await;

        let report =
            run_module("region_info", &base_params(&server), false, &Config::default()).await;
        let out = report.to_json();

        assert!(report.is_failure());
        assert_eq!(out["error"]["Status Code"], 401);
        assert_eq!(out["error"]["Reason"], "unauthorized");
        assert_eq!(out["error"]["Message"], "Unable to authenticate you.");
    }

    #[tokio::test]
    async fn parameter_validation_happens_before_any_request() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/droplets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"droplets": []})))
            .expect(0)
            .mount(&server)
            .await;

        // name without region: invalid combination.
        let params = with(base_params(&server), json!({"name": "web-01"}));
        let report = run_module("droplet", &params, false, &Config::default()).await;
        let out = report.to_json();

        assert!(report.is_failure());
        assert_eq!(out["error"]["Reason"], "invalid parameters");
        assert_eq!(out["error"]["Status Code"], 0);
    }
}

mod inventory_tests {
    use super::*;
    use dostate::inventory;

    #[tokio::test]
    async fn inventory_groups_by_region_tag_and_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/droplets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "droplets": [
                    droplet_record(1, "web-01", "nyc3"),
                    droplet_record(2, "web-02", "ams3"),
                ]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server, 2);
        let doc = inventory::gather(&client).await.expect("inventory builds");

        assert_eq!(doc["region_nyc3"]["hosts"], json!(["web-01"]));
        assert_eq!(doc["region_ams3"]["hosts"], json!(["web-02"]));
        assert_eq!(doc["tag_web"]["hosts"], json!(["web-01", "web-02"]));
        assert_eq!(
            doc["_meta"]["hostvars"]["web-01"]["ansible_host"],
            "203.0.113.10"
        );
    }
}
