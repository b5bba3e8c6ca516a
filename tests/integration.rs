//! Integration tests: boot the router on an ephemeral port and drive the
//! full pipeline (scenarios, sections, mock store, management API) over HTTP.

use serde_json::json;
use std::path::PathBuf;
use unimock::config::{Config, build_state};
use unimock::dispatch;

/// Write `yaml` as a config file under a fresh temp dir, build the server
/// state from it, and serve on an ephemeral port. Returns the base URL.
async fn start_server(name: &str, yaml: &str) -> String {
    let dir = config_dir(name);
    let config_path = dir.join("unimock.yaml");
    std::fs::write(&config_path, yaml).expect("write config");
    let config = Config::load(&config_path).expect("load config");
    let state = build_state(&config, &dir).await.expect("build state");
    let app = dispatch::router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

fn config_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("unimock_it_{name}"));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

const USERS_SECTION: &str = r#"
sections:
  users:
    path_pattern: "/api/users/**"
    body_id_paths: ["/id"]
    return_body: true
"#;

#[tokio::test]
async fn scenario_get_existing() {
    let base = start_server(
        "scenario_get",
        r#"
scenarios:
  - method: GET
    path: "/test/resource/item123"
    status_code: 200
    content_type: "application/json"
    data: '{"id":"item123","data":"sample"}'
"#,
    )
    .await;

    let resp = reqwest::get(format!("{base}/test/resource/item123"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"id":"item123","data":"sample"}));
}

#[tokio::test]
async fn post_then_get_round_trip() {
    let base = start_server("post_get", USERS_SECTION).await;
    let client = reqwest::Client::new();

    let body = r#"{"id":"42","name":"x"}"#;
    let resp = client
        .post(format!("{base}/api/users"))
        .header("Content-Type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    assert_eq!(resp.headers().get("location").unwrap(), "/api/users/42");
    assert_eq!(resp.text().await.unwrap(), body, "return_body echoes");

    let resp = client
        .get(format!("{base}/api/users/42"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );
    assert_eq!(resp.text().await.unwrap(), body);
}

#[tokio::test]
async fn post_conflict_on_taken_id() {
    let base = start_server("post_conflict", USERS_SECTION).await;
    let client = reqwest::Client::new();

    let first = client
        .post(format!("{base}/api/users"))
        .header("Content-Type", "application/json")
        .body(r#"{"id":"42","name":"x"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 201);

    let second = client
        .post(format!("{base}/api/users"))
        .header("Content-Type", "application/json")
        .body(r#"{"id":"42","name":"y"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 409);
}

#[tokio::test]
async fn delete_collection_cascades() {
    let base = start_server(
        "delete_cascade",
        r#"
sections:
  shop:
    path_pattern: "/shop/**"
    body_id_paths: ["/id"]
"#,
    )
    .await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/shop/cart/7"))
        .header("Content-Type", "application/json")
        .body(r#"{"id":"7"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = client
        .delete(format!("{base}/shop/cart"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let resp = client
        .get(format!("{base}/shop/cart/7"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn wildcard_scenario_matches_deep_paths_only_under_prefix() {
    let base = start_server(
        "wildcard_scenario",
        r#"
scenarios:
  - method: GET
    path: "/users/*"
    status_code: 200
    content_type: "application/json"
    data: '{"status":"matched"}'
"#,
    )
    .await;

    let hit = reqwest::get(format!("{base}/users/alice/profile"))
        .await
        .unwrap();
    assert_eq!(hit.status(), 200);
    let body: serde_json::Value = hit.json().await.unwrap();
    assert_eq!(body["status"], "matched");

    let miss = reqwest::get(format!("{base}/customers/data")).await.unwrap();
    assert_eq!(miss.status(), 404);
}

#[tokio::test]
async fn scenario_overrides_store() {
    let base = start_server("scenario_overrides", USERS_SECTION).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/users"))
        .header("Content-Type", "application/json")
        .body(r#"{"id":"u1","name":"stored"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = client
        .post(format!("{base}/_uni/scenarios"))
        .json(&json!({
            "requestPath": "GET /api/users/u1",
            "statusCode": 418,
            "contentType": "application/vnd.teapot",
            "data": "{\"x\":1}"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = client
        .get(format!("{base}/api/users/u1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 418);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/vnd.teapot"
    );
    assert_eq!(resp.text().await.unwrap(), r#"{"x":1}"#);
}

#[tokio::test]
async fn exact_scenario_beats_wildcard() {
    let base = start_server(
        "exact_over_wildcard",
        r#"
scenarios:
  - method: GET
    path: "/a/*"
    status_code: 200
    data: "wild"
  - method: GET
    path: "/a/b"
    status_code: 200
    data: "exact"
"#,
    )
    .await;

    let resp = reqwest::get(format!("{base}/a/b")).await.unwrap();
    assert_eq!(resp.text().await.unwrap(), "exact");
    let resp = reqwest::get(format!("{base}/a/c")).await.unwrap();
    assert_eq!(resp.text().await.unwrap(), "wild");
}

#[tokio::test]
async fn collection_get_returns_json_array() {
    let base = start_server("collection_get", USERS_SECTION).await;
    let client = reqwest::Client::new();

    for body in [r#"{"id":"1"}"#, r#"{"id":"2"}"#] {
        let resp = client
            .post(format!("{base}/api/users"))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }

    let resp = client
        .get(format!("{base}/api/users"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );
    let arr: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(arr.as_array().unwrap().len(), 2);
    assert_eq!(arr[0]["id"], "1");
    assert_eq!(arr[1]["id"], "2");
}

#[tokio::test]
async fn root_collection_is_empty_array_not_404() {
    let base = start_server(
        "root_collection",
        r#"
sections:
  all:
    path_pattern: "/**"
"#,
    )
    .await;

    let resp = reqwest::get(format!("{base}/")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let arr: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(arr, json!([]));
}

#[tokio::test]
async fn missing_collection_is_404() {
    let base = start_server("missing_collection", USERS_SECTION).await;
    let resp = reqwest::get(format!("{base}/api/users")).await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn put_updates_and_is_idempotent() {
    let base = start_server("put_idempotent", USERS_SECTION).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/users"))
        .header("Content-Type", "application/json")
        .body(r#"{"id":"9","v":1}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let updated = r#"{"id":"9","v":2}"#;
    for _ in 0..2 {
        let resp = client
            .put(format!("{base}/api/users/9"))
            .header("Content-Type", "application/json")
            .body(updated)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.unwrap(), updated);
    }

    let resp = client
        .get(format!("{base}/api/users/9"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), updated);

    let missing = client
        .put(format!("{base}/api/users/unknown"))
        .header("Content-Type", "application/json")
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn patch_replaces_body_like_put() {
    let base = start_server("patch", USERS_SECTION).await;
    let client = reqwest::Client::new();

    client
        .post(format!("{base}/api/users"))
        .header("Content-Type", "application/json")
        .body(r#"{"id":"p1","v":1}"#)
        .send()
        .await
        .unwrap();

    let resp = client
        .patch(format!("{base}/api/users/p1"))
        .header("Content-Type", "application/json")
        .body(r#"{"id":"p1","v":2}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{base}/api/users/p1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), r#"{"id":"p1","v":2}"#);
}

#[tokio::test]
async fn head_matches_get_without_body() {
    let base = start_server("head", USERS_SECTION).await;
    let client = reqwest::Client::new();

    client
        .post(format!("{base}/api/users"))
        .header("Content-Type", "application/json")
        .body(r#"{"id":"h1"}"#)
        .send()
        .await
        .unwrap();

    let resp = client
        .head(format!("{base}/api/users/h1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );
    assert_eq!(resp.bytes().await.unwrap().len(), 0);
}

#[tokio::test]
async fn options_is_200() {
    let base = start_server("options", USERS_SECTION).await;
    let client = reqwest::Client::new();
    let resp = client
        .request(reqwest::Method::OPTIONS, format!("{base}/api/users"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn xml_body_id_extraction() {
    let base = start_server(
        "xml_ids",
        r#"
sections:
  accounts:
    path_pattern: "/accounts/**"
    body_id_paths: ["/account/id"]
    return_body: true
"#,
    )
    .await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/accounts"))
        .header("Content-Type", "application/xml")
        .body("<account><id>ax9</id><name>n</name></account>")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    assert_eq!(resp.headers().get("location").unwrap(), "/accounts/ax9");

    let resp = client
        .get(format!("{base}/accounts/ax9"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/xml"
    );
}

#[tokio::test]
async fn header_id_extraction() {
    let base = start_server(
        "header_ids",
        r#"
sections:
  users:
    path_pattern: "/api/users/**"
    header_id_names: ["X-User-Id"]
    return_body: false
"#,
    )
    .await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/users"))
        .header("Content-Type", "text/plain")
        .header("X-User-Id", "hdr7")
        .body("opaque")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    assert_eq!(resp.headers().get("location").unwrap(), "/api/users/hdr7");
    assert_eq!(resp.bytes().await.unwrap().len(), 0, "return_body false");

    let resp = client
        .get(format!("{base}/api/users/hdr7"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "opaque");
}

#[tokio::test]
async fn post_with_json_but_no_id_is_400() {
    let base = start_server("no_id_400", USERS_SECTION).await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base}/api/users"))
        .header("Content-Type", "application/json")
        .body(r#"{"name":"anonymous"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn malformed_json_body_is_400() {
    let base = start_server("bad_json_400", USERS_SECTION).await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base}/api/users"))
        .header("Content-Type", "application/json")
        .body("{oops")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn unmatched_path_is_404() {
    let base = start_server("unmatched", USERS_SECTION).await;
    let resp = reqwest::get(format!("{base}/nothing/here")).await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn fixture_sandbox_serves_empty_body() {
    let base = start_server(
        "sandbox",
        r#"
scenarios:
  - method: GET
    path: "/leak/absolute"
    status_code: 200
    data: "@/etc/passwd"
  - method: GET
    path: "/leak/escape"
    status_code: 200
    data: "@../../secret"
"#,
    )
    .await;

    for path in ["/leak/absolute", "/leak/escape"] {
        let resp = reqwest::get(format!("{base}{path}")).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.bytes().await.unwrap().len(), 0, "{path}");
    }
}

#[tokio::test]
async fn health_endpoint() {
    let base = start_server("health", "{}").await;
    let resp = reqwest::get(format!("{base}/_uni/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn management_scenario_crud() {
    let base = start_server("mgmt_crud", "{}").await;
    let client = reqwest::Client::new();

    // Create without a UUID: one is assigned.
    let resp = client
        .post(format!("{base}/_uni/scenarios"))
        .json(&json!({
            "requestPath": "GET /managed/thing",
            "statusCode": 200,
            "contentType": "application/json",
            "data": "{\"v\":1}"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: serde_json::Value = resp.json().await.unwrap();
    let uuid = created["uuid"].as_str().unwrap().to_string();
    assert!(!uuid.is_empty());

    let resp = reqwest::get(format!("{base}/managed/thing")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "{\"v\":1}");

    // List contains it.
    let list: serde_json::Value = client
        .get(format!("{base}/_uni/scenarios"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(
        list.as_array()
            .unwrap()
            .iter()
            .any(|s| s["uuid"] == uuid.as_str())
    );

    // Get by UUID.
    let got: serde_json::Value = client
        .get(format!("{base}/_uni/scenarios/{uuid}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(got["requestPath"], "GET /managed/thing");

    // Update changes the served response.
    let resp = client
        .put(format!("{base}/_uni/scenarios/{uuid}"))
        .json(&json!({
            "requestPath": "GET /managed/thing",
            "statusCode": 202,
            "data": "{\"v\":2}"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let resp = reqwest::get(format!("{base}/managed/thing")).await.unwrap();
    assert_eq!(resp.status(), 202);
    assert_eq!(resp.text().await.unwrap(), "{\"v\":2}");

    // Delete; the route disappears and a second delete is 404.
    let resp = client
        .delete(format!("{base}/_uni/scenarios/{uuid}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    let resp = reqwest::get(format!("{base}/managed/thing")).await.unwrap();
    assert_eq!(resp.status(), 404);
    let resp = client
        .delete(format!("{base}/_uni/scenarios/{uuid}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn management_rejects_non_json_content_type() {
    let base = start_server("mgmt_415", "{}").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/_uni/scenarios"))
        .header("Content-Type", "text/plain")
        .body(r#"{"requestPath":"GET /x","statusCode":200}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 415);

    let resp = client
        .post(format!("{base}/_uni/scenarios"))
        .header("Content-Type", "application/json")
        .body("not json at all")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn management_get_unknown_uuid_is_404() {
    let base = start_server("mgmt_404", "{}").await;
    let resp = reqwest::get(format!("{base}/_uni/scenarios/no-such-uuid"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn multiple_id_paths_create_aliases() {
    let base = start_server(
        "aliases",
        r#"
sections:
  users:
    path_pattern: "/api/users/**"
    body_id_paths: ["/id", "/nested/id"]
    header_id_names: ["X-User-Id"]
    return_body: true
"#,
    )
    .await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/users"))
        .header("Content-Type", "application/json")
        .header("X-User-Id", "alias-h")
        .body(r#"{"id":"alias-a","nested":{"id":"alias-b"}}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    // Header ID comes first and names the resource.
    assert_eq!(
        resp.headers().get("location").unwrap(),
        "/api/users/alias-h"
    );

    // Every alias resolves to the same record.
    for id in ["alias-h", "alias-a", "alias-b"] {
        let resp = client
            .get(format!("{base}/api/users/{id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "get by {id}");
        assert_eq!(
            resp.text().await.unwrap(),
            r#"{"id":"alias-a","nested":{"id":"alias-b"}}"#
        );
    }

    // Deleting by one alias removes them all.
    let resp = client
        .delete(format!("{base}/api/users/alias-b"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    for id in ["alias-h", "alias-a", "alias-b"] {
        let resp = client
            .get(format!("{base}/api/users/{id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404, "get by {id} after delete");
    }
}

#[tokio::test]
async fn post_without_queryable_body_mints_an_id() {
    let base = start_server(
        "minted_id",
        r#"
sections:
  blobs:
    path_pattern: "/blobs/**"
    return_body: false
"#,
    )
    .await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/blobs"))
        .header("Content-Type", "application/octet-stream")
        .body(vec![0u8, 1, 2, 3])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let location = resp
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let id = location.strip_prefix("/blobs/").unwrap();
    assert!(!id.is_empty());

    let resp = client.get(format!("{base}{location}")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await.unwrap().to_vec(), vec![0u8, 1, 2, 3]);
}

#[tokio::test]
async fn post_deep_path_uses_trailing_segment_when_body_has_no_id() {
    let base = start_server(
        "deep_fallback",
        r#"
sections:
  shop:
    path_pattern: "/shop/**"
    body_id_paths: ["/id"]
"#,
    )
    .await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/shop/orders/555"))
        .header("Content-Type", "application/json")
        .body(r#"{"note":"no id field"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = client
        .get(format!("{base}/shop/orders/555"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), r#"{"note":"no id field"}"#);
}

#[tokio::test]
async fn scenario_priority_holds_regardless_of_store_contents() {
    // The same method+path both as a scenario and as a live record: the
    // scenario always answers, and deleting it uncovers the record.
    let base = start_server(
        "priority",
        r#"
sections:
  users:
    path_pattern: "/api/users/**"
    body_id_paths: ["/id"]
    return_body: true
"#,
    )
    .await;
    let client = reqwest::Client::new();

    client
        .post(format!("{base}/api/users"))
        .header("Content-Type", "application/json")
        .body(r#"{"id":"pr1","from":"store"}"#)
        .send()
        .await
        .unwrap();

    let created: serde_json::Value = client
        .post(format!("{base}/_uni/scenarios"))
        .json(&json!({
            "requestPath": "GET /api/users/pr1",
            "statusCode": 200,
            "contentType": "application/json",
            "data": "{\"from\":\"scenario\"}"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let body: serde_json::Value = client
        .get(format!("{base}/api/users/pr1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["from"], "scenario");

    let uuid = created["uuid"].as_str().unwrap();
    client
        .delete(format!("{base}/_uni/scenarios/{uuid}"))
        .send()
        .await
        .unwrap();

    let body: serde_json::Value = client
        .get(format!("{base}/api/users/pr1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["from"], "store");
}

#[tokio::test]
async fn reserved_prefix_never_reaches_sections() {
    // A catch-all section must not capture /_uni paths.
    let base = start_server(
        "reserved_prefix",
        r#"
sections:
  all:
    path_pattern: "/**"
"#,
    )
    .await;
    let resp = reqwest::get(format!("{base}/_uni/scenarios/a/b"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
