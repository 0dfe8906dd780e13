#![allow(dead_code)]

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use kubealert::api::{create_router, AppState};
use kubealert::db::Database;
use serde_json::{json, Value};
use tower::util::ServiceExt;

pub fn build_state() -> AppState {
    AppState::new(Database::in_memory(), Duration::from_secs(5), None)
}

pub fn build_app() -> axum::Router {
    create_router(build_state())
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    request_raw(app, method, uri, &body.unwrap_or(Value::Null).to_string()).await
}

/// Send `body` as-is with a JSON content type
pub async fn request_raw(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: &str,
) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json)
}

/// Composite creation body for a namespace-scoped alert
pub fn namespace_alert(ns: &str, name: &str, rules: usize) -> Value {
    let rules: Vec<Value> = (0..rules)
        .map(|i| {
            json!({
                "rule_name": format!("rule-{i}"),
                "severity": "critical",
                "condition_type": ">",
                "thresholds": "90",
                "metric_id": format!("mt-{i}"),
            })
        })
        .collect();

    json!({
        "resource_filter": {
            "rs_filter_name": format!("{ns}-filter"),
            "rs_filter_param": json!({ "ns_name": ns }).to_string(),
            "status": "active",
            "rs_type_id": "rst-namespace",
        },
        "policy": {
            "policy_name": format!("{name}-policy"),
            "creator": "admin",
            "language": "en",
        },
        "rules": rules,
        "action": {
            "action_name": format!("{name}-action"),
            "nf_address_list_id": "nl-ops",
        },
        "alert": { "alert_name": name },
    })
}
