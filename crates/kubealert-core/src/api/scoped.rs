//! Alert routes addressed by name under a cluster hierarchy prefix
//!
//! Each prefix (`/clusters`, `/namespaces/:ns_name/pods`, ...) is mounted
//! with its [`ScopeTag`]; path parameters fill in the scope fields.

use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::{Extension, Json};

use super::handlers::AppState;
use super::query::ListQuery;
use super::response::{
    json_body, AlertIdResponse, ApiResult, DeletedAlertsResponse, PolicyIdResponse,
};
use crate::alerting;
use crate::models::scope::{NODE_ID, NS_NAME, POD_NAME, WS_NAME};
use crate::models::{
    AlertByName, AlertDetail, CompositeAlertSpec, CreatedAlert, Page, PolicyByAlert, ScopeContext,
    ScopeTag,
};

/// Route prefixes under `/api/v1` and the scope each one addresses
pub const SCOPE_PREFIXES: [(&str, ScopeTag); 11] = [
    ("/clusters", ScopeTag::Cluster),
    ("/nodes", ScopeTag::Node),
    ("/workspaces", ScopeTag::Workspace),
    ("/workspaces/:ws_name", ScopeTag::Workspace),
    ("/namespaces", ScopeTag::Namespace),
    ("/namespaces/:ns_name", ScopeTag::Namespace),
    ("/namespaces/:ns_name/workloads", ScopeTag::Workload),
    ("/namespaces/:ns_name/pods", ScopeTag::Pod),
    ("/nodes/:node_id/pods", ScopeTag::Pod),
    ("/namespaces/:ns_name/pods/:pod_name/containers", ScopeTag::Container),
    ("/nodes/:node_id/pods/:pod_name/containers", ScopeTag::Container),
];

/// Build the scope for `tag` from the matched path parameters
pub fn scope_from_path(tag: ScopeTag, params: &HashMap<String, String>) -> ScopeContext {
    let field = |key: &str| params.get(key).cloned();
    match tag {
        ScopeTag::Cluster => ScopeContext::Cluster,
        ScopeTag::Node => ScopeContext::Node,
        ScopeTag::Workspace => ScopeContext::Workspace {
            ws_name: field(WS_NAME),
        },
        ScopeTag::Namespace => ScopeContext::Namespace {
            ns_name: field(NS_NAME),
        },
        ScopeTag::Workload => ScopeContext::Workload {
            ns_name: field(NS_NAME),
        },
        ScopeTag::Pod => ScopeContext::Pod {
            ns_name: field(NS_NAME),
            node_id: field(NODE_ID),
        },
        ScopeTag::Container => ScopeContext::Container {
            ns_name: field(NS_NAME),
            node_id: field(NODE_ID),
            pod_name: field(POD_NAME),
        },
    }
    .normalized()
}

fn scope(tag: ScopeTag, params: Option<Path<HashMap<String, String>>>) -> ScopeContext {
    let params = params.map(|Path(params)| params).unwrap_or_default();
    scope_from_path(tag, &params)
}

/// Create an alert together with its filter, policy, action and rules
pub async fn create_alert(
    State(state): State<AppState>,
    Extension(tag): Extension<ScopeTag>,
    params: Option<Path<HashMap<String, String>>>,
    body: Result<Json<CompositeAlertSpec>, JsonRejection>,
) -> ApiResult<CreatedAlert> {
    let spec = json_body(body)?;
    let scope = scope(tag, params);
    let created = state.creator.create(&scope, spec).await?;
    Ok(Json(created))
}

/// Modify the alert named in the body
pub async fn modify_alert_by_name(
    State(state): State<AppState>,
    Extension(tag): Extension<ScopeTag>,
    params: Option<Path<HashMap<String, String>>>,
    body: Result<Json<AlertByName>, JsonRejection>,
) -> ApiResult<AlertIdResponse> {
    let request = json_body(body)?;
    let scope = scope(tag, params);
    let alert_id = alerting::modify_alert_by_name(state.db.store.as_ref(), &scope, request).await?;
    Ok(Json(AlertIdResponse { alert_id }))
}

/// Delete the alerts listed in `alert_names`
pub async fn delete_alerts_by_name(
    State(state): State<AppState>,
    Extension(tag): Extension<ScopeTag>,
    params: Option<Path<HashMap<String, String>>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<DeletedAlertsResponse> {
    let scope = scope(tag, params);
    let raw_names = query.list("alert_names").join(",");
    let alert_names =
        alerting::delete_alerts_by_name(state.db.store.as_ref(), &scope, &raw_names).await?;
    Ok(Json(DeletedAlertsResponse { alert_names }))
}

/// Alert details within the scope
pub async fn describe_alert_details(
    State(state): State<AppState>,
    Extension(tag): Extension<ScopeTag>,
    params: Option<Path<HashMap<String, String>>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Page<AlertDetail>> {
    let scope = scope(tag, params);
    let filter = query.alert_filter()?;
    let page = state.db.store.describe_alert_details(&scope, &filter).await?;
    Ok(Json(page))
}

/// Modify the policy of the alert named in the body
pub async fn modify_policy_by_alert(
    State(state): State<AppState>,
    Extension(tag): Extension<ScopeTag>,
    params: Option<Path<HashMap<String, String>>>,
    body: Result<Json<PolicyByAlert>, JsonRejection>,
) -> ApiResult<PolicyIdResponse> {
    let request = json_body(body)?;
    let scope = scope(tag, params);
    let policy_id = alerting::modify_policy_by_alert(state.db.store.as_ref(), &scope, request).await?;
    Ok(Json(PolicyIdResponse { policy_id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[rstest]
    #[case(ScopeTag::Cluster, &[], r#"{"rs_type_name":"cluster"}"#)]
    #[case(ScopeTag::Workspace, &[], r#"{"rs_type_name":"workspace"}"#)]
    #[case(ScopeTag::Workspace, &[("ws_name", "ws1")], r#"{"rs_type_name":"workspace","ws_name":"ws1"}"#)]
    #[case(ScopeTag::Pod, &[("node_id", "n1")], r#"{"rs_type_name":"pod","node_id":"n1"}"#)]
    #[case(
        ScopeTag::Container,
        &[("ns_name", "ns1"), ("pod_name", "p1")],
        r#"{"rs_type_name":"container","ns_name":"ns1","pod_name":"p1"}"#
    )]
    fn path_parameters_fill_the_scope(
        #[case] tag: ScopeTag,
        #[case] pairs: &[(&str, &str)],
        #[case] expected: &str,
    ) {
        let scope = scope_from_path(tag, &params(pairs));
        assert_eq!(scope, ScopeContext::from_resource_map(expected).unwrap());
    }

    #[test]
    fn prefixes_cover_every_scope() {
        for tag in ScopeTag::ALL {
            assert!(SCOPE_PREFIXES.iter().any(|(_, t)| *t == tag), "{tag} unmounted");
        }
    }
}
