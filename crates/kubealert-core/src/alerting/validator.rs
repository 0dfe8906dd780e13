//! Resource filter scope validation

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::models::scope::{NS_NAME, WS_NAME};
use crate::models::ScopeContext;

/// Decode a resource filter's URI params (a JSON object of strings)
pub fn decode_filter_param(raw: &str) -> Result<HashMap<String, String>> {
    serde_json::from_str(raw).map_err(Error::MalformedFilterParam)
}

/// The URI field a scope pins and the value it expects, if any
///
/// Absent path params compare as the empty string.
fn pinned_field(scope: &ScopeContext) -> Option<(&'static str, &str)> {
    match scope {
        ScopeContext::Cluster | ScopeContext::Node => None,
        ScopeContext::Workspace { .. } => Some((WS_NAME, scope.ws_name())),
        ScopeContext::Namespace { .. }
        | ScopeContext::Workload { .. }
        | ScopeContext::Pod { .. }
        | ScopeContext::Container { .. } => Some((NS_NAME, scope.ns_name())),
    }
}

/// Whether a decoded filter URI agrees with the caller's scope
pub fn validate_scope(scope: &ScopeContext, filter_uri: &HashMap<String, String>) -> bool {
    pinned_field(scope).map_or(true, |(key, expected)| {
        filter_uri.get(key).map_or("", String::as_str) == expected
    })
}

/// Decode `raw` and check it against `scope`
///
/// Every identifying field of the scope, node and pod included, must also
/// appear in the filter with the same value.
pub fn check_filter_param(scope: &ScopeContext, raw: &str) -> Result<HashMap<String, String>> {
    let uri = decode_filter_param(raw)?;
    let mismatch = if validate_scope(scope, &uri) {
        scope
            .identifying_fields()
            .into_iter()
            .find(|(key, expected)| uri.get(*key).map(String::as_str) != Some(*expected))
    } else {
        pinned_field(scope)
    };

    match mismatch {
        None => Ok(uri),
        Some((key, expected)) => Err(Error::ScopeMismatch {
            scope: scope.to_string(),
            detail: format!(
                "{key} is '{}', expected '{expected}'",
                uri.get(key).map_or("", String::as_str)
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;
    use rstest::rstest;

    fn ns(name: &str) -> Option<String> {
        Some(name.to_string())
    }

    #[rstest]
    #[case::cluster(ScopeContext::Cluster, r#"{"ns_name":"anything"}"#, true)]
    #[case::node(ScopeContext::Node, r#"{}"#, true)]
    #[case::workspace_match(ScopeContext::Workspace { ws_name: ns("ws1") }, r#"{"ws_name":"ws1"}"#, true)]
    #[case::workspace_mismatch(ScopeContext::Workspace { ws_name: ns("ws1") }, r#"{"ws_name":"ws2"}"#, false)]
    #[case::all_workspaces(ScopeContext::Workspace { ws_name: None }, r#"{}"#, true)]
    #[case::all_workspaces_pinned_filter(ScopeContext::Workspace { ws_name: None }, r#"{"ws_name":"ws1"}"#, false)]
    #[case::namespace(ScopeContext::Namespace { ns_name: ns("ns1") }, r#"{"ns_name":"ns1"}"#, true)]
    #[case::namespace_missing(ScopeContext::Namespace { ns_name: ns("ns1") }, r#"{}"#, false)]
    #[case::workload(ScopeContext::Workload { ns_name: ns("ns1") }, r#"{"ns_name":"ns2"}"#, false)]
    #[case::node_pods(ScopeContext::Pod { ns_name: None, node_id: ns("node-1") }, r#"{"node_id":"node-1"}"#, true)]
    #[case::container(
        ScopeContext::Container { ns_name: ns("ns1"), node_id: None, pod_name: ns("web-0") },
        r#"{"ns_name":"ns1","pod_name":"web-0"}"#,
        true
    )]
    fn scope_agreement(#[case] scope: ScopeContext, #[case] raw: &str, #[case] expected: bool) {
        let uri = decode_filter_param(raw).unwrap();
        assert_eq!(validate_scope(&scope, &uri), expected);
        assert_eq!(check_filter_param(&scope, raw).is_ok(), expected);
    }

    #[rstest]
    #[case::node_pods_without_node(ScopeContext::Pod { ns_name: None, node_id: ns("n1") }, r#"{}"#)]
    #[case::node_pods_other_node(ScopeContext::Pod { ns_name: None, node_id: ns("n1") }, r#"{"node_id":"n2"}"#)]
    #[case::container_other_pod(
        ScopeContext::Container { ns_name: ns("ns1"), node_id: None, pod_name: ns("web-0") },
        r#"{"ns_name":"ns1","pod_name":"web-1"}"#
    )]
    #[case::node_container_without_pod(
        ScopeContext::Container { ns_name: None, node_id: ns("n1"), pod_name: ns("web-0") },
        r#"{"node_id":"n1"}"#
    )]
    fn creation_requires_every_identifying_field(#[case] scope: ScopeContext, #[case] raw: &str) {
        let err = check_filter_param(&scope, raw).unwrap_err();
        assert!(matches!(err, Error::ScopeMismatch { .. }), "{err}");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let uri = decode_filter_param(raw).unwrap();
        assert!(!scope.contains_filter(scope.tag().as_str(), &uri));
    }

    #[test]
    fn node_mismatch_names_the_node_field() {
        let err = check_filter_param(
            &ScopeContext::Pod { ns_name: None, node_id: ns("n1") },
            r#"{"node_id":"n2"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().ends_with("node_id is 'n2', expected 'n1'"), "{err}");
    }

    #[rstest]
    #[case::not_json("ns_name=ns1")]
    #[case::array(r#"["ns1"]"#)]
    #[case::non_string_value(r#"{"ns_name":1}"#)]
    fn malformed_params_are_distinct_from_mismatches(#[case] raw: &str) {
        let err = check_filter_param(&ScopeContext::Cluster, raw).unwrap_err();
        assert!(matches!(err, Error::MalformedFilterParam(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn mismatch_names_the_field() {
        let err = check_filter_param(
            &ScopeContext::Namespace { ns_name: ns("ns1") },
            r#"{"ns_name":"ns2"}"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Resource filter does not match namespace ns_name=ns1 scope: ns_name is 'ns2', expected 'ns1'"
        );
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    proptest! {
        #[test]
        fn namespace_scopes_accept_exactly_their_namespace(
            scope_ns in "[a-z0-9-]{0,12}",
            filter_ns in "[a-z0-9-]{0,12}",
        ) {
            let scope = ScopeContext::Namespace { ns_name: Some(scope_ns.clone()) }.normalized();
            let uri: HashMap<String, String> = [(NS_NAME.to_string(), filter_ns.clone())].into();
            prop_assert_eq!(validate_scope(&scope, &uri), scope_ns == filter_ns);
        }

        #[test]
        fn cluster_and_node_accept_any_object(
            uri in proptest::collection::hash_map("[a-z_]{1,8}", "[a-z0-9]{0,8}", 0..4),
        ) {
            prop_assert!(validate_scope(&ScopeContext::Cluster, &uri));
            prop_assert!(validate_scope(&ScopeContext::Node, &uri));
        }
    }
}
