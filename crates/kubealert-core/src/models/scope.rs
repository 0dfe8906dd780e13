//! Resource scopes an alert can be attached to

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Key under which the scope tag is carried in scope maps and search blobs
pub const RS_TYPE_NAME: &str = "rs_type_name";

/// Workspace identifying field
pub const WS_NAME: &str = "ws_name";

/// Namespace identifying field
pub const NS_NAME: &str = "ns_name";

/// Node identifying field
pub const NODE_ID: &str = "node_id";

/// Pod identifying field
pub const POD_NAME: &str = "pod_name";

/// The level of the cluster hierarchy a resource type describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeTag {
    /// Whole cluster
    Cluster,
    /// Cluster nodes
    Node,
    /// Workspaces (groups of namespaces)
    Workspace,
    /// Namespaces
    Namespace,
    /// Deployments, statefulsets and daemonsets
    Workload,
    /// Pods
    Pod,
    /// Containers
    Container,
}

impl ScopeTag {
    /// Every scope, outermost first
    pub const ALL: [ScopeTag; 7] = [
        ScopeTag::Cluster,
        ScopeTag::Node,
        ScopeTag::Workspace,
        ScopeTag::Namespace,
        ScopeTag::Workload,
        ScopeTag::Pod,
        ScopeTag::Container,
    ];

    /// Resource type name this scope expects
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cluster => "cluster",
            Self::Node => "node",
            Self::Workspace => "workspace",
            Self::Namespace => "namespace",
            Self::Workload => "workload",
            Self::Pod => "pod",
            Self::Container => "container",
        }
    }
}

impl fmt::Display for ScopeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| Error::validation(format!("unknown resource scope '{s}'")))
    }
}

/// A scope tag together with the fields that pin it down
///
/// Serializes to the flat map form used on the wire and in search blobs,
/// e.g. `{"rs_type_name":"namespace","ns_name":"foo"}`. Absent and empty
/// fields are treated alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rs_type_name", rename_all = "lowercase")]
pub enum ScopeContext {
    /// Cluster scope
    Cluster,
    /// Node scope
    Node,
    /// Workspace scope
    Workspace {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ws_name: Option<String>,
    },
    /// Namespace scope
    Namespace {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ns_name: Option<String>,
    },
    /// Workload scope
    Workload {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ns_name: Option<String>,
    },
    /// Pod scope, reached through a namespace or a node
    Pod {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ns_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node_id: Option<String>,
    },
    /// Container scope, reached through a namespace or a node pod
    Container {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ns_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pod_name: Option<String>,
    },
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl ScopeContext {
    /// Decode the JSON scope map sent by manager-service callers
    pub fn from_resource_map(resource_map: &str) -> Result<Self, Error> {
        let scope: Self = serde_json::from_str(resource_map)
            .map_err(|e| Error::validation(format!("invalid resource map: {e}")))?;
        Ok(scope.normalized())
    }

    /// Drop empty identifying fields
    pub fn normalized(self) -> Self {
        match self {
            Self::Cluster => Self::Cluster,
            Self::Node => Self::Node,
            Self::Workspace { ws_name } => Self::Workspace {
                ws_name: non_empty(ws_name),
            },
            Self::Namespace { ns_name } => Self::Namespace {
                ns_name: non_empty(ns_name),
            },
            Self::Workload { ns_name } => Self::Workload {
                ns_name: non_empty(ns_name),
            },
            Self::Pod { ns_name, node_id } => Self::Pod {
                ns_name: non_empty(ns_name),
                node_id: non_empty(node_id),
            },
            Self::Container {
                ns_name,
                node_id,
                pod_name,
            } => Self::Container {
                ns_name: non_empty(ns_name),
                node_id: non_empty(node_id),
                pod_name: non_empty(pod_name),
            },
        }
    }

    /// The scope tag
    pub fn tag(&self) -> ScopeTag {
        match self {
            Self::Cluster => ScopeTag::Cluster,
            Self::Node => ScopeTag::Node,
            Self::Workspace { .. } => ScopeTag::Workspace,
            Self::Namespace { .. } => ScopeTag::Namespace,
            Self::Workload { .. } => ScopeTag::Workload,
            Self::Pod { .. } => ScopeTag::Pod,
            Self::Container { .. } => ScopeTag::Container,
        }
    }

    /// Workspace name, empty when the scope has none
    pub fn ws_name(&self) -> &str {
        match self {
            Self::Workspace { ws_name } => ws_name.as_deref().unwrap_or(""),
            _ => "",
        }
    }

    /// Namespace name, empty when the scope has none
    pub fn ns_name(&self) -> &str {
        match self {
            Self::Namespace { ns_name }
            | Self::Workload { ns_name }
            | Self::Pod { ns_name, .. }
            | Self::Container { ns_name, .. } => ns_name.as_deref().unwrap_or(""),
            _ => "",
        }
    }

    /// Non-empty identifying fields as `(key, value)` pairs
    pub fn identifying_fields(&self) -> Vec<(&'static str, &str)> {
        let fields: Vec<(&'static str, &Option<String>)> = match self {
            Self::Cluster | Self::Node => vec![],
            Self::Workspace { ws_name } => vec![(WS_NAME, ws_name)],
            Self::Namespace { ns_name } | Self::Workload { ns_name } => vec![(NS_NAME, ns_name)],
            Self::Pod { ns_name, node_id } => vec![(NS_NAME, ns_name), (NODE_ID, node_id)],
            Self::Container {
                ns_name,
                node_id,
                pod_name,
            } => vec![
                (NS_NAME, ns_name),
                (NODE_ID, node_id),
                (POD_NAME, pod_name),
            ],
        };

        fields
            .into_iter()
            .filter_map(|(key, value)| match value.as_deref() {
                Some(v) if !v.is_empty() => Some((key, v)),
                _ => None,
            })
            .collect()
    }

    /// Canonical JSON form with sorted keys, used for logging and lock keys
    pub fn search_blob(&self) -> String {
        let mut map = serde_json::Map::new();
        map.insert(RS_TYPE_NAME.to_string(), self.tag().as_str().into());
        for (key, value) in self.identifying_fields() {
            map.insert(key.to_string(), value.into());
        }
        serde_json::Value::Object(map).to_string()
    }

    /// Whether a resource filter of type `rs_type_name` with URI params
    /// `filter_uri` falls inside this scope
    pub fn contains_filter(&self, rs_type_name: &str, filter_uri: &HashMap<String, String>) -> bool {
        rs_type_name == self.tag().as_str()
            && self
                .identifying_fields()
                .into_iter()
                .all(|(key, value)| filter_uri.get(key).map(String::as_str) == Some(value))
    }
}

impl fmt::Display for ScopeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag().as_str())?;
        for (key, value) in self.identifying_fields() {
            write!(f, " {key}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn resource_map_round_trips_through_the_tagged_form() {
        let scope = ScopeContext::from_resource_map(r#"{"rs_type_name":"namespace","ns_name":"foo"}"#)
            .unwrap();
        assert_eq!(
            scope,
            ScopeContext::Namespace {
                ns_name: Some("foo".into())
            }
        );
        assert_eq!(scope.search_blob(), r#"{"ns_name":"foo","rs_type_name":"namespace"}"#);
    }

    #[test]
    fn empty_path_params_are_dropped() {
        let scope = ScopeContext::from_resource_map(
            r#"{"rs_type_name":"container","ns_name":"","node_id":"node-1","pod_name":"web-0"}"#,
        )
        .unwrap();
        assert_eq!(scope.ns_name(), "");
        assert_eq!(
            scope.identifying_fields(),
            vec![(NODE_ID, "node-1"), (POD_NAME, "web-0")]
        );
    }

    #[test]
    fn unit_scopes_ignore_extra_keys() {
        let scope =
            ScopeContext::from_resource_map(r#"{"rs_type_name":"cluster","ns_name":"x"}"#).unwrap();
        assert_eq!(scope, ScopeContext::Cluster);
        assert_eq!(scope.search_blob(), r#"{"rs_type_name":"cluster"}"#);
    }

    #[test]
    fn unknown_scope_is_rejected() {
        assert!(ScopeContext::from_resource_map(r#"{"rs_type_name":"galaxy"}"#).is_err());
        assert!("galaxy".parse::<ScopeTag>().is_err());
        assert_eq!("pod".parse::<ScopeTag>().unwrap(), ScopeTag::Pod);
    }

    #[test]
    fn filter_containment_checks_type_and_fields() {
        let scope = ScopeContext::Pod {
            ns_name: Some("ns1".into()),
            node_id: None,
        };
        let uri: HashMap<String, String> = [("ns_name".to_string(), "ns1".to_string())].into();

        assert!(scope.contains_filter("pod", &uri));
        assert!(!scope.contains_filter("namespace", &uri));
        assert!(!ScopeContext::Pod {
            ns_name: Some("ns2".into()),
            node_id: None
        }
        .contains_filter("pod", &uri));
    }
}
