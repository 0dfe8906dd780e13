//! Resource types, resource filters and metrics

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::query::Paging;

/// A kind of Kubernetes resource alerts can target (reference data)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ResourceType {
    /// Unique identifier (`rst-*`)
    pub rs_type_id: String,
    /// One of the scope names (`cluster`, `node`, ...)
    pub rs_type_name: String,
    /// JSON schema of the params resource filters of this type carry
    pub rs_type_param: String,
    /// When the row was created
    pub create_time: DateTime<Utc>,
    /// When the row was last updated
    pub update_time: DateTime<Utc>,
}

impl ResourceType {
    /// Id prefix
    pub const ID_PREFIX: &'static str = "rst";
}

/// Input for creating a resource type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewResourceType {
    pub rs_type_name: String,
    #[serde(default)]
    pub rs_type_param: String,
}

/// Partial update of a resource type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceTypeUpdate {
    pub rs_type_id: String,
    pub rs_type_name: Option<String>,
    pub rs_type_param: Option<String>,
}

/// Describe filter for resource types
#[derive(Debug, Clone, Default)]
pub struct ResourceTypeFilter {
    pub rs_type_ids: Vec<String>,
    pub rs_type_names: Vec<String>,
    pub paging: Paging,
}

/// A concrete selection of resources, scoped by its URI params
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ResourceFilter {
    /// Unique identifier (`rf-*`)
    pub rs_filter_id: String,
    /// Human-readable name
    pub rs_filter_name: String,
    /// JSON object of string scope descriptors, e.g. `{"ns_name":"ns1"}`
    pub rs_filter_param: String,
    /// Lifecycle status
    pub status: String,
    /// Owning resource type
    pub rs_type_id: String,
    /// When the row was created
    pub create_time: DateTime<Utc>,
    /// When the row was last updated
    pub update_time: DateTime<Utc>,
}

impl ResourceFilter {
    /// Id prefix
    pub const ID_PREFIX: &'static str = "rf";

    /// Decode the URI params, if they are well formed
    pub fn uri(&self) -> Option<HashMap<String, String>> {
        serde_json::from_str(&self.rs_filter_param).ok()
    }
}

/// Input for creating a resource filter; also the resource filter part of a
/// composite alert request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewResourceFilter {
    pub rs_filter_name: String,
    pub rs_filter_param: String,
    #[serde(default)]
    pub status: String,
    pub rs_type_id: String,
}

/// Partial update of a resource filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceFilterUpdate {
    pub rs_filter_id: String,
    pub rs_filter_name: Option<String>,
    pub rs_filter_param: Option<String>,
    pub status: Option<String>,
}

/// Describe filter for resource filters
#[derive(Debug, Clone, Default)]
pub struct ResourceFilterFilter {
    pub rs_filter_ids: Vec<String>,
    pub rs_filter_names: Vec<String>,
    pub status: Vec<String>,
    pub rs_type_ids: Vec<String>,
    pub paging: Paging,
}

/// A monitoring metric rules can be evaluated against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Metric {
    /// Unique identifier (`mt-*`)
    pub metric_id: String,
    /// Metric name, e.g. `node_cpu_utilisation`
    pub metric_name: String,
    /// Query parameters for the metric backend
    pub metric_param: String,
    /// Lifecycle status
    pub status: String,
    /// Resource type the metric applies to
    pub rs_type_id: String,
    /// When the row was created
    pub create_time: DateTime<Utc>,
    /// When the row was last updated
    pub update_time: DateTime<Utc>,
}

impl Metric {
    /// Id prefix
    pub const ID_PREFIX: &'static str = "mt";
}

/// Input for creating a metric
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewMetric {
    pub metric_name: String,
    #[serde(default)]
    pub metric_param: String,
    #[serde(default)]
    pub status: String,
    pub rs_type_id: String,
}

/// Partial update of a metric
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricUpdate {
    pub metric_id: String,
    pub metric_name: Option<String>,
    pub metric_param: Option<String>,
    pub status: Option<String>,
}

/// Describe filter for metrics
#[derive(Debug, Clone, Default)]
pub struct MetricFilter {
    pub metric_ids: Vec<String>,
    pub metric_names: Vec<String>,
    pub status: Vec<String>,
    pub rs_type_ids: Vec<String>,
    pub paging: Paging,
}
