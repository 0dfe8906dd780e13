//! Alert data models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::policy::{ActionSpec, PolicySpec, PolicyUpdate, RuleSpec};
use super::query::Paging;
use super::resource::NewResourceFilter;
use crate::error::Error;

/// Executor-side lifecycle of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunningStatus {
    /// Created, not yet picked up by an executor
    #[default]
    Adding,
    /// Being evaluated by an executor
    Running,
    /// Definition changed, executor reloading
    Updating,
    /// Scheduled for removal
    Deleting,
}

impl RunningStatus {
    /// Storage form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Adding => "adding",
            Self::Running => "running",
            Self::Updating => "updating",
            Self::Deleting => "deleting",
        }
    }
}

impl fmt::Display for RunningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunningStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adding" => Ok(Self::Adding),
            "running" => Ok(Self::Running),
            "updating" => Ok(Self::Updating),
            "deleting" => Ok(Self::Deleting),
            other => Err(Error::validation(format!("unknown running status '{other}'"))),
        }
    }
}

/// An alert definition: a policy applied to a resource filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Unique identifier (`al-*`)
    pub alert_id: String,
    /// Name, unique within the alert's resource scope
    pub alert_name: String,
    /// Whether evaluation is suspended
    pub disabled: bool,
    /// Executor-side lifecycle
    pub running_status: RunningStatus,
    /// Owning policy
    pub policy_id: String,
    /// Owning resource filter
    pub rs_filter_id: String,
    /// Executor currently evaluating the alert, empty until assigned
    pub executor_id: String,
    /// When the row was created
    pub create_time: DateTime<Utc>,
    /// When the row was last updated
    pub update_time: DateTime<Utc>,
}

impl Alert {
    /// Id prefix
    pub const ID_PREFIX: &'static str = "al";
}

/// Input for creating an alert
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAlert {
    pub alert_name: String,
    #[serde(default)]
    pub disabled: bool,
    pub policy_id: String,
    pub rs_filter_id: String,
}

/// Partial update of an alert
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertUpdate {
    #[serde(default)]
    pub alert_id: String,
    pub alert_name: Option<String>,
    pub disabled: Option<bool>,
    pub running_status: Option<RunningStatus>,
    pub policy_id: Option<String>,
    pub rs_filter_id: Option<String>,
}

/// Describe filter for alerts
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub alert_ids: Vec<String>,
    pub alert_names: Vec<String>,
    pub disabled: Vec<bool>,
    pub running_status: Vec<String>,
    pub policy_ids: Vec<String>,
    pub rs_filter_ids: Vec<String>,
    pub executor_ids: Vec<String>,
    pub creators: Vec<String>,
    pub paging: Paging,
}

/// An alert joined with its resource filter, resource type and policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDetail {
    pub alert_id: String,
    pub alert_name: String,
    pub disabled: bool,
    pub create_time: DateTime<Utc>,
    pub running_status: RunningStatus,
    pub policy_id: String,
    pub rs_filter_id: String,
    pub rs_filter_name: String,
    pub rs_filter_param: String,
    pub rs_type_name: String,
    pub executor_id: String,
    pub policy_name: String,
    pub policy_description: String,
    pub policy_config: String,
    pub creator: String,
    pub available_start_time: String,
    pub available_end_time: String,
    pub language: String,
    /// Names of the metrics the policy's rules evaluate
    pub metrics: Vec<String>,
    /// Number of rules owned by the policy
    pub rules_count: u32,
    /// Notification address list of the policy's action
    pub nf_address_list_id: String,
}

/// The alert part of a composite alert request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertSpec {
    pub alert_name: String,
}

/// Everything needed to create an alert together with its resource filter,
/// policy, action and rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeAlertSpec {
    #[serde(rename = "resource_filter")]
    pub rs_filter: NewResourceFilter,
    pub policy: PolicySpec,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    pub action: ActionSpec,
    pub alert: AlertSpec,
}

/// Result of a successful composite creation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedAlert {
    pub alert_id: String,
    pub alert_name: String,
}

/// Modification of an alert addressed by name within a scope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertByName {
    pub alert_name: String,
    pub disabled: Option<bool>,
    pub policy_id: Option<String>,
    pub rs_filter_id: Option<String>,
}

/// Modification of the policy of an alert addressed by name within a scope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyByAlert {
    pub alert_name: String,
    #[serde(flatten)]
    pub policy: PolicyUpdate,
}
