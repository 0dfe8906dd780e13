//! Policies and the rules and actions they own

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::query::Paging;
use crate::error::Error;

/// A named set of rules with a validity window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Policy {
    /// Unique identifier (`pl-*`)
    pub policy_id: String,
    /// Human-readable name
    pub policy_name: String,
    /// Free-form description
    pub policy_description: String,
    /// Serialized notification/repeat configuration
    pub policy_config: String,
    /// Who created the policy
    pub creator: String,
    /// Start of the daily validity window, e.g. `000000`
    pub available_start_time: String,
    /// End of the daily validity window, e.g. `235959`
    pub available_end_time: String,
    /// Language of notification texts
    pub language: String,
    /// Resource type the policy applies to
    pub rs_type_id: String,
    /// When the row was created
    pub create_time: DateTime<Utc>,
    /// When the row was last updated
    pub update_time: DateTime<Utc>,
}

impl Policy {
    /// Id prefix
    pub const ID_PREFIX: &'static str = "pl";
}

/// The policy part of a composite alert request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySpec {
    pub policy_name: String,
    #[serde(default)]
    pub policy_description: String,
    #[serde(default)]
    pub policy_config: String,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub available_start_time: String,
    #[serde(default)]
    pub available_end_time: String,
    #[serde(default)]
    pub language: String,
}

impl PolicySpec {
    /// Bind the spec to a resource type
    pub fn into_new_policy(self, rs_type_id: impl Into<String>) -> NewPolicy {
        NewPolicy {
            spec: self,
            rs_type_id: rs_type_id.into(),
        }
    }
}

/// Input for creating a policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPolicy {
    #[serde(flatten)]
    pub spec: PolicySpec,
    pub rs_type_id: String,
}

/// Partial update of a policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyUpdate {
    #[serde(default)]
    pub policy_id: String,
    pub policy_name: Option<String>,
    pub policy_description: Option<String>,
    pub policy_config: Option<String>,
    pub creator: Option<String>,
    pub available_start_time: Option<String>,
    pub available_end_time: Option<String>,
    pub language: Option<String>,
    pub rs_type_id: Option<String>,
}

/// Describe filter for policies
#[derive(Debug, Clone, Default)]
pub struct PolicyFilter {
    pub policy_ids: Vec<String>,
    pub policy_names: Vec<String>,
    pub creators: Vec<String>,
    pub rs_type_ids: Vec<String>,
    pub paging: Paging,
}

/// Rule severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Needs immediate attention
    Critical,
    /// Degraded service
    Major,
    /// Informational
    #[default]
    Minor,
}

impl Severity {
    /// Storage form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Major => "major",
            Self::Minor => "minor",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Self::Critical),
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            other => Err(Error::validation(format!("unknown severity '{other}'"))),
        }
    }
}

/// A threshold condition on one metric, owned by a policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique identifier (`rl-*`)
    pub rule_id: String,
    /// Human-readable name
    pub rule_name: String,
    /// Whether evaluation is suspended
    pub disabled: bool,
    /// Number of monitor periods per evaluation
    pub monitor_periods: i32,
    /// Severity of the resulting alert
    pub severity: Severity,
    /// How the metric is aggregated
    pub metrics_type: String,
    /// Comparison, e.g. `>` or `<=`
    pub condition_type: String,
    /// Threshold value(s)
    pub thresholds: String,
    /// Unit of the thresholds
    pub unit: String,
    /// Consecutive breaches before firing
    pub consecutive_count: i32,
    /// Suppress lower severities while this rule fires
    pub inhibit: bool,
    /// Owning policy
    pub policy_id: String,
    /// Evaluated metric
    pub metric_id: String,
    /// When the row was created
    pub create_time: DateTime<Utc>,
    /// When the row was last updated
    pub update_time: DateTime<Utc>,
}

impl Rule {
    /// Id prefix
    pub const ID_PREFIX: &'static str = "rl";
}

/// One rule of a composite alert request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub rule_name: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub monitor_periods: i32,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub metrics_type: String,
    #[serde(default)]
    pub condition_type: String,
    #[serde(default)]
    pub thresholds: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub consecutive_count: i32,
    #[serde(default)]
    pub inhibit: bool,
    pub metric_id: String,
}

impl RuleSpec {
    /// Attach the rule to a policy
    pub fn into_new_rule(self, policy_id: impl Into<String>) -> NewRule {
        NewRule {
            spec: self,
            policy_id: policy_id.into(),
        }
    }
}

/// Input for creating a rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewRule {
    #[serde(flatten)]
    pub spec: RuleSpec,
    pub policy_id: String,
}

/// Partial update of a rule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleUpdate {
    pub rule_id: String,
    pub rule_name: Option<String>,
    pub disabled: Option<bool>,
    pub monitor_periods: Option<i32>,
    pub severity: Option<Severity>,
    pub metrics_type: Option<String>,
    pub condition_type: Option<String>,
    pub thresholds: Option<String>,
    pub unit: Option<String>,
    pub consecutive_count: Option<i32>,
    pub inhibit: Option<bool>,
}

/// Describe filter for rules
#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    pub rule_ids: Vec<String>,
    pub rule_names: Vec<String>,
    pub severities: Vec<String>,
    pub policy_ids: Vec<String>,
    pub metric_ids: Vec<String>,
    pub paging: Paging,
}

/// What to do when a policy's rules fire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Action {
    /// Unique identifier (`act-*`)
    pub action_id: String,
    /// Human-readable name
    pub action_name: String,
    /// Alert status that triggers the action
    pub trigger_status: String,
    /// Kind of action, e.g. `notification`
    pub trigger_action: String,
    /// Owning policy
    pub policy_id: String,
    /// Notification address list to send to
    pub nf_address_list_id: String,
    /// When the row was created
    pub create_time: DateTime<Utc>,
    /// When the row was last updated
    pub update_time: DateTime<Utc>,
}

impl Action {
    /// Id prefix
    pub const ID_PREFIX: &'static str = "act";
}

/// The action part of a composite alert request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub action_name: String,
    #[serde(default)]
    pub trigger_status: String,
    #[serde(default)]
    pub trigger_action: String,
    #[serde(default)]
    pub nf_address_list_id: String,
}

impl ActionSpec {
    /// Attach the action to a policy
    pub fn into_new_action(self, policy_id: impl Into<String>) -> NewAction {
        NewAction {
            spec: self,
            policy_id: policy_id.into(),
        }
    }
}

/// Input for creating an action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAction {
    #[serde(flatten)]
    pub spec: ActionSpec,
    pub policy_id: String,
}

/// Partial update of an action
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionUpdate {
    pub action_id: String,
    pub action_name: Option<String>,
    pub trigger_status: Option<String>,
    pub trigger_action: Option<String>,
    pub nf_address_list_id: Option<String>,
}

/// Describe filter for actions
#[derive(Debug, Clone, Default)]
pub struct ActionFilter {
    pub action_ids: Vec<String>,
    pub action_names: Vec<String>,
    pub trigger_status: Vec<String>,
    pub trigger_actions: Vec<String>,
    pub policy_ids: Vec<String>,
    pub nf_address_list_ids: Vec<String>,
    pub paging: Paging,
}
