//! In-memory entity store for tests and `serve --memory`

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;

use super::{sort_columns, EntityStore};
use crate::error::{Error, Result};
use crate::models::{
    matches_any, new_id, Action, ActionFilter, ActionUpdate, Alert, AlertDetail, AlertFilter,
    AlertUpdate, Comment, CommentFilter, History, HistoryFilter, Metric, MetricFilter,
    MetricUpdate, NewAction, NewAlert, NewComment, NewHistory, NewMetric, NewPolicy,
    NewResourceFilter, NewResourceType, NewRule, Page, Paging, Policy, PolicyFilter, PolicyUpdate,
    ResourceFilter, ResourceFilterFilter, ResourceFilterUpdate, ResourceType, ResourceTypeFilter,
    ResourceTypeUpdate, Rule, RuleFilter, RuleUpdate, RunningStatus, ScopeContext, ScopeTag,
};

/// Parameters resource filters of each seeded type carry
fn seed_param(tag: ScopeTag) -> &'static str {
    match tag {
        ScopeTag::Cluster | ScopeTag::Node => "[]",
        ScopeTag::Workspace => r#"["ws_name"]"#,
        ScopeTag::Namespace | ScopeTag::Workload => r#"["ns_name"]"#,
        ScopeTag::Pod => r#"["ns_name","node_id"]"#,
        ScopeTag::Container => r#"["ns_name","node_id","pod_name"]"#,
    }
}

/// Id of the seeded resource type for `tag`, e.g. `rst-namespace`
pub fn seeded_resource_type_id(tag: ScopeTag) -> String {
    format!("{}-{}", ResourceType::ID_PREFIX, tag)
}

trait Row {
    fn id(&self) -> &str;
    fn sort_value(&self, column: &str) -> String;
}

fn timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

impl Row for ResourceType {
    fn id(&self) -> &str {
        &self.rs_type_id
    }

    fn sort_value(&self, column: &str) -> String {
        match column {
            "rs_type_id" => self.rs_type_id.clone(),
            "rs_type_name" => self.rs_type_name.clone(),
            "update_time" => timestamp(&self.update_time),
            _ => timestamp(&self.create_time),
        }
    }
}

impl Row for ResourceFilter {
    fn id(&self) -> &str {
        &self.rs_filter_id
    }

    fn sort_value(&self, column: &str) -> String {
        match column {
            "rs_filter_id" => self.rs_filter_id.clone(),
            "rs_filter_name" => self.rs_filter_name.clone(),
            "status" => self.status.clone(),
            "update_time" => timestamp(&self.update_time),
            _ => timestamp(&self.create_time),
        }
    }
}

impl Row for Metric {
    fn id(&self) -> &str {
        &self.metric_id
    }

    fn sort_value(&self, column: &str) -> String {
        match column {
            "metric_id" => self.metric_id.clone(),
            "metric_name" => self.metric_name.clone(),
            "status" => self.status.clone(),
            "update_time" => timestamp(&self.update_time),
            _ => timestamp(&self.create_time),
        }
    }
}

impl Row for Policy {
    fn id(&self) -> &str {
        &self.policy_id
    }

    fn sort_value(&self, column: &str) -> String {
        match column {
            "policy_id" => self.policy_id.clone(),
            "policy_name" => self.policy_name.clone(),
            "creator" => self.creator.clone(),
            "update_time" => timestamp(&self.update_time),
            _ => timestamp(&self.create_time),
        }
    }
}

impl Row for Rule {
    fn id(&self) -> &str {
        &self.rule_id
    }

    fn sort_value(&self, column: &str) -> String {
        match column {
            "rule_id" => self.rule_id.clone(),
            "rule_name" => self.rule_name.clone(),
            "severity" => self.severity.as_str().to_string(),
            "update_time" => timestamp(&self.update_time),
            _ => timestamp(&self.create_time),
        }
    }
}

impl Row for Action {
    fn id(&self) -> &str {
        &self.action_id
    }

    fn sort_value(&self, column: &str) -> String {
        match column {
            "action_id" => self.action_id.clone(),
            "action_name" => self.action_name.clone(),
            "update_time" => timestamp(&self.update_time),
            _ => timestamp(&self.create_time),
        }
    }
}

impl Row for Alert {
    fn id(&self) -> &str {
        &self.alert_id
    }

    fn sort_value(&self, column: &str) -> String {
        match column {
            "alert_id" => self.alert_id.clone(),
            "alert_name" => self.alert_name.clone(),
            "running_status" => self.running_status.as_str().to_string(),
            "update_time" => timestamp(&self.update_time),
            _ => timestamp(&self.create_time),
        }
    }
}

impl Row for History {
    fn id(&self) -> &str {
        &self.history_id
    }

    fn sort_value(&self, column: &str) -> String {
        match column {
            "history_id" => self.history_id.clone(),
            "history_name" => self.history_name.clone(),
            "event" => self.event.clone(),
            _ => timestamp(&self.create_time),
        }
    }
}

impl Row for Comment {
    fn id(&self) -> &str {
        &self.comment_id
    }

    fn sort_value(&self, column: &str) -> String {
        match column {
            "comment_id" => self.comment_id.clone(),
            "addresser" => self.addresser.clone(),
            _ => timestamp(&self.create_time),
        }
    }
}

/// Sort by the whitelisted column (insertion order breaks ties) and page
fn ordered<T: Row>(mut rows: Vec<T>, paging: &Paging, columns: &[&str]) -> Page<T> {
    let column = paging.sort_column(columns);
    rows.sort_by_cached_key(|row| row.sort_value(column));
    if paging.reverse {
        rows.reverse();
    }
    Page::slice(rows, paging)
}

fn find_mut<'a, T: Row>(rows: &'a mut [T], id: &str) -> Option<&'a mut T> {
    rows.iter_mut().find(|row| row.id() == id)
}

fn contains<T: Row>(rows: &[T], id: &str) -> bool {
    rows.iter().any(|row| row.id() == id)
}

/// Remove rows whose id is in `ids`, returning the ids removed
fn remove_ids<T: Row>(rows: &mut Vec<T>, ids: &[String]) -> Vec<String> {
    let mut removed = Vec::new();
    rows.retain(|row| {
        if ids.iter().any(|id| id == row.id()) {
            removed.push(row.id().to_string());
            false
        } else {
            true
        }
    });
    removed
}

fn apply<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

#[derive(Default)]
struct Tables {
    resource_types: Vec<ResourceType>,
    resource_filters: Vec<ResourceFilter>,
    metrics: Vec<Metric>,
    policies: Vec<Policy>,
    rules: Vec<Rule>,
    actions: Vec<Action>,
    alerts: Vec<Alert>,
    histories: Vec<History>,
    comments: Vec<Comment>,
}

impl Tables {
    fn policy(&self, policy_id: &str) -> Option<&Policy> {
        self.policies.iter().find(|p| p.policy_id == policy_id)
    }

    fn require_policy(&self, policy_id: &str) -> Result<()> {
        if contains(&self.policies, policy_id) {
            Ok(())
        } else {
            Err(Error::not_found("Policy", policy_id))
        }
    }

    /// The alert's resource filter and the name of its resource type
    fn filter_of(&self, alert: &Alert) -> Option<(&ResourceFilter, &str)> {
        let filter = self
            .resource_filters
            .iter()
            .find(|f| f.rs_filter_id == alert.rs_filter_id)?;
        let rs_type = self
            .resource_types
            .iter()
            .find(|t| t.rs_type_id == filter.rs_type_id)?;
        Some((filter, rs_type.rs_type_name.as_str()))
    }

    fn in_scope(&self, alert: &Alert, scope: &ScopeContext) -> bool {
        self.filter_of(alert).is_some_and(|(filter, rs_type_name)| {
            filter
                .uri()
                .is_some_and(|uri| scope.contains_filter(rs_type_name, &uri))
        })
    }

    fn alert_matches(&self, alert: &Alert, filter: &AlertFilter) -> bool {
        matches_any(&filter.alert_ids, &alert.alert_id)
            && matches_any(&filter.alert_names, &alert.alert_name)
            && (filter.disabled.is_empty() || filter.disabled.contains(&alert.disabled))
            && matches_any(&filter.running_status, alert.running_status.as_str())
            && matches_any(&filter.policy_ids, &alert.policy_id)
            && matches_any(&filter.rs_filter_ids, &alert.rs_filter_id)
            && matches_any(&filter.executor_ids, &alert.executor_id)
            && (filter.creators.is_empty()
                || self
                    .policy(&alert.policy_id)
                    .is_some_and(|p| matches_any(&filter.creators, &p.creator)))
    }

    fn detail(&self, alert: &Alert) -> AlertDetail {
        let (rs_filter_name, rs_filter_param, rs_type_name) = match self.filter_of(alert) {
            Some((filter, rs_type_name)) => (
                filter.rs_filter_name.clone(),
                filter.rs_filter_param.clone(),
                rs_type_name.to_string(),
            ),
            None => Default::default(),
        };
        let rules: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|r| r.policy_id == alert.policy_id)
            .collect();
        let mut metrics: Vec<String> = Vec::new();
        for rule in &rules {
            if let Some(metric) = self.metrics.iter().find(|m| m.metric_id == rule.metric_id) {
                if !metrics.contains(&metric.metric_name) {
                    metrics.push(metric.metric_name.clone());
                }
            }
        }
        let nf_address_list_id = self
            .actions
            .iter()
            .find(|a| a.policy_id == alert.policy_id)
            .map(|a| a.nf_address_list_id.clone())
            .unwrap_or_default();
        let policy = self.policy(&alert.policy_id);
        let policy_field = |f: fn(&Policy) -> &String| policy.map(f).cloned().unwrap_or_default();

        AlertDetail {
            alert_id: alert.alert_id.clone(),
            alert_name: alert.alert_name.clone(),
            disabled: alert.disabled,
            create_time: alert.create_time,
            running_status: alert.running_status,
            policy_id: alert.policy_id.clone(),
            rs_filter_id: alert.rs_filter_id.clone(),
            rs_filter_name,
            rs_filter_param,
            rs_type_name,
            executor_id: alert.executor_id.clone(),
            policy_name: policy_field(|p| &p.policy_name),
            policy_description: policy_field(|p| &p.policy_description),
            policy_config: policy_field(|p| &p.policy_config),
            creator: policy_field(|p| &p.creator),
            available_start_time: policy_field(|p| &p.available_start_time),
            available_end_time: policy_field(|p| &p.available_end_time),
            language: policy_field(|p| &p.language),
            metrics,
            rules_count: u32::try_from(rules.len()).unwrap_or(u32::MAX),
            nf_address_list_id,
        }
    }
}

/// Entity store held entirely in memory
///
/// Mirrors the Postgres schema's foreign keys: owners must exist on insert
/// and deletes cascade the same way.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// An empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding the seven standard resource types
    pub fn with_default_resource_types() -> Self {
        let now = Utc::now();
        let resource_types = ScopeTag::ALL
            .into_iter()
            .map(|tag| ResourceType {
                rs_type_id: seeded_resource_type_id(tag),
                rs_type_name: tag.as_str().to_string(),
                rs_type_param: seed_param(tag).to_string(),
                create_time: now,
                update_time: now,
            })
            .collect();

        Self {
            tables: RwLock::new(Tables {
                resource_types,
                ..Tables::default()
            }),
        }
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn create_resource_type(&self, input: NewResourceType) -> Result<String> {
        let now = Utc::now();
        let row = ResourceType {
            rs_type_id: new_id(ResourceType::ID_PREFIX),
            rs_type_name: input.rs_type_name,
            rs_type_param: input.rs_type_param,
            create_time: now,
            update_time: now,
        };
        let id = row.rs_type_id.clone();
        self.tables.write().resource_types.push(row);
        Ok(id)
    }

    async fn describe_resource_types(
        &self,
        filter: &ResourceTypeFilter,
    ) -> Result<Page<ResourceType>> {
        let rows = self
            .tables
            .read()
            .resource_types
            .iter()
            .filter(|t| {
                matches_any(&filter.rs_type_ids, &t.rs_type_id)
                    && matches_any(&filter.rs_type_names, &t.rs_type_name)
            })
            .cloned()
            .collect();
        Ok(ordered(rows, &filter.paging, sort_columns::RESOURCE_TYPE))
    }

    async fn modify_resource_type(&self, update: ResourceTypeUpdate) -> Result<String> {
        let mut tables = self.tables.write();
        let row = find_mut(&mut tables.resource_types, &update.rs_type_id)
            .ok_or_else(|| Error::not_found("Resource type", &update.rs_type_id))?;
        apply(&mut row.rs_type_name, update.rs_type_name);
        apply(&mut row.rs_type_param, update.rs_type_param);
        row.update_time = Utc::now();
        Ok(update.rs_type_id)
    }

    async fn delete_resource_types(&self, ids: &[String]) -> Result<Vec<String>> {
        Ok(remove_ids(&mut self.tables.write().resource_types, ids))
    }

    async fn create_resource_filter(&self, input: NewResourceFilter) -> Result<String> {
        let now = Utc::now();
        let row = ResourceFilter {
            rs_filter_id: new_id(ResourceFilter::ID_PREFIX),
            rs_filter_name: input.rs_filter_name,
            rs_filter_param: input.rs_filter_param,
            status: input.status,
            rs_type_id: input.rs_type_id,
            create_time: now,
            update_time: now,
        };
        let id = row.rs_filter_id.clone();
        self.tables.write().resource_filters.push(row);
        Ok(id)
    }

    async fn describe_resource_filters(
        &self,
        filter: &ResourceFilterFilter,
    ) -> Result<Page<ResourceFilter>> {
        let rows = self
            .tables
            .read()
            .resource_filters
            .iter()
            .filter(|f| {
                matches_any(&filter.rs_filter_ids, &f.rs_filter_id)
                    && matches_any(&filter.rs_filter_names, &f.rs_filter_name)
                    && matches_any(&filter.status, &f.status)
                    && matches_any(&filter.rs_type_ids, &f.rs_type_id)
            })
            .cloned()
            .collect();
        Ok(ordered(rows, &filter.paging, sort_columns::RESOURCE_FILTER))
    }

    async fn modify_resource_filter(&self, update: ResourceFilterUpdate) -> Result<String> {
        let mut tables = self.tables.write();
        let row = find_mut(&mut tables.resource_filters, &update.rs_filter_id)
            .ok_or_else(|| Error::not_found("Resource filter", &update.rs_filter_id))?;
        apply(&mut row.rs_filter_name, update.rs_filter_name);
        apply(&mut row.rs_filter_param, update.rs_filter_param);
        apply(&mut row.status, update.status);
        row.update_time = Utc::now();
        Ok(update.rs_filter_id)
    }

    async fn delete_resource_filters(&self, ids: &[String]) -> Result<Vec<String>> {
        let mut tables = self.tables.write();
        let removed = remove_ids(&mut tables.resource_filters, ids);
        tables.alerts.retain(|a| !removed.contains(&a.rs_filter_id));
        Ok(removed)
    }

    async fn create_metric(&self, input: NewMetric) -> Result<String> {
        let now = Utc::now();
        let row = Metric {
            metric_id: new_id(Metric::ID_PREFIX),
            metric_name: input.metric_name,
            metric_param: input.metric_param,
            status: input.status,
            rs_type_id: input.rs_type_id,
            create_time: now,
            update_time: now,
        };
        let id = row.metric_id.clone();
        self.tables.write().metrics.push(row);
        Ok(id)
    }

    async fn describe_metrics(&self, filter: &MetricFilter) -> Result<Page<Metric>> {
        let rows = self
            .tables
            .read()
            .metrics
            .iter()
            .filter(|m| {
                matches_any(&filter.metric_ids, &m.metric_id)
                    && matches_any(&filter.metric_names, &m.metric_name)
                    && matches_any(&filter.status, &m.status)
                    && matches_any(&filter.rs_type_ids, &m.rs_type_id)
            })
            .cloned()
            .collect();
        Ok(ordered(rows, &filter.paging, sort_columns::METRIC))
    }

    async fn modify_metric(&self, update: MetricUpdate) -> Result<String> {
        let mut tables = self.tables.write();
        let row = find_mut(&mut tables.metrics, &update.metric_id)
            .ok_or_else(|| Error::not_found("Metric", &update.metric_id))?;
        apply(&mut row.metric_name, update.metric_name);
        apply(&mut row.metric_param, update.metric_param);
        apply(&mut row.status, update.status);
        row.update_time = Utc::now();
        Ok(update.metric_id)
    }

    async fn delete_metrics(&self, ids: &[String]) -> Result<Vec<String>> {
        Ok(remove_ids(&mut self.tables.write().metrics, ids))
    }

    async fn create_policy(&self, input: NewPolicy) -> Result<String> {
        let now = Utc::now();
        let spec = input.spec;
        let row = Policy {
            policy_id: new_id(Policy::ID_PREFIX),
            policy_name: spec.policy_name,
            policy_description: spec.policy_description,
            policy_config: spec.policy_config,
            creator: spec.creator,
            available_start_time: spec.available_start_time,
            available_end_time: spec.available_end_time,
            language: spec.language,
            rs_type_id: input.rs_type_id,
            create_time: now,
            update_time: now,
        };
        let id = row.policy_id.clone();
        self.tables.write().policies.push(row);
        Ok(id)
    }

    async fn describe_policies(&self, filter: &PolicyFilter) -> Result<Page<Policy>> {
        let rows = self
            .tables
            .read()
            .policies
            .iter()
            .filter(|p| {
                matches_any(&filter.policy_ids, &p.policy_id)
                    && matches_any(&filter.policy_names, &p.policy_name)
                    && matches_any(&filter.creators, &p.creator)
                    && matches_any(&filter.rs_type_ids, &p.rs_type_id)
            })
            .cloned()
            .collect();
        Ok(ordered(rows, &filter.paging, sort_columns::POLICY))
    }

    async fn modify_policy(&self, update: PolicyUpdate) -> Result<String> {
        let mut tables = self.tables.write();
        let row = find_mut(&mut tables.policies, &update.policy_id)
            .ok_or_else(|| Error::not_found("Policy", &update.policy_id))?;
        apply(&mut row.policy_name, update.policy_name);
        apply(&mut row.policy_description, update.policy_description);
        apply(&mut row.policy_config, update.policy_config);
        apply(&mut row.creator, update.creator);
        apply(&mut row.available_start_time, update.available_start_time);
        apply(&mut row.available_end_time, update.available_end_time);
        apply(&mut row.language, update.language);
        apply(&mut row.rs_type_id, update.rs_type_id);
        row.update_time = Utc::now();
        Ok(update.policy_id)
    }

    async fn delete_policies(&self, ids: &[String]) -> Result<Vec<String>> {
        let mut tables = self.tables.write();
        let removed = remove_ids(&mut tables.policies, ids);
        tables.rules.retain(|r| !removed.contains(&r.policy_id));
        tables.actions.retain(|a| !removed.contains(&a.policy_id));
        tables.alerts.retain(|a| !removed.contains(&a.policy_id));
        Ok(removed)
    }

    async fn create_rule(&self, input: NewRule) -> Result<String> {
        let mut tables = self.tables.write();
        tables.require_policy(&input.policy_id)?;

        let now = Utc::now();
        let spec = input.spec;
        let row = Rule {
            rule_id: new_id(Rule::ID_PREFIX),
            rule_name: spec.rule_name,
            disabled: spec.disabled,
            monitor_periods: spec.monitor_periods,
            severity: spec.severity,
            metrics_type: spec.metrics_type,
            condition_type: spec.condition_type,
            thresholds: spec.thresholds,
            unit: spec.unit,
            consecutive_count: spec.consecutive_count,
            inhibit: spec.inhibit,
            policy_id: input.policy_id,
            metric_id: spec.metric_id,
            create_time: now,
            update_time: now,
        };
        let id = row.rule_id.clone();
        tables.rules.push(row);
        Ok(id)
    }

    async fn describe_rules(&self, filter: &RuleFilter) -> Result<Page<Rule>> {
        let rows = self
            .tables
            .read()
            .rules
            .iter()
            .filter(|r| {
                matches_any(&filter.rule_ids, &r.rule_id)
                    && matches_any(&filter.rule_names, &r.rule_name)
                    && matches_any(&filter.severities, r.severity.as_str())
                    && matches_any(&filter.policy_ids, &r.policy_id)
                    && matches_any(&filter.metric_ids, &r.metric_id)
            })
            .cloned()
            .collect();
        Ok(ordered(rows, &filter.paging, sort_columns::RULE))
    }

    async fn modify_rule(&self, update: RuleUpdate) -> Result<String> {
        let mut tables = self.tables.write();
        let row = find_mut(&mut tables.rules, &update.rule_id)
            .ok_or_else(|| Error::not_found("Rule", &update.rule_id))?;
        apply(&mut row.rule_name, update.rule_name);
        apply(&mut row.disabled, update.disabled);
        apply(&mut row.monitor_periods, update.monitor_periods);
        apply(&mut row.severity, update.severity);
        apply(&mut row.metrics_type, update.metrics_type);
        apply(&mut row.condition_type, update.condition_type);
        apply(&mut row.thresholds, update.thresholds);
        apply(&mut row.unit, update.unit);
        apply(&mut row.consecutive_count, update.consecutive_count);
        apply(&mut row.inhibit, update.inhibit);
        row.update_time = Utc::now();
        Ok(update.rule_id)
    }

    async fn delete_rules(&self, ids: &[String]) -> Result<Vec<String>> {
        Ok(remove_ids(&mut self.tables.write().rules, ids))
    }

    async fn create_action(&self, input: NewAction) -> Result<String> {
        let mut tables = self.tables.write();
        tables.require_policy(&input.policy_id)?;

        let now = Utc::now();
        let spec = input.spec;
        let row = Action {
            action_id: new_id(Action::ID_PREFIX),
            action_name: spec.action_name,
            trigger_status: spec.trigger_status,
            trigger_action: spec.trigger_action,
            policy_id: input.policy_id,
            nf_address_list_id: spec.nf_address_list_id,
            create_time: now,
            update_time: now,
        };
        let id = row.action_id.clone();
        tables.actions.push(row);
        Ok(id)
    }

    async fn describe_actions(&self, filter: &ActionFilter) -> Result<Page<Action>> {
        let rows = self
            .tables
            .read()
            .actions
            .iter()
            .filter(|a| {
                matches_any(&filter.action_ids, &a.action_id)
                    && matches_any(&filter.action_names, &a.action_name)
                    && matches_any(&filter.trigger_status, &a.trigger_status)
                    && matches_any(&filter.trigger_actions, &a.trigger_action)
                    && matches_any(&filter.policy_ids, &a.policy_id)
                    && matches_any(&filter.nf_address_list_ids, &a.nf_address_list_id)
            })
            .cloned()
            .collect();
        Ok(ordered(rows, &filter.paging, sort_columns::ACTION))
    }

    async fn modify_action(&self, update: ActionUpdate) -> Result<String> {
        let mut tables = self.tables.write();
        let row = find_mut(&mut tables.actions, &update.action_id)
            .ok_or_else(|| Error::not_found("Action", &update.action_id))?;
        apply(&mut row.action_name, update.action_name);
        apply(&mut row.trigger_status, update.trigger_status);
        apply(&mut row.trigger_action, update.trigger_action);
        apply(&mut row.nf_address_list_id, update.nf_address_list_id);
        row.update_time = Utc::now();
        Ok(update.action_id)
    }

    async fn delete_actions(&self, ids: &[String]) -> Result<Vec<String>> {
        Ok(remove_ids(&mut self.tables.write().actions, ids))
    }

    async fn create_alert(&self, input: NewAlert) -> Result<String> {
        let mut tables = self.tables.write();
        tables.require_policy(&input.policy_id)?;
        if !contains(&tables.resource_filters, &input.rs_filter_id) {
            return Err(Error::not_found("Resource filter", &input.rs_filter_id));
        }

        let now = Utc::now();
        let row = Alert {
            alert_id: new_id(Alert::ID_PREFIX),
            alert_name: input.alert_name,
            disabled: input.disabled,
            running_status: RunningStatus::Adding,
            policy_id: input.policy_id,
            rs_filter_id: input.rs_filter_id,
            executor_id: String::new(),
            create_time: now,
            update_time: now,
        };
        let id = row.alert_id.clone();
        tables.alerts.push(row);
        Ok(id)
    }

    async fn describe_alerts(&self, filter: &AlertFilter) -> Result<Page<Alert>> {
        let tables = self.tables.read();
        let rows = tables
            .alerts
            .iter()
            .filter(|a| tables.alert_matches(a, filter))
            .cloned()
            .collect();
        Ok(ordered(rows, &filter.paging, sort_columns::ALERT))
    }

    async fn modify_alert(&self, update: AlertUpdate) -> Result<String> {
        let mut tables = self.tables.write();
        if let Some(policy_id) = &update.policy_id {
            tables.require_policy(policy_id)?;
        }
        if let Some(rs_filter_id) = &update.rs_filter_id {
            if !contains(&tables.resource_filters, rs_filter_id) {
                return Err(Error::not_found("Resource filter", rs_filter_id));
            }
        }

        let row = find_mut(&mut tables.alerts, &update.alert_id)
            .ok_or_else(|| Error::not_found("Alert", &update.alert_id))?;
        apply(&mut row.alert_name, update.alert_name);
        apply(&mut row.disabled, update.disabled);
        apply(&mut row.running_status, update.running_status);
        apply(&mut row.policy_id, update.policy_id);
        apply(&mut row.rs_filter_id, update.rs_filter_id);
        row.update_time = Utc::now();
        Ok(update.alert_id)
    }

    async fn delete_alerts(&self, ids: &[String]) -> Result<Vec<String>> {
        Ok(remove_ids(&mut self.tables.write().alerts, ids))
    }

    async fn describe_alerts_with_resource(
        &self,
        scope: &ScopeContext,
        alert_names: &[String],
    ) -> Result<Page<Alert>> {
        let tables = self.tables.read();
        let rows: Vec<Alert> = tables
            .alerts
            .iter()
            .filter(|a| matches_any(alert_names, &a.alert_name) && tables.in_scope(a, scope))
            .cloned()
            .collect();
        let paging = Paging {
            limit: Paging::MAX_LIMIT,
            ..Paging::default()
        };
        Ok(ordered(rows, &paging, sort_columns::ALERT))
    }

    async fn describe_alert_details(
        &self,
        scope: &ScopeContext,
        filter: &AlertFilter,
    ) -> Result<Page<AlertDetail>> {
        let tables = self.tables.read();
        let rows = tables
            .alerts
            .iter()
            .filter(|a| tables.alert_matches(a, filter) && tables.in_scope(a, scope))
            .cloned()
            .collect();
        Ok(ordered(rows, &filter.paging, sort_columns::ALERT).map(|a| tables.detail(&a)))
    }

    async fn record_history(&self, input: NewHistory) -> Result<String> {
        let row = History {
            history_id: new_id(History::ID_PREFIX),
            history_name: input.history_name,
            alert_id: input.alert_id,
            rule_id: input.rule_id,
            resource_name: input.resource_name,
            event: input.event,
            content: input.content,
            notification_id: input.notification_id,
            create_time: Utc::now(),
        };
        let id = row.history_id.clone();
        self.tables.write().histories.push(row);
        Ok(id)
    }

    async fn describe_histories(&self, filter: &HistoryFilter) -> Result<Page<History>> {
        let rows = self
            .tables
            .read()
            .histories
            .iter()
            .filter(|h| {
                matches_any(&filter.history_ids, &h.history_id)
                    && matches_any(&filter.history_names, &h.history_name)
                    && matches_any(&filter.alert_ids, &h.alert_id)
                    && matches_any(&filter.rule_ids, &h.rule_id)
                    && matches_any(&filter.resource_names, &h.resource_name)
                    && matches_any(&filter.events, &h.event)
            })
            .cloned()
            .collect();
        Ok(ordered(rows, &filter.paging, sort_columns::HISTORY))
    }

    async fn create_comment(&self, input: NewComment) -> Result<String> {
        let mut tables = self.tables.write();
        if !contains(&tables.histories, &input.history_id) {
            return Err(Error::not_found("History", &input.history_id));
        }

        let row = Comment {
            comment_id: new_id(Comment::ID_PREFIX),
            addresser: input.addresser,
            content: input.content,
            history_id: input.history_id,
            create_time: Utc::now(),
        };
        let id = row.comment_id.clone();
        tables.comments.push(row);
        Ok(id)
    }

    async fn describe_comments(&self, filter: &CommentFilter) -> Result<Page<Comment>> {
        let rows = self
            .tables
            .read()
            .comments
            .iter()
            .filter(|c| {
                matches_any(&filter.comment_ids, &c.comment_id)
                    && matches_any(&filter.addressers, &c.addresser)
                    && matches_any(&filter.history_ids, &c.history_id)
            })
            .cloned()
            .collect();
        Ok(ordered(rows, &filter.paging, sort_columns::COMMENT))
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
