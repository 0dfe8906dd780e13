//! Test support: a store that fails or stalls on demand

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::db::{EntityStore, MemoryStore};
use crate::error::{Error, Result};
use crate::models::{
    Action, ActionFilter, ActionSpec, ActionUpdate, Alert, AlertDetail, AlertFilter, AlertSpec,
    AlertUpdate, Comment, CommentFilter, CompositeAlertSpec, History, HistoryFilter, Metric,
    MetricFilter, MetricUpdate, NewAction, NewAlert, NewComment, NewHistory, NewMetric, NewPolicy,
    NewResourceFilter, NewResourceType, NewRule, Page, Policy, PolicyFilter, PolicySpec,
    PolicyUpdate, ResourceFilter, ResourceFilterFilter, ResourceFilterUpdate, ResourceType,
    ResourceTypeFilter, ResourceTypeUpdate, Rule, RuleFilter, RuleSpec, RuleUpdate, ScopeContext,
    Severity,
};

/// Which calls misbehave
#[derive(Debug, Default)]
pub struct Faults {
    pub fail_action: bool,
    /// Zero-based index of the `create_rule` call that fails
    pub fail_rule: Option<usize>,
    pub fail_alert: bool,
    pub fail_filter_delete: bool,
    pub policy_delay: Option<Duration>,
}

/// [`MemoryStore`] with injected failures
pub struct FaultyStore {
    inner: MemoryStore,
    faults: Faults,
    rule_calls: AtomicUsize,
}

impl FaultyStore {
    pub fn new(faults: Faults) -> Self {
        Self {
            inner: MemoryStore::with_default_resource_types(),
            faults,
            rule_calls: AtomicUsize::new(0),
        }
    }
}

pub fn namespace_scope(ns: &str) -> ScopeContext {
    ScopeContext::Namespace {
        ns_name: Some(ns.to_string()),
    }
}

/// A namespace-scoped request for alert `name` in `ns` with `rules` rules
pub fn composite_spec(ns: &str, name: &str, rules: usize) -> CompositeAlertSpec {
    CompositeAlertSpec {
        rs_filter: NewResourceFilter {
            rs_filter_name: format!("{ns}-filter"),
            rs_filter_param: format!(r#"{{"ns_name":"{ns}"}}"#),
            status: "active".into(),
            rs_type_id: "rst-namespace".into(),
        },
        policy: PolicySpec {
            policy_name: format!("{name}-policy"),
            creator: "admin".into(),
            available_start_time: "000000".into(),
            available_end_time: "235959".into(),
            language: "en".into(),
            ..PolicySpec::default()
        },
        rules: (0..rules)
            .map(|i| RuleSpec {
                rule_name: format!("rule-{i}"),
                severity: Severity::Major,
                condition_type: ">".into(),
                thresholds: "80".into(),
                metric_id: format!("mt-{i}"),
                ..RuleSpec::default()
            })
            .collect(),
        action: ActionSpec {
            action_name: format!("{name}-action"),
            trigger_status: "triggered".into(),
            trigger_action: "notification".into(),
            nf_address_list_id: "nl-ops".into(),
        },
        alert: AlertSpec {
            alert_name: name.to_string(),
        },
    }
}

#[async_trait]
impl EntityStore for FaultyStore {
    async fn create_resource_type(&self, input: NewResourceType) -> Result<String> {
        self.inner.create_resource_type(input).await
    }

    async fn describe_resource_types(
        &self,
        filter: &ResourceTypeFilter,
    ) -> Result<Page<ResourceType>> {
        self.inner.describe_resource_types(filter).await
    }

    async fn modify_resource_type(&self, update: ResourceTypeUpdate) -> Result<String> {
        self.inner.modify_resource_type(update).await
    }

    async fn delete_resource_types(&self, ids: &[String]) -> Result<Vec<String>> {
        self.inner.delete_resource_types(ids).await
    }

    async fn create_resource_filter(&self, input: NewResourceFilter) -> Result<String> {
        self.inner.create_resource_filter(input).await
    }

    async fn describe_resource_filters(
        &self,
        filter: &ResourceFilterFilter,
    ) -> Result<Page<ResourceFilter>> {
        self.inner.describe_resource_filters(filter).await
    }

    async fn modify_resource_filter(&self, update: ResourceFilterUpdate) -> Result<String> {
        self.inner.modify_resource_filter(update).await
    }

    async fn delete_resource_filters(&self, ids: &[String]) -> Result<Vec<String>> {
        if self.faults.fail_filter_delete {
            return Err(Error::internal("injected filter delete failure"));
        }
        self.inner.delete_resource_filters(ids).await
    }

    async fn create_metric(&self, input: NewMetric) -> Result<String> {
        self.inner.create_metric(input).await
    }

    async fn describe_metrics(&self, filter: &MetricFilter) -> Result<Page<Metric>> {
        self.inner.describe_metrics(filter).await
    }

    async fn modify_metric(&self, update: MetricUpdate) -> Result<String> {
        self.inner.modify_metric(update).await
    }

    async fn delete_metrics(&self, ids: &[String]) -> Result<Vec<String>> {
        self.inner.delete_metrics(ids).await
    }

    async fn create_policy(&self, input: NewPolicy) -> Result<String> {
        if let Some(delay) = self.faults.policy_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.create_policy(input).await
    }

    async fn describe_policies(&self, filter: &PolicyFilter) -> Result<Page<Policy>> {
        self.inner.describe_policies(filter).await
    }

    async fn modify_policy(&self, update: PolicyUpdate) -> Result<String> {
        self.inner.modify_policy(update).await
    }

    async fn delete_policies(&self, ids: &[String]) -> Result<Vec<String>> {
        self.inner.delete_policies(ids).await
    }

    async fn create_rule(&self, input: NewRule) -> Result<String> {
        let call = self.rule_calls.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_rule == Some(call) {
            return Err(Error::internal("injected rule failure"));
        }
        self.inner.create_rule(input).await
    }

    async fn describe_rules(&self, filter: &RuleFilter) -> Result<Page<Rule>> {
        self.inner.describe_rules(filter).await
    }

    async fn modify_rule(&self, update: RuleUpdate) -> Result<String> {
        self.inner.modify_rule(update).await
    }

    async fn delete_rules(&self, ids: &[String]) -> Result<Vec<String>> {
        self.inner.delete_rules(ids).await
    }

    async fn create_action(&self, input: NewAction) -> Result<String> {
        if self.faults.fail_action {
            return Err(Error::internal("injected action failure"));
        }
        self.inner.create_action(input).await
    }

    async fn describe_actions(&self, filter: &ActionFilter) -> Result<Page<Action>> {
        self.inner.describe_actions(filter).await
    }

    async fn modify_action(&self, update: ActionUpdate) -> Result<String> {
        self.inner.modify_action(update).await
    }

    async fn delete_actions(&self, ids: &[String]) -> Result<Vec<String>> {
        self.inner.delete_actions(ids).await
    }

    async fn create_alert(&self, input: NewAlert) -> Result<String> {
        if self.faults.fail_alert {
            return Err(Error::internal("injected duplicate alert"));
        }
        self.inner.create_alert(input).await
    }

    async fn describe_alerts(&self, filter: &AlertFilter) -> Result<Page<Alert>> {
        self.inner.describe_alerts(filter).await
    }

    async fn modify_alert(&self, update: AlertUpdate) -> Result<String> {
        self.inner.modify_alert(update).await
    }

    async fn delete_alerts(&self, ids: &[String]) -> Result<Vec<String>> {
        self.inner.delete_alerts(ids).await
    }

    async fn describe_alerts_with_resource(
        &self,
        scope: &ScopeContext,
        alert_names: &[String],
    ) -> Result<Page<Alert>> {
        self.inner.describe_alerts_with_resource(scope, alert_names).await
    }

    async fn describe_alert_details(
        &self,
        scope: &ScopeContext,
        filter: &AlertFilter,
    ) -> Result<Page<AlertDetail>> {
        self.inner.describe_alert_details(scope, filter).await
    }

    async fn record_history(&self, input: NewHistory) -> Result<String> {
        self.inner.record_history(input).await
    }

    async fn describe_histories(&self, filter: &HistoryFilter) -> Result<Page<History>> {
        self.inner.describe_histories(filter).await
    }

    async fn create_comment(&self, input: NewComment) -> Result<String> {
        self.inner.create_comment(input).await
    }

    async fn describe_comments(&self, filter: &CommentFilter) -> Result<Page<Comment>> {
        self.inner.describe_comments(filter).await
    }

    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }
}
