//! Database layer for KubeAlert
//!
//! Every entity is reached through [`EntityStore`]. [`PgStore`] is the
//! production implementation; [`MemoryStore`] backs tests and `serve --memory`.
//! Both cascade deletes from a policy to its rules, actions and alerts, and
//! from a resource filter to its alerts.

mod memory;
mod postgres;
mod redis;

pub use memory::MemoryStore;
pub use postgres::{PgStore, PostgresPool};
pub use redis::RedisPool;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::Result;
use crate::models::{
    Action, ActionFilter, ActionUpdate, Alert, AlertDetail, AlertFilter, AlertUpdate, Comment,
    CommentFilter, History, HistoryFilter, Metric, MetricFilter, MetricUpdate, NewAction,
    NewAlert, NewComment, NewHistory, NewMetric, NewPolicy, NewResourceFilter, NewResourceType,
    NewRule, Page, Policy, PolicyFilter, PolicyUpdate, ResourceFilter, ResourceFilterFilter,
    ResourceFilterUpdate, ResourceType, ResourceTypeFilter, ResourceTypeUpdate, Rule, RuleFilter,
    RuleUpdate, ScopeContext,
};

/// Columns each describe call may sort by
pub(crate) mod sort_columns {
    pub const RESOURCE_TYPE: &[&str] = &["rs_type_id", "rs_type_name", "create_time", "update_time"];
    pub const RESOURCE_FILTER: &[&str] = &[
        "rs_filter_id",
        "rs_filter_name",
        "status",
        "create_time",
        "update_time",
    ];
    pub const METRIC: &[&str] = &["metric_id", "metric_name", "status", "create_time", "update_time"];
    pub const POLICY: &[&str] = &["policy_id", "policy_name", "creator", "create_time", "update_time"];
    pub const RULE: &[&str] = &["rule_id", "rule_name", "severity", "create_time", "update_time"];
    pub const ACTION: &[&str] = &["action_id", "action_name", "create_time", "update_time"];
    pub const ALERT: &[&str] = &[
        "alert_id",
        "alert_name",
        "running_status",
        "create_time",
        "update_time",
    ];
    pub const HISTORY: &[&str] = &["history_id", "history_name", "event", "create_time"];
    pub const COMMENT: &[&str] = &["comment_id", "addresser", "create_time"];
}

/// Per-entity CRUD consumed by the alert pipeline and the API
///
/// `create_*` returns the new id, `modify_*` the id of the modified row
/// (`NotFound` if it does not exist), `delete_*` the ids actually deleted.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // --- Resource types ---

    async fn create_resource_type(&self, input: NewResourceType) -> Result<String>;
    async fn describe_resource_types(&self, filter: &ResourceTypeFilter) -> Result<Page<ResourceType>>;
    async fn modify_resource_type(&self, update: ResourceTypeUpdate) -> Result<String>;
    async fn delete_resource_types(&self, ids: &[String]) -> Result<Vec<String>>;

    // --- Resource filters ---

    async fn create_resource_filter(&self, input: NewResourceFilter) -> Result<String>;
    async fn describe_resource_filters(
        &self,
        filter: &ResourceFilterFilter,
    ) -> Result<Page<ResourceFilter>>;
    async fn modify_resource_filter(&self, update: ResourceFilterUpdate) -> Result<String>;
    async fn delete_resource_filters(&self, ids: &[String]) -> Result<Vec<String>>;

    // --- Metrics ---

    async fn create_metric(&self, input: NewMetric) -> Result<String>;
    async fn describe_metrics(&self, filter: &MetricFilter) -> Result<Page<Metric>>;
    async fn modify_metric(&self, update: MetricUpdate) -> Result<String>;
    async fn delete_metrics(&self, ids: &[String]) -> Result<Vec<String>>;

    // --- Policies ---

    async fn create_policy(&self, input: NewPolicy) -> Result<String>;
    async fn describe_policies(&self, filter: &PolicyFilter) -> Result<Page<Policy>>;
    async fn modify_policy(&self, update: PolicyUpdate) -> Result<String>;
    async fn delete_policies(&self, ids: &[String]) -> Result<Vec<String>>;

    // --- Rules ---

    async fn create_rule(&self, input: NewRule) -> Result<String>;
    async fn describe_rules(&self, filter: &RuleFilter) -> Result<Page<Rule>>;
    async fn modify_rule(&self, update: RuleUpdate) -> Result<String>;
    async fn delete_rules(&self, ids: &[String]) -> Result<Vec<String>>;

    // --- Actions ---

    async fn create_action(&self, input: NewAction) -> Result<String>;
    async fn describe_actions(&self, filter: &ActionFilter) -> Result<Page<Action>>;
    async fn modify_action(&self, update: ActionUpdate) -> Result<String>;
    async fn delete_actions(&self, ids: &[String]) -> Result<Vec<String>>;

    // --- Alerts ---

    async fn create_alert(&self, input: NewAlert) -> Result<String>;
    async fn describe_alerts(&self, filter: &AlertFilter) -> Result<Page<Alert>>;
    async fn modify_alert(&self, update: AlertUpdate) -> Result<String>;
    async fn delete_alerts(&self, ids: &[String]) -> Result<Vec<String>>;

    /// Alerts named one of `alert_names` whose resource filter lies in `scope`
    async fn describe_alerts_with_resource(
        &self,
        scope: &ScopeContext,
        alert_names: &[String],
    ) -> Result<Page<Alert>>;

    /// Alerts in `scope` joined with filter, resource type and policy
    async fn describe_alert_details(
        &self,
        scope: &ScopeContext,
        filter: &AlertFilter,
    ) -> Result<Page<AlertDetail>>;

    // --- Audit ---

    async fn record_history(&self, input: NewHistory) -> Result<String>;
    async fn describe_histories(&self, filter: &HistoryFilter) -> Result<Page<History>>;
    async fn create_comment(&self, input: NewComment) -> Result<String>;
    async fn describe_comments(&self, filter: &CommentFilter) -> Result<Page<Comment>>;

    /// Check the backing storage is reachable
    async fn health_check(&self) -> Result<()>;
}

/// Database connections bundle
#[derive(Clone)]
pub struct Database {
    /// Entity storage
    pub store: Arc<dyn EntityStore>,
    /// PostgreSQL pool, absent for the in-memory store
    pub postgres: Option<PostgresPool>,
    /// Redis pool used for cross-replica creation locks
    pub redis: Option<RedisPool>,
}

impl Database {
    /// Connect to PostgreSQL (and Redis, when configured)
    pub async fn new(config: &Config) -> Result<Self> {
        let postgres = PostgresPool::new(&config.database).await?;
        let redis = match config.redis.url.as_deref() {
            Some(url) if !url.is_empty() => Some(RedisPool::new(url, config.redis.lock_ttl)?),
            _ => None,
        };

        Ok(Self {
            store: Arc::new(PgStore::new(&postgres)),
            postgres: Some(postgres),
            redis,
        })
    }

    /// An in-memory store seeded with the standard resource types
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(MemoryStore::with_default_resource_types()),
            postgres: None,
            redis: None,
        }
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        match &self.postgres {
            Some(pg) => pg.migrate().await,
            None => Ok(()),
        }
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        self.store.health_check().await?;
        if let Some(redis) = &self.redis {
            redis.health_check().await?;
        }
        Ok(())
    }
}
