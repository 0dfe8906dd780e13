//! PostgreSQL connection and queries

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{FromRow, Postgres, QueryBuilder};
use tracing::debug;

use super::{sort_columns, EntityStore};
use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::models::{
    new_id, Action, ActionFilter, ActionUpdate, Alert, AlertDetail, AlertFilter, AlertUpdate,
    Comment, CommentFilter, History, HistoryFilter, Metric, MetricFilter, MetricUpdate, NewAction,
    NewAlert, NewComment, NewHistory, NewMetric, NewPolicy, NewResourceFilter, NewResourceType,
    NewRule, Page, Paging, Policy, PolicyFilter, PolicyUpdate, ResourceFilter,
    ResourceFilterFilter, ResourceFilterUpdate, ResourceType, ResourceTypeFilter,
    ResourceTypeUpdate, Rule, RuleFilter, RuleUpdate, ScopeContext,
};

/// PostgreSQL connection pool
#[derive(Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    /// Create a new PostgreSQL connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::internal(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map a foreign key violation on insert/update to `NotFound` for the owner
///
/// `owners` pairs a referencing column with the owner's entity name and id.
fn owner_missing(err: sqlx::Error, owners: &[(&str, &str, &str)]) -> Error {
    let constraint = err
        .as_database_error()
        .filter(|db| db.code().is_some_and(|code| code == "23503"))
        .map(|db| db.constraint().unwrap_or_default().to_string());

    match constraint {
        Some(constraint) => owners
            .iter()
            .find(|(column, _, _)| constraint.contains(column))
            .or_else(|| owners.first())
            .map_or(Error::Database(err), |(_, entity, id)| {
                Error::not_found(*entity, *id)
            }),
        None => Error::Database(err),
    }
}

/// `AND column = ANY($n)` when the filter list is non-empty
fn push_any<T>(qb: &mut QueryBuilder<'_, Postgres>, column: &str, values: &[T])
where
    T: Clone + Send + for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + 'static,
    Vec<T>: for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres>,
{
    if !values.is_empty() {
        qb.push(" AND ")
            .push(column)
            .push(" = ANY(")
            .push_bind(values.to_vec())
            .push(")");
    }
}

/// Restrict joined `rf`/`rt` rows to a scope
fn push_scope(qb: &mut QueryBuilder<'_, Postgres>, scope: &ScopeContext) {
    qb.push(" AND rt.rs_type_name = ").push_bind(scope.tag().as_str());
    for (key, value) in scope.identifying_fields() {
        qb.push(format!(" AND rf.rs_filter_param ->> '{key}' = "))
            .push_bind(value.to_string());
    }
}

/// Entity store backed by PostgreSQL
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store on an existing pool
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool.clone(),
        }
    }

    /// Count and fetch one page of `select` rows from `from`
    ///
    /// `filters` appends `AND ...` clauses; it runs once for the count and
    /// once for the page query.
    async fn page<T>(
        &self,
        select: &str,
        from: &str,
        paging: &Paging,
        columns: (&str, &[&str]),
        filters: impl Fn(&mut QueryBuilder<'_, Postgres>),
    ) -> Result<Page<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let mut count = QueryBuilder::new(format!("SELECT COUNT(*) FROM {from} WHERE TRUE"));
        filters(&mut count);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let (prefix, allowed) = columns;
        let mut query = QueryBuilder::new(format!("SELECT {select} FROM {from} WHERE TRUE"));
        filters(&mut query);
        query.push(format!(
            " ORDER BY {prefix}{} {}",
            paging.sort_column(allowed),
            if paging.reverse { "DESC" } else { "ASC" }
        ));
        query
            .push(" LIMIT ")
            .push_bind(i64::from(paging.limit()))
            .push(" OFFSET ")
            .push_bind(i64::from(paging.offset()));

        let items = query.build_query_as::<T>().fetch_all(&self.pool).await?;
        Ok(Page {
            total: usize::try_from(total).unwrap_or_default(),
            items,
        })
    }

    async fn delete_ids(&self, table: &str, id_column: &str, ids: &[String]) -> Result<Vec<String>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let deleted: Vec<String> = sqlx::query_scalar(&format!(
            "DELETE FROM {table} WHERE {id_column} = ANY($1) RETURNING {id_column}"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        debug!(table, requested = ids.len(), deleted = deleted.len(), "Deleted rows");
        Ok(deleted)
    }
}

const RESOURCE_FILTER_COLUMNS: &str = "rs_filter_id, rs_filter_name, rs_filter_param::text AS rs_filter_param, \
     status, rs_type_id, create_time, update_time";

const ALERT_COLUMNS: &str = "a.alert_id, a.alert_name, a.disabled, a.running_status, a.policy_id, \
     a.rs_filter_id, a.executor_id, a.create_time, a.update_time";

const ALERT_DETAIL_COLUMNS: &str = r#"
    a.alert_id, a.alert_name, a.disabled, a.create_time, a.running_status,
    a.policy_id, a.rs_filter_id, rf.rs_filter_name,
    rf.rs_filter_param::text AS rs_filter_param, rt.rs_type_name, a.executor_id,
    p.policy_name, p.policy_description, p.policy_config, p.creator,
    p.available_start_time, p.available_end_time, p.language,
    COALESCE((
        SELECT array_agg(DISTINCT m.metric_name)
        FROM rules r JOIN metrics m ON m.metric_id = r.metric_id
        WHERE r.policy_id = a.policy_id
    ), '{}') AS metrics,
    (SELECT COUNT(*) FROM rules r WHERE r.policy_id = a.policy_id) AS rules_count,
    COALESCE((
        SELECT ac.nf_address_list_id FROM actions ac
        WHERE ac.policy_id = a.policy_id
        ORDER BY ac.create_time LIMIT 1
    ), '') AS nf_address_list_id
"#;

const ALERT_JOIN: &str = "alerts a \
     JOIN policies p ON p.policy_id = a.policy_id \
     JOIN resource_filters rf ON rf.rs_filter_id = a.rs_filter_id \
     JOIN resource_types rt ON rt.rs_type_id = rf.rs_type_id";

fn push_alert_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &AlertFilter) {
    push_any(qb, "a.alert_id", &filter.alert_ids);
    push_any(qb, "a.alert_name", &filter.alert_names);
    push_any(qb, "a.disabled", &filter.disabled);
    push_any(qb, "a.running_status", &filter.running_status);
    push_any(qb, "a.policy_id", &filter.policy_ids);
    push_any(qb, "a.rs_filter_id", &filter.rs_filter_ids);
    push_any(qb, "a.executor_id", &filter.executor_ids);
    push_any(qb, "p.creator", &filter.creators);
}

#[async_trait]
impl EntityStore for PgStore {
    // --- Resource types ---

    async fn create_resource_type(&self, input: NewResourceType) -> Result<String> {
        let id = new_id(ResourceType::ID_PREFIX);
        sqlx::query(
            r#"
            INSERT INTO resource_types (rs_type_id, rs_type_name, rs_type_param)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&id)
        .bind(&input.rs_type_name)
        .bind(&input.rs_type_param)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn describe_resource_types(
        &self,
        filter: &ResourceTypeFilter,
    ) -> Result<Page<ResourceType>> {
        self.page(
            "*",
            "resource_types",
            &filter.paging,
            ("", sort_columns::RESOURCE_TYPE),
            |qb| {
                push_any(qb, "rs_type_id", &filter.rs_type_ids);
                push_any(qb, "rs_type_name", &filter.rs_type_names);
            },
        )
        .await
    }

    async fn modify_resource_type(&self, update: ResourceTypeUpdate) -> Result<String> {
        sqlx::query_scalar(
            r#"
            UPDATE resource_types SET
                rs_type_name = COALESCE($2, rs_type_name),
                rs_type_param = COALESCE($3, rs_type_param),
                update_time = NOW()
            WHERE rs_type_id = $1
            RETURNING rs_type_id
            "#,
        )
        .bind(&update.rs_type_id)
        .bind(&update.rs_type_name)
        .bind(&update.rs_type_param)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found("Resource type", &update.rs_type_id))
    }

    async fn delete_resource_types(&self, ids: &[String]) -> Result<Vec<String>> {
        self.delete_ids("resource_types", "rs_type_id", ids).await
    }

    // --- Resource filters ---

    async fn create_resource_filter(&self, input: NewResourceFilter) -> Result<String> {
        let id = new_id(ResourceFilter::ID_PREFIX);
        sqlx::query(
            r#"
            INSERT INTO resource_filters (rs_filter_id, rs_filter_name, rs_filter_param, status, rs_type_id)
            VALUES ($1, $2, $3::jsonb, $4, $5)
            "#,
        )
        .bind(&id)
        .bind(&input.rs_filter_name)
        .bind(&input.rs_filter_param)
        .bind(&input.status)
        .bind(&input.rs_type_id)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn describe_resource_filters(
        &self,
        filter: &ResourceFilterFilter,
    ) -> Result<Page<ResourceFilter>> {
        self.page(
            RESOURCE_FILTER_COLUMNS,
            "resource_filters",
            &filter.paging,
            ("", sort_columns::RESOURCE_FILTER),
            |qb| {
                push_any(qb, "rs_filter_id", &filter.rs_filter_ids);
                push_any(qb, "rs_filter_name", &filter.rs_filter_names);
                push_any(qb, "status", &filter.status);
                push_any(qb, "rs_type_id", &filter.rs_type_ids);
            },
        )
        .await
    }

    async fn modify_resource_filter(&self, update: ResourceFilterUpdate) -> Result<String> {
        sqlx::query_scalar(
            r#"
            UPDATE resource_filters SET
                rs_filter_name = COALESCE($2, rs_filter_name),
                rs_filter_param = COALESCE($3::jsonb, rs_filter_param),
                status = COALESCE($4, status),
                update_time = NOW()
            WHERE rs_filter_id = $1
            RETURNING rs_filter_id
            "#,
        )
        .bind(&update.rs_filter_id)
        .bind(&update.rs_filter_name)
        .bind(&update.rs_filter_param)
        .bind(&update.status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found("Resource filter", &update.rs_filter_id))
    }

    async fn delete_resource_filters(&self, ids: &[String]) -> Result<Vec<String>> {
        self.delete_ids("resource_filters", "rs_filter_id", ids).await
    }

    // --- Metrics ---

    async fn create_metric(&self, input: NewMetric) -> Result<String> {
        let id = new_id(Metric::ID_PREFIX);
        sqlx::query(
            r#"
            INSERT INTO metrics (metric_id, metric_name, metric_param, status, rs_type_id)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&id)
        .bind(&input.metric_name)
        .bind(&input.metric_param)
        .bind(&input.status)
        .bind(&input.rs_type_id)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn describe_metrics(&self, filter: &MetricFilter) -> Result<Page<Metric>> {
        self.page(
            "*",
            "metrics",
            &filter.paging,
            ("", sort_columns::METRIC),
            |qb| {
                push_any(qb, "metric_id", &filter.metric_ids);
                push_any(qb, "metric_name", &filter.metric_names);
                push_any(qb, "status", &filter.status);
                push_any(qb, "rs_type_id", &filter.rs_type_ids);
            },
        )
        .await
    }

    async fn modify_metric(&self, update: MetricUpdate) -> Result<String> {
        sqlx::query_scalar(
            r#"
            UPDATE metrics SET
                metric_name = COALESCE($2, metric_name),
                metric_param = COALESCE($3, metric_param),
                status = COALESCE($4, status),
                update_time = NOW()
            WHERE metric_id = $1
            RETURNING metric_id
            "#,
        )
        .bind(&update.metric_id)
        .bind(&update.metric_name)
        .bind(&update.metric_param)
        .bind(&update.status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found("Metric", &update.metric_id))
    }

    async fn delete_metrics(&self, ids: &[String]) -> Result<Vec<String>> {
        self.delete_ids("metrics", "metric_id", ids).await
    }

    // --- Policies ---

    async fn create_policy(&self, input: NewPolicy) -> Result<String> {
        let id = new_id(Policy::ID_PREFIX);
        let spec = &input.spec;
        sqlx::query(
            r#"
            INSERT INTO policies (
                policy_id, policy_name, policy_description, policy_config, creator,
                available_start_time, available_end_time, language, rs_type_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&id)
        .bind(&spec.policy_name)
        .bind(&spec.policy_description)
        .bind(&spec.policy_config)
        .bind(&spec.creator)
        .bind(&spec.available_start_time)
        .bind(&spec.available_end_time)
        .bind(&spec.language)
        .bind(&input.rs_type_id)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn describe_policies(&self, filter: &PolicyFilter) -> Result<Page<Policy>> {
        self.page(
            "*",
            "policies",
            &filter.paging,
            ("", sort_columns::POLICY),
            |qb| {
                push_any(qb, "policy_id", &filter.policy_ids);
                push_any(qb, "policy_name", &filter.policy_names);
                push_any(qb, "creator", &filter.creators);
                push_any(qb, "rs_type_id", &filter.rs_type_ids);
            },
        )
        .await
    }

    async fn modify_policy(&self, update: PolicyUpdate) -> Result<String> {
        sqlx::query_scalar(
            r#"
            UPDATE policies SET
                policy_name = COALESCE($2, policy_name),
                policy_description = COALESCE($3, policy_description),
                policy_config = COALESCE($4, policy_config),
                creator = COALESCE($5, creator),
                available_start_time = COALESCE($6, available_start_time),
                available_end_time = COALESCE($7, available_end_time),
                language = COALESCE($8, language),
                rs_type_id = COALESCE($9, rs_type_id),
                update_time = NOW()
            WHERE policy_id = $1
            RETURNING policy_id
            "#,
        )
        .bind(&update.policy_id)
        .bind(&update.policy_name)
        .bind(&update.policy_description)
        .bind(&update.policy_config)
        .bind(&update.creator)
        .bind(&update.available_start_time)
        .bind(&update.available_end_time)
        .bind(&update.language)
        .bind(&update.rs_type_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found("Policy", &update.policy_id))
    }

    async fn delete_policies(&self, ids: &[String]) -> Result<Vec<String>> {
        self.delete_ids("policies", "policy_id", ids).await
    }

    // --- Rules ---

    async fn create_rule(&self, input: NewRule) -> Result<String> {
        let id = new_id(Rule::ID_PREFIX);
        let spec = &input.spec;
        sqlx::query(
            r#"
            INSERT INTO rules (
                rule_id, rule_name, disabled, monitor_periods, severity,
                metrics_type, condition_type, thresholds, unit,
                consecutive_count, inhibit, policy_id, metric_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(&id)
        .bind(&spec.rule_name)
        .bind(spec.disabled)
        .bind(spec.monitor_periods)
        .bind(spec.severity.as_str())
        .bind(&spec.metrics_type)
        .bind(&spec.condition_type)
        .bind(&spec.thresholds)
        .bind(&spec.unit)
        .bind(spec.consecutive_count)
        .bind(spec.inhibit)
        .bind(&input.policy_id)
        .bind(&spec.metric_id)
        .execute(&self.pool)
        .await
        .map_err(|e| owner_missing(e, &[("policy_id", "Policy", &input.policy_id)]))?;

        Ok(id)
    }

    async fn describe_rules(&self, filter: &RuleFilter) -> Result<Page<Rule>> {
        let page: Page<RuleRow> = self
            .page(
                "*",
                "rules",
                &filter.paging,
                ("", sort_columns::RULE),
                |qb| {
                    push_any(qb, "rule_id", &filter.rule_ids);
                    push_any(qb, "rule_name", &filter.rule_names);
                    push_any(qb, "severity", &filter.severities);
                    push_any(qb, "policy_id", &filter.policy_ids);
                    push_any(qb, "metric_id", &filter.metric_ids);
                },
            )
            .await?;
        Ok(page.map(Into::into))
    }

    async fn modify_rule(&self, update: RuleUpdate) -> Result<String> {
        sqlx::query_scalar(
            r#"
            UPDATE rules SET
                rule_name = COALESCE($2, rule_name),
                disabled = COALESCE($3, disabled),
                monitor_periods = COALESCE($4, monitor_periods),
                severity = COALESCE($5, severity),
                metrics_type = COALESCE($6, metrics_type),
                condition_type = COALESCE($7, condition_type),
                thresholds = COALESCE($8, thresholds),
                unit = COALESCE($9, unit),
                consecutive_count = COALESCE($10, consecutive_count),
                inhibit = COALESCE($11, inhibit),
                update_time = NOW()
            WHERE rule_id = $1
            RETURNING rule_id
            "#,
        )
        .bind(&update.rule_id)
        .bind(&update.rule_name)
        .bind(update.disabled)
        .bind(update.monitor_periods)
        .bind(update.severity.map(|s| s.as_str()))
        .bind(&update.metrics_type)
        .bind(&update.condition_type)
        .bind(&update.thresholds)
        .bind(&update.unit)
        .bind(update.consecutive_count)
        .bind(update.inhibit)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found("Rule", &update.rule_id))
    }

    async fn delete_rules(&self, ids: &[String]) -> Result<Vec<String>> {
        self.delete_ids("rules", "rule_id", ids).await
    }

    // --- Actions ---

    async fn create_action(&self, input: NewAction) -> Result<String> {
        let id = new_id(Action::ID_PREFIX);
        let spec = &input.spec;
        sqlx::query(
            r#"
            INSERT INTO actions (
                action_id, action_name, trigger_status, trigger_action,
                policy_id, nf_address_list_id
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&id)
        .bind(&spec.action_name)
        .bind(&spec.trigger_status)
        .bind(&spec.trigger_action)
        .bind(&input.policy_id)
        .bind(&spec.nf_address_list_id)
        .execute(&self.pool)
        .await
        .map_err(|e| owner_missing(e, &[("policy_id", "Policy", &input.policy_id)]))?;

        Ok(id)
    }

    async fn describe_actions(&self, filter: &ActionFilter) -> Result<Page<Action>> {
        self.page(
            "*",
            "actions",
            &filter.paging,
            ("", sort_columns::ACTION),
            |qb| {
                push_any(qb, "action_id", &filter.action_ids);
                push_any(qb, "action_name", &filter.action_names);
                push_any(qb, "trigger_status", &filter.trigger_status);
                push_any(qb, "trigger_action", &filter.trigger_actions);
                push_any(qb, "policy_id", &filter.policy_ids);
                push_any(qb, "nf_address_list_id", &filter.nf_address_list_ids);
            },
        )
        .await
    }

    async fn modify_action(&self, update: ActionUpdate) -> Result<String> {
        sqlx::query_scalar(
            r#"
            UPDATE actions SET
                action_name = COALESCE($2, action_name),
                trigger_status = COALESCE($3, trigger_status),
                trigger_action = COALESCE($4, trigger_action),
                nf_address_list_id = COALESCE($5, nf_address_list_id),
                update_time = NOW()
            WHERE action_id = $1
            RETURNING action_id
            "#,
        )
        .bind(&update.action_id)
        .bind(&update.action_name)
        .bind(&update.trigger_status)
        .bind(&update.trigger_action)
        .bind(&update.nf_address_list_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found("Action", &update.action_id))
    }

    async fn delete_actions(&self, ids: &[String]) -> Result<Vec<String>> {
        self.delete_ids("actions", "action_id", ids).await
    }

    // --- Alerts ---

    async fn create_alert(&self, input: NewAlert) -> Result<String> {
        let id = new_id(Alert::ID_PREFIX);
        sqlx::query(
            r#"
            INSERT INTO alerts (alert_id, alert_name, disabled, policy_id, rs_filter_id)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&id)
        .bind(&input.alert_name)
        .bind(input.disabled)
        .bind(&input.policy_id)
        .bind(&input.rs_filter_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            owner_missing(
                e,
                &[
                    ("rs_filter_id", "Resource filter", &input.rs_filter_id),
                    ("policy_id", "Policy", &input.policy_id),
                ],
            )
        })?;

        Ok(id)
    }

    async fn describe_alerts(&self, filter: &AlertFilter) -> Result<Page<Alert>> {
        let page: Page<AlertRow> = self
            .page(
                ALERT_COLUMNS,
                "alerts a JOIN policies p ON p.policy_id = a.policy_id",
                &filter.paging,
                ("a.", sort_columns::ALERT),
                |qb| push_alert_filter(qb, filter),
            )
            .await?;
        Ok(page.map(Into::into))
    }

    async fn modify_alert(&self, update: AlertUpdate) -> Result<String> {
        let policy_id = update.policy_id.clone().unwrap_or_default();
        let rs_filter_id = update.rs_filter_id.clone().unwrap_or_default();

        sqlx::query_scalar(
            r#"
            UPDATE alerts SET
                alert_name = COALESCE($2, alert_name),
                disabled = COALESCE($3, disabled),
                running_status = COALESCE($4, running_status),
                policy_id = COALESCE($5, policy_id),
                rs_filter_id = COALESCE($6, rs_filter_id),
                update_time = NOW()
            WHERE alert_id = $1
            RETURNING alert_id
            "#,
        )
        .bind(&update.alert_id)
        .bind(&update.alert_name)
        .bind(update.disabled)
        .bind(update.running_status.map(|s| s.as_str()))
        .bind(&update.policy_id)
        .bind(&update.rs_filter_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            owner_missing(
                e,
                &[
                    ("rs_filter_id", "Resource filter", &rs_filter_id),
                    ("policy_id", "Policy", &policy_id),
                ],
            )
        })?
        .ok_or_else(|| Error::not_found("Alert", &update.alert_id))
    }

    async fn delete_alerts(&self, ids: &[String]) -> Result<Vec<String>> {
        self.delete_ids("alerts", "alert_id", ids).await
    }

    async fn describe_alerts_with_resource(
        &self,
        scope: &ScopeContext,
        alert_names: &[String],
    ) -> Result<Page<Alert>> {
        let paging = Paging {
            limit: Paging::MAX_LIMIT,
            ..Paging::default()
        };
        let page: Page<AlertRow> = self
            .page(
                ALERT_COLUMNS,
                ALERT_JOIN,
                &paging,
                ("a.", sort_columns::ALERT),
                |qb| {
                    push_any(qb, "a.alert_name", alert_names);
                    push_scope(qb, scope);
                },
            )
            .await?;
        Ok(page.map(Into::into))
    }

    async fn describe_alert_details(
        &self,
        scope: &ScopeContext,
        filter: &AlertFilter,
    ) -> Result<Page<AlertDetail>> {
        let page: Page<AlertDetailRow> = self
            .page(
                ALERT_DETAIL_COLUMNS,
                ALERT_JOIN,
                &filter.paging,
                ("a.", sort_columns::ALERT),
                |qb| {
                    push_alert_filter(qb, filter);
                    push_scope(qb, scope);
                },
            )
            .await?;
        Ok(page.map(Into::into))
    }

    // --- Audit ---

    async fn record_history(&self, input: NewHistory) -> Result<String> {
        let id = new_id(History::ID_PREFIX);
        sqlx::query(
            r#"
            INSERT INTO histories (
                history_id, history_name, alert_id, rule_id, resource_name,
                event, content, notification_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&id)
        .bind(&input.history_name)
        .bind(&input.alert_id)
        .bind(&input.rule_id)
        .bind(&input.resource_name)
        .bind(&input.event)
        .bind(&input.content)
        .bind(&input.notification_id)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn describe_histories(&self, filter: &HistoryFilter) -> Result<Page<History>> {
        self.page(
            "*",
            "histories",
            &filter.paging,
            ("", sort_columns::HISTORY),
            |qb| {
                push_any(qb, "history_id", &filter.history_ids);
                push_any(qb, "history_name", &filter.history_names);
                push_any(qb, "alert_id", &filter.alert_ids);
                push_any(qb, "rule_id", &filter.rule_ids);
                push_any(qb, "resource_name", &filter.resource_names);
                push_any(qb, "event", &filter.events);
            },
        )
        .await
    }

    async fn create_comment(&self, input: NewComment) -> Result<String> {
        let id = new_id(Comment::ID_PREFIX);
        sqlx::query(
            r#"
            INSERT INTO comments (comment_id, addresser, content, history_id)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&id)
        .bind(&input.addresser)
        .bind(&input.content)
        .bind(&input.history_id)
        .execute(&self.pool)
        .await
        .map_err(|e| owner_missing(e, &[("history_id", "History", &input.history_id)]))?;

        Ok(id)
    }

    async fn describe_comments(&self, filter: &CommentFilter) -> Result<Page<Comment>> {
        self.page(
            "*",
            "comments",
            &filter.paging,
            ("", sort_columns::COMMENT),
            |qb| {
                push_any(qb, "comment_id", &filter.comment_ids);
                push_any(qb, "addresser", &filter.addressers);
                push_any(qb, "history_id", &filter.history_ids);
            },
        )
        .await
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Database row types for mapping

#[derive(sqlx::FromRow)]
struct RuleRow {
    rule_id: String,
    rule_name: String,
    disabled: bool,
    monitor_periods: i32,
    severity: String,
    metrics_type: String,
    condition_type: String,
    thresholds: String,
    unit: String,
    consecutive_count: i32,
    inhibit: bool,
    policy_id: String,
    metric_id: String,
    create_time: DateTime<Utc>,
    update_time: DateTime<Utc>,
}

impl From<RuleRow> for Rule {
    fn from(row: RuleRow) -> Self {
        Rule {
            rule_id: row.rule_id,
            rule_name: row.rule_name,
            disabled: row.disabled,
            monitor_periods: row.monitor_periods,
            severity: row.severity.parse().unwrap_or_default(),
            metrics_type: row.metrics_type,
            condition_type: row.condition_type,
            thresholds: row.thresholds,
            unit: row.unit,
            consecutive_count: row.consecutive_count,
            inhibit: row.inhibit,
            policy_id: row.policy_id,
            metric_id: row.metric_id,
            create_time: row.create_time,
            update_time: row.update_time,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AlertRow {
    alert_id: String,
    alert_name: String,
    disabled: bool,
    running_status: String,
    policy_id: String,
    rs_filter_id: String,
    executor_id: String,
    create_time: DateTime<Utc>,
    update_time: DateTime<Utc>,
}

impl From<AlertRow> for Alert {
    fn from(row: AlertRow) -> Self {
        Alert {
            alert_id: row.alert_id,
            alert_name: row.alert_name,
            disabled: row.disabled,
            running_status: row.running_status.parse().unwrap_or_default(),
            policy_id: row.policy_id,
            rs_filter_id: row.rs_filter_id,
            executor_id: row.executor_id,
            create_time: row.create_time,
            update_time: row.update_time,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AlertDetailRow {
    alert_id: String,
    alert_name: String,
    disabled: bool,
    create_time: DateTime<Utc>,
    running_status: String,
    policy_id: String,
    rs_filter_id: String,
    rs_filter_name: String,
    rs_filter_param: String,
    rs_type_name: String,
    executor_id: String,
    policy_name: String,
    policy_description: String,
    policy_config: String,
    creator: String,
    available_start_time: String,
    available_end_time: String,
    language: String,
    metrics: Vec<String>,
    rules_count: i64,
    nf_address_list_id: String,
}

impl From<AlertDetailRow> for AlertDetail {
    fn from(row: AlertDetailRow) -> Self {
        AlertDetail {
            alert_id: row.alert_id,
            alert_name: row.alert_name,
            disabled: row.disabled,
            create_time: row.create_time,
            running_status: row.running_status.parse().unwrap_or_default(),
            policy_id: row.policy_id,
            rs_filter_id: row.rs_filter_id,
            rs_filter_name: row.rs_filter_name,
            rs_filter_param: row.rs_filter_param,
            rs_type_name: row.rs_type_name,
            executor_id: row.executor_id,
            policy_name: row.policy_name,
            policy_description: row.policy_description,
            policy_config: row.policy_config,
            creator: row.creator,
            available_start_time: row.available_start_time,
            available_end_time: row.available_end_time,
            language: row.language,
            metrics: row.metrics,
            rules_count: u32::try_from(row.rules_count).unwrap_or(u32::MAX),
            nf_address_list_id: row.nf_address_list_id,
        }
    }
}
