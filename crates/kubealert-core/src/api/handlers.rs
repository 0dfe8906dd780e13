//! API handlers for the HTTP REST API

use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::warn;

use super::query::ListQuery;
use super::response::{json_body, ApiResult, HealthResponse, IdResponse, IdsResponse};
use crate::alerting::{AlertCreator, CreationLock};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::manager::ManagerService;
use crate::models::{
    Action, ActionUpdate, Alert, AlertUpdate, Comment, History, Metric, MetricUpdate, NewAction,
    NewAlert, NewComment, NewHistory, NewMetric, NewPolicy, NewResourceFilter, NewResourceType,
    NewRule, Page, Policy, PolicyUpdate, ResourceFilter, ResourceFilterUpdate, ResourceType,
    ResourceTypeUpdate, Rule, RuleUpdate,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub creator: AlertCreator,
    /// RPC-style entry point for in-process callers; shares the creator
    pub manager: ManagerService,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire the alert creator to the database; creation locks go through
    /// Redis when it is configured
    pub fn new(db: Database, deadline: Duration, metrics: Option<PrometheusHandle>) -> Self {
        let creator = AlertCreator::new(
            db.store.clone(),
            CreationLock::from_redis(db.redis.clone()),
            deadline,
        );
        Self {
            manager: ManagerService::new(creator.clone()),
            db,
            creator,
            metrics,
        }
    }
}

fn ids(query: &ListQuery, key: &str) -> Result<Vec<String>> {
    let ids = query.list(key);
    if ids.is_empty() {
        return Err(Error::validation(format!("{key} must not be empty")));
    }
    Ok(ids)
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, label) = match state.db.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };
    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Prometheus exposition
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}

// Resource types

pub async fn create_resource_type(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewResourceType>, JsonRejection>,
) -> ApiResult<IdResponse> {
    let input = json_body(body)?;
    let id = state.db.store.create_resource_type(input).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn describe_resource_types(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Page<ResourceType>> {
    let filter = query.resource_type_filter()?;
    Ok(Json(state.db.store.describe_resource_types(&filter).await?))
}

pub async fn modify_resource_type(
    State(state): State<AppState>,
    body: std::result::Result<Json<ResourceTypeUpdate>, JsonRejection>,
) -> ApiResult<IdResponse> {
    let update = json_body(body)?;
    let id = state.db.store.modify_resource_type(update).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn delete_resource_types(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<IdsResponse> {
    let ids = state
        .db
        .store
        .delete_resource_types(&ids(&query, "rs_type_ids")?)
        .await?;
    Ok(Json(IdsResponse { ids }))
}

// Resource filters

pub async fn create_resource_filter(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewResourceFilter>, JsonRejection>,
) -> ApiResult<IdResponse> {
    let input = json_body(body)?;
    let id = state.db.store.create_resource_filter(input).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn describe_resource_filters(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Page<ResourceFilter>> {
    let filter = query.resource_filter_filter()?;
    Ok(Json(state.db.store.describe_resource_filters(&filter).await?))
}

pub async fn modify_resource_filter(
    State(state): State<AppState>,
    body: std::result::Result<Json<ResourceFilterUpdate>, JsonRejection>,
) -> ApiResult<IdResponse> {
    let update = json_body(body)?;
    let id = state.db.store.modify_resource_filter(update).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn delete_resource_filters(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<IdsResponse> {
    let ids = state
        .db
        .store
        .delete_resource_filters(&ids(&query, "rs_filter_ids")?)
        .await?;
    Ok(Json(IdsResponse { ids }))
}

// Metrics

pub async fn create_metric(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewMetric>, JsonRejection>,
) -> ApiResult<IdResponse> {
    let input = json_body(body)?;
    let id = state.db.store.create_metric(input).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn describe_metrics(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Page<Metric>> {
    let filter = query.metric_filter()?;
    Ok(Json(state.db.store.describe_metrics(&filter).await?))
}

pub async fn modify_metric(
    State(state): State<AppState>,
    body: std::result::Result<Json<MetricUpdate>, JsonRejection>,
) -> ApiResult<IdResponse> {
    let update = json_body(body)?;
    let id = state.db.store.modify_metric(update).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn delete_metrics(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<IdsResponse> {
    let ids = state.db.store.delete_metrics(&ids(&query, "metric_ids")?).await?;
    Ok(Json(IdsResponse { ids }))
}

// Policies

pub async fn create_policy(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewPolicy>, JsonRejection>,
) -> ApiResult<IdResponse> {
    let input = json_body(body)?;
    let id = state.db.store.create_policy(input).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn describe_policies(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Page<Policy>> {
    let filter = query.policy_filter()?;
    Ok(Json(state.db.store.describe_policies(&filter).await?))
}

pub async fn modify_policy(
    State(state): State<AppState>,
    body: std::result::Result<Json<PolicyUpdate>, JsonRejection>,
) -> ApiResult<IdResponse> {
    let update = json_body(body)?;
    let id = state.db.store.modify_policy(update).await?;
    Ok(Json(IdResponse { id }))
}

/// Deleting a policy also removes its rules, actions and alerts
pub async fn delete_policies(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<IdsResponse> {
    let ids = state.db.store.delete_policies(&ids(&query, "policy_ids")?).await?;
    Ok(Json(IdsResponse { ids }))
}

// Rules

pub async fn create_rule(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewRule>, JsonRejection>,
) -> ApiResult<IdResponse> {
    let input = json_body(body)?;
    let id = state.db.store.create_rule(input).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn describe_rules(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Page<Rule>> {
    let filter = query.rule_filter()?;
    Ok(Json(state.db.store.describe_rules(&filter).await?))
}

pub async fn modify_rule(
    State(state): State<AppState>,
    body: std::result::Result<Json<RuleUpdate>, JsonRejection>,
) -> ApiResult<IdResponse> {
    let update = json_body(body)?;
    let id = state.db.store.modify_rule(update).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn delete_rules(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<IdsResponse> {
    let ids = state.db.store.delete_rules(&ids(&query, "rule_ids")?).await?;
    Ok(Json(IdsResponse { ids }))
}

// Actions

pub async fn create_action(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewAction>, JsonRejection>,
) -> ApiResult<IdResponse> {
    let input = json_body(body)?;
    let id = state.db.store.create_action(input).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn describe_actions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Page<Action>> {
    let filter = query.action_filter()?;
    Ok(Json(state.db.store.describe_actions(&filter).await?))
}

pub async fn modify_action(
    State(state): State<AppState>,
    body: std::result::Result<Json<ActionUpdate>, JsonRejection>,
) -> ApiResult<IdResponse> {
    let update = json_body(body)?;
    let id = state.db.store.modify_action(update).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn delete_actions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<IdsResponse> {
    let ids = state.db.store.delete_actions(&ids(&query, "action_ids")?).await?;
    Ok(Json(IdsResponse { ids }))
}

// Alerts by id

pub async fn create_alert(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewAlert>, JsonRejection>,
) -> ApiResult<IdResponse> {
    let input = json_body(body)?;
    let id = state.db.store.create_alert(input).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn describe_alerts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Page<Alert>> {
    let filter = query.alert_filter()?;
    Ok(Json(state.db.store.describe_alerts(&filter).await?))
}

pub async fn modify_alert(
    State(state): State<AppState>,
    body: std::result::Result<Json<AlertUpdate>, JsonRejection>,
) -> ApiResult<IdResponse> {
    let update = json_body(body)?;
    let id = state.db.store.modify_alert(update).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn delete_alerts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<IdsResponse> {
    let ids = state.db.store.delete_alerts(&ids(&query, "alert_ids")?).await?;
    Ok(Json(IdsResponse { ids }))
}

// History and comments

pub async fn record_history(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewHistory>, JsonRejection>,
) -> ApiResult<IdResponse> {
    let input = json_body(body)?;
    let id = state.db.store.record_history(input).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn describe_histories(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Page<History>> {
    let filter = query.history_filter()?;
    Ok(Json(state.db.store.describe_histories(&filter).await?))
}

pub async fn create_comment(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewComment>, JsonRejection>,
) -> ApiResult<IdResponse> {
    let input = json_body(body)?;
    let id = state.db.store.create_comment(input).await?;
    Ok(Json(IdResponse { id }))
}

pub async fn describe_comments(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Page<Comment>> {
    let filter = query.comment_filter()?;
    Ok(Json(state.db.store.describe_comments(&filter).await?))
}
