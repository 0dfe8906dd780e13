//! API routes

use axum::{
    routing::{get, patch, post},
    Extension, Router,
};

use super::handlers::{self, AppState};
use super::scoped::{self, SCOPE_PREFIXES};
use crate::models::ScopeTag;

/// Alert routes for one scope prefix
fn scoped_routes(tag: ScopeTag) -> Router<AppState> {
    Router::new()
        .route(
            "/alert",
            post(scoped::create_alert)
                .patch(scoped::modify_alert_by_name)
                .delete(scoped::delete_alerts_by_name)
                .get(scoped::describe_alert_details),
        )
        .route("/policy", patch(scoped::modify_policy_by_alert))
        .layer(Extension(tag))
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        // Health
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))

        // Entities by id
        .route(
            "/api/v1/resource_type",
            post(handlers::create_resource_type)
                .get(handlers::describe_resource_types)
                .patch(handlers::modify_resource_type)
                .delete(handlers::delete_resource_types),
        )
        .route(
            "/api/v1/resource_filter",
            post(handlers::create_resource_filter)
                .get(handlers::describe_resource_filters)
                .patch(handlers::modify_resource_filter)
                .delete(handlers::delete_resource_filters),
        )
        .route(
            "/api/v1/metric",
            post(handlers::create_metric)
                .get(handlers::describe_metrics)
                .patch(handlers::modify_metric)
                .delete(handlers::delete_metrics),
        )
        .route(
            "/api/v1/policy",
            post(handlers::create_policy)
                .get(handlers::describe_policies)
                .patch(handlers::modify_policy)
                .delete(handlers::delete_policies),
        )
        .route(
            "/api/v1/rule",
            post(handlers::create_rule)
                .get(handlers::describe_rules)
                .patch(handlers::modify_rule)
                .delete(handlers::delete_rules),
        )
        .route(
            "/api/v1/action",
            post(handlers::create_action)
                .get(handlers::describe_actions)
                .patch(handlers::modify_action)
                .delete(handlers::delete_actions),
        )
        .route(
            "/api/v1/alert",
            post(handlers::create_alert)
                .get(handlers::describe_alerts)
                .patch(handlers::modify_alert)
                .delete(handlers::delete_alerts),
        )

        // Audit trail
        .route(
            "/api/v1/history",
            post(handlers::record_history).get(handlers::describe_histories),
        )
        .route(
            "/api/v1/comment",
            post(handlers::create_comment).get(handlers::describe_comments),
        );

    // Alerts by name within a scope
    for (prefix, tag) in SCOPE_PREFIXES {
        router = router.nest(&format!("/api/v1{prefix}"), scoped_routes(tag));
    }

    router.with_state(state)
}
