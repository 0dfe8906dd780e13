//! Composite alert creation
//!
//! Creates a resource filter, a policy, its action and rules, and finally the
//! alert, in that order. A failure after the resource filter exists deletes
//! what was created; the store's cascades take the action and rules along
//! with the policy.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::lock::{lock_key, CreationLock};
use super::names::{check_alert_names, parse_alert_names};
use super::validator::check_filter_param;
use crate::db::EntityStore;
use crate::error::{CreateStep, Error, Result};
use crate::models::{
    split_list, CompositeAlertSpec, CreatedAlert, NewAlert, ResourceType, ResourceTypeFilter,
    ScopeContext,
};

/// Rows committed so far by one creation attempt
#[derive(Debug, Default)]
struct Created {
    rs_filter_id: Option<String>,
    policy_id: Option<String>,
}

/// Runs the composite alert creation pipeline
#[derive(Clone)]
pub struct AlertCreator {
    store: Arc<dyn EntityStore>,
    lock: CreationLock,
    deadline: Duration,
}

impl AlertCreator {
    /// Create a new alert creator
    pub fn new(store: Arc<dyn EntityStore>, lock: CreationLock, deadline: Duration) -> Self {
        Self {
            store,
            lock,
            deadline,
        }
    }

    /// The store the creator writes to
    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Create an alert with everything it depends on inside `scope`
    ///
    /// Runs under the configured deadline, lock wait included. Steps already
    /// committed when the deadline passes are left in place.
    pub async fn create(&self, scope: &ScopeContext, spec: CompositeAlertSpec) -> Result<CreatedAlert> {
        let op_id = Uuid::now_v7();
        let span = info_span!("create_alert", %op_id, scope = %scope, alert_name = %spec.alert.alert_name);

        let result = match tokio::time::timeout(self.deadline, self.run(scope, spec))
            .instrument(span)
            .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::DeadlineExceeded(self.deadline)),
        };

        let outcome = match &result {
            Ok(_) => "created",
            Err(e) => e.kind().as_str(),
        };
        metrics::counter!("kubealert_alert_creates_total", "outcome" => outcome).increment(1);

        match &result {
            Ok(created) => info!(%op_id, alert_id = %created.alert_id, "Alert created"),
            Err(e) => warn!(%op_id, error = %e, kind = e.kind().as_str(), "Alert creation failed"),
        }
        result
    }

    async fn run(&self, scope: &ScopeContext, mut spec: CompositeAlertSpec) -> Result<CreatedAlert> {
        if spec.rules.is_empty() {
            return Err(Error::validation("at least one rule is required"));
        }
        let alert_name = match <[String; 1]>::try_from(parse_alert_names(&spec.alert.alert_name)?) {
            Ok([name]) => name,
            Err(_) => {
                return Err(Error::validation(format!(
                    "exactly one alert name expected, got '{}'",
                    spec.alert.alert_name
                )))
            }
        };
        spec.alert.alert_name.clone_from(&alert_name);

        let rs_type = self.resolve_resource_type(scope, &spec.rs_filter.rs_type_id).await?;
        spec.rs_filter.rs_type_id = rs_type.rs_type_id;
        check_filter_param(scope, &spec.rs_filter.rs_filter_param)?;

        let names = [alert_name];
        let guard = self.lock.acquire(&lock_key(scope, &names)).await?;
        let result = self.create_locked(scope, &names, spec).await;
        guard.release().await;
        result
    }

    /// The single resource type named by `rs_type_id`, which must match the scope
    async fn resolve_resource_type(
        &self,
        scope: &ScopeContext,
        rs_type_id: &str,
    ) -> Result<ResourceType> {
        let ids = split_list(rs_type_id);
        if ids.is_empty() {
            return Err(Error::validation("resource type is required"));
        }

        let page = self
            .store
            .describe_resource_types(&ResourceTypeFilter {
                rs_type_ids: ids,
                ..ResourceTypeFilter::default()
            })
            .await
            .map_err(|e| Error::step(CreateStep::DescribeResourceType, e))?;

        let total = page.total;
        let rs_type = match <[ResourceType; 1]>::try_from(page.items) {
            Ok([rs_type]) if total == 1 => rs_type,
            _ => {
                return Err(Error::validation(format!(
                    "resource type '{rs_type_id}' matched {total} types, expected exactly one"
                )))
            }
        };
        if rs_type.rs_type_name != scope.tag().as_str() {
            return Err(Error::validation(format!(
                "resource type '{}' does not match scope '{}'",
                rs_type.rs_type_name,
                scope.tag()
            )));
        }
        Ok(rs_type)
    }

    async fn create_locked(
        &self,
        scope: &ScopeContext,
        names: &[String],
        spec: CompositeAlertSpec,
    ) -> Result<CreatedAlert> {
        let existing = check_alert_names(self.store.as_ref(), scope, names)
            .await
            .map_err(|e| Error::step(CreateStep::CheckAlertName, e))?;
        if existing.total != 0 {
            let mut taken: Vec<String> = existing.items.into_iter().map(|a| a.alert_name).collect();
            taken.sort();
            taken.dedup();
            return Err(Error::AlreadyExists {
                scope: scope.to_string(),
                names: taken.join(","),
            });
        }

        let mut created = Created::default();
        match self.insert_all(spec, &mut created).await {
            Ok(alert) => Ok(alert),
            Err(e) => {
                self.compensate(&created).await;
                Err(e)
            }
        }
    }

    async fn insert_all(&self, spec: CompositeAlertSpec, created: &mut Created) -> Result<CreatedAlert> {
        let CompositeAlertSpec {
            rs_filter,
            policy,
            rules,
            action,
            alert,
        } = spec;

        let rs_type_id = rs_filter.rs_type_id.clone();
        let rs_filter_id = self
            .store
            .create_resource_filter(rs_filter)
            .await
            .map_err(|e| Error::step(CreateStep::CreateResourceFilter, e))?;
        created.rs_filter_id = Some(rs_filter_id.clone());

        let policy_id = self
            .store
            .create_policy(policy.into_new_policy(rs_type_id))
            .await
            .map_err(|e| Error::step(CreateStep::CreatePolicy, e))?;
        created.policy_id = Some(policy_id.clone());

        self.store
            .create_action(action.into_new_action(&policy_id))
            .await
            .map_err(|e| Error::step(CreateStep::CreateAction, e))?;

        for (index, rule) in rules.into_iter().enumerate() {
            self.store
                .create_rule(rule.into_new_rule(&policy_id))
                .await
                .map_err(|e| Error::step(CreateStep::CreateRule(index), e))?;
        }

        let alert_id = self
            .store
            .create_alert(NewAlert {
                alert_name: alert.alert_name.clone(),
                disabled: false,
                policy_id,
                rs_filter_id,
            })
            .await
            .map_err(|e| Error::step(CreateStep::CreateAlert, e))?;

        Ok(CreatedAlert {
            alert_id,
            alert_name: alert.alert_name,
        })
    }

    /// Best-effort removal of a failed attempt's rows
    async fn compensate(&self, created: &Created) {
        if let Some(rs_filter_id) = &created.rs_filter_id {
            if let Err(e) = self
                .store
                .delete_resource_filters(std::slice::from_ref(rs_filter_id))
                .await
            {
                warn!(rs_filter_id = %rs_filter_id, error = %e, "Failed to delete resource filter");
            }
        }
        if let Some(policy_id) = &created.policy_id {
            if let Err(e) = self
                .store
                .delete_policies(std::slice::from_ref(policy_id))
                .await
            {
                warn!(policy_id = %policy_id, error = %e, "Failed to delete policy");
            }
        }

        if created.rs_filter_id.is_some() {
            metrics::counter!("kubealert_alert_compensations_total").increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::testing::{composite_spec, namespace_scope, FaultyStore, Faults};
    use crate::error::ErrorKind;
    use crate::models::{
        ActionFilter, AlertFilter, PolicyFilter, ResourceFilterFilter, RuleFilter, RuleSpec,
    };
    use pretty_assertions::assert_eq;

    fn creator(store: Arc<FaultyStore>) -> AlertCreator {
        AlertCreator::new(store, CreationLock::local(), Duration::from_secs(5))
    }

    async fn row_counts(store: &FaultyStore) -> [usize; 5] {
        [
            store
                .describe_resource_filters(&ResourceFilterFilter::default())
                .await
                .unwrap()
                .total,
            store.describe_policies(&PolicyFilter::default()).await.unwrap().total,
            store.describe_actions(&ActionFilter::default()).await.unwrap().total,
            store.describe_rules(&RuleFilter::default()).await.unwrap().total,
            store.describe_alerts(&AlertFilter::default()).await.unwrap().total,
        ]
    }

    #[tokio::test]
    async fn creates_every_row() {
        let store = Arc::new(FaultyStore::new(Faults::default()));
        let created = creator(store.clone())
            .create(&namespace_scope("ns1"), composite_spec("ns1", "cpu-alert", 3))
            .await
            .unwrap();

        assert!(created.alert_id.starts_with("al-"));
        assert_eq!(created.alert_name, "cpu-alert");

        let alerts = store
            .describe_alerts(&AlertFilter {
                alert_ids: vec![created.alert_id.clone()],
                ..AlertFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(alerts.total, 1);
        let alert = &alerts.items[0];

        let policies = store
            .describe_policies(&PolicyFilter {
                policy_ids: vec![alert.policy_id.clone()],
                ..PolicyFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(policies.total, 1);
        assert_eq!(policies.items[0].rs_type_id, "rst-namespace");

        let rules = store
            .describe_rules(&RuleFilter {
                policy_ids: vec![alert.policy_id.clone()],
                ..RuleFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(rules.total, 3);
        assert_eq!(row_counts(&store).await, [1, 1, 1, 3, 1]);
    }

    #[tokio::test]
    async fn zero_rules_is_rejected_without_side_effects() {
        let store = Arc::new(FaultyStore::new(Faults::default()));
        let err = creator(store.clone())
            .create(&namespace_scope("ns1"), composite_spec("ns1", "cpu-alert", 0))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(row_counts(&store).await, [0; 5]);
    }

    #[tokio::test]
    async fn scope_mismatch_is_rejected_without_side_effects() {
        let store = Arc::new(FaultyStore::new(Faults::default()));
        let err = creator(store.clone())
            .create(&namespace_scope("ns1"), composite_spec("ns2", "cpu-alert", 1))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ScopeMismatch { .. }));
        assert_eq!(row_counts(&store).await, [0; 5]);
    }

    #[tokio::test]
    async fn resource_type_must_match_the_scope() {
        let store = Arc::new(FaultyStore::new(Faults::default()));
        let creator = creator(store.clone());

        let mut spec = composite_spec("ns1", "cpu-alert", 1);
        spec.rs_filter.rs_type_id = "rst-pod".into();
        let err = creator.create(&namespace_scope("ns1"), spec).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let mut spec = composite_spec("ns1", "cpu-alert", 1);
        spec.rs_filter.rs_type_id = "rst-namespace,rst-pod".into();
        let err = creator.create(&namespace_scope("ns1"), spec).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        assert_eq!(row_counts(&store).await, [0; 5]);
    }

    #[tokio::test]
    async fn invalid_alert_name_is_rejected() {
        let store = Arc::new(FaultyStore::new(Faults::default()));
        let err = creator(store.clone())
            .create(&namespace_scope("ns1"), composite_spec("ns1", "cpu alert!", 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(row_counts(&store).await, [0; 5]);
    }

    #[tokio::test]
    async fn name_lists_are_rejected_without_side_effects() {
        let store = Arc::new(FaultyStore::new(Faults::default()));
        let creator = creator(store.clone());

        for _ in 0..2 {
            let err = creator
                .create(&namespace_scope("ns1"), composite_spec("ns1", "a,b", 1))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
        assert_eq!(row_counts(&store).await, [0; 5]);
    }

    #[tokio::test]
    async fn stored_name_is_trimmed_and_stays_unique() {
        let store = Arc::new(FaultyStore::new(Faults::default()));
        let creator = creator(store.clone());

        let created = creator
            .create(&namespace_scope("ns1"), composite_spec("ns1", " cpu-alert ", 1))
            .await
            .unwrap();
        assert_eq!(created.alert_name, "cpu-alert");

        let alerts = store.describe_alerts(&AlertFilter::default()).await.unwrap();
        assert_eq!(alerts.items[0].alert_name, "cpu-alert");

        let err = creator
            .create(&namespace_scope("ns1"), composite_spec("ns1", "cpu-alert", 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(row_counts(&store).await, [1, 1, 1, 1, 1]);
    }

    #[tokio::test]
    async fn node_pod_filter_must_name_the_node() {
        let store = Arc::new(FaultyStore::new(Faults::default()));
        let creator = creator(store.clone());
        let scope = ScopeContext::Pod {
            ns_name: None,
            node_id: Some("n1".into()),
        };
        let pod_spec = |param: &str| {
            let mut spec = composite_spec("ns1", "pod-alert", 1);
            spec.rs_filter.rs_type_id = "rst-pod".into();
            spec.rs_filter.rs_filter_param = param.into();
            spec
        };

        for param in ["{}", r#"{"node_id":"n2"}"#] {
            let err = creator.create(&scope, pod_spec(param)).await.unwrap_err();
            assert!(matches!(err, Error::ScopeMismatch { .. }), "{param}: {err}");
        }
        assert_eq!(row_counts(&store).await, [0; 5]);

        creator
            .create(&scope, pod_spec(r#"{"node_id":"n1"}"#))
            .await
            .unwrap();
        let err = creator
            .create(&scope, pod_spec(r#"{"node_id":"n1"}"#))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(row_counts(&store).await, [1, 1, 1, 1, 1]);
    }

    #[tokio::test]
    async fn duplicate_name_in_scope_already_exists() {
        let store = Arc::new(FaultyStore::new(Faults::default()));
        let creator = creator(store.clone());

        creator
            .create(&namespace_scope("ns1"), composite_spec("ns1", "cpu-alert", 1))
            .await
            .unwrap();
        let err = creator
            .create(&namespace_scope("ns1"), composite_spec("ns1", "cpu-alert", 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        // The same name in another namespace is fine
        creator
            .create(&namespace_scope("ns2"), composite_spec("ns2", "cpu-alert", 1))
            .await
            .unwrap();
        assert_eq!(row_counts(&store).await, [2, 2, 2, 2, 2]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicates_create_one_alert() {
        let store = Arc::new(FaultyStore::new(Faults {
            policy_delay: Some(Duration::from_millis(20)),
            ..Faults::default()
        }));
        let creator = creator(store.clone());

        let attempts: Vec<_> = (0..6)
            .map(|_| {
                let creator = creator.clone();
                tokio::spawn(async move {
                    creator
                        .create(&namespace_scope("ns1"), composite_spec("ns1", "cpu-alert", 2))
                        .await
                })
            })
            .collect();

        let mut succeeded = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::AlreadyExists),
            }
        }

        assert_eq!(succeeded, 1);
        assert_eq!(row_counts(&store).await, [1, 1, 1, 2, 1]);
    }

    #[tokio::test]
    async fn action_failure_removes_filter_and_policy() {
        let store = Arc::new(FaultyStore::new(Faults {
            fail_action: true,
            ..Faults::default()
        }));
        let err = creator(store.clone())
            .create(&namespace_scope("ns1"), composite_spec("ns1", "cpu-alert", 2))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(matches!(
            err,
            Error::Step {
                step: CreateStep::CreateAction,
                ..
            }
        ));
        assert_eq!(row_counts(&store).await, [0; 5]);
    }

    #[tokio::test]
    async fn rule_failure_removes_everything() {
        let store = Arc::new(FaultyStore::new(Faults {
            fail_rule: Some(2),
            ..Faults::default()
        }));
        let err = creator(store.clone())
            .create(&namespace_scope("ns1"), composite_spec("ns1", "cpu-alert", 4))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Failed to create rule #3: Internal error: injected rule failure");
        assert_eq!(row_counts(&store).await, [0; 5]);
    }

    #[tokio::test]
    async fn alert_failure_removes_everything() {
        let store = Arc::new(FaultyStore::new(Faults {
            fail_alert: true,
            ..Faults::default()
        }));
        let err = creator(store.clone())
            .create(&namespace_scope("ns1"), composite_spec("ns1", "cpu-alert", 1))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(row_counts(&store).await, [0; 5]);
    }

    #[tokio::test]
    async fn compensation_failures_do_not_mask_the_cause() {
        let store = Arc::new(FaultyStore::new(Faults {
            fail_action: true,
            fail_filter_delete: true,
            ..Faults::default()
        }));
        let err = creator(store.clone())
            .create(&namespace_scope("ns1"), composite_spec("ns1", "cpu-alert", 1))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Step {
                step: CreateStep::CreateAction,
                ..
            }
        ));
        // The policy is still removed; the filter stays behind
        assert_eq!(row_counts(&store).await, [1, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn deadline_leaves_committed_steps() {
        let store = Arc::new(FaultyStore::new(Faults {
            policy_delay: Some(Duration::from_millis(500)),
            ..Faults::default()
        }));
        let creator = AlertCreator::new(store.clone(), CreationLock::local(), Duration::from_millis(50));

        let err = creator
            .create(&namespace_scope("ns1"), composite_spec("ns1", "cpu-alert", 1))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DeadlineExceeded(_)));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(row_counts(&store).await, [1, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn rules_keep_their_specs() {
        let store = Arc::new(FaultyStore::new(Faults::default()));
        let mut spec = composite_spec("ns1", "cpu-alert", 0);
        spec.rules.push(RuleSpec {
            rule_name: "mem-high".into(),
            thresholds: "90".into(),
            metric_id: "mt-mem".into(),
            ..RuleSpec::default()
        });
        creator(store.clone())
            .create(&namespace_scope("ns1"), spec)
            .await
            .unwrap();

        let rules = store.describe_rules(&RuleFilter::default()).await.unwrap();
        assert_eq!(rules.items[0].rule_name, "mem-high");
        assert_eq!(rules.items[0].thresholds, "90");
    }
}
