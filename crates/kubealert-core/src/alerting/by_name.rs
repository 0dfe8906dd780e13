//! Alert mutations addressed by name within a scope
//!
//! Each operation resolves names to ids in the scope, mutates by id, and
//! checks the store acted on exactly the resolved rows.

use std::collections::BTreeSet;

use tracing::info;

use super::names::{check_alert_names, parse_alert_names};
use crate::db::EntityStore;
use crate::error::{Error, Result};
use crate::models::{Alert, AlertByName, AlertUpdate, PolicyByAlert, PolicyUpdate, ScopeContext};

/// The single alert named `raw_name` in `scope`
async fn resolve_one(store: &dyn EntityStore, scope: &ScopeContext, raw_name: &str) -> Result<Alert> {
    let names = parse_alert_names(raw_name)?;
    if names.len() != 1 {
        return Err(Error::validation(format!(
            "exactly one alert name expected, got '{raw_name}'"
        )));
    }

    let matches = check_alert_names(store, scope, &names).await?;
    let name = &names[0];
    match <[Alert; 1]>::try_from(matches.items) {
        Ok([alert]) if matches.total == 1 => Ok(alert),
        _ if matches.total == 0 => Err(Error::not_found("Alert", format!("{name} in {scope}"))),
        _ => Err(Error::Ambiguous {
            entity: "Alert".into(),
            name: name.clone(),
            count: matches.total,
        }),
    }
}

fn ensure_same(entity: &str, expected: &str, actual: &str) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::Inconsistent {
            entity: entity.into(),
            expected: expected.into(),
            actual: actual.into(),
        })
    }
}

/// Update the disabled flag, policy or resource filter of a named alert
///
/// Returns the alert id.
pub async fn modify_alert_by_name(
    store: &dyn EntityStore,
    scope: &ScopeContext,
    request: AlertByName,
) -> Result<String> {
    let alert = resolve_one(store, scope, &request.alert_name).await?;

    let modified = store
        .modify_alert(AlertUpdate {
            alert_id: alert.alert_id.clone(),
            disabled: request.disabled,
            policy_id: request.policy_id,
            rs_filter_id: request.rs_filter_id,
            ..AlertUpdate::default()
        })
        .await?;
    ensure_same("Alert", &alert.alert_id, &modified)?;

    info!(alert_id = %modified, scope = %scope, "Modified alert by name");
    Ok(modified)
}

/// Update the policy owned by a named alert
///
/// Returns the policy id.
pub async fn modify_policy_by_alert(
    store: &dyn EntityStore,
    scope: &ScopeContext,
    request: PolicyByAlert,
) -> Result<String> {
    let alert = resolve_one(store, scope, &request.alert_name).await?;

    let modified = store
        .modify_policy(PolicyUpdate {
            policy_id: alert.policy_id.clone(),
            ..request.policy
        })
        .await?;
    ensure_same("Policy", &alert.policy_id, &modified)?;

    info!(policy_id = %modified, alert_id = %alert.alert_id, "Modified policy by alert name");
    Ok(modified)
}

/// Delete the named alerts in `scope`
///
/// Every name must match at most one alert and at least one name must match.
/// Returns the names of the deleted alerts.
pub async fn delete_alerts_by_name(
    store: &dyn EntityStore,
    scope: &ScopeContext,
    raw_names: &str,
) -> Result<Vec<String>> {
    let names = parse_alert_names(raw_names)?;
    let matches = check_alert_names(store, scope, &names).await?;

    if matches.total == 0 {
        return Err(Error::not_found("Alert", format!("{} in {scope}", names.join(","))));
    }
    for name in &names {
        let count = matches.items.iter().filter(|a| &a.alert_name == name).count();
        if count > 1 {
            return Err(Error::Ambiguous {
                entity: "Alert".into(),
                name: name.clone(),
                count,
            });
        }
    }

    let ids: Vec<String> = matches.items.iter().map(|a| a.alert_id.clone()).collect();
    let deleted = store.delete_alerts(&ids).await?;

    let expected: BTreeSet<&str> = ids.iter().map(String::as_str).collect();
    let actual: BTreeSet<&str> = deleted.iter().map(String::as_str).collect();
    if expected != actual {
        return Err(Error::Inconsistent {
            entity: "Alert".into(),
            expected: ids.join(","),
            actual: deleted.join(","),
        });
    }

    info!(count = deleted.len(), scope = %scope, "Deleted alerts by name");
    Ok(matches.items.into_iter().map(|a| a.alert_name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::testing::{composite_spec, namespace_scope, FaultyStore, Faults};
    use crate::alerting::{AlertCreator, CreationLock};
    use crate::error::ErrorKind;
    use crate::models::{AlertFilter, NewAlert, PolicyFilter};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    async fn seeded() -> (Arc<FaultyStore>, String) {
        let store = Arc::new(FaultyStore::new(Faults::default()));
        let creator = AlertCreator::new(store.clone(), CreationLock::local(), Duration::from_secs(5));
        let created = creator
            .create(&namespace_scope("ns1"), composite_spec("ns1", "cpu-alert", 1))
            .await
            .unwrap();
        creator
            .create(&namespace_scope("ns1"), composite_spec("ns1", "mem-alert", 1))
            .await
            .unwrap();
        (store, created.alert_id)
    }

    async fn alert(store: &FaultyStore, alert_id: &str) -> Alert {
        store
            .describe_alerts(&AlertFilter {
                alert_ids: vec![alert_id.to_string()],
                ..AlertFilter::default()
            })
            .await
            .unwrap()
            .items
            .remove(0)
    }

    #[tokio::test]
    async fn modify_by_name_updates_the_resolved_alert() {
        let (store, alert_id) = seeded().await;

        let modified = modify_alert_by_name(
            store.as_ref(),
            &namespace_scope("ns1"),
            AlertByName {
                alert_name: "cpu-alert".into(),
                disabled: Some(true),
                ..AlertByName::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(modified, alert_id);
        assert!(alert(&store, &alert_id).await.disabled);
    }

    #[tokio::test]
    async fn modify_by_name_outside_scope_is_not_found() {
        let (store, _) = seeded().await;
        let err = modify_alert_by_name(
            store.as_ref(),
            &namespace_scope("ns2"),
            AlertByName {
                alert_name: "cpu-alert".into(),
                disabled: Some(true),
                ..AlertByName::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn duplicate_rows_are_ambiguous() {
        let (store, alert_id) = seeded().await;
        // A second row with the same name, bypassing the creator's checks
        let original = alert(&store, &alert_id).await;
        store
            .create_alert(NewAlert {
                alert_name: "cpu-alert".into(),
                disabled: false,
                policy_id: original.policy_id,
                rs_filter_id: original.rs_filter_id,
            })
            .await
            .unwrap();

        let err = modify_alert_by_name(
            store.as_ref(),
            &namespace_scope("ns1"),
            AlertByName {
                alert_name: "cpu-alert".into(),
                ..AlertByName::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Ambiguous);

        let err = delete_alerts_by_name(store.as_ref(), &namespace_scope("ns1"), "cpu-alert,mem-alert")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Ambiguous);
        assert_eq!(store.describe_alerts(&AlertFilter::default()).await.unwrap().total, 3);
    }

    #[tokio::test]
    async fn modify_policy_by_alert_touches_only_its_policy() {
        let (store, alert_id) = seeded().await;
        let policy_id = alert(&store, &alert_id).await.policy_id;

        let modified = modify_policy_by_alert(
            store.as_ref(),
            &namespace_scope("ns1"),
            PolicyByAlert {
                alert_name: "cpu-alert".into(),
                policy: PolicyUpdate {
                    policy_id: "pl-ignored".into(),
                    policy_description: Some("updated".into()),
                    ..PolicyUpdate::default()
                },
            },
        )
        .await
        .unwrap();
        assert_eq!(modified, policy_id);

        let policies = store.describe_policies(&PolicyFilter::default()).await.unwrap();
        let described: Vec<_> = policies
            .items
            .iter()
            .map(|p| (p.policy_id == policy_id, p.policy_description.as_str()))
            .collect();
        assert!(described.contains(&(true, "updated")));
        assert!(described.contains(&(false, "")));
    }

    #[tokio::test]
    async fn delete_by_name_removes_matches() {
        let (store, _) = seeded().await;

        let deleted =
            delete_alerts_by_name(store.as_ref(), &namespace_scope("ns1"), "cpu-alert, ghost")
                .await
                .unwrap();
        assert_eq!(deleted, vec!["cpu-alert".to_string()]);

        let remaining = store.describe_alerts(&AlertFilter::default()).await.unwrap();
        assert_eq!(remaining.total, 1);
        assert_eq!(remaining.items[0].alert_name, "mem-alert");
    }

    #[tokio::test]
    async fn delete_with_no_match_is_not_found() {
        let (store, _) = seeded().await;
        let err = delete_alerts_by_name(store.as_ref(), &namespace_scope("ns1"), "ghost")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = delete_alerts_by_name(store.as_ref(), &namespace_scope("ns1"), " , ")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
