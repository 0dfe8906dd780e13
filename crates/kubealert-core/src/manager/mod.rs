//! Manager service: the in-process RPC front door
//!
//! Callers address scopes with a JSON `resource_map`, e.g.
//! `{"rs_type_name":"namespace","ns_name":"ns1"}`, and receive
//! [`tonic::Status`] errors whose code follows the error kind.
//!
//! The server builds one in [`AppState`](crate::api::AppState) on top of
//! the HTTP routes' creator; in-process callers reach it there and share
//! its creation lock and store.

use serde::{Deserialize, Serialize};
use tonic::{Code, Status};
use tracing::{debug, error};

use crate::alerting::AlertCreator;
use crate::error::{Error, ErrorKind};
use crate::models::{
    split_list, Alert, AlertDetail, AlertFilter, CompositeAlertSpec, CreatedAlert, ScopeContext,
};

impl From<ErrorKind> for Code {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidArgument => Code::InvalidArgument,
            ErrorKind::AlreadyExists => Code::AlreadyExists,
            ErrorKind::NotFound => Code::NotFound,
            ErrorKind::Ambiguous => Code::FailedPrecondition,
            ErrorKind::Internal => Code::Internal,
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        Status::new(err.kind().into(), err.to_string())
    }
}

/// Composite creation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAlertWrapperRequest {
    /// JSON scope map
    pub resource_map: String,
    /// Everything to create
    #[serde(flatten)]
    pub spec: CompositeAlertSpec,
}

/// Lookup of alerts by name within a scope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DescribeAlertsWithResourceRequest {
    /// JSON scope map
    pub resource_map: String,
    /// Names to look up; comma-separated entries are split
    #[serde(default)]
    pub alert_names: Vec<String>,
}

/// Alerts found by [`ManagerService::describe_alerts_with_resource`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DescribeAlertsWithResourceResponse {
    pub total: u32,
    pub alert_set: Vec<Alert>,
}

/// Detail listing of alerts within a scope
#[derive(Debug, Clone, Default)]
pub struct DescribeAlertDetailsRequest {
    /// JSON scope map
    pub resource_map: String,
    /// Additional alert filters and paging
    pub filter: AlertFilter,
}

/// Alert details found by [`ManagerService::describe_alert_details`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DescribeAlertDetailsResponse {
    pub total: u32,
    pub alert_detail_set: Vec<AlertDetail>,
}

fn count(total: usize) -> u32 {
    u32::try_from(total).unwrap_or(u32::MAX)
}

/// Manager-side alert operations
#[derive(Clone)]
pub struct ManagerService {
    creator: AlertCreator,
}

impl ManagerService {
    /// Create a new manager service
    pub fn new(creator: AlertCreator) -> Self {
        Self { creator }
    }

    /// Create an alert with its resource filter, policy, action and rules
    pub async fn create_alert_wrapper(
        &self,
        request: CreateAlertWrapperRequest,
    ) -> Result<CreatedAlert, Status> {
        let scope = ScopeContext::from_resource_map(&request.resource_map)?;
        Ok(self.creator.create(&scope, request.spec).await?)
    }

    /// Alerts in a scope carrying one of the requested names
    pub async fn describe_alerts_with_resource(
        &self,
        request: DescribeAlertsWithResourceRequest,
    ) -> Result<DescribeAlertsWithResourceResponse, Status> {
        let scope = ScopeContext::from_resource_map(&request.resource_map)?;
        let names: Vec<String> = request
            .alert_names
            .iter()
            .flat_map(|raw| split_list(raw))
            .collect();

        let page = self
            .creator
            .store()
            .describe_alerts_with_resource(&scope, &names)
            .await
            .map_err(|e| {
                error!(scope = %scope, error = %e, "Failed to describe alerts with resource");
                e
            })?;

        debug!(scope = %scope, total = page.total, "Described alerts with resource");
        Ok(DescribeAlertsWithResourceResponse {
            total: count(page.total),
            alert_set: page.items,
        })
    }

    /// Alerts in a scope joined with their filter, type and policy
    pub async fn describe_alert_details(
        &self,
        request: DescribeAlertDetailsRequest,
    ) -> Result<DescribeAlertDetailsResponse, Status> {
        let scope = ScopeContext::from_resource_map(&request.resource_map)?;
        let page = self
            .creator
            .store()
            .describe_alert_details(&scope, &request.filter)
            .await
            .map_err(|e| {
                error!(scope = %scope, error = %e, "Failed to describe alert details");
                e
            })?;

        debug!(scope = %scope, total = page.total, "Described alert details");
        Ok(DescribeAlertDetailsResponse {
            total: count(page.total),
            alert_detail_set: page.items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::testing::{composite_spec, FaultyStore, Faults};
    use crate::alerting::CreationLock;
    use std::sync::Arc;
    use std::time::Duration;

    fn service() -> ManagerService {
        let store = Arc::new(FaultyStore::new(Faults::default()));
        ManagerService::new(AlertCreator::new(
            store,
            CreationLock::local(),
            Duration::from_secs(5),
        ))
    }

    const NS1: &str = r#"{"rs_type_name":"namespace","ns_name":"ns1"}"#;

    #[tokio::test]
    async fn wrapper_creates_and_describes() {
        let service = service();
        let created = service
            .create_alert_wrapper(CreateAlertWrapperRequest {
                resource_map: NS1.into(),
                spec: composite_spec("ns1", "cpu-alert", 2),
            })
            .await
            .unwrap();

        let found = service
            .describe_alerts_with_resource(DescribeAlertsWithResourceRequest {
                resource_map: NS1.into(),
                alert_names: vec!["cpu-alert,other".into()],
            })
            .await
            .unwrap();
        assert_eq!(found.total, 1);
        assert_eq!(found.alert_set[0].alert_id, created.alert_id);

        let details = service
            .describe_alert_details(DescribeAlertDetailsRequest {
                resource_map: NS1.into(),
                filter: AlertFilter::default(),
            })
            .await
            .unwrap();
        assert_eq!(details.total, 1);
        assert_eq!(details.alert_detail_set[0].rules_count, 2);
    }

    #[tokio::test]
    async fn errors_carry_their_kind_as_status_code() {
        let service = service();
        let request = CreateAlertWrapperRequest {
            resource_map: NS1.into(),
            spec: composite_spec("ns1", "cpu-alert", 1),
        };
        service.create_alert_wrapper(request.clone()).await.unwrap();

        let status = service.create_alert_wrapper(request).await.unwrap_err();
        assert_eq!(status.code(), Code::AlreadyExists);

        let status = service
            .create_alert_wrapper(CreateAlertWrapperRequest {
                resource_map: "not json".into(),
                spec: composite_spec("ns1", "cpu-alert", 1),
            })
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[test]
    fn status_message_keeps_the_cause() {
        let status: Status = Error::step(
            crate::error::CreateStep::CreatePolicy,
            Error::internal("connection reset"),
        )
        .into();
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(
            status.message(),
            "Failed to create policy: Internal error: connection reset"
        );
    }
}
