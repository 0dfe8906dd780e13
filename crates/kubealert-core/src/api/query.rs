//! Query string parsing: comma-separated lists plus paging

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{
    split_list, ActionFilter, AlertFilter, CommentFilter, HistoryFilter, MetricFilter, Paging,
    PolicyFilter, ResourceFilterFilter, ResourceTypeFilter, RuleFilter,
};

/// Raw query parameters
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct ListQuery(HashMap<String, String>);

impl ListQuery {
    /// A comma-separated parameter, empty when absent
    pub fn list(&self, key: &str) -> Vec<String> {
        self.0.get(key).map(|raw| split_list(raw)).unwrap_or_default()
    }

    fn parse<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.0.get(key).map(|raw| raw.trim()).filter(|raw| !raw.is_empty()) {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| Error::validation(format!("invalid value '{raw}' for {key}"))),
            None => Ok(None),
        }
    }

    /// A comma-separated list of booleans
    pub fn bools(&self, key: &str) -> Result<Vec<bool>> {
        self.list(key)
            .iter()
            .map(|raw| {
                raw.parse()
                    .map_err(|_| Error::validation(format!("invalid value '{raw}' for {key}")))
            })
            .collect()
    }

    /// `sort_key`, `reverse`, `offset` and `limit`
    pub fn paging(&self) -> Result<Paging> {
        Ok(Paging {
            sort_key: self.0.get("sort_key").filter(|k| !k.is_empty()).cloned(),
            reverse: self.parse("reverse")?.unwrap_or_default(),
            offset: self.parse("offset")?.unwrap_or_default(),
            limit: self.parse("limit")?.unwrap_or_default(),
        })
    }

    pub fn resource_type_filter(&self) -> Result<ResourceTypeFilter> {
        Ok(ResourceTypeFilter {
            rs_type_ids: self.list("rs_type_ids"),
            rs_type_names: self.list("rs_type_names"),
            paging: self.paging()?,
        })
    }

    pub fn resource_filter_filter(&self) -> Result<ResourceFilterFilter> {
        Ok(ResourceFilterFilter {
            rs_filter_ids: self.list("rs_filter_ids"),
            rs_filter_names: self.list("rs_filter_names"),
            status: self.list("status"),
            rs_type_ids: self.list("rs_type_ids"),
            paging: self.paging()?,
        })
    }

    pub fn metric_filter(&self) -> Result<MetricFilter> {
        Ok(MetricFilter {
            metric_ids: self.list("metric_ids"),
            metric_names: self.list("metric_names"),
            status: self.list("status"),
            rs_type_ids: self.list("rs_type_ids"),
            paging: self.paging()?,
        })
    }

    pub fn policy_filter(&self) -> Result<PolicyFilter> {
        Ok(PolicyFilter {
            policy_ids: self.list("policy_ids"),
            policy_names: self.list("policy_names"),
            creators: self.list("creators"),
            rs_type_ids: self.list("rs_type_ids"),
            paging: self.paging()?,
        })
    }

    pub fn rule_filter(&self) -> Result<RuleFilter> {
        Ok(RuleFilter {
            rule_ids: self.list("rule_ids"),
            rule_names: self.list("rule_names"),
            severities: self.list("severities"),
            policy_ids: self.list("policy_ids"),
            metric_ids: self.list("metric_ids"),
            paging: self.paging()?,
        })
    }

    pub fn action_filter(&self) -> Result<ActionFilter> {
        Ok(ActionFilter {
            action_ids: self.list("action_ids"),
            action_names: self.list("action_names"),
            trigger_status: self.list("trigger_status"),
            trigger_actions: self.list("trigger_actions"),
            policy_ids: self.list("policy_ids"),
            nf_address_list_ids: self.list("nf_address_list_ids"),
            paging: self.paging()?,
        })
    }

    pub fn alert_filter(&self) -> Result<AlertFilter> {
        Ok(AlertFilter {
            alert_ids: self.list("alert_ids"),
            alert_names: self.list("alert_names"),
            disabled: self.bools("disabled")?,
            running_status: self.list("running_status"),
            policy_ids: self.list("policy_ids"),
            rs_filter_ids: self.list("rs_filter_ids"),
            executor_ids: self.list("executor_ids"),
            creators: self.list("creators"),
            paging: self.paging()?,
        })
    }

    pub fn history_filter(&self) -> Result<HistoryFilter> {
        Ok(HistoryFilter {
            history_ids: self.list("history_ids"),
            history_names: self.list("history_names"),
            alert_ids: self.list("alert_ids"),
            rule_ids: self.list("rule_ids"),
            resource_names: self.list("resource_names"),
            events: self.list("events"),
            paging: self.paging()?,
        })
    }

    pub fn comment_filter(&self) -> Result<CommentFilter> {
        Ok(CommentFilter {
            comment_ids: self.list("comment_ids"),
            addressers: self.list("addressers"),
            history_ids: self.list("history_ids"),
            paging: self.paging()?,
        })
    }
}
