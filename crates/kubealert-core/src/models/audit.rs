//! Alert history and operator comments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::query::Paging;

/// A recorded alert event, written by the executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct History {
    pub history_id: String,
    pub history_name: String,
    pub alert_id: String,
    pub rule_id: String,
    pub resource_name: String,
    /// e.g. `triggered`, `resumed`
    pub event: String,
    pub content: String,
    pub notification_id: String,
    pub create_time: DateTime<Utc>,
}

impl History {
    /// Id prefix
    pub const ID_PREFIX: &'static str = "hs";
}

/// Input for recording a history entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewHistory {
    pub history_name: String,
    pub alert_id: String,
    pub rule_id: String,
    pub resource_name: String,
    pub event: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub notification_id: String,
}

/// Describe filter for histories
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub history_ids: Vec<String>,
    pub history_names: Vec<String>,
    pub alert_ids: Vec<String>,
    pub rule_ids: Vec<String>,
    pub resource_names: Vec<String>,
    pub events: Vec<String>,
    pub paging: Paging,
}

/// An operator's note on a history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub comment_id: String,
    pub addresser: String,
    pub content: String,
    pub history_id: String,
    pub create_time: DateTime<Utc>,
}

impl Comment {
    /// Id prefix
    pub const ID_PREFIX: &'static str = "cm";
}

/// Input for creating a comment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewComment {
    pub addresser: String,
    pub content: String,
    pub history_id: String,
}

/// Describe filter for comments
#[derive(Debug, Clone, Default)]
pub struct CommentFilter {
    pub comment_ids: Vec<String>,
    pub addressers: Vec<String>,
    pub history_ids: Vec<String>,
    pub paging: Paging,
}
