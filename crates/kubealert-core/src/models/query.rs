//! Query and response types shared between API and database layers

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Length of the random part of an entity id
const ID_SUFFIX_LEN: usize = 12;

/// Generate an entity id such as `al-2loEnEY6Oyzp`
pub fn new_id(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{prefix}-{suffix}")
}

/// Sorting and pagination shared by every describe call
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Paging {
    /// Column to sort by; unknown keys fall back to `create_time`
    pub sort_key: Option<String>,
    /// Sort descending
    #[serde(default)]
    pub reverse: bool,
    /// Index of the first row to return
    #[serde(default)]
    pub offset: u32,
    /// Maximum rows to return; zero means the default
    #[serde(default)]
    pub limit: u32,
}

impl Paging {
    /// Rows returned when no limit is given
    pub const DEFAULT_LIMIT: u32 = 20;
    /// Upper bound on any page
    pub const MAX_LIMIT: u32 = 200;

    /// Effective page size
    pub fn limit(&self) -> u32 {
        match self.limit {
            0 => Self::DEFAULT_LIMIT,
            n => n.min(Self::MAX_LIMIT),
        }
    }

    /// Effective offset
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// The sort key if it is one of `allowed`, else `create_time`
    pub fn sort_column<'a>(&self, allowed: &[&'a str]) -> &'a str {
        self.sort_key
            .as_deref()
            .and_then(|key| allowed.iter().copied().find(|c| *c == key))
            .unwrap_or("create_time")
    }
}

/// One page of a describe call together with the unpaged total
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// Rows matching the filter, ignoring pagination
    pub total: usize,
    /// The requested page
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// Apply paging to an already filtered and sorted set
    pub fn slice(rows: Vec<T>, paging: &Paging) -> Self {
        let total = rows.len();
        let items = rows
            .into_iter()
            .skip(paging.offset() as usize)
            .take(paging.limit() as usize)
            .collect();
        Self { total, items }
    }

    /// Transform each row
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            total: self.total,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            total: 0,
            items: Vec::new(),
        }
    }
}

/// Whether `value` passes an id/name list filter (an empty list passes all)
pub fn matches_any(filter: &[String], value: &str) -> bool {
    filter.is_empty() || filter.iter().any(|f| f == value)
}

/// Split a comma-separated list, trimming and dropping empty and repeated items
pub fn split_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !out.iter().any(|existing| existing == item) {
            out.push(item.to_string());
        }
    }
    out
}
