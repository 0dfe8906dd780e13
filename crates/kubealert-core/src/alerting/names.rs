//! Alert name validation and per-scope uniqueness lookups

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::db::EntityStore;
use crate::error::{Error, Result};
use crate::models::{split_list, Alert, Page, ScopeContext};

/// Longest accepted alert name
pub const MAX_NAME_LEN: usize = 253;

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9._-]*[A-Za-z0-9])?$").expect("valid alert name pattern")
});

/// Check a single alert name: alphanumeric ends, `.`, `_` and `-` inside
pub fn validate_alert_name(name: &str) -> Result<()> {
    if name.len() > MAX_NAME_LEN {
        return Err(Error::validation(format!(
            "alert name '{name}' is longer than {MAX_NAME_LEN} characters"
        )));
    }
    if !NAME_PATTERN.is_match(name) {
        return Err(Error::validation(format!("invalid alert name '{name}'")));
    }
    Ok(())
}

/// Split a comma-separated name list and validate every entry
pub fn parse_alert_names(raw: &str) -> Result<Vec<String>> {
    let names = split_list(raw);
    if names.is_empty() {
        return Err(Error::validation("alert name is required"));
    }
    for name in &names {
        validate_alert_name(name)?;
    }
    Ok(names)
}

/// Alerts in `scope` already carrying one of `names`
pub async fn check_alert_names(
    store: &dyn EntityStore,
    scope: &ScopeContext,
    names: &[String],
) -> Result<Page<Alert>> {
    let matches = store.describe_alerts_with_resource(scope, names).await?;
    debug!(
        search = %scope.search_blob(),
        names = ?names,
        total = matches.total,
        "Checked alert names"
    );
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("cpu-alert")]
    #[case("a")]
    #[case("Node_CPU.high-1")]
    fn accepts(#[case] name: &str) {
        assert!(validate_alert_name(name).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("-leading")]
    #[case("trailing.")]
    #[case("with space")]
    #[case("slash/name")]
    fn rejects(#[case] name: &str) {
        assert!(validate_alert_name(name).is_err());
    }

    #[test]
    fn rejects_overlong_names() {
        assert!(validate_alert_name(&"a".repeat(MAX_NAME_LEN)).is_ok());
        assert!(validate_alert_name(&"a".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn name_lists_are_split_and_checked() {
        assert_eq!(parse_alert_names(" a, b ,a").unwrap(), vec!["a", "b"]);
        assert!(parse_alert_names(" , ").is_err());
        assert!(parse_alert_names("ok,not ok").is_err());
    }
}
