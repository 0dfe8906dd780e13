//! Alert definition lifecycle for KubeAlert
//!
//! Scope validation, name checks, composite creation with compensation, and
//! by-name modification and deletion.

mod by_name;
mod creator;
mod lock;
mod names;
mod validator;

#[cfg(test)]
pub(crate) mod testing;

pub use by_name::{delete_alerts_by_name, modify_alert_by_name, modify_policy_by_alert};
pub use creator::AlertCreator;
pub use lock::{lock_key, CreationLock, LockGuard};
pub use names::{check_alert_names, parse_alert_names, validate_alert_name};
pub use validator::{check_filter_param, decode_filter_param, validate_scope};
