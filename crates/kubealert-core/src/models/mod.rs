//! Data models for KubeAlert

mod alert;
mod audit;
mod policy;
mod query;
mod resource;
pub mod scope;

pub use alert::*;
pub use audit::*;
pub use policy::*;
pub use query::*;
pub use resource::*;
pub use scope::{ScopeContext, ScopeTag};
