//! # KubeAlert
//!
//! Alert definition management for Kubernetes clusters.
//!
//! KubeAlert stores resource types, resource filters, metrics, policies,
//! rules, actions and alerts, and creates a complete alert in one call with
//! compensation when a step fails.
//!
//! ## Architecture
//!
//! - **Alerting**: scope validation, name checks and composite creation
//! - **Storage**: PostgreSQL for entities, Redis for cross-replica creation locks
//! - **API**: REST API for CRUD and alerts addressed by name under a scope
//! - **Manager**: in-process RPC surface with status-coded errors
//!
//! ## Quick Start
//!
//! ```bash
//! # Apply migrations, then start the API server
//! kubealert db migrate
//! kubealert serve
//!
//! # Or run against the in-memory store
//! kubealert serve --memory
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod manager;
pub mod models;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{AlertCreator, CreationLock};
    pub use crate::config::Config;
    pub use crate::db::{Database, EntityStore};
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::manager::ManagerService;
    pub use crate::models::*;
}
