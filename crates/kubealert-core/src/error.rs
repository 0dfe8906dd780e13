//! Error types for KubeAlert

use std::time::Duration;

use thiserror::Error;

/// Result type alias using KubeAlert's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], stable across front doors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request itself is wrong and must not be retried unchanged
    InvalidArgument,
    /// An alert with the same name already exists in the scope
    AlreadyExists,
    /// A by-name lookup matched nothing
    NotFound,
    /// A by-name lookup matched more than one alert
    Ambiguous,
    /// A downstream failure (store, lock, deadline)
    Internal,
}

impl ErrorKind {
    /// Snake-case label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::AlreadyExists => "already_exists",
            Self::NotFound => "not_found",
            Self::Ambiguous => "ambiguous",
            Self::Internal => "internal",
        }
    }
}

/// A step of the composite alert creation pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateStep {
    /// Resource type lookup
    DescribeResourceType,
    /// Alert name uniqueness lookup
    CheckAlertName,
    /// Resource filter insert
    CreateResourceFilter,
    /// Policy insert
    CreatePolicy,
    /// Action insert
    CreateAction,
    /// Rule insert (zero-based index into the submitted rules)
    CreateRule(usize),
    /// Alert insert
    CreateAlert,
}

impl std::fmt::Display for CreateStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DescribeResourceType => f.write_str("describe resource type"),
            Self::CheckAlertName => f.write_str("check alert name"),
            Self::CreateResourceFilter => f.write_str("create resource filter"),
            Self::CreatePolicy => f.write_str("create policy"),
            Self::CreateAction => f.write_str("create action"),
            Self::CreateRule(index) => write!(f, "create rule #{}", index + 1),
            Self::CreateAlert => f.write_str("create alert"),
        }
    }
}

/// Error types for KubeAlert operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Redis error
    #[error("Redis error: {0}")]
    Redis(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// The resource filter parameter blob is not a JSON object of strings
    #[error("Malformed resource filter param: {0}")]
    MalformedFilterParam(#[source] serde_json::Error),

    /// The resource filter disagrees with the caller's scope
    #[error("Resource filter does not match {scope} scope: {detail}")]
    ScopeMismatch { scope: String, detail: String },

    /// An alert with one of the names already exists in the scope
    #[error("Alert already exists in {scope}: {names}")]
    AlreadyExists { scope: String, names: String },

    /// Not found error
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// More than one row matched a lookup that must be unambiguous
    #[error("{entity} is ambiguous: {name} matched {count} rows")]
    Ambiguous {
        entity: String,
        name: String,
        count: usize,
    },

    /// The store returned a different id than the one resolved beforehand
    #[error("{entity} changed during update: resolved {expected}, store returned {actual}")]
    Inconsistent {
        entity: String,
        expected: String,
        actual: String,
    },

    /// A composite creation step failed
    #[error("Failed to {step}: {source}")]
    Step {
        step: CreateStep,
        #[source]
        source: Box<Error>,
    },

    /// The composite operation ran out of time
    #[error("Deadline of {} exceeded", format_duration(.0))]
    DeadlineExceeded(Duration),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn format_duration(duration: &Duration) -> String {
    humantime::format_duration(*duration).to_string()
}

impl Error {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Wrap a store failure with the pipeline step it happened in
    pub fn step(step: CreateStep, source: Error) -> Self {
        Self::Step {
            step,
            source: Box::new(source),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::MalformedFilterParam(_) | Self::ScopeMismatch { .. } => {
                ErrorKind::InvalidArgument
            }
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Ambiguous { .. } => ErrorKind::Ambiguous,
            Self::Database(_)
            | Self::Redis(_)
            | Self::Config(_)
            | Self::Inconsistent { .. }
            | Self::Step { .. }
            | Self::DeadlineExceeded(_)
            | Self::Internal(_)
            | Self::Io(_)
            | Self::Serialization(_) => ErrorKind::Internal,
        }
    }
}

impl From<deadpool_redis::PoolError> for Error {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::Redis(err.to_string())
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Self::Redis(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_errors_are_internal_and_keep_the_cause() {
        let err = Error::step(
            CreateStep::CreateRule(1),
            Error::internal("connection reset"),
        );

        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(
            err.to_string(),
            "Failed to create rule #2: Internal error: connection reset"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn validation_failures_are_invalid_argument() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(
            Error::MalformedFilterParam(parse).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            Error::ScopeMismatch {
                scope: "namespace".into(),
                detail: "ns_name".into()
            }
            .kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn deadline_message_is_human_readable() {
        let err = Error::DeadlineExceeded(Duration::from_secs(60));
        assert_eq!(err.to_string(), "Deadline of 1m exceeded");
    }
}
