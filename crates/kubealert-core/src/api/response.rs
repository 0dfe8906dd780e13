//! Response bodies and error mapping

use std::marker::PhantomData;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::{Error, ErrorKind, Result};

/// HTTP status for an error kind
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::AlreadyExists | ErrorKind::Ambiguous => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// A failed call: the kind's status with the operation's default body
pub struct ApiError<T> {
    status: StatusCode,
    body: PhantomData<fn() -> T>,
}

impl<T> From<Error> for ApiError<T> {
    fn from(err: Error) -> Self {
        let kind = err.kind();
        if kind == ErrorKind::Internal {
            error!(error = %err, "Request failed");
        } else {
            warn!(error = %err, kind = kind.as_str(), "Request rejected");
        }
        Self {
            status: status_for(kind),
            body: PhantomData,
        }
    }
}

impl<T: Default + Serialize> IntoResponse for ApiError<T> {
    fn into_response(self) -> Response {
        (self.status, Json(T::default())).into_response()
    }
}

/// Handler result
pub type ApiResult<T> = std::result::Result<Json<T>, ApiError<T>>;

/// Unwrap a request body, turning a rejected one into a validation error
///
/// Handlers take `Result<Json<T>, JsonRejection>` so a bad body gets the
/// operation's own empty response instead of axum's plain-text rejection.
pub fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| Error::validation(rejection.body_text()))
}

/// Id of a created or modified row
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IdResponse {
    pub id: String,
}

/// Ids of deleted rows
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IdsResponse {
    pub ids: Vec<String>,
}

/// Alert touched by a by-name modification
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AlertIdResponse {
    pub alert_id: String,
}

/// Policy touched through its alert
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PolicyIdResponse {
    pub policy_id: String,
}

/// Names of alerts deleted by name
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DeletedAlertsResponse {
    pub alert_names: Vec<String>,
}

/// Health check response
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
