//! Error types and HTTP response conversion
//!
//! Structural and input errors (unknown sort or shape fields, bad page
//! windows) are raised before any data access and map to `400`. A missing
//! registry mapping or route template is a deployment bug and maps to `500`.
//! Data source failures pass through unchanged.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::source::SourceError;

/// Result type alias using the pipeline error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the pipeline
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// A request parameter failed validation (400)
    ///
    /// `parameter` names the query parameter (`sort`, `fields`, `page`, ...)
    /// and `message` names the offending value.
    #[error("Invalid {parameter}: {message}")]
    Validation {
        /// Query parameter that failed validation
        parameter: String,
        /// Human-readable reason, including the offending field name
        message: String,
    },

    /// Registry, route table or negotiation setup is incomplete (500)
    #[error("Pipeline misconfigured: {0}")]
    Configuration(String),

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller identity could not be resolved (401)
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// `If-Match` precondition did not hold (412)
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Error raised by the queryable data source, propagated unchanged
    #[error(transparent)]
    DataSource(#[from] SourceError),

    /// Representation could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a validation error for a query parameter
    pub fn validation(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Whether the error was caused by the request rather than the deployment
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::NotFound(_)
                | Self::Unauthorized(_)
                | Self::PreconditionFailed(_)
        )
    }

    /// HTTP status this error maps to
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            Self::Config(_)
            | Self::Configuration(_)
            | Self::DataSource(_)
            | Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,

    /// Optional error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// HTTP status code
    pub status: u16,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            status: status.as_u16(),
        }
    }

    /// Create error response with a code
    pub fn with_code(
        status: StatusCode,
        code: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            error: error.into(),
            code: Some(code.into()),
            status: status.as_u16(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = match self {
            Error::Config(e) => {
                tracing::error!("Configuration error: {}", e);
                ErrorResponse::with_code(status, "CONFIG_ERROR", "Service misconfigured")
            }

            Error::Validation { parameter, message } => {
                tracing::warn!(parameter = %parameter, "Rejected request: {}", message);
                let code = format!("INVALID_{}", parameter.to_uppercase());
                ErrorResponse::with_code(
                    status,
                    code,
                    format!("The provided {} parameter isn't valid: {}", parameter, message),
                )
            }

            Error::Configuration(msg) => {
                tracing::error!("Pipeline configuration error: {}", msg);
                ErrorResponse::with_code(status, "PIPELINE_MISCONFIGURED", "Internal server error")
            }

            Error::NotFound(msg) => ErrorResponse::with_code(status, "NOT_FOUND", msg),

            Error::Unauthorized(msg) => ErrorResponse::with_code(status, "UNAUTHORIZED", msg),

            Error::PreconditionFailed(msg) => {
                ErrorResponse::with_code(status, "PRECONDITION_FAILED", msg)
            }

            Error::DataSource(e) => {
                tracing::error!(operation = %e.operation, "Data source error: {}", e.message);
                ErrorResponse::with_code(
                    status,
                    "DATA_SOURCE_ERROR",
                    "Data source operation failed",
                )
            }

            Error::Serialization(e) => {
                tracing::error!("Serialization error: {}", e);
                ErrorResponse::with_code(status, "SERIALIZATION_ERROR", "Internal server error")
            }
        };

        (status, Json(error_response)).into_response()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

// Manual From implementations for boxed errors
impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}
