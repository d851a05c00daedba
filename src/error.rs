//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type. Each variant maps to an
//! HTTP status code and a JSON body of the form:
//!
//! ```json
//! { "message": "payment not found: 6f1c…", "error": "not_found" }
//! ```
//!
//! Server-side failures never leak their detail to the client: the
//! detail is logged and the body carries a generic message.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::PaymentStatus;

/// JSON error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub message: String,
    /// Machine-readable error kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// | Variant             | HTTP Status                 |
/// |---------------------|-----------------------------|
/// | `Validation`        | 400 Bad Request             |
/// | `Unauthorized`      | 401 Unauthorized            |
/// | `Forbidden`         | 403 Forbidden               |
/// | `NotFound`          | 404 Not Found               |
/// | `InvalidTransition` | 409 Conflict                |
/// | `Persistence`       | 500 Internal Server Error   |
/// | `Storage`           | 500 Internal Server Error   |
/// | `Internal`          | 500 Internal Server Error   |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Malformed or missing input.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Missing or invalid caller identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller identity lacks the required permission.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. `"listing"`.
        entity: &'static str,
        /// Requested identifier.
        id: String,
    },

    /// Payment status change not permitted from its current state.
    #[error("cannot move payment from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: PaymentStatus,
        /// Requested status.
        to: PaymentStatus,
    },

    /// Datastore failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Object storage failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Any other server-side failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Shorthand for [`GatewayError::NotFound`].
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns the machine-readable kind for this variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Persistence(_) | Self::Storage(_) | Self::Internal(_) => "internal_error",
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidTransition { .. } => StatusCode::CONFLICT,
            Self::Persistence(_) | Self::Storage(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(e: sqlx::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for GatewayError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl From<JsonRejection> for GatewayError {
    fn from(e: JsonRejection) -> Self {
        Self::Validation(e.body_text())
    }
}

impl From<PathRejection> for GatewayError {
    fn from(e: PathRejection) -> Self {
        Self::Validation(e.body_text())
    }
}

impl From<MultipartRejection> for GatewayError {
    fn from(e: MultipartRejection) -> Self {
        Self::Validation(e.body_text())
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = ErrorResponse {
            message,
            error: Some(self.kind().to_string()),
        };
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            GatewayError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GatewayError::not_found("listing", "abc").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::InvalidTransition {
                from: PaymentStatus::Approved,
                to: PaymentStatus::Rejected,
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            GatewayError::Persistence("db down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = GatewayError::not_found("payment", "42");
        assert_eq!(err.to_string(), "payment not found: 42");
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn server_errors_hide_detail() {
        let response = GatewayError::Persistence("password=hunter2".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body read failed");
        };
        let body = String::from_utf8_lossy(&bytes);
        assert!(!body.contains("hunter2"));
        assert!(body.contains("internal server error"));
        assert!(body.contains("internal_error"));
    }
}
