//! # Error Handling
//!
//! Errors for the JSON endpoints use a problem+json envelope with trace ID
//! propagation. Login flow failures never reach this type: they are rendered as
//! redirects by [`crate::oauth::LoginFailure`].

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::telemetry;

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<S: Into<String>>(status: StatusCode, code: S, message: S) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            trace_id: Self::current_trace_id(),
        }
    }

    /// Request trace ID, or a short correlation ID outside a traced request
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().to_string()[..8]).into_boxed_str())
            })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        match error {
            sea_orm::DbErr::RecordNotFound(record) => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                &format!("Record not found: {}", record),
            ),
            sea_orm::DbErr::Conn(connection_err) => {
                tracing::error!("Database connection error: {:?}", connection_err);
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service unavailable",
                )
            }
            _ => {
                tracing::error!("Database error: {:?}", error);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Database error occurred",
                )
            }
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(db_err) => db_err.into(),
            RepositoryError::Validation(message) => {
                Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", &message)
            }
        }
    }
}

/// Errors raised by the persistence layer
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("validation failed: {0}")]
    Validation(String),
}

impl RepositoryError {
    pub fn database_error(err: sea_orm::DbErr) -> Self {
        Self::Database(err)
    }

    pub fn validation_error<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }
}

/// Create an unauthorized error (401)
pub fn unauthorized(message: Option<&str>) -> ApiError {
    let msg = message.unwrap_or("Authentication required");
    ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_basic() {
        let error = ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", "Bad input");
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.code.as_ref(), "VALIDATION_FAILED");
        assert_eq!(error.message.as_ref(), "Bad input");
        assert!(error.trace_id.is_some());
    }

    #[test]
    fn test_content_type_header() {
        let response = unauthorized(None).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/problem+json"
        );
    }

    #[test]
    fn test_connection_error_hides_internal_message() {
        let error: ApiError = RepositoryError::database_error(sea_orm::DbErr::Conn(
            sea_orm::RuntimeErr::Internal("connection string leaked".to_string()),
        ))
        .into();
        assert_eq!(error.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!error.message.contains("leaked"));
    }

    #[test]
    fn test_database_error_mapping() {
        let error: ApiError = sea_orm::DbErr::RecordNotFound("user".to_string()).into();
        assert_eq!(error.status, StatusCode::NOT_FOUND);

        let error: ApiError = RepositoryError::validation_error("external id is empty").into();
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.code.as_ref(), "VALIDATION_FAILED");
    }

    #[test]
    fn test_serialization_skips_status() {
        let error = unauthorized(Some("Session expired"));
        let json = serde_json::to_value(&error).unwrap();
        assert!(json.get("status").is_none());
        assert_eq!(json["code"], "UNAUTHORIZED");
        assert_eq!(json["message"], "Session expired");
        assert!(json["trace_id"].is_string());
    }
}
