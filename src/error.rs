//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TenancyError {
    /// No tenant id could be derived from the incoming request.
    #[error("tenant resolution: {0}")]
    Resolution(String),
    /// The configured validator rejected the tenant id.
    #[error("tenant validation: {0}")]
    Validation(String),
    /// Opening the tenant's connection failed. Does not poison the registry;
    /// a later call for the same tenant retries creation.
    #[error("connection for tenant '{tenant_id}': {source}")]
    Connection {
        tenant_id: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("config: {0}")]
    Config(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for TenancyError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            TenancyError::Resolution(_) => (StatusCode::BAD_REQUEST, "tenant_resolution_error"),
            TenancyError::Validation(_) => (StatusCode::FORBIDDEN, "tenant_validation_error"),
            TenancyError::Connection { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "connection_error"),
            TenancyError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            TenancyError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
