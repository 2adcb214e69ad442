use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Error payload returned on every non-2xx response.
///
/// `request_id` is an opaque correlation id; operators grep it out of the
/// structured logs, clients just echo it back in bug reports.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub request_id: String,
    pub timestamp: String,
}

/// Boundary error kinds for the MRP service.
///
/// The engine fails closed: any upstream or integrity error aborts the run
/// and no partial view is published. Retries are left to callers.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("ERP gateway unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("projection store unavailable: {0}")]
    LocalStoreUnavailable(String),

    #[error("data integrity error: {0}")]
    DataIntegrityError(String),

    #[error("allocation invariant violated: {0}")]
    InvariantViolation(String),

    #[error("request deadline exceeded")]
    Timeout,
}

impl ServiceError {
    /// Stable machine-readable kind, used in the response envelope and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::ValidationError(_) => "validation_error",
            ServiceError::UpstreamUnavailable(_) => "upstream_unavailable",
            ServiceError::LocalStoreUnavailable(_) => "local_store_unavailable",
            ServiceError::DataIntegrityError(_) => "data_integrity_error",
            ServiceError::InvariantViolation(_) => "invariant_violation",
            ServiceError::Timeout => "timeout",
        }
    }

    pub fn upstream(err: impl std::fmt::Display) -> Self {
        ServiceError::UpstreamUnavailable(err.to_string())
    }

    pub fn local_store(err: impl std::fmt::Display) -> Self {
        ServiceError::LocalStoreUnavailable(err.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            ServiceError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ServiceError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ServiceError::LocalStoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::DataIntegrityError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::InvariantViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Timeout => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let request_id = Uuid::new_v4().to_string();

        // 5xx details stay in the logs; the client message is short and
        // non-sensitive either way.
        if status.is_server_error() {
            tracing::error!(
                kind = self.kind(),
                %request_id,
                error = %self,
                "request failed"
            );
        } else {
            tracing::warn!(kind = self.kind(), %request_id, error = %self, "request rejected");
        }

        let body = ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

/// Process exit codes for the binary, per the operational contract.
pub fn exit_code_for(err: &ServiceError) -> i32 {
    match err {
        ServiceError::UpstreamUnavailable(_) | ServiceError::LocalStoreUnavailable(_) => 2,
        ServiceError::InvariantViolation(_) => 3,
        _ => 1,
    }
}
