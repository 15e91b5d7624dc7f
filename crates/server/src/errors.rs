use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::{error, warn};

use quotedesk_core::errors::{ApplicationError, InterfaceError};
use quotedesk_db::repositories::{RepositoryError, WorkflowError};

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub correlation_id: String,
}

pub fn repository_error(
    error: RepositoryError,
    correlation_id: &str,
) -> (StatusCode, Json<ApiError>) {
    warn!(error = %error, correlation_id = %correlation_id, "store access failed");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ApiError {
            error: "The service is temporarily unavailable. Please retry shortly.".to_string(),
            correlation_id: correlation_id.to_string(),
        }),
    )
}

/// Map a workflow failure onto a response. Data-integrity faults are logged
/// at error severity here, once, before they leave the service as opaque
/// internal errors.
pub fn workflow_error(
    error: WorkflowError,
    correlation_id: &str,
) -> (StatusCode, Json<ApiError>) {
    let application = ApplicationError::from(error);
    let interface = application.into_interface(correlation_id);

    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    match &interface {
        InterfaceError::Internal { message, .. } => {
            error!(
                event_name = "workflow.integrity_fault",
                correlation_id = %correlation_id,
                detail = %message,
                "workflow operation failed on corrupted state"
            );
        }
        other => {
            warn!(
                event_name = "workflow.request_rejected",
                correlation_id = %correlation_id,
                detail = %other,
                "workflow operation rejected"
            );
        }
    }

    (
        status,
        Json(ApiError {
            error: interface.user_message().to_string(),
            correlation_id: correlation_id.to_string(),
        }),
    )
}

pub fn new_correlation_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use quotedesk_core::errors::DomainError;
    use quotedesk_db::repositories::WorkflowError;

    use super::workflow_error;

    #[test]
    fn duplicate_name_is_a_conflict() {
        let (status, body) = workflow_error(
            WorkflowError::Domain(DomainError::DuplicateCustomerName {
                name: "Acme".to_string(),
            }),
            "req-1",
        );

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.0.correlation_id, "req-1");
    }

    #[test]
    fn missing_requester_is_internal() {
        let (status, _) = workflow_error(
            WorkflowError::Domain(DomainError::RequesterMissing { customer_id: 7 }),
            "req-2",
        );

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn gate_failure_is_a_conflict() {
        let (status, _) = workflow_error(
            WorkflowError::Domain(DomainError::CustomerNotApproved {
                customer_id: 42,
                status: quotedesk_core::domain::customer::CustomerStatus::Pending,
            }),
            "req-3",
        );

        assert_eq!(status, StatusCode::CONFLICT);
    }
}
