use chrono::{DateTime, Utc};
use thiserror::Error;

use quotedesk_core::errors::{ApplicationError, DomainError};

pub mod approval_log;
pub mod customer;
pub mod quotation;
pub mod user;

pub use approval_log::SqlApprovalLogRepository;
pub use customer::SqlCustomerRepository;
pub use quotation::{CustomerApprovalGate, SqlQuotationRepository};
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Workflow operations fail either on a domain rule or on the store itself;
/// the two layers stay distinct so the boundary can map them to different
/// response classes.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for WorkflowError {
    fn from(value: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(value))
    }
}

impl From<WorkflowError> for ApplicationError {
    fn from(value: WorkflowError) -> Self {
        match value {
            WorkflowError::Domain(domain) => Self::Domain(domain),
            WorkflowError::Repository(repository) => Self::Persistence(repository.to_string()),
        }
    }
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}
