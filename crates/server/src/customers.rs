//! Customer approval workflow endpoints.
//!
//! - `POST /api/v1/customers`                          — register a customer (enters pending)
//! - `GET  /api/v1/customers`                          — list customers (role-scoped visibility)
//! - `POST /api/v1/customers/{id}/approve`             — admin: pending → approved
//! - `POST /api/v1/customers/{id}/reject`              — admin: pending → rejected with comment
//! - `GET  /api/v1/customers/{id}/approval-history`    — admin: append-only audit trail

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use quotedesk_core::domain::approval::TransitionOutcome;
use quotedesk_core::domain::customer::{Customer, CustomerId, NewCustomer};
use quotedesk_core::errors::DomainError;
use quotedesk_core::notifications::{CustomerAction, CustomerStatusEvent};
use quotedesk_db::repositories::customer::ListVisibility;
use quotedesk_db::repositories::{
    RepositoryError, SqlApprovalLogRepository, SqlCustomerRepository, SqlUserRepository,
    WorkflowError,
};

use crate::bootstrap::AppState;
use crate::errors::{new_correlation_id, workflow_error, ApiError};
use crate::identity::{require_admin, resolve_actor};

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub customer_code: Option<String>,
    pub name_kana: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListCustomersQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectCustomerRequest {
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub id: i64,
    pub customer_code: Option<String>,
    pub name: String,
    pub name_kana: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub note: Option<String>,
    pub status: String,
    pub requested_by_user_id: Option<i64>,
    pub approved_by_user_id: Option<i64>,
    pub approved_at: Option<String>,
    pub rejected_at: Option<String>,
    pub approval_comment: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Customer> for CustomerResponse {
    fn from(customer: Customer) -> Self {
        Self {
            id: customer.id.0,
            customer_code: customer.customer_code,
            name: customer.name,
            name_kana: customer.name_kana,
            address: customer.address,
            phone: customer.phone,
            note: customer.note,
            status: customer.status.as_str().to_string(),
            requested_by_user_id: customer.requested_by_user_id.map(|id| id.0),
            approved_by_user_id: customer.approved_by_user_id.map(|id| id.0),
            approved_at: customer.approved_at.map(|at| at.to_rfc3339()),
            rejected_at: customer.rejected_at.map(|at| at.to_rfc3339()),
            approval_comment: customer.approval_comment,
            created_at: customer.created_at.to_rfc3339(),
            updated_at: customer.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    /// `approved`/`rejected` when this request performed the write,
    /// `already_processed` when another request got there first.
    pub outcome: &'static str,
    pub customer: Option<CustomerResponse>,
}

#[derive(Debug, Serialize)]
pub struct ApprovalHistoryEntry {
    pub id: i64,
    pub user_id: i64,
    pub approved_by: i64,
    pub approved_by_login: Option<String>,
    pub approved_at: String,
}

#[derive(Debug, Serialize)]
pub struct ApprovalHistoryResponse {
    pub customer_id: i64,
    pub entries: Vec<ApprovalHistoryEntry>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/customers", post(create_customer).get(list_customers))
        .route("/api/v1/customers/{id}/approve", post(approve_customer))
        .route("/api/v1/customers/{id}/reject", post(reject_customer))
        .route("/api/v1/customers/{id}/approval-history", get(approval_history))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn create_customer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateCustomerRequest>,
) -> Result<Json<CustomerResponse>, (StatusCode, Json<ApiError>)> {
    let correlation_id = new_correlation_id();
    let actor = resolve_actor(&state.db_pool, &headers, &correlation_id).await?;

    let customer = SqlCustomerRepository::new(state.db_pool.clone())
        .create(NewCustomer {
            customer_code: body.customer_code,
            name: body.name,
            name_kana: body.name_kana,
            address: body.address,
            phone: body.phone,
            note: body.note,
            requested_by_user_id: Some(actor.id),
        })
        .await
        .map_err(|error| workflow_error(error, &correlation_id))?;

    info!(
        event_name = "customer.registered",
        correlation_id = %correlation_id,
        customer_id = %customer.id,
        actor_user_id = %actor.id,
        "customer registered, awaiting approval"
    );

    Ok(Json(customer.into()))
}

pub async fn list_customers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListCustomersQuery>,
) -> Result<Json<Vec<CustomerResponse>>, (StatusCode, Json<ApiError>)> {
    let correlation_id = new_correlation_id();
    let actor = resolve_actor(&state.db_pool, &headers, &correlation_id).await?;

    let visibility =
        if actor.is_admin() { ListVisibility::All } else { ListVisibility::ApprovedOnly };

    let customers = SqlCustomerRepository::new(state.db_pool.clone())
        .list(visibility, query.q.as_deref())
        .await
        .map_err(|error| workflow_error(error.into(), &correlation_id))?;

    Ok(Json(customers.into_iter().map(CustomerResponse::from).collect()))
}

pub async fn approve_customer(
    Path(customer_id): Path<i64>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TransitionResponse>, (StatusCode, Json<ApiError>)> {
    let correlation_id = new_correlation_id();
    let actor = require_admin(&state.db_pool, &headers, &correlation_id).await?;

    let repo = SqlCustomerRepository::new(state.db_pool.clone());
    let customer_id = CustomerId(customer_id);
    ensure_customer_exists(&repo, &customer_id, &correlation_id).await?;

    let outcome = repo
        .approve(&customer_id, &actor.id)
        .await
        .map_err(|error| workflow_error(error, &correlation_id))?;

    match outcome {
        TransitionOutcome::Applied(customer) => {
            info!(
                event_name = "customer.approved",
                correlation_id = %correlation_id,
                customer_id = %customer.id,
                actor_user_id = %actor.id,
                "customer approved, requester activated, audit entry written"
            );
            // Only the call that performed the write notifies; committed
            // state is never affected by anything the dispatcher does.
            state
                .dispatcher
                .notify(CustomerStatusEvent::new(&customer, CustomerAction::Approve, &actor, None));

            Ok(Json(TransitionResponse {
                outcome: "approved",
                customer: Some(customer.into()),
            }))
        }
        TransitionOutcome::AlreadyProcessed => {
            already_processed_response(&repo, &customer_id, &correlation_id).await
        }
    }
}

pub async fn reject_customer(
    Path(customer_id): Path<i64>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RejectCustomerRequest>,
) -> Result<Json<TransitionResponse>, (StatusCode, Json<ApiError>)> {
    let correlation_id = new_correlation_id();
    let actor = require_admin(&state.db_pool, &headers, &correlation_id).await?;

    let repo = SqlCustomerRepository::new(state.db_pool.clone());
    let customer_id = CustomerId(customer_id);
    ensure_customer_exists(&repo, &customer_id, &correlation_id).await?;

    let comment = body.comment.as_deref().unwrap_or("").trim().to_string();
    let outcome = repo
        .reject(&customer_id, &comment)
        .await
        .map_err(|error| workflow_error(error, &correlation_id))?;

    match outcome {
        TransitionOutcome::Applied(customer) => {
            info!(
                event_name = "customer.rejected",
                correlation_id = %correlation_id,
                customer_id = %customer.id,
                actor_user_id = %actor.id,
                "customer rejected"
            );
            state.dispatcher.notify(CustomerStatusEvent::new(
                &customer,
                CustomerAction::Reject,
                &actor,
                Some(comment.as_str()),
            ));

            Ok(Json(TransitionResponse {
                outcome: "rejected",
                customer: Some(customer.into()),
            }))
        }
        TransitionOutcome::AlreadyProcessed => {
            already_processed_response(&repo, &customer_id, &correlation_id).await
        }
    }
}

pub async fn approval_history(
    Path(customer_id): Path<i64>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApprovalHistoryResponse>, (StatusCode, Json<ApiError>)> {
    let correlation_id = new_correlation_id();
    require_admin(&state.db_pool, &headers, &correlation_id).await?;

    let repo = SqlCustomerRepository::new(state.db_pool.clone());
    let customer_id = CustomerId(customer_id);
    ensure_customer_exists(&repo, &customer_id, &correlation_id).await?;

    let entries = SqlApprovalLogRepository::new(state.db_pool.clone())
        .history(&customer_id)
        .await
        .map_err(|error| workflow_error(error.into(), &correlation_id))?;

    let users = SqlUserRepository::new(state.db_pool.clone());
    let mut response_entries = Vec::with_capacity(entries.len());
    for entry in entries {
        let approved_by_login = users
            .find_by_id(&entry.approved_by)
            .await
            .map_err(|error| workflow_error(error.into(), &correlation_id))?
            .map(|user| user.login_id);

        response_entries.push(ApprovalHistoryEntry {
            id: entry.id,
            user_id: entry.user_id.0,
            approved_by: entry.approved_by.0,
            approved_by_login,
            approved_at: entry.approved_at.to_rfc3339(),
        });
    }

    Ok(Json(ApprovalHistoryResponse { customer_id: customer_id.0, entries: response_entries }))
}

async fn ensure_customer_exists(
    repo: &SqlCustomerRepository,
    customer_id: &CustomerId,
    correlation_id: &str,
) -> Result<(), (StatusCode, Json<ApiError>)> {
    let found = repo
        .find_by_id(customer_id)
        .await
        .map_err(|error| workflow_error(error.into(), correlation_id))?;

    if found.is_none() {
        return Err(workflow_error(
            WorkflowError::Domain(DomainError::NotFound { entity: "customer", id: customer_id.0 }),
            correlation_id,
        ));
    }

    Ok(())
}

async fn already_processed_response(
    repo: &SqlCustomerRepository,
    customer_id: &CustomerId,
    correlation_id: &str,
) -> Result<Json<TransitionResponse>, (StatusCode, Json<ApiError>)> {
    let current = repo
        .find_by_id(customer_id)
        .await
        .map_err(|error: RepositoryError| workflow_error(error.into(), correlation_id))?;

    Ok(Json(TransitionResponse {
        outcome: "already_processed",
        customer: current.map(CustomerResponse::from),
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
