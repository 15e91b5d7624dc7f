//! Quotation endpoints. Creation consults the customer approval gate: a
//! quotation may only be bound to an approved customer.
//!
//! - `POST /api/v1/quotations`                      — create a quotation or a revision
//! - `GET  /api/v1/quotations/{id}`                 — fetch one quotation
//! - `GET  /api/v1/customers/{id}/quotations`       — list a customer's quotation series

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use quotedesk_core::domain::customer::CustomerId;
use quotedesk_core::domain::quotation::{NewQuotation, Quotation, QuotationId};
use quotedesk_core::errors::DomainError;
use quotedesk_db::repositories::{SqlQuotationRepository, WorkflowError};

use crate::bootstrap::AppState;
use crate::errors::{new_correlation_id, workflow_error, ApiError};
use crate::identity::resolve_actor;

#[derive(Debug, Deserialize)]
pub struct CreateQuotationRequest {
    pub customer_id: Option<i64>,
    pub company_name: Option<String>,
    pub project_name: String,
    pub total_amount: Decimal,
    pub revise_source_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct QuotationResponse {
    pub id: i64,
    pub customer_id: Option<i64>,
    pub company_name: String,
    pub project_name: String,
    pub total_amount: String,
    pub original_id: i64,
    pub revision_no: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Quotation> for QuotationResponse {
    fn from(quotation: Quotation) -> Self {
        Self {
            id: quotation.id.0,
            customer_id: quotation.customer_id.map(|id| id.0),
            company_name: quotation.company_name,
            project_name: quotation.project_name,
            total_amount: quotation.total_amount.to_string(),
            original_id: quotation.original_id.0,
            revision_no: quotation.revision_no,
            created_at: quotation.created_at.to_rfc3339(),
            updated_at: quotation.updated_at.to_rfc3339(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/quotations", post(create_quotation))
        .route("/api/v1/quotations/{id}", get(get_quotation))
        .route("/api/v1/customers/{id}/quotations", get(list_customer_quotations))
        .with_state(state)
}

pub async fn create_quotation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateQuotationRequest>,
) -> Result<Json<QuotationResponse>, (StatusCode, Json<ApiError>)> {
    let correlation_id = new_correlation_id();
    let actor = resolve_actor(&state.db_pool, &headers, &correlation_id).await?;

    let project_name = body.project_name.trim().to_string();
    if project_name.is_empty() {
        return Err(workflow_error(
            WorkflowError::Domain(DomainError::InvariantViolation(
                "project_name must not be empty".to_string(),
            )),
            &correlation_id,
        ));
    }

    let company_name = body.company_name.unwrap_or_default().trim().to_string();
    if body.customer_id.is_none() && company_name.is_empty() {
        return Err(workflow_error(
            WorkflowError::Domain(DomainError::InvariantViolation(
                "either customer_id or company_name is required".to_string(),
            )),
            &correlation_id,
        ));
    }

    let quotation = SqlQuotationRepository::new(state.db_pool.clone())
        .create(NewQuotation {
            customer_id: body.customer_id.map(CustomerId),
            company_name,
            project_name,
            total_amount: body.total_amount,
            revise_source_id: body.revise_source_id.map(QuotationId),
        })
        .await
        .map_err(|error| workflow_error(error, &correlation_id))?;

    info!(
        event_name = "quotation.created",
        correlation_id = %correlation_id,
        quotation_id = %quotation.id,
        revision_no = quotation.revision_no,
        actor_user_id = %actor.id,
        "quotation created"
    );

    Ok(Json(quotation.into()))
}

pub async fn get_quotation(
    Path(quotation_id): Path<i64>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<QuotationResponse>, (StatusCode, Json<ApiError>)> {
    let correlation_id = new_correlation_id();
    resolve_actor(&state.db_pool, &headers, &correlation_id).await?;

    let quotation = SqlQuotationRepository::new(state.db_pool.clone())
        .find_by_id(&QuotationId(quotation_id))
        .await
        .map_err(|error| workflow_error(error.into(), &correlation_id))?
        .ok_or_else(|| {
            workflow_error(
                WorkflowError::Domain(DomainError::NotFound {
                    entity: "quotation",
                    id: quotation_id,
                }),
                &correlation_id,
            )
        })?;

    Ok(Json(quotation.into()))
}

pub async fn list_customer_quotations(
    Path(customer_id): Path<i64>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<QuotationResponse>>, (StatusCode, Json<ApiError>)> {
    let correlation_id = new_correlation_id();
    resolve_actor(&state.db_pool, &headers, &correlation_id).await?;

    let quotations = SqlQuotationRepository::new(state.db_pool.clone())
        .list_for_customer(&CustomerId(customer_id))
        .await
        .map_err(|error| workflow_error(error.into(), &correlation_id))?;

    Ok(Json(quotations.into_iter().map(QuotationResponse::from).collect()))
}
