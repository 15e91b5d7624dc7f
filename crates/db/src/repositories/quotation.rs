use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use quotedesk_core::domain::customer::{CustomerId, CustomerStatus};
use quotedesk_core::domain::quotation::{NewQuotation, Quotation, QuotationId};
use quotedesk_core::errors::DomainError;

use super::{parse_timestamp, RepositoryError, WorkflowError};
use crate::DbPool;

const QUOTATION_COLUMNS: &str = "id, customer_id, company_name, project_name, total_amount,
        original_id, revision_no, created_at, updated_at";

/// Read-only precondition check consulted before a quotation is bound to a
/// customer. The read is advisory: the customer could in theory be rejected
/// between this check and the insert, a gap the original workflow accepts.
pub struct CustomerApprovalGate {
    pool: DbPool,
}

impl CustomerApprovalGate {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn check_approved(&self, customer_id: &CustomerId) -> Result<(), WorkflowError> {
        let status_raw = sqlx::query_scalar::<_, String>(
            "SELECT status FROM customers WHERE id = ?",
        )
        .bind(customer_id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(status_raw) = status_raw else {
            return Err(DomainError::NotFound { entity: "customer", id: customer_id.0 }.into());
        };

        let status = CustomerStatus::parse(&status_raw).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown customer status `{status_raw}`"))
        })?;

        if status != CustomerStatus::Approved {
            return Err(DomainError::CustomerNotApproved {
                customer_id: customer_id.0,
                status,
            }
            .into());
        }

        Ok(())
    }
}

pub struct SqlQuotationRepository {
    pool: DbPool,
    gate: CustomerApprovalGate,
}

impl SqlQuotationRepository {
    pub fn new(pool: DbPool) -> Self {
        let gate = CustomerApprovalGate::new(pool.clone());
        Self { pool, gate }
    }

    /// Create a quotation, either fresh (revision 0, its own series root) or
    /// as the next revision of an existing series. A referenced customer must
    /// be approved and supplies the company name; a quotation without a
    /// customer reference keeps its free-text company name and skips the
    /// gate.
    pub async fn create(&self, new_quotation: NewQuotation) -> Result<Quotation, WorkflowError> {
        let mut company_name = new_quotation.company_name.clone();
        if let Some(customer_id) = &new_quotation.customer_id {
            self.gate.check_approved(customer_id).await?;

            let name = sqlx::query_scalar::<_, String>(
                "SELECT name FROM customers WHERE id = ?",
            )
            .bind(customer_id.0)
            .fetch_one(&self.pool)
            .await?;
            company_name = name;
        }

        let series = match &new_quotation.revise_source_id {
            Some(source_id) => {
                let source = self.find_by_id(source_id).await?.ok_or(DomainError::NotFound {
                    entity: "quotation",
                    id: source_id.0,
                })?;
                let next_revision = sqlx::query_scalar::<_, i64>(
                    "SELECT COALESCE(MAX(revision_no), 0) + 1 FROM quotations WHERE original_id = ?",
                )
                .bind(source.original_id.0)
                .fetch_one(&self.pool)
                .await?;
                Some((source.original_id, next_revision))
            }
            None => None,
        };

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO quotations (
                customer_id, company_name, project_name, total_amount,
                original_id, revision_no, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new_quotation.customer_id.map(|id| id.0))
        .bind(&company_name)
        .bind(&new_quotation.project_name)
        .bind(new_quotation.total_amount.to_string())
        .bind(series.as_ref().map(|(original_id, _)| original_id.0))
        .bind(series.as_ref().map(|(_, revision_no)| *revision_no).unwrap_or(0))
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();
        if series.is_none() {
            // A fresh quotation roots its own revision series.
            sqlx::query("UPDATE quotations SET original_id = id WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.find_by_id(&QuotationId(id))
            .await?
            .ok_or_else(|| RepositoryError::Decode(format!("quotation {id} vanished after insert")))
            .map_err(WorkflowError::Repository)
    }

    pub async fn find_by_id(
        &self,
        id: &QuotationId,
    ) -> Result<Option<Quotation>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {QUOTATION_COLUMNS} FROM quotations WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| quotation_from_row(&r)).transpose()
    }

    pub async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Quotation>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {QUOTATION_COLUMNS} FROM quotations
             WHERE customer_id = ?
             ORDER BY original_id, revision_no",
        ))
        .bind(customer_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(quotation_from_row).collect()
    }
}

fn quotation_from_row(row: &SqliteRow) -> Result<Quotation, RepositoryError> {
    let id: i64 = row.try_get("id")?;
    let total_raw: String = row.try_get("total_amount")?;
    let total_amount = Decimal::from_str(&total_raw).map_err(|error| {
        RepositoryError::Decode(format!("invalid total_amount `{total_raw}` ({error})"))
    })?;

    Ok(Quotation {
        id: QuotationId(id),
        customer_id: row.try_get::<Option<i64>, _>("customer_id")?.map(CustomerId),
        company_name: row.try_get("company_name")?,
        project_name: row.try_get("project_name")?,
        total_amount,
        original_id: QuotationId(row.try_get::<Option<i64>, _>("original_id")?.unwrap_or(id)),
        revision_no: row.try_get("revision_no")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}
