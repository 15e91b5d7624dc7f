use sqlx::{sqlite::SqliteRow, Row};

use quotedesk_core::domain::approval::ApprovalLogEntry;
use quotedesk_core::domain::customer::CustomerId;
use quotedesk_core::domain::user::UserId;

use super::{parse_timestamp, RepositoryError};
use crate::DbPool;

/// Read side of the append-only approval audit log.
///
/// The single insert lives inside the approve transaction in the customer
/// repository; this type deliberately exposes no write operations.
pub struct SqlApprovalLogRepository {
    pool: DbPool,
}

impl SqlApprovalLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn history(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<ApprovalLogEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, customer_id, user_id, approved_by, approved_at
             FROM customer_approval_log
             WHERE customer_id = ?
             ORDER BY approved_at DESC, id DESC",
        )
        .bind(customer_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    pub async fn count_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM customer_approval_log WHERE customer_id = ?",
        )
        .bind(customer_id.0)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

fn entry_from_row(row: &SqliteRow) -> Result<ApprovalLogEntry, RepositoryError> {
    Ok(ApprovalLogEntry {
        id: row.try_get("id")?,
        customer_id: CustomerId(row.try_get("customer_id")?),
        user_id: UserId(row.try_get("user_id")?),
        approved_by: UserId(row.try_get("approved_by")?),
        approved_at: parse_timestamp("approved_at", row.try_get("approved_at")?)?,
    })
}
