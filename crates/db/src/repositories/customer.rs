use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use quotedesk_core::domain::approval::TransitionOutcome;
use quotedesk_core::domain::customer::{Customer, CustomerId, CustomerStatus, NewCustomer};
use quotedesk_core::domain::user::UserId;
use quotedesk_core::errors::DomainError;

use super::{parse_optional_timestamp, parse_timestamp, RepositoryError, WorkflowError};
use crate::DbPool;

const CUSTOMER_COLUMNS: &str = "id, customer_code, name, name_kana, address, phone, note,
        status, requested_by_user_id, approved_by_user_id,
        approved_at, rejected_at, approval_comment, created_at, updated_at";

/// Which customers a caller may see: admins browse every status, everyone
/// else only approved records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListVisibility {
    All,
    ApprovedOnly,
}

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_customer: NewCustomer) -> Result<Customer, WorkflowError> {
        new_customer.validate().map_err(WorkflowError::Domain)?;

        let name = new_customer.name.trim().to_string();
        if self.find_by_name(&name).await?.is_some() {
            return Err(DomainError::DuplicateCustomerName { name }.into());
        }

        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO customers (
                customer_code, name, name_kana, address, phone, note,
                status, requested_by_user_id, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, 'pending', ?, ?, ?)",
        )
        .bind(new_customer.customer_code.as_deref())
        .bind(&name)
        .bind(new_customer.name_kana.as_deref())
        .bind(new_customer.address.as_deref())
        .bind(new_customer.phone.as_deref())
        .bind(new_customer.note.as_deref())
        .bind(new_customer.requested_by_user_id.map(|id| id.0))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|error| map_unique_violation(error, &name))?;

        let id = CustomerId(result.last_insert_rowid());
        self.find_by_id(&id)
            .await?
            .ok_or_else(|| RepositoryError::Decode(format!("customer {id} vanished after insert")))
            .map_err(WorkflowError::Repository)
    }

    pub async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| customer_from_row(&r)).transpose()
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE name = ?"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| customer_from_row(&r)).transpose()
    }

    pub async fn list(
        &self,
        visibility: ListVisibility,
        name_query: Option<&str>,
    ) -> Result<Vec<Customer>, RepositoryError> {
        let mut sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers");
        let mut clauses = Vec::new();
        if visibility == ListVisibility::ApprovedOnly {
            clauses.push("status = 'approved'");
        }
        if name_query.is_some() {
            clauses.push("(name LIKE '%' || ?1 || '%' OR name_kana LIKE '%' || ?1 || '%')");
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY name");

        let mut query = sqlx::query(&sql);
        if let Some(name_query) = name_query {
            query = query.bind(name_query);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(customer_from_row).collect()
    }

    /// Perform the pending→approved transition for one customer.
    ///
    /// The guarded UPDATE is the sole serialization point: whichever request
    /// the store applies first wins, every other concurrent call sees zero
    /// affected rows and returns `AlreadyProcessed` without writing anything.
    /// The requester activation and the audit-log insert commit atomically
    /// with the status change; a missing requester rolls all of it back.
    pub async fn approve(
        &self,
        id: &CustomerId,
        actor: &UserId,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE customers
             SET status = 'approved',
                 approved_by_user_id = ?,
                 approved_at = ?,
                 rejected_at = NULL,
                 approval_comment = NULL,
                 updated_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(actor.0)
        .bind(&now)
        .bind(&now)
        .bind(id.0)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // Lost the race, or the id was never pending. No writes happened.
            return Ok(TransitionOutcome::AlreadyProcessed);
        }

        let row =
            sqlx::query(&format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?"))
                .bind(id.0)
                .fetch_one(&mut *tx)
                .await?;
        let customer = customer_from_row(&row).map_err(WorkflowError::Repository)?;

        let Some(requester_id) = customer.requested_by_user_id else {
            // Dropping the transaction rolls the conditional update back.
            return Err(DomainError::RequesterMissing { customer_id: id.0 }.into());
        };

        let activated = sqlx::query("UPDATE users SET is_active = 1 WHERE id = ?")
            .bind(requester_id.0)
            .execute(&mut *tx)
            .await?;
        if activated.rows_affected() == 0 {
            return Err(DomainError::RequesterMissing { customer_id: id.0 }.into());
        }

        sqlx::query(
            "INSERT INTO customer_approval_log (customer_id, user_id, approved_by, approved_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(id.0)
        .bind(requester_id.0)
        .bind(actor.0)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(TransitionOutcome::Applied(customer))
    }

    /// Perform the pending→rejected transition for one customer.
    ///
    /// A single guarded UPDATE, same shape as approve's: already-approved and
    /// already-rejected records match zero rows. Rejection leaves the audit
    /// log untouched; the customer row's own fields carry the outcome, and
    /// the acting admin is recorded only in the request log at the boundary.
    pub async fn reject(
        &self,
        id: &CustomerId,
        comment: &str,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let now = Utc::now().to_rfc3339();

        let updated = sqlx::query(
            "UPDATE customers
             SET status = 'rejected',
                 approval_comment = ?,
                 rejected_at = ?,
                 approved_at = NULL,
                 approved_by_user_id = NULL,
                 updated_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(comment)
        .bind(&now)
        .bind(&now)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(TransitionOutcome::AlreadyProcessed);
        }

        let customer = self.find_by_id(id).await?.ok_or_else(|| {
            RepositoryError::Decode(format!("customer {id} vanished after rejection"))
        })?;

        Ok(TransitionOutcome::Applied(customer))
    }
}

fn map_unique_violation(error: sqlx::Error, name: &str) -> WorkflowError {
    match &error {
        sqlx::Error::Database(database) if database.is_unique_violation() => {
            DomainError::DuplicateCustomerName { name: name.to_string() }.into()
        }
        _ => WorkflowError::Repository(RepositoryError::Database(error)),
    }
}

fn customer_from_row(row: &SqliteRow) -> Result<Customer, RepositoryError> {
    let status_raw: String = row.try_get("status")?;
    let status = CustomerStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown customer status `{status_raw}`")))?;

    Ok(Customer {
        id: CustomerId(row.try_get("id")?),
        customer_code: row.try_get("customer_code")?,
        name: row.try_get("name")?,
        name_kana: row.try_get("name_kana")?,
        address: row.try_get("address")?,
        phone: row.try_get("phone")?,
        note: row.try_get("note")?,
        status,
        requested_by_user_id: row.try_get::<Option<i64>, _>("requested_by_user_id")?.map(UserId),
        approved_by_user_id: row.try_get::<Option<i64>, _>("approved_by_user_id")?.map(UserId),
        approved_at: parse_optional_timestamp("approved_at", row.try_get("approved_at")?)?,
        rejected_at: parse_optional_timestamp("rejected_at", row.try_get("rejected_at")?)?,
        approval_comment: row.try_get("approval_comment")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use quotedesk_core::domain::approval::TransitionOutcome;
    use quotedesk_core::domain::customer::{CustomerId, CustomerStatus, NewCustomer};
    use quotedesk_core::domain::user::{NewUser, UserId, UserRole};
    use quotedesk_core::errors::DomainError;

    use super::{ListVisibility, SqlCustomerRepository};
    use crate::repositories::{SqlApprovalLogRepository, SqlUserRepository, WorkflowError};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    async fn seed_users(pool: &DbPool) -> (UserId, UserId) {
        let users = SqlUserRepository::new(pool.clone());
        let admin = users
            .create(NewUser {
                login_id: "admin".to_string(),
                display_name: "Administrator".to_string(),
                role: UserRole::Admin,
            })
            .await
            .expect("create admin");
        let requester = users
            .create(NewUser {
                login_id: "sales-01".to_string(),
                display_name: "Sales Rep".to_string(),
                role: UserRole::User,
            })
            .await
            .expect("create requester");
        (admin.id, requester.id)
    }

    fn pending_customer(name: &str, requester: UserId) -> NewCustomer {
        NewCustomer {
            customer_code: Some("C-1001".to_string()),
            name: name.to_string(),
            name_kana: Some("アクメ".to_string()),
            address: Some("1-1-1 Chiyoda, Tokyo".to_string()),
            phone: Some("03-0000-0000".to_string()),
            note: None,
            requested_by_user_id: Some(requester),
        }
    }

    #[tokio::test]
    async fn create_starts_pending_with_requester_recorded() {
        let pool = setup().await;
        let (_, requester) = seed_users(&pool).await;
        let repo = SqlCustomerRepository::new(pool);

        let customer =
            repo.create(pending_customer("Acme Fabrication", requester)).await.expect("create");

        assert_eq!(customer.status, CustomerStatus::Pending);
        assert_eq!(customer.requested_by_user_id, Some(requester));
        assert!(customer.approved_at.is_none());
        assert!(customer.rejected_at.is_none());
    }

    #[tokio::test]
    async fn create_rejects_blank_and_duplicate_names() {
        let pool = setup().await;
        let (_, requester) = seed_users(&pool).await;
        let repo = SqlCustomerRepository::new(pool);

        let blank = repo.create(pending_customer("   ", requester)).await;
        assert!(matches!(
            blank,
            Err(WorkflowError::Domain(DomainError::EmptyCustomerName))
        ));

        repo.create(pending_customer("Acme Fabrication", requester)).await.expect("first create");
        let duplicate = repo.create(pending_customer("Acme Fabrication", requester)).await;
        assert!(matches!(
            duplicate,
            Err(WorkflowError::Domain(DomainError::DuplicateCustomerName { ref name }))
                if name == "Acme Fabrication"
        ));
    }

    #[tokio::test]
    async fn approve_transitions_activates_requester_and_logs_once() {
        let pool = setup().await;
        let (admin, requester) = seed_users(&pool).await;
        let repo = SqlCustomerRepository::new(pool.clone());
        let logs = SqlApprovalLogRepository::new(pool.clone());
        let users = SqlUserRepository::new(pool.clone());

        let customer =
            repo.create(pending_customer("Acme Fabrication", requester)).await.expect("create");
        assert!(!users.find_by_id(&requester).await.expect("find").expect("exists").is_active);

        let outcome = repo.approve(&customer.id, &admin).await.expect("approve");
        let approved = outcome.applied().expect("first approve should win");

        assert_eq!(approved.status, CustomerStatus::Approved);
        assert_eq!(approved.approved_by_user_id, Some(admin));
        assert!(approved.approved_at.is_some());
        assert!(approved.rejected_at.is_none());

        let requester_row = users.find_by_id(&requester).await.expect("find").expect("exists");
        assert!(requester_row.is_active);

        let history = logs.history(&customer.id).await.expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].approved_by, admin);
        assert_eq!(history[0].user_id, requester);
    }

    #[tokio::test]
    async fn second_approve_is_already_processed_and_writes_nothing() {
        let pool = setup().await;
        let (admin, requester) = seed_users(&pool).await;
        let repo = SqlCustomerRepository::new(pool.clone());
        let logs = SqlApprovalLogRepository::new(pool.clone());

        let customer =
            repo.create(pending_customer("Acme Fabrication", requester)).await.expect("create");
        let first = repo.approve(&customer.id, &admin).await.expect("first approve");
        let approved_at = first.applied().expect("applied").approved_at;

        let second = repo.approve(&customer.id, &admin).await.expect("second approve");
        assert_eq!(second, TransitionOutcome::AlreadyProcessed);

        let unchanged = repo.find_by_id(&customer.id).await.expect("find").expect("exists");
        assert_eq!(unchanged.approved_at, approved_at);
        assert_eq!(logs.count_for_customer(&customer.id).await.expect("count"), 1);
    }

    #[tokio::test]
    async fn approve_of_unknown_customer_is_already_processed() {
        let pool = setup().await;
        let (admin, _) = seed_users(&pool).await;
        let repo = SqlCustomerRepository::new(pool);

        let outcome = repo.approve(&CustomerId(9999), &admin).await.expect("approve");
        assert_eq!(outcome, TransitionOutcome::AlreadyProcessed);
    }

    #[tokio::test]
    async fn approve_without_resolvable_requester_rolls_back() {
        let pool = setup().await;
        let (admin, _) = seed_users(&pool).await;
        let repo = SqlCustomerRepository::new(pool.clone());
        let logs = SqlApprovalLogRepository::new(pool.clone());

        let customer = repo
            .create(NewCustomer {
                name: "Orphaned Request".to_string(),
                ..NewCustomer::default()
            })
            .await
            .expect("create");

        let result = repo.approve(&customer.id, &admin).await;
        assert!(matches!(
            result,
            Err(WorkflowError::Domain(DomainError::RequesterMissing { customer_id }))
                if customer_id == customer.id.0
        ));

        // The conditional update must not survive the rollback.
        let reloaded = repo.find_by_id(&customer.id).await.expect("find").expect("exists");
        assert_eq!(reloaded.status, CustomerStatus::Pending);
        assert!(reloaded.approved_at.is_none());
        assert_eq!(logs.count_for_customer(&customer.id).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn reject_persists_comment_verbatim_without_audit_entry() {
        let pool = setup().await;
        let (_admin, requester) = seed_users(&pool).await;
        let repo = SqlCustomerRepository::new(pool.clone());
        let logs = SqlApprovalLogRepository::new(pool.clone());
        let users = SqlUserRepository::new(pool.clone());

        let customer =
            repo.create(pending_customer("Acme Fabrication", requester)).await.expect("create");

        let outcome = repo
            .reject(&customer.id, "credit data incomplete, resubmit with FY2025")
            .await
            .expect("reject");
        let rejected = outcome.applied().expect("applied");

        assert_eq!(rejected.status, CustomerStatus::Rejected);
        assert_eq!(
            rejected.approval_comment.as_deref(),
            Some("credit data incomplete, resubmit with FY2025")
        );
        assert!(rejected.rejected_at.is_some());
        assert!(rejected.approved_at.is_none());
        assert!(rejected.approved_by_user_id.is_none());

        assert_eq!(logs.count_for_customer(&customer.id).await.expect("count"), 0);

        // Rejection never activates the requesting user.
        assert!(!users.find_by_id(&requester).await.expect("find").expect("exists").is_active);
    }

    #[tokio::test]
    async fn reject_after_terminal_state_is_already_processed() {
        let pool = setup().await;
        let (admin, requester) = seed_users(&pool).await;
        let repo = SqlCustomerRepository::new(pool.clone());

        let customer =
            repo.create(pending_customer("Acme Fabrication", requester)).await.expect("create");
        repo.approve(&customer.id, &admin).await.expect("approve");

        let outcome = repo.reject(&customer.id, "too late").await.expect("reject");
        assert_eq!(outcome, TransitionOutcome::AlreadyProcessed);

        let reloaded = repo.find_by_id(&customer.id).await.expect("find").expect("exists");
        assert_eq!(reloaded.status, CustomerStatus::Approved);
        assert!(reloaded.approval_comment.is_none());
    }

    #[tokio::test]
    async fn list_visibility_hides_unapproved_records_from_non_admins() {
        let pool = setup().await;
        let (admin, requester) = seed_users(&pool).await;
        let repo = SqlCustomerRepository::new(pool.clone());

        let pending =
            repo.create(pending_customer("Pending Works", requester)).await.expect("create");
        let approved = repo
            .create(NewCustomer {
                name: "Approved Works".to_string(),
                requested_by_user_id: Some(requester),
                ..NewCustomer::default()
            })
            .await
            .expect("create");
        repo.approve(&approved.id, &admin).await.expect("approve");

        let all = repo.list(ListVisibility::All, None).await.expect("list all");
        assert_eq!(all.len(), 2);

        let visible = repo.list(ListVisibility::ApprovedOnly, None).await.expect("list approved");
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, approved.id);
        assert_ne!(visible[0].id, pending.id);

        let filtered = repo
            .list(ListVisibility::All, Some("Pending"))
            .await
            .expect("list filtered");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, pending.id);
    }
}
