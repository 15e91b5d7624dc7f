use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Deterministic demo dataset covering each workflow state: a pending
/// customer awaiting review, an approved customer whose requester was
/// activated and audited, and a rejected customer with a review comment.
pub struct DemoSeedDataset;

#[derive(Clone, Debug)]
pub struct SeedResult {
    pub customers_seeded: usize,
    pub users_seeded: usize,
}

#[derive(Clone, Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

impl DemoSeedDataset {
    pub const SQL: &'static str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult { customers_seeded: 3, users_seeded: 3 })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let user_count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users").fetch_one(pool).await?;
        checks.push(("three seed users", user_count == 3));

        let status_spread = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(DISTINCT status) FROM customers
             WHERE status IN ('pending', 'approved', 'rejected')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("one customer per workflow state", status_spread == 3));

        let audit_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM customer_approval_log WHERE customer_id = 2",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("approved customer audited once", audit_count == 1));

        let activated = sqlx::query_scalar::<_, i64>(
            "SELECT is_active FROM users WHERE id = 3",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("approved customer's requester active", activated == 1));

        let quotation_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM quotations WHERE customer_id = 2",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("quotation bound to approved customer", quotation_count == 1));

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }
}

#[cfg(test)]
mod tests {
    use super::DemoSeedDataset;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn demo_seed_loads_and_verifies() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let result = DemoSeedDataset::load(&pool).await.expect("load seed");
        assert_eq!(result.customers_seeded, 3);
        assert_eq!(result.users_seeded, 3);

        let verification = DemoSeedDataset::verify(&pool).await.expect("verify seed");
        assert!(
            verification.all_present,
            "failed checks: {:?}",
            verification
                .checks
                .iter()
                .filter(|(_, passed)| !passed)
                .map(|(check, _)| *check)
                .collect::<Vec<_>>()
        );
    }
}
