use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::customer::{Customer, CustomerId};
use crate::domain::user::UserId;

/// One row of the append-only approval audit log.
///
/// Entries are written only by a winning pending→approved transition, in the
/// same transaction as the transition itself; nothing in the tree updates or
/// deletes them. `user_id` is the requesting user whose account was
/// activated, `approved_by` the acting admin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLogEntry {
    pub id: i64,
    pub customer_id: CustomerId,
    pub user_id: UserId,
    pub approved_by: UserId,
    pub approved_at: DateTime<Utc>,
}

/// Result of a conditional approve/reject attempt.
///
/// `AlreadyProcessed` means the guarded update matched zero rows: another
/// request transitioned the customer first (or it was never pending). It is
/// a normal outcome, not a failure, and implies no writes were performed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied(Customer),
    AlreadyProcessed,
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn applied(self) -> Option<Customer> {
        match self {
            Self::Applied(customer) => Some(customer),
            Self::AlreadyProcessed => None,
        }
    }
}
