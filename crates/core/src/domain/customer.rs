use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub i64);

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    Pending,
    Approved,
    Rejected,
}

impl CustomerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// A customer master record together with its approval-workflow fields.
///
/// Invariant: at most one of `approved_at`/`rejected_at` is set, and only
/// for the matching status; both are null while the record is pending.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub customer_code: Option<String>,
    pub name: String,
    pub name_kana: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub note: Option<String>,
    pub status: CustomerStatus,
    pub requested_by_user_id: Option<UserId>,
    pub approved_by_user_id: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub approval_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn is_pending(&self) -> bool {
        self.status == CustomerStatus::Pending
    }

    pub fn is_approved(&self) -> bool {
        self.status == CustomerStatus::Approved
    }

    pub fn is_rejected(&self) -> bool {
        self.status == CustomerStatus::Rejected
    }

    /// Approved and rejected are both terminal for the workflow; the only
    /// legal transitions leave the pending state.
    pub fn can_transition_to(&self, next: CustomerStatus) -> bool {
        matches!(
            (self.status, next),
            (CustomerStatus::Pending, CustomerStatus::Approved)
                | (CustomerStatus::Pending, CustomerStatus::Rejected)
        )
    }

    pub fn transition_to(&mut self, next: CustomerStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidCustomerTransition { from: self.status, to: next })
    }
}

/// Input for registering a new customer; always enters the workflow pending.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub customer_code: Option<String>,
    pub name: String,
    pub name_kana: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub note: Option<String>,
    pub requested_by_user_id: Option<UserId>,
}

impl NewCustomer {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::EmptyCustomerName);
        }
        Ok(())
    }
}
