use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuotationId(pub i64);

impl std::fmt::Display for QuotationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A price quotation header. Revisions form a series: `original_id` points
/// at the series root (a fresh quotation is its own root, revision 0) and
/// `revision_no` increments within the series.
///
/// `customer_id` is optional: a quotation may carry a free-text company
/// name with no customer reference. When a customer is referenced, creation
/// is gated on that customer being approved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub customer_id: Option<CustomerId>,
    pub company_name: String,
    pub project_name: String,
    pub total_amount: Decimal,
    pub original_id: QuotationId,
    pub revision_no: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuotation {
    pub customer_id: Option<CustomerId>,
    pub company_name: String,
    pub project_name: String,
    pub total_amount: Decimal,
    /// When set, the new quotation becomes the next revision in the
    /// source's series instead of starting a fresh one.
    pub revise_source_id: Option<QuotationId>,
}
