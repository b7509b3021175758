//! Fiscal invoice model.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A fiscal invoice raised from an order (1:1).
///
/// `invoice_number` is the idempotency key for the submission log; its format
/// is authority-defined, the service only requires uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: i64,
    pub order_id: i64,
    pub invoice_number: String,
    pub total_amount: Decimal,
    pub tax_amount: Decimal,
    pub issue_date: NaiveDate,
    pub created_utc: DateTime<Utc>,
}

/// Input for raising an invoice from an order.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub order_id: i64,
    /// Overrides the default `INV-{order_id}` numbering when set.
    pub invoice_number: Option<String>,
    pub issue_date: Option<NaiveDate>,
}
