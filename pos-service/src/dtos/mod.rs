//! Request/response shapes for the HTTP surface.
//!
//! Monetary amounts cross the wire as plain numbers and are converted to
//! `Decimal` at this boundary; everything past it works in `Decimal`.

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service_core::error::AppError;
use validator::Validate;

use crate::models::{Invoice, Order, OrderItem, Product, SubmissionRecord};

/// Convert a wire amount into a `Decimal`, rejecting NaN/infinite input.
pub(crate) fn money(value: f64) -> Result<Decimal, AppError> {
    Decimal::try_from(value)
        .map_err(|_| AppError::BadRequest(anyhow!("invalid monetary amount: {}", value)))
}

fn wire(amount: Decimal) -> f64 {
    amount.to_f64().unwrap_or_default()
}

// -----------------------------------------------------------------------------
// Products
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 0.0))]
    pub price: f64,
    #[validate(range(min = 0))]
    pub stock: i32,
    /// Authority tax-type code; defaults to the standard-rated code.
    pub tax_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock: i32,
    pub tax_code: String,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price: wire(product.price),
            stock: product.stock,
            tax_code: product.tax_code,
        }
    }
}

// -----------------------------------------------------------------------------
// Orders
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderItemRequest {
    pub product_id: i64,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(range(min = 0.0))]
    pub price: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(range(min = 0.0))]
    pub total: f64,
    #[validate(range(min = 0.0))]
    pub tax: f64,
    #[validate(range(min = 0.0))]
    pub discount: f64,
    #[validate(length(min = 1), nested)]
    pub items: Vec<CreateOrderItemRequest>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderItemResponse {
    pub product_id: i64,
    pub quantity: i32,
    pub price: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: i64,
    pub total: f64,
    pub tax: f64,
    pub discount: f64,
    pub created_utc: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

impl OrderResponse {
    pub fn from_parts(order: Order, items: Vec<OrderItem>) -> Self {
        Self {
            id: order.id,
            total: wire(order.total),
            tax: wire(order.tax),
            discount: wire(order.discount),
            created_utc: order.created_utc,
            items: items
                .into_iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    price: wire(item.price),
                })
                .collect(),
        }
    }
}

// -----------------------------------------------------------------------------
// Invoices & submissions
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub order_id: i64,
    /// Overrides the default `INV-{order_id}` numbering when set.
    pub invoice_number: Option<String>,
    pub issue_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvoiceResponse {
    pub id: i64,
    pub order_id: i64,
    pub invoice_number: String,
    pub total_amount: f64,
    pub tax_amount: f64,
    pub issue_date: NaiveDate,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            id: invoice.id,
            order_id: invoice.order_id,
            invoice_number: invoice.invoice_number,
            total_amount: wire(invoice.total_amount),
            tax_amount: wire(invoice.tax_amount),
            issue_date: invoice.issue_date,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitInvoiceResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionLogResponse {
    pub invoice_number: String,
    pub status: String,
    pub response: Value,
    pub submitted_utc: DateTime<Utc>,
}

impl From<SubmissionRecord> for SubmissionLogResponse {
    fn from(record: SubmissionRecord) -> Self {
        Self {
            invoice_number: record.invoice_number,
            status: record.status,
            response: record.response_payload,
            submitted_utc: record.submitted_utc,
        }
    }
}

// -----------------------------------------------------------------------------
// Reports
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct DailyReportQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct MonthlyReportQuery {
    /// `YYYY-MM`.
    pub month: Option<String>,
}
