//! Order and order-item models.
//!
//! Orders are written once at capture time and are read-only afterwards; the
//! fiscal pipeline and the report aggregator only ever read them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A captured sale.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub total: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub created_utc: DateTime<Utc>,
}

/// A single line of an order.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub price: Decimal,
}

/// An order line joined with product identity, as needed by the fiscal
/// transformer (name and tax code come from the catalog).
#[derive(Debug, Clone, FromRow)]
pub struct OrderLine {
    pub product_id: i64,
    pub product_name: String,
    pub tax_code: String,
    pub quantity: i32,
    pub price: Decimal,
}

/// Input for capturing an order.
///
/// `created_utc` is optional so that imports can backdate; the capture
/// endpoint always leaves it unset and lets the database stamp `NOW()`.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub total: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub created_utc: Option<DateTime<Utc>>,
    pub items: Vec<CreateOrderItem>,
}

#[derive(Debug, Clone)]
pub struct CreateOrderItem {
    pub product_id: i64,
    pub quantity: i32,
    pub price: Decimal,
}
