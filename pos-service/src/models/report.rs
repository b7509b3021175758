//! Derived sales report rows. Never persisted; recomputed per request.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Per-period totals as they come back from the grouping query.
#[derive(Debug, Clone, FromRow)]
pub struct SalesPeriodTotals {
    pub period: String,
    pub total_orders: i64,
    pub total_revenue: Decimal,
    pub total_tax: Decimal,
}

/// One product in the per-period ranking.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TopProduct {
    pub product_id: i64,
    pub name: String,
    pub quantity_sold: i64,
}

/// One row of a daily or monthly sales report.
///
/// `period` is `YYYY-MM-DD` for daily reports and `YYYY-MM` for monthly ones.
/// Revenue and tax are emitted as plain numbers to match the rest of the
/// report API surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesReportRow {
    pub period: String,
    pub total_orders: i64,
    pub total_revenue: f64,
    pub total_tax: f64,
    pub top_products: Vec<TopProduct>,
}
