//! Report aggregation: assembles grouped order totals and per-period product
//! rankings into report rows.
//!
//! Read-only. Periods with no orders produce no row, except a period the
//! caller explicitly asked for, which yields a single zeroed row.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use service_core::error::AppError;

use crate::models::{SalesPeriodTotals, SalesReportRow, TopProduct};
use crate::services::Database;

/// Daily sales summary, ascending by date.
pub async fn daily_summary(
    db: &Database,
    date: Option<NaiveDate>,
) -> Result<Vec<SalesReportRow>, AppError> {
    let totals = db.daily_totals(date).await?;

    let mut rows = Vec::with_capacity(totals.len());
    for period in totals {
        let top_products = db.top_products_for_day(&period.period).await?;
        rows.push(assemble(period, top_products));
    }

    if rows.is_empty() {
        if let Some(date) = date {
            rows.push(zero_row(date.format("%Y-%m-%d").to_string()));
        }
    }

    Ok(rows)
}

/// Monthly sales summary, ascending by `YYYY-MM` key.
pub async fn monthly_summary(
    db: &Database,
    month: Option<&str>,
) -> Result<Vec<SalesReportRow>, AppError> {
    let totals = db.monthly_totals(month).await?;

    let mut rows = Vec::with_capacity(totals.len());
    for period in totals {
        let top_products = db.top_products_for_month(&period.period).await?;
        rows.push(assemble(period, top_products));
    }

    if rows.is_empty() {
        if let Some(month) = month {
            rows.push(zero_row(month.to_string()));
        }
    }

    Ok(rows)
}

fn assemble(totals: SalesPeriodTotals, top_products: Vec<TopProduct>) -> SalesReportRow {
    SalesReportRow {
        period: totals.period,
        total_orders: totals.total_orders,
        total_revenue: totals.total_revenue.to_f64().unwrap_or_default(),
        total_tax: totals.total_tax.to_f64().unwrap_or_default(),
        top_products,
    }
}

fn zero_row(period: String) -> SalesReportRow {
    SalesReportRow {
        period,
        total_orders: 0,
        total_revenue: 0.0,
        total_tax: 0.0,
        top_products: Vec::new(),
    }
}
