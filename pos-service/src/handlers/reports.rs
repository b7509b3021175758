//! Sales report handlers. Bearer attribution is required here; the subject is
//! recorded on the span and nothing else is done with it.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use service_core::error::AppError;

use crate::dtos::{DailyReportQuery, MonthlyReportQuery};
use crate::middleware::CallerContext;
use crate::models::SalesReportRow;
use crate::services::reports;
use crate::startup::AppState;

/// Daily sales summary, optionally restricted to one date.
pub async fn daily_report(
    State(state): State<AppState>,
    caller: CallerContext,
    Query(params): Query<DailyReportQuery>,
) -> Result<Json<Vec<SalesReportRow>>, AppError> {
    tracing::info!(caller = %caller.subject, date = ?params.date, "Daily report requested");

    let rows = reports::daily_summary(&state.db, params.date).await?;
    Ok(Json(rows))
}

/// Monthly sales summary, optionally restricted to one `YYYY-MM` month.
pub async fn monthly_report(
    State(state): State<AppState>,
    caller: CallerContext,
    Query(params): Query<MonthlyReportQuery>,
) -> Result<Json<Vec<SalesReportRow>>, AppError> {
    if let Some(month) = &params.month {
        NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d")
            .map_err(|_| AppError::BadRequest(anyhow::anyhow!("month must be formatted YYYY-MM")))?;
    }

    tracing::info!(caller = %caller.subject, month = ?params.month, "Monthly report requested");

    let rows = reports::monthly_summary(&state.db, params.month.as_deref()).await?;
    Ok(Json(rows))
}
