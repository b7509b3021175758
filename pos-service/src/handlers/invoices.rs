//! Invoice handlers: raising invoices, submitting them to the authority, and
//! looking up recorded outcomes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::dtos::{
    CreateInvoiceRequest, InvoiceResponse, SubmissionLogResponse, SubmitInvoiceResponse,
};
use crate::models::CreateInvoice;
use crate::services::submission;
use crate::startup::AppState;

/// Raise an invoice from an order.
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    let input = CreateInvoice {
        order_id: payload.order_id,
        invoice_number: payload.invoice_number,
        issue_date: payload.issue_date,
    };

    let invoice = state.db.create_invoice(&input).await?;

    Ok((StatusCode::CREATED, Json(invoice.into())))
}

/// Submit an invoice to the tax authority and record the outcome.
///
/// Authority rejections and transport failures come back as a 200 with
/// `status: "ERROR"`; only storage faults and unknown invoices are HTTP
/// errors.
pub async fn submit_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<i64>,
) -> Result<Json<SubmitInvoiceResponse>, AppError> {
    let (outcome, _record) = submission::submit_invoice(
        &state.db,
        &state.submitter,
        state.tax_rule.as_ref(),
        &state.config.authority,
        invoice_id,
    )
    .await?;

    Ok(Json(SubmitInvoiceResponse {
        status: outcome.status.as_str().to_string(),
        authority_reference: outcome.authority_reference,
        message: outcome.message,
    }))
}

/// Look up the recorded submission outcome for an invoice number.
pub async fn get_submission_log(
    State(state): State<AppState>,
    Path(invoice_number): Path<String>,
) -> Result<Json<SubmissionLogResponse>, AppError> {
    let record = state
        .db
        .get_submission(&invoice_number)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!(
                "No submission recorded for invoice '{}'",
                invoice_number
            ))
        })?;

    Ok(Json(record.into()))
}
