//! Submission pipeline orchestration: load the invoice and its order lines,
//! transform, submit, and durably record the outcome.

use chrono::Utc;
use rust_decimal::Decimal;
use service_core::error::AppError;

use crate::config::AuthorityConfig;
use crate::fiscal::payload::{NORMAL_SALE_CODE, SALE_RECEIPT_CODE};
use crate::fiscal::{
    build_payload, vat_breakdown, InvoiceSource, SourceLineItem, SubmissionClient,
    SubmissionOutcome, TaxRule, TransformError,
};
use crate::models::SubmissionRecord;
use crate::services::metrics::{ERRORS_TOTAL, SUBMISSIONS_TOTAL, SUBMISSION_ATTEMPTS_TOTAL};
use crate::services::Database;

/// Run the whole pipeline for one invoice. The retry sequence yields exactly
/// one log write; the returned record is the authoritative row.
#[tracing::instrument(skip(db, submitter, tax_rule, authority))]
pub async fn submit_invoice(
    db: &Database,
    submitter: &SubmissionClient,
    tax_rule: &dyn TaxRule,
    authority: &AuthorityConfig,
    invoice_id: i64,
) -> Result<(SubmissionOutcome, SubmissionRecord), AppError> {
    let invoice = db
        .get_invoice(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;
    let lines = db.get_order_lines(invoice.order_id).await?;

    let items: Vec<SourceLineItem> = lines
        .iter()
        .map(|line| {
            let class = tax_rule.classify(&line.tax_code);
            let total = line.price * Decimal::from(line.quantity);
            let (taxable, tax) = vat_breakdown(total, class.rate);
            SourceLineItem {
                item_code: format!("P{:06}", line.product_id),
                item_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price: line.price,
                tax_code: line.tax_code.clone(),
                taxable_amount: taxable,
                tax_amount: tax,
                total_amount: total,
            }
        })
        .collect();

    let source = InvoiceSource {
        tpin: authority.tpin.clone(),
        bhf_id: authority.bhf_id.clone(),
        device_serial: authority.device_serial.clone(),
        invoice_number: invoice.invoice_number.clone(),
        sale_date: invoice.issue_date,
        // Refund flows are not captured upstream; every submitted invoice is
        // a normal sale receipt.
        sale_type_code: NORMAL_SALE_CODE.to_string(),
        receipt_type_code: SALE_RECEIPT_CODE.to_string(),
        payment_type: None,
        customer_tpin: None,
        customer_name: None,
        total_taxable: invoice.total_amount - invoice.tax_amount,
        total_tax: invoice.tax_amount,
        total_amount: invoice.total_amount,
        items,
    };

    let payload = build_payload(&source, tax_rule).map_err(|err| match err {
        TransformError::Validation(msg) => {
            ERRORS_TOTAL.with_label_values(&["validation"]).inc();
            AppError::BadRequest(anyhow::anyhow!(msg))
        }
    })?;

    let outcome = submitter.submit(&payload).await;

    SUBMISSION_ATTEMPTS_TOTAL.inc_by(outcome.attempts as f64);
    SUBMISSIONS_TOTAL
        .with_label_values(&[outcome.status.as_str()])
        .inc();

    // A log-write failure is a storage fault and must surface as one, even
    // though the authority call itself may have succeeded.
    let record = db
        .record_submission(
            &invoice.invoice_number,
            outcome.status,
            &outcome.response,
            Utc::now(),
        )
        .await
        .map_err(|err| {
            ERRORS_TOTAL.with_label_values(&["storage"]).inc();
            err
        })?;

    Ok((outcome, record))
}
